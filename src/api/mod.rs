use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, State as AxumState, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::clients::{HttpListingProvider, HttpOracle, ListingCache, ListingError, ListingSource};
use crate::config::ServeConfig;
use crate::core::{
    EngineError, EnvelopeConfig, Finance, LifeEvent, MatchedListing, PriceOracle, SearchFilter,
    State, TurnDelta, advance, compute_envelope, lookup_region, match_listings, solve_for_region,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct AppState<O, L> {
    oracle: Arc<O>,
    listings: Arc<L>,
    envelope: EnvelopeConfig,
}

impl<O, L> AppState<O, L> {
    pub fn new(oracle: Arc<O>, listings: Arc<L>, envelope: EnvelopeConfig) -> Self {
        Self {
            oracle,
            listings,
            envelope,
        }
    }
}

impl<O, L> Clone for AppState<O, L> {
    fn clone(&self) -> Self {
        Self {
            oracle: Arc::clone(&self.oracle),
            listings: Arc::clone(&self.listings),
            envelope: self.envelope,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::InvalidInput(_) | EngineError::UnknownRegion(_) => {
                StatusCode::BAD_REQUEST
            }
            EngineError::NonAmortizing { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::OracleUnavailable(_) => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("Invalid JSON payload: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(self.status, &self.message)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct StateResponse {
    state: State,
}

#[derive(Debug, Serialize)]
struct HousesResponse {
    results: Vec<MatchedListing>,
}

#[derive(Debug, Serialize)]
struct DurationResponse {
    years: f64,
}

#[derive(Debug, Deserialize)]
struct InitPayload {
    age: u32,
    finance: Finance,
    #[serde(rename = "filter_option", alias = "filter_options")]
    filter: SearchFilter,
}

#[derive(Debug, Deserialize)]
struct ChangeAgePayload {
    #[serde(alias = "age")]
    delta_age: i64,
    #[serde(alias = "game_state")]
    state: State,
}

#[derive(Debug, Deserialize)]
struct ChangeChancePayload {
    chance: LifeEvent,
    state: State,
}

#[derive(Debug, Deserialize)]
struct ChangeFilterPayload {
    #[serde(rename = "filter_option", alias = "filter_options")]
    filter: SearchFilter,
    state: State,
}

#[derive(Debug, Deserialize)]
struct HousesPayload {
    #[serde(alias = "game_state")]
    state: State,
}

#[derive(Debug, Deserialize)]
struct DurationPayload {
    price: f64,
    finance: Finance,
    region: String,
}

type ApiResult = Result<Response, ApiError>;

pub async fn run_http_server(config: ServeConfig) -> Result<(), ServerError> {
    let client = reqwest::Client::builder()
        .timeout(config.oracle_timeout)
        .build()?;
    let oracle = Arc::new(HttpOracle::new(client.clone(), config.oracle_url.clone()));
    let cache = Arc::new(ListingCache::new(config.listing_cache_capacity));
    let listings = Arc::new(HttpListingProvider::new(
        client,
        config.listings_url.clone(),
        config.listing_page_size,
        cache,
    ));
    let state = AppState::new(
        oracle,
        listings,
        EnvelopeConfig {
            oracle_timeout: config.oracle_timeout,
        },
    );

    let listener = TcpListener::bind(config.bind).await?;
    info!("immoquest HTTP API listening on http://{}", config.bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router<O: PriceOracle, L: ListingSource>(state: AppState<O, L>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/init", post(init_handler::<O, L>))
        .route("/change-age", post(change_age_handler::<O, L>))
        .route("/change-chance", post(change_chance_handler))
        .route("/change-filter", post(change_filter_handler))
        .route("/houses", post(houses_handler::<O, L>))
        .route("/duration", post(duration_handler))
        .fallback(not_found_handler)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn init_handler<O: PriceOracle, L: ListingSource>(
    AxumState(app): AxumState<AppState<O, L>>,
    payload: Result<Json<InitPayload>, JsonRejection>,
) -> ApiResult {
    let Json(payload) = payload?;
    payload.finance.validate()?;
    lookup_region(&payload.filter.region)?;

    let mut state = State::new(payload.age, payload.finance, payload.filter);
    state.equity = Some(compute_envelope(&app.oracle, &state, app.envelope).await?);
    Ok(json_response(StatusCode::OK, StateResponse { state }))
}

async fn change_age_handler<O: PriceOracle, L: ListingSource>(
    AxumState(app): AxumState<AppState<O, L>>,
    payload: Result<Json<ChangeAgePayload>, JsonRejection>,
) -> ApiResult {
    let Json(payload) = payload?;
    let delta = TurnDelta::try_from(payload.delta_age)?;
    payload.state.finance.validate()?;

    let state = advance(&app.oracle, &payload.state, delta, app.envelope).await?;
    Ok(json_response(StatusCode::OK, StateResponse { state }))
}

async fn change_chance_handler(
    payload: Result<Json<ChangeChancePayload>, JsonRejection>,
) -> ApiResult {
    let Json(ChangeChancePayload { chance, mut state }) = payload?;
    if !chance.yearly_cost.is_finite() || !chance.one_time_cost.is_finite() {
        let err = EngineError::InvalidInput("life event costs must be finite".to_string());
        return Err(err.into());
    }
    state.pending_events.push(chance);
    Ok(json_response(StatusCode::OK, StateResponse { state }))
}

async fn change_filter_handler(
    payload: Result<Json<ChangeFilterPayload>, JsonRejection>,
) -> ApiResult {
    let Json(ChangeFilterPayload { filter, mut state }) = payload?;
    lookup_region(&filter.region)?;
    state.filter = filter;
    Ok(json_response(StatusCode::OK, StateResponse { state }))
}

async fn houses_handler<O: PriceOracle, L: ListingSource>(
    AxumState(app): AxumState<AppState<O, L>>,
    payload: Result<Json<HousesPayload>, JsonRejection>,
) -> ApiResult {
    let Json(HousesPayload { state }) = payload?;
    let Some(envelope) = state.equity else {
        return Ok(json_response(StatusCode::OK, HousesResponse { results: Vec::new() }));
    };
    state.finance.validate()?;
    lookup_region(state.region())?;

    let listings = app.listings.fetch(&state.filter).await?;
    let outcome = match_listings(&listings, envelope, &state.finance, state.region());
    for skipped in &outcome.skipped {
        warn!(listing = %skipped.id, reason = %skipped.reason, "listing dropped from matches");
    }
    Ok(json_response(
        StatusCode::OK,
        HousesResponse {
            results: outcome.matched,
        },
    ))
}

async fn duration_handler(payload: Result<Json<DurationPayload>, JsonRejection>) -> ApiResult {
    let Json(payload) = payload?;
    payload.finance.validate()?;
    let years = solve_for_region(payload.price, &payload.finance, &payload.region)?;
    Ok(json_response(StatusCode::OK, DurationResponse { years }))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
