use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::core::{OracleQuery, PriceOracle};

pub const DEFAULT_ORACLE_URL: &str =
    "https://www.interhyp.de/customer-generation/budget/calculateMaxBuyingPower";

const AMORTISATION_PCT: f64 = 1.5;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("oracle answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyingPowerRequest {
    monthly_rate: f64,
    equity_cash: f64,
    federal_state: &'static str,
    amortisation: f64,
    fixed_period: u32,
    salary: f64,
    additional_loan: f64,
    desired_total_time: u32,
    calculation_mode: &'static str,
}

impl From<OracleQuery> for BuyingPowerRequest {
    fn from(query: OracleQuery) -> Self {
        Self {
            monthly_rate: query.monthly_payment,
            equity_cash: query.capital,
            federal_state: query.region.code,
            amortisation: AMORTISATION_PCT,
            fixed_period: query.term_years,
            salary: query.income,
            additional_loan: 0.0,
            desired_total_time: query.term_years,
            calculation_mode: "TIMESPAN",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuyingPowerResponse {
    scoring_result: ScoringResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoringResult {
    price_building: f64,
}

#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    url: String,
}

impl HttpOracle {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl PriceOracle for HttpOracle {
    type Error = OracleError;

    async fn estimate_max_price(&self, query: OracleQuery) -> Result<f64, OracleError> {
        info!(
            term_years = query.term_years,
            federal_state = query.region.code,
            "requesting maximum buying power"
        );
        let response = self
            .client
            .post(&self.url)
            .json(&BuyingPowerRequest::from(query))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_price(&body)
    }
}

fn parse_price(body: &str) -> Result<f64, OracleError> {
    let response: BuyingPowerResponse =
        serde_json::from_str(body).map_err(|err| OracleError::Malformed(err.to_string()))?;
    Ok(response.scoring_result.price_building)
}
