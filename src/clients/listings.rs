use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::{Listing, SearchFilter};

pub const DEFAULT_LISTINGS_URL: &str = "https://thinkimmo-api.mgraetz.de/thinkimmo";

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("listing request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("listing service answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed listing response: {0}")]
    Malformed(String),
}

pub trait ListingSource: Send + Sync + 'static {
    fn fetch(
        &self,
        filter: &SearchFilter,
    ) -> impl Future<Output = Result<Arc<Vec<Listing>>, ListingError>> + Send;
}

/// Listing sets keyed by [`SearchFilter::cache_key`]. Holds at most
/// `capacity` sets and evicts the oldest insertion first.
#[derive(Debug)]
pub struct ListingCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, Arc<Vec<Listing>>>,
    order: VecDeque<String>,
}

impl ListingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<Listing>>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(key).cloned()
    }

    pub fn insert(&self, key: String, listings: Vec<Listing>) -> Arc<Vec<Listing>> {
        let listings = Arc::new(listings);
        if self.capacity == 0 {
            return listings;
        }

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner
            .entries
            .insert(key.clone(), Arc::clone(&listings))
            .is_none()
        {
            inner.order.push_back(key);
        }
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
        listings
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    active: bool,
    #[serde(rename = "type")]
    property_type: &'a str,
    sort_by: &'static str,
    sort_key: &'a str,
    from: u32,
    size: u32,
    geo_searches: GeoSearch<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeoSearch<'a> {
    geo_search_query: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
    id: Value,
    title: String,
    buying_price: f64,
    rooms: f64,
    square_meter: f64,
    images: Vec<RawImage>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    construction_year: Option<u32>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImage {
    original_url: String,
}

#[derive(Debug, Clone)]
pub struct HttpListingProvider {
    client: reqwest::Client,
    url: String,
    page_size: u32,
    cache: Arc<ListingCache>,
}

impl HttpListingProvider {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        page_size: u32,
        cache: Arc<ListingCache>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            page_size,
            cache,
        }
    }
}

impl ListingSource for HttpListingProvider {
    async fn fetch(&self, filter: &SearchFilter) -> Result<Arc<Vec<Listing>>, ListingError> {
        let key = filter.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        info!(filter = %key, "loading real estate offers");
        let request = SearchRequest {
            active: true,
            property_type: &filter.property_type,
            sort_by: "desc",
            sort_key: &filter.sort_type,
            from: 0,
            size: self.page_size,
            geo_searches: GeoSearch {
                geo_search_query: &filter.city,
            },
        };
        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ListingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let listings = parse_listings(&body, filter)?;
        info!(filter = %key, count = listings.len(), "loaded real estate offers");
        Ok(self.cache.insert(key, listings))
    }
}

fn parse_listings(body: &str, filter: &SearchFilter) -> Result<Vec<Listing>, ListingError> {
    let mut response: Value =
        serde_json::from_str(body).map_err(|err| ListingError::Malformed(err.to_string()))?;
    let Some(Value::Array(results)) = response.get_mut("results").map(Value::take) else {
        return Err(ListingError::Malformed(
            "response has no results array".to_string(),
        ));
    };

    let mut listings = Vec::with_capacity(results.len());
    for record in results {
        match parse_listing(record, filter) {
            Ok(listing) => listings.push(listing),
            Err(reason) => warn!(%reason, "skipping malformed offer"),
        }
    }
    Ok(listings)
}

fn parse_listing(record: Value, filter: &SearchFilter) -> Result<Listing, String> {
    let raw: RawListing = serde_json::from_value(record).map_err(|err| err.to_string())?;
    let id = match raw.id {
        Value::String(id) => id,
        Value::Number(id) => id.to_string(),
        other => return Err(format!("unsupported id {other}")),
    };
    let Some(image) = raw.images.into_iter().next() else {
        return Err(format!("offer {id} has no images"));
    };

    Ok(Listing {
        id,
        title: raw.title,
        buying_price: raw.buying_price,
        rooms: raw.rooms,
        square_meter: raw.square_meter,
        image_url: image.original_url,
        construction_year: raw.construction_year.unwrap_or_default(),
        condition: raw.condition.unwrap_or_default(),
        region: filter.region.clone(),
        city: filter.city.clone(),
        link: raw.link.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;

    use super::*;
    use crate::clients::stub;

    async fn counting_provider(
        hits: Arc<AtomicUsize>,
        cache: Arc<ListingCache>,
    ) -> HttpListingProvider {
        let router = Router::new().route(
            "/",
            post(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"results": [
                        {"id": "a1", "title": "Altbau", "buyingPrice": 410000, "rooms": 3,
                         "squareMeter": 92, "images": [{"originalUrl": "https://img/a1.jpg"}]}
                    ]}))
                }
            }),
        );
        HttpListingProvider::new(reqwest::Client::new(), stub::serve(router).await, 20, cache)
    }

    fn filter() -> SearchFilter {
        SearchFilter {
            max_budget: 500_000.0,
            property_type: "APARTMENTBUY".to_string(),
            sort_type: "pricePerSqm".to_string(),
            size: 20,
            city: "München".to_string(),
            region: "Bayern".to_string(),
        }
    }

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            title: String::new(),
            buying_price: 1.0,
            rooms: 1.0,
            square_meter: 1.0,
            image_url: String::new(),
            construction_year: 0,
            condition: String::new(),
            region: String::new(),
            city: String::new(),
            link: String::new(),
        }
    }

    #[test]
    fn cache_evicts_oldest_entry_beyond_capacity() {
        let cache = ListingCache::new(2);
        cache.insert("a".to_string(), vec![listing("1")]);
        cache.insert("b".to_string(), vec![listing("2")]);
        cache.insert("a".to_string(), vec![listing("3")]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").expect("cached")[0].id, "3");

        cache.insert("c".to_string(), vec![listing("4")]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn zero_capacity_cache_stores_nothing() {
        let cache = ListingCache::new(0);
        let stored = cache.insert("a".to_string(), vec![listing("1")]);
        assert_eq!(stored.len(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn search_request_matches_listing_api_shape() {
        let filter = filter();
        let request = SearchRequest {
            active: true,
            property_type: &filter.property_type,
            sort_by: "desc",
            sort_key: &filter.sort_type,
            from: 0,
            size: 20,
            geo_searches: GeoSearch {
                geo_search_query: &filter.city,
            },
        };
        let value = serde_json::to_value(&request).expect("serializable");
        assert_eq!(
            value,
            serde_json::json!({
                "active": true,
                "type": "APARTMENTBUY",
                "sortBy": "desc",
                "sortKey": "pricePerSqm",
                "from": 0,
                "size": 20,
                "geoSearches": {"geoSearchQuery": "München"}
            })
        );
    }

    #[test]
    fn malformed_records_are_skipped() {
        let body = r#"{"results": [
            {"id": "a1", "title": "Altbau", "buyingPrice": 410000, "rooms": 3.5,
             "squareMeter": 92.5, "images": [{"originalUrl": "https://img/a1.jpg"}],
             "condition": "MINT", "constructionYear": 1910},
            {"id": 77, "title": "Neubau", "buyingPrice": 620000, "rooms": 4,
             "squareMeter": 110, "images": [{"originalUrl": "https://img/77.jpg"}, {"originalUrl": "x"}],
             "condition": null, "constructionYear": null},
            {"id": "no-images", "title": "x", "buyingPrice": 1, "rooms": 1,
             "squareMeter": 1, "images": []},
            {"id": "no-price", "title": "x", "rooms": 1, "squareMeter": 1,
             "images": [{"originalUrl": "x"}]}
        ]}"#;

        let listings = parse_listings(body, &filter()).expect("valid response");
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].id, "a1");
        assert_eq!(listings[0].rooms, 3.5);
        assert_eq!(listings[0].image_url, "https://img/a1.jpg");
        assert_eq!(listings[0].construction_year, 1910);
        assert_eq!(listings[0].region, "Bayern");
        assert_eq!(listings[1].id, "77");
        assert_eq!(listings[1].condition, "");
        assert_eq!(listings[1].image_url, "https://img/77.jpg");
    }

    #[test]
    fn empty_results_are_not_an_error() {
        let listings = parse_listings(r#"{"results": []}"#, &filter()).expect("valid response");
        assert!(listings.is_empty());
    }

    #[test]
    fn missing_results_array_is_malformed() {
        let err = parse_listings(r#"{"items": []}"#, &filter()).expect_err("no results");
        assert!(matches!(err, ListingError::Malformed(_)));
    }

    #[tokio::test]
    async fn repeated_filter_is_served_from_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ListingCache::new(8));
        let provider = counting_provider(Arc::clone(&hits), Arc::clone(&cache)).await;

        let first = provider.fetch(&filter()).await.expect("stub answers");
        let second = provider.fetch(&filter()).await.expect("cached");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first[0].id, "a1");

        let mut other_city = filter();
        other_city.city = "Augsburg".to_string();
        provider.fetch(&other_city).await.expect("stub answers");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn error_status_is_not_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().route(
            "/",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::SERVICE_UNAVAILABLE, "busy")
                }
            }),
        );
        let cache = Arc::new(ListingCache::new(8));
        let provider = HttpListingProvider::new(
            reqwest::Client::new(),
            stub::serve(router).await,
            20,
            Arc::clone(&cache),
        );

        for _ in 0..2 {
            let err = provider.fetch(&filter()).await.expect_err("503 reply");
            assert!(matches!(err, ListingError::Status { status: 503, .. }));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
