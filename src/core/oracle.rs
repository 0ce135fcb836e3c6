use std::fmt::Display;
use std::future::Future;

use super::amortization::Region;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleQuery {
    pub income: f64,
    pub capital: f64,
    pub monthly_payment: f64,
    pub term_years: u32,
    pub region: &'static Region,
}

/// External service estimating the highest purchase price a buyer can
/// finance. Implementations must not retry or cache; each call is one
/// round trip.
pub trait PriceOracle: Send + Sync + 'static {
    type Error: Display + Send + 'static;

    fn estimate_max_price(
        &self,
        query: OracleQuery,
    ) -> impl Future<Output = Result<f64, Self::Error>> + Send;
}
