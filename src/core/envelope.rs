use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::debug;

use super::amortization::lookup_region;
use super::error::{EngineError, Result};
use super::oracle::{OracleQuery, PriceOracle};
use super::types::{Envelope, State};

pub const SHORT_TERM_YEARS: u32 = 10;
pub const LONG_TERM_CAP_YEARS: u32 = 25;
pub const RETIREMENT_AGE: u32 = 65;

#[derive(Debug, Clone, Copy)]
pub struct EnvelopeConfig {
    pub oracle_timeout: Duration,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(8),
        }
    }
}

pub fn long_term_years(age: u32) -> u32 {
    RETIREMENT_AGE
        .saturating_sub(age)
        .min(LONG_TERM_CAP_YEARS)
        .max(SHORT_TERM_YEARS)
}

pub async fn compute_envelope<O: PriceOracle>(
    oracle: &Arc<O>,
    state: &State,
    config: EnvelopeConfig,
) -> Result<Envelope> {
    let region = lookup_region(state.region())?;
    let finance = &state.finance;
    let base = OracleQuery {
        income: finance.income,
        capital: finance.capital,
        monthly_payment: finance.monthly_payment(),
        term_years: SHORT_TERM_YEARS,
        region,
    };
    let long_term = long_term_years(state.age);
    debug!(
        short_term = SHORT_TERM_YEARS,
        long_term,
        region = region.code,
        "querying affordability oracle"
    );

    // Dropping the set aborts whatever is still in flight, including when
    // the caller drops this future.
    let mut calls = JoinSet::new();
    for term_years in [SHORT_TERM_YEARS, long_term] {
        let oracle = Arc::clone(oracle);
        let query = OracleQuery { term_years, ..base };
        calls.spawn(async move {
            let price = oracle
                .estimate_max_price(query)
                .await
                .map_err(|err| err.to_string());
            (term_years, price)
        });
    }

    let joined = tokio::time::timeout(config.oracle_timeout, collect_prices(&mut calls)).await;
    let prices = match joined {
        Ok(result) => result?,
        Err(_) => {
            return Err(EngineError::OracleUnavailable(format!(
                "no answer within {} ms",
                config.oracle_timeout.as_millis()
            )));
        }
    };

    let &[first, second] = prices.as_slice() else {
        return Err(EngineError::OracleUnavailable(format!(
            "expected 2 quotes, got {}",
            prices.len()
        )));
    };
    Ok(Envelope::new(first, second))
}

type QuoteSet = JoinSet<(u32, std::result::Result<f64, String>)>;

async fn collect_prices(calls: &mut QuoteSet) -> Result<Vec<f64>> {
    let mut prices = Vec::with_capacity(2);
    while let Some(joined) = calls.join_next().await {
        let (term_years, price) = joined
            .map_err(|err| EngineError::OracleUnavailable(format!("query aborted: {err}")))?;
        let price = price.map_err(|err| {
            EngineError::OracleUnavailable(format!("{term_years}-year query: {err}"))
        })?;

        if !price.is_finite() || price < 0.0 {
            return Err(EngineError::OracleUnavailable(format!(
                "{term_years}-year query returned unusable price {price}"
            )));
        }
        prices.push(price);
    }
    Ok(prices)
}
