use std::sync::Arc;

use tracing::info;

use super::envelope::{EnvelopeConfig, compute_envelope};
use super::error::{EngineError, Result};
use super::fast_forward::years_to_wait;
use super::oracle::PriceOracle;
use super::types::{POLICY_SAVINGS_FRACTION, State};

pub const FAST_FORWARD_SENTINEL: i64 = -1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TurnDelta {
    Years(u32),
    FastForward,
}

impl TryFrom<i64> for TurnDelta {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self> {
        if value == FAST_FORWARD_SENTINEL {
            return Ok(Self::FastForward);
        }
        u32::try_from(value).map(Self::Years).map_err(|_| {
            EngineError::InvalidInput(format!(
                "delta_age must be >= 0 or {FAST_FORWARD_SENTINEL}, got {value}"
            ))
        })
    }
}

/// Moves `state` forward by `delta` years and returns the resulting state.
/// The input is never modified, so a failed oracle round trip leaves the
/// caller with its previous state.
pub async fn advance<O: PriceOracle>(
    oracle: &Arc<O>,
    state: &State,
    delta: TurnDelta,
    config: EnvelopeConfig,
) -> Result<State> {
    let years = match delta {
        TurnDelta::Years(years) => years,
        TurnDelta::FastForward => years_to_wait(state)?,
    };

    let mut next = state.clone();
    apply_elapsed_years(&mut next, years);
    next.equity = Some(compute_envelope(oracle, &next, config).await?);
    next.age = next.age.saturating_add(years);
    next.position = next.position.saturating_add(years);

    info!(
        years,
        age = next.age,
        capital = next.finance.capital,
        "advanced turn"
    );
    Ok(next)
}

pub fn apply_elapsed_years(state: &mut State, years: u32) {
    let finance = &mut state.finance;
    for event in &mut state.pending_events {
        event.apply(finance, years);
    }
    finance.capital += finance.income * POLICY_SAVINGS_FRACTION * 12.0 * years as f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::envelope::testing::TableOracle;
    use crate::core::types::{Envelope, Finance, LifeEvent, LifeEventKind, SearchFilter};

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_state() -> State {
        let mut state = State::new(
            30,
            Finance {
                income: 5_000.0,
                capital: 260_000.0,
                interest_rate: 3.5,
                savings_fraction: 0.2,
            },
            SearchFilter {
                region: "Bayern".to_string(),
                ..SearchFilter::default()
            },
        );
        state.position = 3;
        state.pending_events.push(LifeEvent {
            kind: LifeEventKind::Child,
            yearly_cost: 6_000.0,
            one_time_cost: 1_000.0,
            trigger_age: 31,
        });
        state
    }

    fn oracle() -> Arc<TableOracle> {
        TableOracle::new(&[
            (10, 400_000.0),
            (20, 520_000.0),
            (23, 510_000.0),
            (25, 500_000.0),
        ])
    }

    #[test]
    fn delta_parsing_maps_sentinel_and_rejects_other_negatives() {
        assert_eq!(TurnDelta::try_from(-1_i64), Ok(TurnDelta::FastForward));
        assert_eq!(TurnDelta::try_from(0_i64), Ok(TurnDelta::Years(0)));
        assert_eq!(TurnDelta::try_from(7_i64), Ok(TurnDelta::Years(7)));
        assert!(matches!(
            TurnDelta::try_from(-2_i64),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn advance_applies_events_savings_envelope_and_age() {
        let state = sample_state();
        let next = advance(&oracle(), &state, TurnDelta::Years(2), EnvelopeConfig::default())
            .await
            .expect("oracle available");

        // 2 years of child costs, the one-time cost, then 2 years of 20% savings.
        assert_approx(
            next.finance.capital,
            260_000.0 - 12_000.0 - 1_000.0 + 5_000.0 * 0.2 * 12.0 * 2.0,
        );
        assert_eq!(next.pending_events[0].one_time_cost, 0.0);
        assert_eq!(next.equity, Some(Envelope::new(400_000.0, 500_000.0)));
        assert_eq!(next.age, 32);
        assert_eq!(next.position, 5);
        assert_eq!(state, sample_state());
    }

    #[tokio::test]
    async fn zero_delta_charges_one_time_costs_exactly_once() {
        let oracle = oracle();
        let state = sample_state();

        let first = advance(&oracle, &state, TurnDelta::Years(0), EnvelopeConfig::default())
            .await
            .expect("oracle available");
        assert_approx(first.finance.capital, 259_000.0);
        assert_eq!(first.age, 30);
        assert_eq!(first.position, 3);

        let second = advance(&oracle, &first, TurnDelta::Years(0), EnvelopeConfig::default())
            .await
            .expect("oracle available");
        assert_approx(second.finance.capital, 259_000.0);
    }

    #[tokio::test]
    async fn envelope_uses_age_before_the_turn() {
        let oracle = oracle();
        let mut state = sample_state();
        state.age = 42;

        advance(&oracle, &state, TurnDelta::Years(5), EnvelopeConfig::default())
            .await
            .expect("oracle available");
        let terms: Vec<u32> = oracle.recorded().iter().map(|q| q.term_years).collect();
        assert!(terms.contains(&23), "long term should use age 42, got {terms:?}");
    }

    #[tokio::test]
    async fn fast_forward_resolves_years_from_current_envelope() {
        let mut state = sample_state();
        state.equity = Some(Envelope::new(150_000.0, 250_000.0));

        let next = advance(&oracle(), &state, TurnDelta::FastForward, EnvelopeConfig::default())
            .await
            .expect("oracle available");
        assert_eq!(next.age, 31);
        assert_eq!(next.position, 4);
    }

    #[tokio::test]
    async fn fast_forward_without_envelope_is_a_no_op_turn() {
        let state = sample_state();
        let next = advance(&oracle(), &state, TurnDelta::FastForward, EnvelopeConfig::default())
            .await
            .expect("oracle available");
        assert_eq!(next.age, 30);
        assert!(next.equity.is_some());
    }

    #[tokio::test]
    async fn oracle_failure_leaves_state_untouched() {
        let broken = TableOracle::new(&[(10, 400_000.0)]);
        let state = sample_state();

        let err = advance(&broken, &state, TurnDelta::Years(3), EnvelopeConfig::default())
            .await
            .expect_err("long-term quote missing");
        assert!(matches!(err, EngineError::OracleUnavailable(_)));
        assert_eq!(state, sample_state());
    }

    #[test]
    fn capital_is_allowed_to_go_negative() {
        let mut state = sample_state();
        state.finance.capital = 0.0;
        state.finance.income = 0.0;
        apply_elapsed_years(&mut state, 4);
        assert_approx(state.finance.capital, -24_000.0 - 1_000.0);
    }
}
