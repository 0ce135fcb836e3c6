use super::envelope::SHORT_TERM_YEARS;
use super::error::{EngineError, Result};
use super::types::State;

pub fn annuity_present_value(payment: f64, monthly_rate: f64, months: u32) -> f64 {
    let n = months as f64;
    if monthly_rate.abs() < 1e-12 {
        return payment * n;
    }
    let growth = (1.0 + monthly_rate).powf(n);
    payment * (growth - 1.0) / (monthly_rate * growth)
}

/// Smallest number of whole years the player has to wait before the middle
/// of the current envelope becomes reachable. Zero when nothing is unlocked
/// yet, otherwise at least one.
pub fn years_to_wait(state: &State) -> Result<u32> {
    let Some(envelope) = state.equity else {
        return Ok(0);
    };

    let finance = &state.finance;
    let monthly_payment = finance.monthly_payment();
    if !monthly_payment.is_finite() || monthly_payment <= 0.0 {
        return Err(EngineError::InvalidInput(
            "monthly payment (income * desired_rates) must be > 0 to fast-forward".to_string(),
        ));
    }

    let reference_loan =
        annuity_present_value(monthly_payment, finance.monthly_rate(), SHORT_TERM_YEARS * 12);
    let pending_one_time = state
        .pending_events
        .first()
        .map(|event| event.one_time_cost)
        .unwrap_or(0.0);
    let available_capital = finance.capital + pending_one_time;

    let deficit = envelope.midpoint() - available_capital - reference_loan;
    let raw_years = deficit / (monthly_payment * 12.0);
    if !raw_years.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "cannot fast-forward with a deficit of {deficit}"
        )));
    }

    let years = (raw_years.floor() + 1.0).max(1.0);
    Ok(years.min(u32::MAX as f64) as u32)
}
