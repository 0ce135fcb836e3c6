mod amortization;
mod engine;
mod envelope;
mod error;
mod fast_forward;
mod matcher;
mod oracle;
mod types;

pub use amortization::{
    AGENT_FEE_PCT, Region, TRANSFER_FEE_PCT, lookup_region, regions, solve_duration,
    solve_for_region,
};
pub use engine::{FAST_FORWARD_SENTINEL, TurnDelta, advance, apply_elapsed_years};
pub use envelope::{
    EnvelopeConfig, LONG_TERM_CAP_YEARS, RETIREMENT_AGE, SHORT_TERM_YEARS, compute_envelope,
    long_term_years,
};
pub use error::{EngineError, Result};
pub use fast_forward::{annuity_present_value, years_to_wait};
pub use matcher::{MatchOutcome, SkippedListing, match_listings};
pub use oracle::{OracleQuery, PriceOracle};
pub use types::{
    Envelope, Finance, LifeEvent, LifeEventKind, Listing, MatchedListing,
    POLICY_SAVINGS_FRACTION, SearchFilter, State,
};

#[cfg(test)]
pub(crate) use envelope::testing;
