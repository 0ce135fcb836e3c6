use super::amortization::solve_for_region;
use super::error::EngineError;
use super::types::{Envelope, Finance, Listing, MatchedListing};

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedListing {
    pub id: String,
    pub reason: EngineError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedListing>,
    pub skipped: Vec<SkippedListing>,
}

pub fn match_listings(
    listings: &[Listing],
    envelope: Envelope,
    finance: &Finance,
    region: &str,
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    for listing in listings
        .iter()
        .filter(|listing| envelope.contains(listing.buying_price))
    {
        match solve_for_region(listing.buying_price, finance, region) {
            Ok(financing_duration) => outcome.matched.push(MatchedListing {
                listing: listing.clone(),
                financing_duration,
            }),
            Err(reason) => outcome.skipped.push(SkippedListing {
                id: listing.id.clone(),
                reason,
            }),
        }
    }
    outcome
}
