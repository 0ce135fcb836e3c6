mod listings;
mod oracle;

pub use listings::{
    DEFAULT_LISTINGS_URL, HttpListingProvider, ListingCache, ListingError, ListingSource,
};
pub use oracle::{DEFAULT_ORACLE_URL, HttpOracle, OracleError};
