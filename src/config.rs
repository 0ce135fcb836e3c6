use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::clients::{DEFAULT_LISTINGS_URL, DEFAULT_ORACLE_URL};
use crate::core::{Finance, lookup_region, solve_for_region};

#[derive(Parser, Debug)]
#[command(
    name = "immoquest",
    about = "Real estate affordability game: envelope oracle, fast-forward and financing durations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game service
    Serve(ServeArgs),
    /// Print the financing duration for a single purchase price
    Duration(DurationArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "IMMOQUEST_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,
    #[arg(long, env = "IMMOQUEST_ORACLE_URL", default_value = DEFAULT_ORACLE_URL)]
    pub oracle_url: String,
    #[arg(long, env = "IMMOQUEST_LISTINGS_URL", default_value = DEFAULT_LISTINGS_URL)]
    pub listings_url: String,
    #[arg(
        long,
        env = "IMMOQUEST_ORACLE_TIMEOUT_MS",
        default_value_t = 8_000,
        help = "Time budget for both concurrent oracle calls of one envelope"
    )]
    pub oracle_timeout_ms: u64,
    #[arg(
        long,
        env = "IMMOQUEST_LISTING_CACHE_CAPACITY",
        default_value_t = 10_000,
        help = "Number of listing sets kept in memory; 0 disables caching"
    )]
    pub listing_cache_capacity: usize,
    #[arg(long, env = "IMMOQUEST_LISTING_PAGE_SIZE", default_value_t = 20)]
    pub listing_page_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub oracle_url: String,
    pub listings_url: String,
    pub oracle_timeout: Duration,
    pub listing_cache_capacity: usize,
    pub listing_page_size: u32,
}

impl ServeArgs {
    pub fn into_config(self) -> Result<ServeConfig, String> {
        if self.oracle_timeout_ms == 0 {
            return Err("--oracle-timeout-ms must be > 0".to_string());
        }
        if self.listing_page_size == 0 {
            return Err("--listing-page-size must be > 0".to_string());
        }
        for (name, url) in [
            ("--oracle-url", &self.oracle_url),
            ("--listings-url", &self.listings_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{name} must be an http(s) URL"));
            }
        }

        Ok(ServeConfig {
            bind: self.bind,
            oracle_url: self.oracle_url,
            listings_url: self.listings_url,
            oracle_timeout: Duration::from_millis(self.oracle_timeout_ms),
            listing_cache_capacity: self.listing_cache_capacity,
            listing_page_size: self.listing_page_size,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct DurationArgs {
    #[arg(long, help = "Purchase price before fees and taxes")]
    pub price: f64,
    #[arg(long, default_value_t = 0.0)]
    pub capital: f64,
    #[arg(long, help = "Gross income per month")]
    pub income: f64,
    #[arg(
        long,
        help = "Fraction of monthly income paid towards the loan, e.g. 0.3"
    )]
    pub savings_fraction: f64,
    #[arg(long, help = "Annual loan interest rate in percent, e.g. 3.5")]
    pub interest_rate: f64,
    #[arg(long, default_value = "Bayern", help = "German federal state")]
    pub region: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DurationReport<'a> {
    price: f64,
    region: &'a str,
    transfer_tax_pct: f64,
    financing_years: f64,
}

pub fn run_duration(args: DurationArgs) -> Result<String, String> {
    if !args.price.is_finite() || args.price <= 0.0 {
        return Err("--price must be > 0".to_string());
    }
    let finance = Finance {
        income: args.income,
        capital: args.capital,
        interest_rate: args.interest_rate,
        savings_fraction: args.savings_fraction,
    };
    finance
        .validate()
        .map_err(|err| format!("invalid finances: {err}"))?;
    let region = lookup_region(&args.region).map_err(|err| err.to_string())?;
    let financing_years =
        solve_for_region(args.price, &finance, region.name).map_err(|err| err.to_string())?;

    serde_json::to_string_pretty(&DurationReport {
        price: args.price,
        region: region.name,
        transfer_tax_pct: region.transfer_tax_pct,
        financing_years,
    })
    .map_err(|err| format!("failed to render report: {err}"))
}
