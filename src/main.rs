use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use immoquest::config::{Cli, Command, run_duration};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "immoquest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Serve(args) => {
            let config = match args.into_config() {
                Ok(config) => config,
                Err(msg) => {
                    error!("{msg}");
                    std::process::exit(2);
                }
            };
            if let Err(e) = immoquest::api::run_http_server(config).await {
                error!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Duration(args) => match run_duration(args) {
            Ok(report) => println!("{report}"),
            Err(msg) => {
                eprintln!("{msg}");
                std::process::exit(1);
            }
        },
    }
}
