mod cli;
mod error;
mod report;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use time::Duration;
use tracing_subscriber::EnvFilter;

use oispin_core::{
    CsvLiquidityStore, Engine, EngineConfig, HttpClient, JsonRosterStore, ReqwestHttpClient,
    WikipediaRosterSource, YahooOpenInterestSource,
};

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("oispin=info");

    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let cache_dir = cli.cache_dir.clone().unwrap_or_else(resolve_oispin_home);
    tracing::debug!(cache_dir = %cache_dir.display(), "using cache directory");

    let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

    let engine = Engine::new(
        Arc::new(JsonRosterStore::new(&cache_dir)),
        Arc::new(CsvLiquidityStore::new(&cache_dir)),
        Arc::new(WikipediaRosterSource::new(
            http_client.clone(),
            cli.timeout_ms,
        )),
        Arc::new(YahooOpenInterestSource::new(http_client, cli.timeout_ms)),
        EngineConfig {
            sample_size: cli.count,
            seed: cli.seed,
            force_refresh: cli.refresh,
            max_cache_age: Duration::days(cli.max_age_days),
            fetch_concurrency: cli.concurrency,
        },
    );

    let run_report = engine.run().await?;
    report::render(&run_report);

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

fn resolve_oispin_home() -> PathBuf {
    if let Some(path) = env::var_os("OISPIN_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".oispin");
    }

    PathBuf::from(".oispin")
}
