pub mod batch;
mod config;
mod error;
pub mod ingestion;
mod logging;
pub mod poller;
mod runtime;
pub mod services;

pub use config::AppConfig;
pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    logging::init()?;
    let config = load_config()?;

    tracing::info!(
        http_host = %config.http_host,
        port = config.port,
        db_path = %config.db_path,
        station_contract = %config.station_contract,
        station_poll_interval_secs = config.station_poll_interval_secs,
        api_key_configured = config.api_key.is_some(),
        "application bootstrap initialized"
    );

    runtime::run(config)
}

pub fn run_station_fetch() -> Result<(), AppError> {
    logging::init()?;
    let config = load_config()?;

    runtime::run_station_fetch(config)
}

fn load_config() -> Result<AppConfig, AppError> {
    if let Err(error) = dotenvy::dotenv()
        && !error.not_found()
    {
        return Err(AppError::config(error));
    }

    AppConfig::from_env()
}
