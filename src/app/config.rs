use crate::app::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub http_host: String,
    pub port: u16,
    pub db_path: String,
    pub station_contract: String,
    pub station_api_url: String,
    pub station_poll_interval_secs: u64,
    pub upstream_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let station_poll_interval_secs =
            parse_or_default(&lookup, "STATION_POLL_INTERVAL_SECS", 300_u64)?;
        if station_poll_interval_secs == 0 {
            return Err(AppError::config(
                "STATION_POLL_INTERVAL_SECS must be greater than zero",
            ));
        }

        Ok(Self {
            // a missing key is reported on every poll, not at startup
            api_key: non_empty(&lookup, "JCDECAUX_API_KEY"),
            http_host: non_empty(&lookup, "HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or_default(&lookup, "PORT", 3000_u16)?,
            db_path: non_empty(&lookup, "DB_PATH")
                .unwrap_or_else(|| "./data/telemetry.db".to_string()),
            station_contract: non_empty(&lookup, "JCDECAUX_CONTRACT")
                .unwrap_or_else(|| "dublin".to_string()),
            station_api_url: non_empty(&lookup, "JCDECAUX_BASE_URL")
                .unwrap_or_else(|| "https://api.jcdecaux.com/vls/v1/stations".to_string()),
            station_poll_interval_secs,
            upstream_timeout_secs: parse_or_default(&lookup, "UPSTREAM_TIMEOUT_SECS", 30_u64)?,
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
