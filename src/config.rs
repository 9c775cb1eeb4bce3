use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const MINUTES_PER_YEAR: u64 = 365 * 24 * 60;
const SECONDS_PER_YEAR: u64 = MINUTES_PER_YEAR * 60;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub cache_duration_minutes: u64,
    pub cache_max_capacity: u64,
    pub rate_limit_requests_per_minute: usize,
    pub rate_limit_sweep_seconds: u64,
    pub max_cities_allowed: usize,
    pub include_forecast: bool,
    pub upstream_timeout_seconds: u64,
    pub bind_addr: SocketAddr,
    pub cors_allowed_origin: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup so tests never touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENWEATHER_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("OPENWEATHER_API_KEY not set"))?;

        let base_url = lookup("OPENWEATHER_BASE_URL")
            .unwrap_or_else(|| "https://api.openweathermap.org".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Settings {
            api_key,
            base_url,
            cache_duration_minutes: bounded(
                &lookup,
                "CACHE_DURATION_MINUTES",
                10,
                MINUTES_PER_YEAR,
            )?,
            cache_max_capacity: positive(&lookup, "CACHE_MAX_CAPACITY", 1000)?,
            rate_limit_requests_per_minute: positive(
                &lookup,
                "RATE_LIMIT_REQUESTS_PER_MINUTE",
                60,
            )?,
            rate_limit_sweep_seconds: bounded(
                &lookup,
                "RATE_LIMIT_SWEEP_SECONDS",
                300,
                SECONDS_PER_YEAR,
            )?,
            max_cities_allowed: positive(&lookup, "MAX_CITIES_ALLOWED", 5)?,
            include_forecast: parse_or(&lookup, "WEATHER_INCLUDE_FORECAST", false)?,
            upstream_timeout_seconds: bounded(
                &lookup,
                "UPSTREAM_TIMEOUT_SECONDS",
                30,
                SECONDS_PER_YEAR,
            )?,
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 5000)))?,
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_duration_minutes.saturating_mul(60))
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_seconds)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = parse_or(lookup, key, default)?;
    if value <= T::default() {
        anyhow::bail!("{} must be greater than zero", key);
    }
    Ok(value)
}

fn bounded<F>(lookup: &F, key: &str, default: u64, max: u64) -> anyhow::Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let value = positive(lookup, key, default)?;
    if value > max {
        anyhow::bail!("{} must be at most {}", key, max);
    }
    Ok(value)
}
