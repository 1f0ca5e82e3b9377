use std::time::Duration;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;

const DEFAULT_TTL: &str = "1h";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// When absent the service falls back to the in-memory credential store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let secret = lookup("JWT_SECRET").context("JWT_SECRET is not set")?;
        if secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let raw_ttl = lookup("EXPIRES_IN")
            .or_else(|| lookup("JWT_TTL"))
            .unwrap_or_else(|| DEFAULT_TTL.into());
        let ttl = parse_ttl(&raw_ttl)?;

        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("APP_PORT").or_else(|| lookup("PORT")) {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid port {v:?}"))?,
            None => 5000,
        };

        Ok(Self {
            database_url,
            jwt: JwtConfig { secret, ttl },
            host,
            port,
        })
    }
}

const SECOND_MS: f64 = 1000.0;
const DAY_MS: f64 = 24.0 * 60.0 * 60.0 * SECOND_MS;
const YEAR_MS: f64 = 365.25 * DAY_MS;
// Longest accepted lifetime; keeps `now + ttl` well inside `time`'s date range.
const MAX_TTL_MS: f64 = 1000.0 * YEAR_MS;

/// Parses a token lifetime in the `ms` grammar used by `EXPIRES_IN` deployments:
/// `1h`, `15 minutes`, `2 days`, `1w`, `1y`, `1.5h`. A bare number is milliseconds.
pub fn parse_ttl(raw: &str) -> anyhow::Result<Duration> {
    lazy_static! {
        static ref TTL_RE: Regex = Regex::new(
            r"(?i)^(\d+(?:\.\d+)?|\.\d+)\s*(milliseconds?|msecs?|ms|seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w|years?|yrs?|y)?$"
        )
        .unwrap();
    }
    let raw = raw.trim();
    let caps = TTL_RE
        .captures(raw)
        .with_context(|| format!("invalid token ttl {raw:?}"))?;
    let amount: f64 = caps[1]
        .parse()
        .with_context(|| format!("invalid token ttl {raw:?}"))?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let unit_ms = match unit.as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => SECOND_MS,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0 * SECOND_MS,
        "h" | "hr" | "hrs" | "hour" | "hours" => 60.0 * 60.0 * SECOND_MS,
        "d" | "day" | "days" => DAY_MS,
        "w" | "week" | "weeks" => 7.0 * DAY_MS,
        "y" | "yr" | "yrs" | "year" | "years" => YEAR_MS,
        other => anyhow::bail!("unknown ttl unit {other:?}"),
    };
    let ms = (amount * unit_ms).round();
    if !ms.is_finite() || ms > MAX_TTL_MS {
        anyhow::bail!("token ttl {raw:?} is out of range");
    }
    Ok(Duration::from_millis(ms as u64))
}
