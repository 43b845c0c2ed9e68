use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::auth::MAX_TOKEN_TTL;

pub const DEFAULT_BASE_URL: &str = "https://seguros.sura.cl";
pub const DEFAULT_SEARCH_PATH: &str = "/busqueda";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which page source the extractor drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchBackend {
    Browser,
    Http,
    Catalog,
}

impl FromStr for FetchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" | "chromium" => Ok(FetchBackend::Browser),
            "http" | "reqwest" => Ok(FetchBackend::Http),
            "catalog" | "sample" => Ok(FetchBackend::Catalog),
            other => Err(format!("unknown backend `{other}` (expected browser, http or catalog)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub db_name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_username: String,
    pub api_password: String,
    pub api_secret_key: String,
    pub token_ttl: Duration,
    pub data_dir: PathBuf,
    pub running_in_container: bool,
    pub chrome_path: Option<PathBuf>,
    pub backend: FetchBackend,
    pub base_url: String,
    pub search_path: String,
    pub extraction_timeout: Duration,
    pub schema_file: Option<PathBuf>,
    pub mongo: Option<MongoConfig>,
    pub debug: bool,
}

impl Config {
    /// Reads the process environment, honoring a `.env` file if present.
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_env = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let get_env_opt = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mongo = get_env_opt("MONGO_URI").map(|uri| MongoConfig {
            uri,
            db_name: get_env_opt("MONGO_DB_NAME").unwrap_or_else(|| "sura_scraper".to_string()),
        });

        Ok(Config {
            port: parse_or_default(&lookup, "PORT", 8080)?,
            api_username: get_env("API_USERNAME")?,
            api_password: get_env("API_PASSWORD")?,
            api_secret_key: get_env("API_SECRET_KEY")?,
            token_ttl: parse_token_ttl(&lookup)?,
            data_dir: get_env_opt("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            running_in_container: parse_flag(&lookup, "RUNNING_IN_DOCKER")?,
            chrome_path: get_env_opt("CHROME_PATH").map(PathBuf::from),
            backend: parse_or_default(&lookup, "SCRAPER_BACKEND", FetchBackend::Browser)?,
            base_url: get_env_opt("SURA_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            search_path: get_env_opt("SURA_SEARCH_PATH")
                .unwrap_or_else(|| DEFAULT_SEARCH_PATH.to_string()),
            extraction_timeout: Duration::from_secs(parse_or_default(
                &lookup,
                "EXTRACTION_TIMEOUT_SECS",
                30,
            )?),
            schema_file: get_env_opt("RESULT_SCHEMA_FILE").map(PathBuf::from),
            mongo,
            debug: parse_flag(&lookup, "DEBUG")?,
        })
    }
}

fn parse_or_default<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
    }
}

fn parse_token_ttl<F>(lookup: &F) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let hours: u64 = parse_or_default(lookup, "TOKEN_TTL_HOURS", 24)?;
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .filter(|ttl| !ttl.is_zero() && *ttl <= MAX_TOKEN_TTL)
        .ok_or_else(|| ConfigError::Invalid {
            key: "TOKEN_TTL_HOURS",
            value: hours.to_string(),
            reason: format!(
                "expected between 1 and {} hours",
                MAX_TOKEN_TTL.as_secs() / 3600
            ),
        })
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(false),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "f" | "no" => Ok(false),
            "1" | "true" | "t" | "yes" => Ok(true),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("API_USERNAME", "admin"),
        ("API_PASSWORD", "password123"),
        ("API_SECRET_KEY", "s3cret"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.token_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.backend, FetchBackend::Browser);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.extraction_timeout, Duration::from_secs(30));
        assert!(!config.running_in_container);
        assert!(config.mongo.is_none());
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("API_SECRET_KEY")));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "9000"),
            ("RUNNING_IN_DOCKER", "true"),
            ("SCRAPER_BACKEND", "catalog"),
            ("SURA_BASE_URL", "http://localhost:1234/"),
            ("MONGO_URI", "mongodb://localhost:27017"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.running_in_container);
        assert_eq!(config.backend, FetchBackend::Catalog);
        assert_eq!(config.base_url, "http://localhost:1234");
        assert_eq!(config.mongo.unwrap().db_name, "sura_scraper");
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));

        for hours in ["0", "87601", "18446744073709551615"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("TOKEN_TTL_HOURS", hours));
            assert!(
                matches!(
                    Config::from_lookup(lookup_from(&pairs)),
                    Err(ConfigError::Invalid { key: "TOKEN_TTL_HOURS", .. })
                ),
                "{hours}"
            );
        }

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TOKEN_TTL_HOURS", "87600"));
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.token_ttl, MAX_TOKEN_TTL);

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SCRAPER_BACKEND", "selenium"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::Invalid { key: "SCRAPER_BACKEND", .. })
        ));
    }
}
