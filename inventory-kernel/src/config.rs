use std::{path::PathBuf, time::Duration};

/// Upper bound for `REFRESH_INTERVAL`, 30 days.
pub const MAX_REFRESH_SECS: u64 = 30 * 24 * 3600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub refresh_interval: Duration,
    pub port: u16,
    pub debug: bool,
    pub log_level: String,
    pub snapshot_path: PathBuf,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub token: Option<String>,
    pub datacenter: Option<String>,
    pub timeout: Duration,
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: Option<String>,
    pub api_key: Option<String>,
    pub session_ttl_hours: i64,
    pub oauth: OAuthConfig,
}

/// Settings consumed by the external OAuth/OIDC login flow.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub issuer: Option<String>,
    pub scope: String,
}

impl CatalogConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/v1", self.scheme, self.host, self.port)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8500,
            scheme: "http".into(),
            token: None,
            datacenter: None,
            timeout: Duration::from_secs(10),
            concurrency: 8,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            refresh_interval: Duration::from_secs(3600),
            port: 5000,
            debug: false,
            log_level: "INFO".into(),
            snapshot_path: PathBuf::from("websites.json"),
            auth: AuthConfig {
                secret_key: None,
                api_key: None,
                session_ttl_hours: 12,
                oauth: OAuthConfig {
                    client_id: "inventory".into(),
                    client_secret: None,
                    issuer: None,
                    scope: "openid profile email roles".into(),
                },
            },
        }
    }
}

impl Config {
    /// Tracing filter directive derived from `LOG_LEVEL` and `DEBUG`.
    pub fn log_directive(&self) -> String {
        if self.debug {
            return "debug".into();
        }
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "warning" => "warn".into(),
            "critical" | "fatal" => "error".into(),
            "" => "info".into(),
            other => other.to_string(),
        }
    }
}

/// Loads the configuration from the process environment.
/// `.env` is expected to have been loaded by the caller.
pub fn load_config() -> Result<Config, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let defaults = Config::default();

    let catalog = CatalogConfig {
        host: get("CONSUL_HOST").unwrap_or(defaults.catalog.host),
        port: parse_or("CONSUL_PORT", get("CONSUL_PORT"), defaults.catalog.port)?,
        scheme: get("CONSUL_SCHEME").unwrap_or(defaults.catalog.scheme),
        token: get("CONSUL_TOKEN"),
        datacenter: get("CONSUL_DATACENTER"),
        timeout: Duration::from_secs(at_least_one("CONSUL_TIMEOUT_SECS", parse_or(
            "CONSUL_TIMEOUT_SECS",
            get("CONSUL_TIMEOUT_SECS"),
            10u64,
        )?)?),
        concurrency: parse_or("CONSUL_CONCURRENCY", get("CONSUL_CONCURRENCY"), defaults.catalog.concurrency)?.max(1),
    };

    let refresh_secs = at_least_one("REFRESH_INTERVAL", parse_or("REFRESH_INTERVAL", get("REFRESH_INTERVAL"), 3600)?)?;
    if refresh_secs > MAX_REFRESH_SECS {
        return Err(ConfigError::Invalid {
            key: "REFRESH_INTERVAL",
            value: refresh_secs.to_string(),
            reason: format!("must be at most {MAX_REFRESH_SECS} seconds"),
        });
    }

    let auth = AuthConfig {
        secret_key: get("SECRET_KEY"),
        api_key: get("INVENTORY_API_KEY"),
        session_ttl_hours: parse_or("SESSION_TTL_HOURS", get("SESSION_TTL_HOURS"), defaults.auth.session_ttl_hours)?,
        oauth: OAuthConfig {
            client_id: get("OAUTH_CLIENT_ID").unwrap_or(defaults.auth.oauth.client_id),
            client_secret: get("OAUTH_CLIENT_SECRET"),
            issuer: get("OAUTH_ISSUER"),
            scope: get("OAUTH_SCOPE").unwrap_or(defaults.auth.oauth.scope),
        },
    };

    Ok(Config {
        catalog,
        refresh_interval: Duration::from_secs(refresh_secs),
        port: parse_or("PORT", get("PORT"), defaults.port)?,
        debug: get("DEBUG").map(|v| parse_flag(&v)).unwrap_or(false),
        log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        snapshot_path: get("SNAPSHOT_PATH").map(PathBuf::from).unwrap_or(defaults.snapshot_path),
        auth,
    })
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn at_least_one(key: &'static str, secs: u64) -> Result<u64, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".into(),
            reason: "must be at least one second".into(),
        });
    }
    Ok(secs)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.catalog.base_url(), "http://localhost:8500/v1");
        assert_eq!(cfg.refresh_interval, Duration::from_secs(3600));
        assert_eq!(cfg.port, 5000);
        assert!(!cfg.debug);
        assert!(cfg.catalog.token.is_none());
        assert_eq!(cfg.auth.oauth.client_id, "inventory");
        assert_eq!(cfg.snapshot_path, PathBuf::from("websites.json"));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let cfg = from_lookup(lookup(&[
            ("CONSUL_HOST", "consul.internal"),
            ("CONSUL_PORT", "8501"),
            ("CONSUL_SCHEME", "https"),
            ("CONSUL_TOKEN", "secret"),
            ("REFRESH_INTERVAL", "60"),
            ("DEBUG", "True"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(cfg.catalog.base_url(), "https://consul.internal:8501/v1");
        assert_eq!(cfg.catalog.token.as_deref(), Some("secret"));
        assert_eq!(cfg.refresh_interval, Duration::from_secs(60));
        assert!(cfg.debug);
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn test_blank_token_means_no_token() {
        let cfg = from_lookup(lookup(&[("CONSUL_TOKEN", "  ")])).unwrap();
        assert!(cfg.catalog.token.is_none());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = from_lookup(lookup(&[("CONSUL_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("CONSUL_PORT"));
        assert!(from_lookup(lookup(&[("REFRESH_INTERVAL", "0")])).is_err());
    }

    #[test]
    fn test_durations_are_bounded() {
        let err = from_lookup(lookup(&[("CONSUL_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("CONSUL_TIMEOUT_SECS"));

        let err = from_lookup(lookup(&[("REFRESH_INTERVAL", "18446744073709551615")])).unwrap_err();
        assert!(err.to_string().contains("REFRESH_INTERVAL"));

        let max = MAX_REFRESH_SECS.to_string();
        let cfg = from_lookup(lookup(&[("REFRESH_INTERVAL", max.as_str())])).unwrap();
        assert_eq!(cfg.refresh_interval, Duration::from_secs(MAX_REFRESH_SECS));
        assert!(from_lookup(lookup(&[("REFRESH_INTERVAL", "2592001")])).is_err());
    }

    #[test]
    fn test_log_directive() {
        let mut cfg = Config::default();
        assert_eq!(cfg.log_directive(), "info");
        cfg.log_level = "WARNING".into();
        assert_eq!(cfg.log_directive(), "warn");
        cfg.debug = true;
        assert_eq!(cfg.log_directive(), "debug");
    }
}
