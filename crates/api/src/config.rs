use std::str::FromStr;

use axum::http::HeaderValue;

/// Server configuration loaded from environment variables.
///
/// Everything except the database URL and the two API tokens has a default
/// suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on waiting for each background service at shutdown
    /// (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    /// Bearer token the verification engine presents on ingest endpoints.
    pub engine_api_token: String,
    /// Bearer token for `/api/v1/admin` endpoints.
    pub admin_api_token: String,
}

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `DATABASE_URL`          | required                |
    /// | `ENGINE_API_TOKEN`      | required                |
    /// | `ADMIN_API_TOKEN`       | required                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PORT", 3000)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| o.parse::<HeaderValue>().is_err())
        {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGINS",
                value: bad.clone(),
            });
        }

        let request_timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs = parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30)?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url: required(&lookup, "DATABASE_URL")?,
            engine_api_token: required(&lookup, "ENGINE_API_TOKEN")?,
            admin_api_token: required(&lookup, "ADMIN_API_TOKEN")?,
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    lookup(var)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/onlyvalid"),
        ("ENGINE_API_TOKEN", "engine"),
        ("ADMIN_API_TOKEN", "admin"),
    ];

    #[test]
    fn defaults_apply() {
        let config = ServerConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.engine_api_token, "engine");
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CORS_ORIGINS", "https://app.onlyvalidemails.com, http://localhost:5173,"));
        let config = ServerConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://app.onlyvalidemails.com", "http://localhost:5173"]
        );
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = ServerConfig::from_lookup(lookup_from(&REQUIRED[..2])).unwrap_err();
        assert_matches!(err, ConfigError::Missing("ADMIN_API_TOKEN"));
    }

    #[test]
    fn bad_port_is_an_error() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        let err = ServerConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "PORT", .. });
        assert_eq!(err.to_string(), "PORT has invalid value 'eighty'");
    }
}
