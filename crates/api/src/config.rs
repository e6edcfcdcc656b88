use std::time::Duration;

use soilsense_analysis::GeminiConfig;
use soilsense_core::topics::DEFAULT_NAMESPACE;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background services get to stop after the server does.
    pub shutdown_timeout_secs: u64,
    pub sensor: SensorConfig,
    pub analysis: AnalysisProvider,
    pub log_format: LogFormat,
}

/// Where sensor requests go and replies come from.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// WebSocket gateway URL. `None` selects the in-memory bus.
    pub gateway_url: Option<String>,
    /// Topic namespace, the `<ns>` in `<ns>/read/request/...`.
    pub namespace: String,
    /// Answer requests with a simulated device when using the in-memory bus.
    pub simulator: bool,
    pub simulator_delay: Duration,
}

/// Which analysis backend to use.
#[derive(Debug, Clone)]
pub enum AnalysisProvider {
    Stub,
    Gemini(GeminiConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be set")]
    Missing { var: &'static str },

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                                       |
    /// |-----------------------------|-----------------------------------------------|
    /// | `HOST`                      | `0.0.0.0`                                     |
    /// | `PORT`                      | `3000`                                        |
    /// | `CORS_ORIGINS`              | `http://localhost:5173,http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                                          |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                                          |
    /// | `SENSOR_GATEWAY_URL`        | unset (in-memory bus)                         |
    /// | `SENSOR_TOPIC_NAMESPACE`    | `npk`                                         |
    /// | `SENSOR_SIMULATOR`          | `true`                                        |
    /// | `SENSOR_SIMULATOR_DELAY_MS` | `2000`                                        |
    /// | `ANALYSIS_PROVIDER`         | `stub`                                        |
    /// | `GEMINI_API_URL`            | `https://generativelanguage.googleapis.com`   |
    /// | `GEMINI_API_KEY`            | required for `gemini`                         |
    /// | `GEMINI_MODEL`              | `gemini-1.5-flash`                            |
    /// | `ANALYSIS_TIMEOUT_SECS`     | `60`                                          |
    /// | `LOG_FORMAT`                | `pretty`                                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&var, "PORT", 3000u16)?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173,http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            if let Err(e) = origin.parse::<axum::http::HeaderValue>() {
                return Err(ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let request_timeout_secs = parse_or(&var, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = parse_or(&var, "SHUTDOWN_TIMEOUT_SECS", 30u64)?;

        let sensor = SensorConfig {
            gateway_url: var("SENSOR_GATEWAY_URL"),
            namespace: var("SENSOR_TOPIC_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.into()),
            simulator: parse_or(&var, "SENSOR_SIMULATOR", true)?,
            simulator_delay: Duration::from_millis(parse_or(
                &var,
                "SENSOR_SIMULATOR_DELAY_MS",
                2000u64,
            )?),
        };

        let analysis = match var("ANALYSIS_PROVIDER").as_deref() {
            None | Some("stub") => AnalysisProvider::Stub,
            Some("gemini") => AnalysisProvider::Gemini(GeminiConfig {
                api_url: var("GEMINI_API_URL")
                    .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
                api_key: var("GEMINI_API_KEY").ok_or(ConfigError::Missing {
                    var: "GEMINI_API_KEY",
                })?,
                model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".into()),
                timeout: Duration::from_secs(parse_or(&var, "ANALYSIS_TIMEOUT_SECS", 60u64)?),
            }),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "ANALYSIS_PROVIDER",
                    value: other.into(),
                    reason: "expected `stub` or `gemini`".into(),
                })
            }
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.into(),
                    reason: "expected `pretty` or `json`".into(),
                })
            }
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            sensor,
            analysis,
            log_format,
        })
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:5173", "http://localhost:3000"]
        );
        assert_eq!(config.sensor.namespace, "npk");
        assert!(config.sensor.gateway_url.is_none());
        assert!(config.sensor.simulator);
        assert_matches!(config.analysis, AnalysisProvider::Stub);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn gemini_requires_key() {
        let err = load(&[("ANALYSIS_PROVIDER", "gemini")]).unwrap_err();
        assert_matches!(err, ConfigError::Missing { var: "GEMINI_API_KEY" });
    }

    #[test]
    fn gemini_settings() {
        let config = load(&[
            ("ANALYSIS_PROVIDER", "gemini"),
            ("GEMINI_API_KEY", "secret"),
            ("ANALYSIS_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_matches!(config.analysis, AnalysisProvider::Gemini(ref g) => {
            assert_eq!(g.api_key, "secret");
            assert_eq!(g.model, "gemini-1.5-flash");
            assert_eq!(g.timeout, Duration::from_secs(5));
        });
    }

    #[test]
    fn bad_port_is_reported() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "PORT", .. });
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = load(&[("ANALYSIS_PROVIDER", "oracle")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "ANALYSIS_PROVIDER", .. });
    }

    #[test]
    fn gateway_and_namespace() {
        let config = load(&[
            ("SENSOR_GATEWAY_URL", "ws://gateway:9001"),
            ("SENSOR_TOPIC_NAMESPACE", "farm1"),
            ("SENSOR_SIMULATOR", "false"),
        ])
        .unwrap();
        assert_eq!(config.sensor.gateway_url.as_deref(), Some("ws://gateway:9001"));
        assert_eq!(config.sensor.namespace, "farm1");
        assert!(!config.sensor.simulator);
    }
}
