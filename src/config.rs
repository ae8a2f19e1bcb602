//! Startup configuration loaded from the environment.
//!
//! All settings are read once, before the pipeline is built and the
//! listener binds. Missing or invalid values fail the process
//! immediately with an error naming the offending variable, instead of
//! deferring the failure to the first incoming request.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Default bind address when `MEDICHAT_BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
/// Default chat-completion model when `MEDICHAT_CHAT_MODEL` is unset.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
/// Default number of passages retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

/// Errors raised while reading or validating the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    /// A variable is present but cannot be parsed.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    /// The configured vector index database does not exist on disk.
    #[error("vector index database not found at {}", .0.display())]
    IndexNotFound(PathBuf),
}

/// Validated process configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Credential for the hosted Gemini embedding and completion APIs.
    pub gemini_api_key: String,
    /// Path to the pre-populated sqlite-vec passage index.
    pub index_db: PathBuf,
    /// Address the HTTP front-end listens on.
    pub bind_addr: SocketAddr,
    /// Chat-completion model identifier.
    pub chat_model: String,
    /// Number of passages retrieved per question.
    pub top_k: usize,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through an arbitrary lookup function.
    ///
    /// `from_env` delegates here; tests supply a closure over a map so
    /// they never mutate process-global state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let gemini_api_key = require(&lookup, "GEMINI_API_KEY")?;

        let index_db = PathBuf::from(require(&lookup, "MEDICHAT_INDEX_DB")?);
        if !index_db.is_file() {
            return Err(ConfigError::IndexNotFound(index_db));
        }

        let bind_addr = lookup("MEDICHAT_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::Invalid {
                key: "MEDICHAT_BIND_ADDR",
                message: err.to_string(),
            })?;

        let chat_model =
            lookup("MEDICHAT_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());

        let top_k = match lookup("MEDICHAT_TOP_K") {
            Some(raw) => {
                let parsed = raw.parse::<usize>().map_err(|err| ConfigError::Invalid {
                    key: "MEDICHAT_TOP_K",
                    message: err.to_string(),
                })?;
                if parsed == 0 {
                    return Err(ConfigError::Invalid {
                        key: "MEDICHAT_TOP_K",
                        message: "must be at least 1".to_string(),
                    });
                }
                parsed
            }
            None => DEFAULT_TOP_K,
        };

        Ok(Self {
            gemini_api_key,
            index_db,
            bind_addr,
            chat_model,
            top_k,
        })
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn base_vars(index_path: &str) -> HashMap<String, String> {
        HashMap::from([
            ("GEMINI_API_KEY".to_string(), "test-key".to_string()),
            ("MEDICHAT_INDEX_DB".to_string(), index_path.to_string()),
        ])
    }

    fn temp_index() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"placeholder").expect("write");
        file
    }

    fn load(vars: &HashMap<String, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_optionals_absent() {
        let index = temp_index();
        let config = load(&base_vars(index.path().to_str().unwrap())).unwrap();

        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
    }

    #[test]
    fn missing_api_key_is_named() {
        let index = temp_index();
        let mut vars = base_vars(index.path().to_str().unwrap());
        vars.remove("GEMINI_API_KEY");

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("GEMINI_API_KEY")));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let index = temp_index();
        let mut vars = base_vars(index.path().to_str().unwrap());
        vars.insert("GEMINI_API_KEY".to_string(), "   ".to_string());

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("GEMINI_API_KEY")));
    }

    #[test]
    fn absent_index_file_fails_fast() {
        let vars = base_vars("/definitely/not/a/real/index.sqlite");
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::IndexNotFound(_)));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let index = temp_index();
        let mut vars = base_vars(index.path().to_str().unwrap());
        vars.insert("MEDICHAT_TOP_K".to_string(), "0".to_string());

        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "MEDICHAT_TOP_K",
                ..
            }
        ));
    }

    #[test]
    fn malformed_bind_addr_is_rejected() {
        let index = temp_index();
        let mut vars = base_vars(index.path().to_str().unwrap());
        vars.insert("MEDICHAT_BIND_ADDR".to_string(), "not-an-addr".to_string());

        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "MEDICHAT_BIND_ADDR",
                ..
            }
        ));
    }

    #[test]
    fn overrides_are_honored() {
        let index = temp_index();
        let mut vars = base_vars(index.path().to_str().unwrap());
        vars.insert(
            "MEDICHAT_BIND_ADDR".to_string(),
            "127.0.0.1:9901".to_string(),
        );
        vars.insert(
            "MEDICHAT_CHAT_MODEL".to_string(),
            "gemini-2.0-flash".to_string(),
        );
        vars.insert("MEDICHAT_TOP_K".to_string(), "5".to_string());

        let config = load(&vars).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9901");
        assert_eq!(config.chat_model, "gemini-2.0-flash");
        assert_eq!(config.top_k, 5);
    }
}
