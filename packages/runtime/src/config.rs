//! Client configuration, populated from environment variables.

use crate::error::ConfigError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for building a [`Client`](crate::Client) and its default
/// transport.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `RESTWIRE_BASE_URL` | (absent) | Base URL every relative function URL resolves against |
/// | `RESTWIRE_TIMEOUT_SECS` | `30` | Whole-request timeout of the `reqwest` transport |
/// | `RESTWIRE_USER_AGENT` | `restwire/<version>` | `User-Agent` sent by the `reqwest` transport |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Must be http(s), end with `/` and carry no query or fragment.
    pub base_url: Option<String>,

    pub timeout_secs: u64,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timeout_secs = match lookup("RESTWIRE_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT_SECS,
            Some(v) => match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: "RESTWIRE_TIMEOUT_SECS",
                        expected: "a positive number of seconds",
                        value: v,
                    })
                }
            },
        };

        Ok(Self {
            base_url: lookup("RESTWIRE_BASE_URL").filter(|v| !v.is_empty()),
            timeout_secs,
            user_agent: lookup("RESTWIRE_USER_AGENT").unwrap_or_else(default_user_agent),
        })
    }

    /// The base URL, or an error naming the variable that should hold it.
    pub fn require_base_url(&self) -> Result<&str, ConfigError> {
        self.base_url
            .as_deref()
            .ok_or(ConfigError::MissingEnv("RESTWIRE_BASE_URL"))
    }
}

fn default_user_agent() -> String {
    format!("restwire/{}", env!("CARGO_PKG_VERSION"))
}
