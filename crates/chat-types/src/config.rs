use serde::{Deserialize, Serialize};

use crate::{ChatError, Result};

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend origin, without a trailing slash
    pub api_base: String,
    /// Use the streaming endpoints for sends
    pub streaming: bool,
    pub default_session_title: String,
    pub max_title_len: usize,
    pub recent_files_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            streaming: true,
            default_session_title: DEFAULT_SESSION_TITLE.to_string(),
            max_title_len: 50,
            recent_files_limit: 5,
        }
    }
}

impl ClientConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ClientConfig =
            serde_json::from_str(raw).map_err(|e| ChatError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(ChatError::Config("api_base must not be empty".to_string()));
        }
        if self.max_title_len == 0 {
            return Err(ChatError::Config("max_title_len must be positive".to_string()));
        }
        Ok(())
    }

    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}
