// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

/// Default User-Agent sent with every probe
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Probe engine runtime settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum number of rule executions running at once
    #[validate(range(min = 1, max = 1000))]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Response bodies are truncated past this size; 10MB when unset
    #[serde(default)]
    pub max_body_size: Option<usize>,

    #[validate(length(min = 1))]
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout_secs: default_timeout(),
            max_body_size: None,
            user_agent: default_user_agent(),
            accept_invalid_certs: false,
        }
    }
}

impl EngineConfig {
    /// Apply command-line overrides and validate the merged settings
    pub fn with_overrides(
        mut self,
        concurrency: Option<usize>,
        timeout_secs: Option<u64>,
        accept_invalid_certs: bool,
    ) -> Result<Self, ValidationErrors> {
        if let Some(concurrency) = concurrency {
            self.concurrency = concurrency;
        }
        if let Some(timeout_secs) = timeout_secs {
            self.request_timeout_secs = timeout_secs;
        }
        if accept_invalid_certs {
            self.accept_invalid_certs = true;
        }
        self.validate()?;
        Ok(self)
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
