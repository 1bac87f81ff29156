// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

use super::core::EngineConfig;
use crate::policy::{ConfigProgress, PolicyDefinition};

/// Key under which a job document nests its policy
const POLICY_DEFINITION_KEY: &str = "policyDefinition";

pub struct ConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref().to_path_buf();
        let format = Self::detect_format(&path)?;

        Ok(Self {
            config_path: path,
            format,
        })
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file format"))?;

        match extension {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported config file format: {}", extension)),
        }
    }

    fn read_document(&self) -> Result<Value> {
        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;

        let document = match self.format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(&content).context("Failed to parse YAML config")?
            }
            ConfigFormat::Toml => toml::from_str(&content).context("Failed to parse TOML config")?,
            ConfigFormat::Json => {
                serde_json::from_str(&content).context("Failed to parse JSON config")?
            }
        };
        Ok(document)
    }

    /// Load engine settings, apply environment overrides and validate
    pub fn load_engine_config(&self) -> Result<EngineConfig> {
        let document = self.read_document()?;
        let mut config: EngineConfig = if document.is_null() {
            EngineConfig::default()
        } else {
            serde_json::from_value(document).context("Invalid engine configuration")?
        };

        apply_env_overrides(&mut config)?;
        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    /// Load a policy document. Problems with individual entries are
    /// reported on `progress`; only unreadable files are errors.
    pub fn load_policy(&self, progress: &mut ConfigProgress) -> Result<PolicyDefinition> {
        let document = self.read_document()?;
        let policy = document.get(POLICY_DEFINITION_KEY).unwrap_or(&document);
        debug!("Loading policy from {:?}", self.config_path);

        let job_name = self
            .config_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("policy");
        let policy = if policy.is_null() { None } else { Some(policy) };
        Ok(PolicyDefinition::from_config(policy, job_name, progress))
    }
}

/// Environment overrides for the engine configuration
pub fn apply_env_overrides(config: &mut EngineConfig) -> Result<()> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn apply_overrides<F>(config: &mut EngineConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(concurrency) = lookup("PROBE_CONCURRENCY") {
        config.concurrency = concurrency
            .parse()
            .context("Invalid PROBE_CONCURRENCY")?;
    }

    if let Some(timeout) = lookup("PROBE_TIMEOUT_SECS") {
        config.request_timeout_secs = timeout.parse().context("Invalid PROBE_TIMEOUT_SECS")?;
    }

    if let Some(user_agent) = lookup("PROBE_USER_AGENT") {
        config.user_agent = user_agent;
    }

    if let Some(accept) = lookup("ACCEPT_INVALID_CERTS") {
        config.accept_invalid_certs = accept == "1" || accept.eq_ignore_ascii_case("true");
    }

    Ok(())
}
