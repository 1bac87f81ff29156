// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Engine Error Types
 * Configuration, transport and alert errors with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    /// Policy, registry or alert configuration errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Rule-internal errors that are not transport related
    #[error("Rule {rule_id} failed: {reason}")]
    Rule { rule_id: i32, reason: String },
}

/// Errors detected while loading or validating configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Invalid regex pattern '{pattern}' in {location}: {reason}")]
    InvalidPattern {
        location: String,
        pattern: String,
        reason: String,
    },

    #[error("Duplicate rule id {id}: already registered as '{existing}'")]
    DuplicateRuleId { id: i32, existing: String },

    #[error("Unknown rule id {0}")]
    UnknownRuleId(i32),

    #[error("Alert is missing required field '{0}'")]
    MissingAlertField(&'static str),

    #[error("Alert builder is not attached to a sink")]
    DetachedAlert,

    #[error("Malformed policy: {0}")]
    MalformedPolicy(String),

    #[error("Invalid rule metadata: {0}")]
    InvalidMetadata(String),
}

/// Errors raised by the transport boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("I/O error for {url}: {reason}")]
    Io { url: String, reason: String },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),
}

impl TransportError {
    pub fn io(url: impl Into<String>, reason: impl ToString) -> Self {
        TransportError::Io {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
