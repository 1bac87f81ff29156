// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Attack strength controls how many and which probes a rule attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    /// Inherit the policy default
    Default,
    Low,
    Medium,
    High,
    Insane,
}

impl Default for Strength {
    fn default() -> Self {
        Strength::Medium
    }
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Strength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Default => "default",
            Strength::Low => "low",
            Strength::Medium => "medium",
            Strength::High => "high",
            Strength::Insane => "insane",
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Strength::Default)
    }

    /// Resolve `Default` against a fallback, leaving concrete values untouched
    pub fn or(self, fallback: Strength) -> Strength {
        if self.is_default() {
            fallback
        } else {
            self
        }
    }
}

impl FromStr for Strength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Strength::Default),
            "low" => Ok(Strength::Low),
            "medium" => Ok(Strength::Medium),
            "high" => Ok(Strength::High),
            "insane" => Ok(Strength::Insane),
            other => Err(format!("unknown strength '{}'", other)),
        }
    }
}

/// Alert threshold controls whether a rule must confirm a finding before raising it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    /// Inherit the policy default
    Default,
    Off,
    Low,
    Medium,
    High,
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Medium
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Threshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            Threshold::Default => "default",
            Threshold::Off => "off",
            Threshold::Low => "low",
            Threshold::Medium => "medium",
            Threshold::High => "high",
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Threshold::Default)
    }

    pub fn is_off(&self) -> bool {
        matches!(self, Threshold::Off)
    }

    pub fn or(self, fallback: Threshold) -> Threshold {
        if self.is_default() {
            fallback
        } else {
            self
        }
    }
}

impl FromStr for Threshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Threshold::Default),
            "off" => Ok(Threshold::Off),
            "low" => Ok(Threshold::Low),
            "medium" => Ok(Threshold::Medium),
            "high" => Ok(Threshold::High),
            other => Err(format!("unknown threshold '{}'", other)),
        }
    }
}

/// Alert risk. Names are part of the export contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Risk {
    Info,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Risk::Info => write!(f, "INFO"),
            Risk::Low => write!(f, "LOW"),
            Risk::Medium => write!(f, "MEDIUM"),
            Risk::High => write!(f, "HIGH"),
        }
    }
}

/// Alert confidence. Names are part of the export contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
    Confirmed,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::High => write!(f, "HIGH"),
            Confidence::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}
