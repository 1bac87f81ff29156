// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::sink::AlertSink;
use crate::errors::ConfigurationError;
use crate::registry::RuleDescriptor;
use crate::transport::ProbeRequest;
use crate::types::{Confidence, Risk};

/// A finding raised by a rule. Field names are part of the export contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub rule_id: i32,
    pub alert_ref: String,
    pub name: String,
    pub description: String,
    pub risk: Risk,
    pub confidence: Confidence,
    pub param: String,
    pub attack: String,
    pub evidence: String,
    pub other_info: String,
    pub solution: String,
    pub reference: String,
    pub request_uri: String,
    pub method: String,
    pub cwe_id: u32,
    pub wasc_id: u32,
    pub tags: BTreeMap<String, String>,
    pub source_message_ref: Option<String>,
    pub raised_at: DateTime<Utc>,
}

/// Builder for a single alert. Validates required fields on `build()`;
/// `raise()` is the only call with a side effect.
#[derive(Debug, Clone)]
pub struct AlertBuilder {
    sink: Option<AlertSink>,
    rule_id: i32,
    variant: Option<String>,
    name: Option<String>,
    description: Option<String>,
    risk: Option<Risk>,
    confidence: Option<Confidence>,
    param: String,
    attack: String,
    evidence: String,
    other_info: String,
    solution: String,
    reference: String,
    request_uri: String,
    method: String,
    cwe_id: u32,
    wasc_id: u32,
    tags: BTreeMap<String, String>,
    source_message_ref: Option<String>,
}

impl AlertBuilder {
    /// Detached builder; only `build()` is available
    pub fn new(rule_id: i32) -> Self {
        Self {
            sink: None,
            rule_id,
            variant: None,
            name: None,
            description: None,
            risk: None,
            confidence: None,
            param: String::new(),
            attack: String::new(),
            evidence: String::new(),
            other_info: String::new(),
            solution: String::new(),
            reference: String::new(),
            request_uri: String::new(),
            method: String::new(),
            cwe_id: 0,
            wasc_id: 0,
            tags: BTreeMap::new(),
            source_message_ref: None,
        }
    }

    /// Builder seeded from rule metadata and attached to a sink
    pub fn for_rule(descriptor: &RuleDescriptor, sink: AlertSink) -> Self {
        let mut builder = Self::new(descriptor.id);
        builder.sink = Some(sink);
        builder.name = Some(descriptor.name.clone()).filter(|n| !n.is_empty());
        builder.description = Some(descriptor.description.clone()).filter(|d| !d.is_empty());
        builder.risk = Some(descriptor.risk);
        builder.solution = descriptor.solution.clone();
        builder.reference = descriptor.references.join("\n");
        builder.cwe_id = descriptor.cwe_id;
        builder.wasc_id = descriptor.wasc_id;
        builder.tags = descriptor.tags.clone();
        builder
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn risk(mut self, risk: Risk) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Suffix that distinguishes alert variants of the same rule
    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn attack(mut self, attack: impl Into<String>) -> Self {
        self.attack = attack.into();
        self
    }

    pub fn evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = evidence.into();
        self
    }

    pub fn other_info(mut self, other_info: impl Into<String>) -> Self {
        self.other_info = other_info.into();
        self
    }

    /// Attach the probe message the alert is raised on
    pub fn message(mut self, request: &ProbeRequest) -> Self {
        self.request_uri = request.url.to_string();
        self.method = request.method.clone();
        self.source_message_ref = Some(request.id.to_string());
        self
    }

    pub fn build(self) -> Result<Alert, ConfigurationError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(ConfigurationError::MissingAlertField("name"))?;
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or(ConfigurationError::MissingAlertField("description"))?;
        let risk = self.risk.ok_or(ConfigurationError::MissingAlertField("risk"))?;
        let confidence = self
            .confidence
            .ok_or(ConfigurationError::MissingAlertField("confidence"))?;

        let alert_ref = match self.variant {
            Some(variant) => format!("{}-{}", self.rule_id, variant),
            None => self.rule_id.to_string(),
        };

        Ok(Alert {
            rule_id: self.rule_id,
            alert_ref,
            name,
            description,
            risk,
            confidence,
            param: self.param,
            attack: self.attack,
            evidence: self.evidence,
            other_info: self.other_info,
            solution: self.solution,
            reference: self.reference,
            request_uri: self.request_uri,
            method: self.method,
            cwe_id: self.cwe_id,
            wasc_id: self.wasc_id,
            tags: self.tags,
            source_message_ref: self.source_message_ref,
            raised_at: Utc::now(),
        })
    }

    /// Validate and append the alert to the attached sink
    pub fn raise(mut self) -> Result<Alert, ConfigurationError> {
        let sink = self.sink.take().ok_or(ConfigurationError::DetachedAlert)?;
        let alert = self.build()?;
        debug!(
            "Raising alert {} '{}' [{} / {}]",
            alert.alert_ref, alert.name, alert.risk, alert.confidence
        );
        sink.append(alert.clone());
        Ok(alert)
    }
}
