// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Rule Registry
 * Catalogue of scan rules with metadata, tags and rule factories
 * © 2026 Bountyy Oy
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::errors::ConfigurationError;
use crate::scanners::ScanRule;
use crate::types::Risk;

/// Rule category enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCategory {
    InfoGather,
    Browser,
    Server,
    Injection,
    #[default]
    Misc,
}

/// Release status of a rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Release,
    Beta,
    Alpha,
    #[default]
    Unknown,
}

/// Static metadata describing a scan rule. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleDescriptor {
    #[serde(default = "unset_id")]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub category: RuleCategory,
    #[serde(default = "default_risk")]
    pub risk: Risk,
    #[serde(default)]
    pub cwe_id: u32,
    #[serde(default)]
    pub wasc_id: u32,
    /// Namespaced tag keys; values are frequently empty
    #[serde(default, rename = "alertTags")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub status: RuleStatus,
}

fn unset_id() -> i32 {
    -1
}

fn default_risk() -> Risk {
    Risk::Info
}

impl RuleDescriptor {
    pub fn new(id: i32, name: &str, category: RuleCategory, risk: Risk) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: String::new(),
            solution: String::new(),
            references: Vec::new(),
            category,
            risk,
            cwe_id: 0,
            wasc_id: 0,
            tags: BTreeMap::new(),
            status: RuleStatus::Unknown,
        }
    }

    /// Parse rule metadata from a YAML document, as shipped alongside
    /// externally loaded rules.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        let descriptor: RuleDescriptor = serde_yaml::from_str(yaml)
            .map_err(|e| ConfigurationError::InvalidMetadata(e.to_string()))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.id < 0 {
            return Err(ConfigurationError::InvalidMetadata(format!(
                "rule '{}' has no valid id",
                self.name
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidMetadata(format!(
                "rule {} has no name",
                self.id
            )));
        }
        Ok(())
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn with_cwe(mut self, cwe_id: u32) -> Self {
        self.cwe_id = cwe_id;
        self
    }

    pub fn with_wasc(mut self, wasc_id: u32) -> Self {
        self.wasc_id = wasc_id;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_solution(mut self, solution: &str) -> Self {
        self.solution = solution.to_string();
        self
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.references.push(reference.to_string());
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    /// Add a tag. An empty value marks a presence-only tag.
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }
}

/// Produces a fresh rule instance for every (rule, target) pair
pub type RuleFactory = Arc<dyn Fn() -> Box<dyn ScanRule> + Send + Sync>;

struct RegisteredRule {
    descriptor: RuleDescriptor,
    factory: Option<RuleFactory>,
}

impl fmt::Debug for RegisteredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredRule")
            .field("descriptor", &self.descriptor)
            .field("executable", &self.factory.is_some())
            .finish()
    }
}

/// Rule Registry. Read-only once a scan starts.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<i32, RegisteredRule>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in rules
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        for factory in crate::scanners::builtin_rules() {
            // Built-in ids are distinct constants
            if let Err(e) = registry.register_rule(factory) {
                debug!("Skipping built-in rule: {}", e);
            }
        }
        registry
    }

    /// Register metadata only. Such rules take part in policy resolution
    /// but have nothing to execute.
    pub fn register(&mut self, descriptor: RuleDescriptor) -> Result<(), ConfigurationError> {
        descriptor.validate()?;
        self.insert(descriptor, None)
    }

    /// Register an executable rule. The descriptor is taken from a probe instance.
    pub fn register_rule(&mut self, factory: RuleFactory) -> Result<(), ConfigurationError> {
        let descriptor = factory().descriptor().clone();
        descriptor.validate()?;
        self.insert(descriptor, Some(factory))
    }

    fn insert(
        &mut self,
        descriptor: RuleDescriptor,
        factory: Option<RuleFactory>,
    ) -> Result<(), ConfigurationError> {
        if let Some(existing) = self.rules.get(&descriptor.id) {
            return Err(ConfigurationError::DuplicateRuleId {
                id: descriptor.id,
                existing: existing.descriptor.name.clone(),
            });
        }
        debug!("Registered rule {} ({})", descriptor.id, descriptor.name);
        self.rules
            .insert(descriptor.id, RegisteredRule { descriptor, factory });
        Ok(())
    }

    /// Get rule metadata
    pub fn get(&self, id: i32) -> Option<&RuleDescriptor> {
        self.rules.get(&id).map(|r| &r.descriptor)
    }

    /// Build a new rule instance, if the rule is executable
    pub fn instantiate(&self, id: i32) -> Option<Box<dyn ScanRule>> {
        self.rules
            .get(&id)
            .and_then(|r| r.factory.as_ref())
            .map(|factory| factory())
    }

    /// All descriptors, ordered by id
    pub fn descriptors(&self) -> Vec<&RuleDescriptor> {
        self.rules.values().map(|r| &r.descriptor).collect()
    }

    /// Owned snapshot of the catalogue, as consumed by the policy resolver
    pub fn snapshot(&self) -> Vec<RuleDescriptor> {
        self.rules.values().map(|r| r.descriptor.clone()).collect()
    }

    /// Check if rule exists
    pub fn exists(&self, id: i32) -> bool {
        self.rules.contains_key(&id)
    }

    pub fn is_executable(&self, id: i32) -> bool {
        self.rules
            .get(&id)
            .map(|r| r.factory.is_some())
            .unwrap_or(false)
    }

    /// Get rule count
    pub fn count(&self) -> usize {
        self.rules.len()
    }
}
