// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{Strength, Threshold};

/// Where a resolved rule entry came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "camelCase")]
pub enum EntrySource {
    Explicit,
    AlertTag(String),
}

/// One entry of the ordered, id-deduplicated rule collection produced by
/// resolution. Strength and threshold may still be `Default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub id: i32,
    pub name: String,
    pub strength: Strength,
    pub threshold: Threshold,
    pub source: EntrySource,
}

/// Execution parameters for a single rule, with defaults applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RulePolicy {
    pub strength: Strength,
    pub threshold: Threshold,
    pub enabled: bool,
}

/// The final per-rule configuration used for a scan run.
/// Read-only once built and shared between workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePolicy {
    pub default_strength: Strength,
    pub default_threshold: Threshold,
    pub entries: Vec<ResolvedEntry>,
    pub rules: BTreeMap<i32, RulePolicy>,
}

impl EffectivePolicy {
    pub(crate) fn new(default_strength: Strength, default_threshold: Threshold) -> Self {
        Self {
            default_strength,
            default_threshold,
            entries: Vec::new(),
            rules: BTreeMap::new(),
        }
    }

    /// Parameters for a rule id. Ids missing from the catalogue at resolution
    /// time fall back to the global defaults.
    pub fn rule(&self, id: i32) -> RulePolicy {
        self.rules
            .get(&id)
            .copied()
            .unwrap_or_else(|| self.default_rule_policy())
    }

    pub fn entry(&self, id: i32) -> Option<&ResolvedEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn is_enabled(&self, id: i32) -> bool {
        self.rule(id).enabled
    }

    /// Ids of enabled rules, ascending
    pub fn enabled_rule_ids(&self) -> Vec<i32> {
        self.rules
            .iter()
            .filter(|(_, policy)| policy.enabled)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn default_rule_policy(&self) -> RulePolicy {
        RulePolicy {
            strength: self.default_strength,
            threshold: self.default_threshold,
            enabled: !self.default_threshold.is_off(),
        }
    }
}
