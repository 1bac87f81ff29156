// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Policy Resolver
 * Turns a PolicyDefinition and a rule catalogue snapshot into an EffectivePolicy
 *
 * Resolution order:
 * - explicit rule overrides, in source order (first occurrence of an id wins)
 * - alert-tag rules, in declaration order (never replace an existing id)
 * - global defaults for every catalogue rule without an entry
 *
 * © 2026 Bountyy Oy
 */
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::definition::{ConfigProgress, PolicyDefinition};
use super::effective::{EffectivePolicy, EntrySource, ResolvedEntry, RulePolicy};
use crate::errors::ConfigurationError;
use crate::registry::RuleDescriptor;
use crate::types::{Strength, Threshold};

/// Ordered collection that ignores inserts for ids it already holds
#[derive(Default)]
struct EntrySet {
    seen: HashSet<i32>,
    entries: Vec<ResolvedEntry>,
}

impl EntrySet {
    fn insert(&mut self, entry: ResolvedEntry) -> bool {
        if !self.seen.insert(entry.id) {
            return false;
        }
        self.entries.push(entry);
        true
    }
}

/// Resolve a policy against the rule catalogue.
///
/// Returns `None` when the policy is absent or defines nothing; the caller
/// must then leave its ambient default policy untouched.
pub fn resolve(
    policy: Option<&PolicyDefinition>,
    catalogue: &[RuleDescriptor],
    progress: &mut ConfigProgress,
) -> Option<EffectivePolicy> {
    let policy = policy?;
    if policy.is_undefined() {
        debug!("Policy defines no defaults and no rules, leaving defaults untouched");
        return None;
    }

    let by_id: BTreeMap<i32, &RuleDescriptor> = catalogue.iter().map(|d| (d.id, d)).collect();
    let mut set = EntrySet::default();

    for rule in &policy.rules {
        let Some(descriptor) = by_id.get(&rule.id) else {
            progress.warn(format!(
                "{}, ignoring it",
                ConfigurationError::UnknownRuleId(rule.id)
            ));
            continue;
        };
        let inserted = set.insert(ResolvedEntry {
            id: rule.id,
            name: descriptor.name.clone(),
            strength: rule.strength,
            threshold: rule.threshold,
            source: EntrySource::Explicit,
        });
        if !inserted {
            debug!("Rule {} listed more than once, keeping the first entry", rule.id);
        }
    }

    for tag_rule in &policy.alert_tag_rules {
        for descriptor in catalogue {
            if !tag_rule.selects(descriptor.tags.keys()) {
                continue;
            }
            let inserted = set.insert(ResolvedEntry {
                id: descriptor.id,
                name: descriptor.name.clone(),
                strength: tag_rule.strength,
                threshold: tag_rule.threshold,
                source: EntrySource::AlertTag(tag_rule.name.clone()),
            });
            if inserted {
                debug!(
                    "Alert tag rule '{}' selected rule {} ({})",
                    tag_rule.name, descriptor.id, descriptor.name
                );
            }
        }
    }

    let default_strength = policy
        .default_strength
        .unwrap_or(Strength::Medium)
        .or(Strength::Medium);
    let default_threshold = policy
        .default_threshold
        .unwrap_or(Threshold::Medium)
        .or(Threshold::Medium);

    let mut effective = EffectivePolicy::new(default_strength, default_threshold);
    progress.info(format!("Default strength set to {}", default_strength));
    progress.info(format!("Default threshold set to {}", default_threshold));

    let defaults = effective.default_rule_policy();
    for descriptor in catalogue {
        effective.rules.insert(descriptor.id, defaults);
    }

    for entry in &set.entries {
        let policy = apply_entry(effective.rule(entry.id), entry);
        if !entry.strength.is_default() {
            progress.info(format!("Rule {} strength set to {}", entry.id, policy.strength));
        }
        if !entry.threshold.is_default() {
            progress.info(format!("Rule {} threshold set to {}", entry.id, policy.threshold));
        }
        effective.rules.insert(entry.id, policy);
    }

    effective.entries = set.entries;
    Some(effective)
}

/// A concrete strength enables the rule; a concrete threshold enables it
/// unless that threshold is OFF.
fn apply_entry(mut policy: RulePolicy, entry: &ResolvedEntry) -> RulePolicy {
    if !entry.strength.is_default() {
        policy.strength = entry.strength;
        policy.enabled = true;
    }
    if !entry.threshold.is_default() {
        policy.threshold = entry.threshold;
        policy.enabled = !entry.threshold.is_off();
    }
    policy
}
