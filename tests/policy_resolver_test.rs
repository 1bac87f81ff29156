// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Policy Resolution Tests
 * Precedence, tag selection and OFF handling against a rule catalogue
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde_json::json;

use lonkero_probe::policy::{
    resolve, AlertTagRule, ConfigProgress, EntrySource, PolicyDefinition, PolicyRuleOverride,
};
use lonkero_probe::registry::{RuleCategory, RuleDescriptor, RuleRegistry};
use lonkero_probe::types::{Risk, Strength, Threshold};

fn catalogue() -> Vec<RuleDescriptor> {
    let mut registry = RuleRegistry::with_builtin_rules();
    registry
        .register(
            RuleDescriptor::new(100, "Directory Browsing", RuleCategory::Server, Risk::Medium)
                .with_tag("CWE-548", "")
                .with_tag("PENTEST", ""),
        )
        .unwrap();
    registry
        .register(
            RuleDescriptor::new(200, "Backup File Disclosure", RuleCategory::InfoGather, Risk::Low)
                .with_tag("CWE-541", ""),
        )
        .unwrap();
    registry.snapshot()
}

#[test]
fn test_undefined_policy_leaves_defaults() {
    let mut progress = ConfigProgress::new();
    assert!(resolve(None, &catalogue(), &mut progress).is_none());

    let empty_tags = PolicyDefinition::new().with_alert_tag_rule(
        AlertTagRule::new("tags", &["CWE-.*"], &[], Strength::High, Threshold::Low).unwrap(),
    );
    assert!(resolve(Some(&empty_tags), &catalogue(), &mut progress).is_none());
}

#[test]
fn test_explicit_rule_beats_tag_rule() {
    let definition = PolicyDefinition::new()
        .with_default_threshold(Threshold::Medium)
        .with_rule(PolicyRuleOverride::new(100, Strength::High, Threshold::Low))
        .with_alert_tag_rule(
            AlertTagRule::new("pentest", &["PENTEST"], &[], Strength::Insane, Threshold::High)
                .unwrap(),
        );
    let mut progress = ConfigProgress::new();
    let effective = resolve(Some(&definition), &catalogue(), &mut progress).unwrap();

    let rule = effective.rule(100);
    assert_eq!(rule.strength, Strength::High);
    assert_eq!(rule.threshold, Threshold::Low);
    assert!(rule.enabled);
    assert_eq!(effective.entry(100).unwrap().source, EntrySource::Explicit);

    // Both built-in rules carry PENTEST and are picked up by the tag rule
    for id in [90028, 40025] {
        assert_eq!(effective.rule(id).strength, Strength::Insane);
        assert_eq!(
            effective.entry(id).unwrap().source,
            EntrySource::AlertTag("pentest".to_string())
        );
    }

    // Untouched rules get the defaults
    assert_eq!(effective.rule(200).strength, Strength::Medium);
    assert_eq!(effective.rule(200).threshold, Threshold::Medium);
}

#[test]
fn test_tag_inclusion_by_cwe() {
    let definition = PolicyDefinition::new()
        .with_default_threshold(Threshold::Off)
        .with_alert_tag_rule(
            AlertTagRule::new("cwe", &["CWE-54[0-9]"], &["CWE-548"], Strength::Low, Threshold::Low)
                .unwrap(),
        );
    let mut progress = ConfigProgress::new();
    let effective = resolve(Some(&definition), &catalogue(), &mut progress).unwrap();

    assert_eq!(effective.enabled_rule_ids(), vec![200]);
    assert!(!effective.is_enabled(100));
    assert!(!effective.is_enabled(90028));
}

#[test]
fn test_off_threshold_dominates_strength() {
    let definition = PolicyDefinition::new()
        .with_default_strength(Strength::Low)
        .with_rule(PolicyRuleOverride::new(40025, Strength::Insane, Threshold::Off));
    let mut progress = ConfigProgress::new();
    let effective = resolve(Some(&definition), &catalogue(), &mut progress).unwrap();

    assert!(!effective.is_enabled(40025));
    assert!(effective.is_enabled(90028));
    assert_eq!(effective.rule(90028).strength, Strength::Low);
}

#[test]
fn test_resolution_is_idempotent() {
    let document = json!({
        "defaultStrength": "high",
        "defaultThreshold": "low",
        "rules": [
            { "id": 90028, "name": "Insecure HTTP Method", "strength": "insane" },
            { "id": 40025, "threshold": "off" }
        ],
        "alertTags": [
            { "name": "cwe", "include": ["CWE-.*"], "strength": "low" }
        ]
    });
    let mut progress = ConfigProgress::new();
    let definition = PolicyDefinition::from_config(Some(&document), "job", &mut progress);

    let first = resolve(Some(&definition), &catalogue(), &mut progress).unwrap();
    let second = resolve(Some(&definition), &catalogue(), &mut progress).unwrap();
    assert_eq!(first, second);

    assert_eq!(first.rule(90028).strength, Strength::Insane);
    assert_eq!(first.rule(90028).threshold, Threshold::Low);
    assert!(!first.is_enabled(40025));
    assert_eq!(first.rule(200).strength, Strength::Low);
    assert!(!progress.has_errors());
}

#[test]
fn test_unknown_rule_ids_fall_back_to_defaults() {
    let definition = PolicyDefinition::new()
        .with_default_strength(Strength::High)
        .with_rule(PolicyRuleOverride::new(999_999, Strength::Low, Threshold::Low));
    let mut progress = ConfigProgress::new();
    let effective = resolve(Some(&definition), &catalogue(), &mut progress).unwrap();

    assert!(progress.has_warnings());
    assert_eq!(progress.warnings[0], "Unknown rule id 999999, ignoring it");
    assert!(effective.entry(999_999).is_none());
    assert_eq!(effective.rule(999_999).strength, Strength::High);
}

#[test]
fn test_invalid_exclude_rejects_tag_rule() {
    let document = json!({
        "defaultThreshold": "off",
        "alertTags": [
            { "name": "pentest", "include": ["PENTEST"], "exclude": ["CWE-(89"], "threshold": "low" }
        ]
    });
    let mut registry = RuleRegistry::new();
    registry
        .register(
            RuleDescriptor::new(300, "SQL Injection", RuleCategory::Injection, Risk::High)
                .with_tag("PENTEST", "")
                .with_tag("CWE-89", ""),
        )
        .unwrap();

    let mut progress = ConfigProgress::new();
    let definition = PolicyDefinition::from_config(Some(&document), "job", &mut progress);
    assert!(definition.alert_tag_rules.is_empty());
    assert!(progress.has_errors());
    assert!(progress.errors.iter().any(|e| e.contains("CWE-(89")));

    // The broken exclude must not widen the selection
    let effective = resolve(Some(&definition), &registry.snapshot(), &mut progress).unwrap();
    assert!(!effective.is_enabled(300));
    assert!(effective.enabled_rule_ids().is_empty());
}
