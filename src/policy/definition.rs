// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Policy Definition
 * Declarative scan policy: global defaults, explicit rule overrides
 * and alert-tag inclusion/exclusion rules
 *
 * © 2026 Bountyy Oy
 */
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::errors::ConfigurationError;
use crate::types::{Strength, Threshold};

const DEFAULT_STRENGTH_KEY: &str = "defaultStrength";
const DEFAULT_THRESHOLD_KEY: &str = "defaultThreshold";
const RULES_KEY: &str = "rules";
const ALERT_TAGS_KEY: &str = "alertTags";

/// Collects informational messages, warnings and errors raised while a
/// policy is loaded and resolved. Every message is also logged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigProgress {
    pub infos: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.infos.push(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.errors.push(message);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Explicit configuration for a single rule, selected by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRuleOverride {
    pub id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub strength: Strength,
    pub threshold: Threshold,
}

impl PolicyRuleOverride {
    pub fn new(id: i32, strength: Strength, threshold: Threshold) -> Self {
        Self {
            id,
            name: None,
            strength,
            threshold,
        }
    }
}

/// A compiled whole-string pattern matched against tag keys
#[derive(Debug, Clone)]
pub struct TagPattern {
    source: String,
    regex: Regex,
}

impl TagPattern {
    /// Compile `source` so that it only matches complete tag keys
    pub fn compile(source: &str, location: &str) -> Result<Self, ConfigurationError> {
        let anchored = format!("^(?:{})$", source);
        let regex = Regex::new(&anchored).map_err(|e| ConfigurationError::InvalidPattern {
            location: location.to_string(),
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

impl PartialEq for TagPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for TagPattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.source)
    }
}

/// Selects rules by matching their tag keys
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertTagRule {
    pub name: String,
    #[serde(rename = "include")]
    pub include_patterns: Vec<TagPattern>,
    #[serde(rename = "exclude")]
    pub exclude_patterns: Vec<TagPattern>,
    pub strength: Strength,
    pub threshold: Threshold,
}

impl AlertTagRule {
    /// Build a tag rule, rejecting any pattern that is not a valid regex
    pub fn new(
        name: &str,
        include: &[&str],
        exclude: &[&str],
        strength: Strength,
        threshold: Threshold,
    ) -> Result<Self, ConfigurationError> {
        let include_patterns = include
            .iter()
            .map(|p| TagPattern::compile(p, &format!("{}.include", name)))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_patterns = exclude
            .iter()
            .map(|p| TagPattern::compile(p, &format!("{}.exclude", name)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.to_string(),
            include_patterns,
            exclude_patterns,
            strength,
            threshold,
        })
    }

    /// True if at least one key matches an include pattern and no key
    /// matches an exclude pattern
    pub fn selects<'a, I>(&self, tag_keys: I) -> bool
    where
        I: IntoIterator<Item = &'a String> + Clone,
    {
        !any_key_matches(tag_keys.clone(), &self.exclude_patterns)
            && any_key_matches(tag_keys, &self.include_patterns)
    }
}

fn any_key_matches<'a, I>(keys: I, patterns: &[TagPattern]) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    if patterns.is_empty() {
        return false;
    }
    keys.into_iter()
        .any(|key| patterns.iter().any(|p| p.matches(key)))
}

/// Declarative scan policy
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinition {
    pub default_strength: Option<Strength>,
    pub default_threshold: Option<Threshold>,
    pub rules: Vec<PolicyRuleOverride>,
    #[serde(rename = "alertTags")]
    pub alert_tag_rules: Vec<AlertTagRule>,
}

impl PolicyDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_strength(mut self, strength: Strength) -> Self {
        self.default_strength = Some(strength);
        self
    }

    pub fn with_default_threshold(mut self, threshold: Threshold) -> Self {
        self.default_threshold = Some(threshold);
        self
    }

    pub fn with_rule(mut self, rule: PolicyRuleOverride) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_alert_tag_rule(mut self, rule: AlertTagRule) -> Self {
        self.alert_tag_rules.push(rule);
        self
    }

    /// A policy with no defaults and no explicit rules defines nothing
    pub fn is_undefined(&self) -> bool {
        self.default_strength.is_none()
            && self.default_threshold.is_none()
            && self.rules.is_empty()
    }

    /// Build a policy from an already parsed YAML/JSON document.
    ///
    /// Problems are reported on `progress` and the offending element is
    /// skipped; only the document as a whole being of the wrong shape
    /// produces an undefined policy.
    pub fn from_config(value: Option<&Value>, job_name: &str, progress: &mut ConfigProgress) -> Self {
        let data = match value {
            None | Some(Value::Null) => return Self::default(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                progress.warn(format!(
                    "Job {}: invalid list for policyDefinition: {}",
                    job_name, other
                ));
                return Self::default();
            }
        };

        if data.is_empty() || undefined_definition(data) {
            return Self::default();
        }

        let mut policy = Self {
            default_strength: Some(
                parse_strength(data.get(DEFAULT_STRENGTH_KEY), job_name, progress)
                    .unwrap_or(Strength::Medium),
            ),
            default_threshold: Some(
                parse_threshold(data.get(DEFAULT_THRESHOLD_KEY), job_name, progress)
                    .unwrap_or(Threshold::Medium),
            ),
            rules: Vec::new(),
            alert_tag_rules: Vec::new(),
        };

        match data.get(RULES_KEY) {
            Some(Value::Array(rules)) => {
                for rule in rules {
                    let Value::Object(rule_map) = rule else {
                        progress.warn(format!(
                            "Job {}: invalid list entry for {}: {}",
                            job_name, RULES_KEY, rule
                        ));
                        continue;
                    };
                    let Some(id) = rule_map
                        .get("id")
                        .and_then(Value::as_i64)
                        .and_then(|id| i32::try_from(id).ok())
                    else {
                        progress.warn(format!(
                            "Job {}: rule entry without a valid integer id: {}",
                            job_name, rule
                        ));
                        continue;
                    };
                    policy.rules.push(PolicyRuleOverride {
                        id,
                        name: rule_map
                            .get("name")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        strength: parse_strength(rule_map.get("strength"), job_name, progress)
                            .unwrap_or(Strength::Default),
                        threshold: parse_threshold(rule_map.get("threshold"), job_name, progress)
                            .unwrap_or(Threshold::Default),
                    });
                }
            }
            None | Some(Value::Null) => {}
            Some(other) => progress.warn(format!(
                "Job {}: invalid list for {}: {}",
                job_name, RULES_KEY, other
            )),
        }

        if let Some(Value::Array(tag_rules)) = data.get(ALERT_TAGS_KEY) {
            for (i, entry) in tag_rules.iter().enumerate() {
                let Value::Object(tag_map) = entry else {
                    progress.warn(format!(
                        "Job {}: invalid list entry for {}: {}",
                        job_name, ALERT_TAGS_KEY, entry
                    ));
                    continue;
                };
                let name = tag_map
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Rule #{}", i + 1));
                let key = |field: &str| {
                    format!("{}.policyDefinition.alertTags[{}].{}", job_name, i, field)
                };
                // A rule with any unusable pattern would select more than intended
                let include = parse_patterns(tag_map.get("include"), &key("include"), progress);
                let exclude = parse_patterns(tag_map.get("exclude"), &key("exclude"), progress);
                let (Some(include_patterns), Some(exclude_patterns)) = (include, exclude) else {
                    progress.error(format!(
                        "Job {}: alert tag rule '{}' rejected",
                        job_name, name
                    ));
                    continue;
                };
                policy.alert_tag_rules.push(AlertTagRule {
                    name,
                    include_patterns,
                    exclude_patterns,
                    strength: parse_strength(tag_map.get("strength"), &key("strength"), progress)
                        .unwrap_or(Strength::Default),
                    threshold: parse_threshold(tag_map.get("threshold"), &key("threshold"), progress)
                        .unwrap_or(Threshold::Default),
                });
            }
        }

        policy
    }
}

/// Missing default keys together with an absent or empty rules list leave
/// the policy undefined. Explicit nulls for the defaults count as `medium`.
fn undefined_definition(data: &Map<String, Value>) -> bool {
    let rules_invalid = match data.get(RULES_KEY) {
        Some(Value::Array(rules)) => rules.is_empty(),
        None | Some(Value::Null) => true,
        Some(_) => false,
    };
    !data.contains_key(DEFAULT_STRENGTH_KEY)
        && !data.contains_key(DEFAULT_THRESHOLD_KEY)
        && rules_invalid
}

fn parse_strength(value: Option<&Value>, location: &str, progress: &mut ConfigProgress) -> Option<Strength> {
    match value? {
        Value::Null => Some(Strength::Medium),
        Value::String(s) => match s.parse() {
            Ok(strength) => Some(strength),
            Err(e) => {
                progress.warn(format!("{}: {}", location, e));
                None
            }
        },
        other => {
            progress.warn(format!("{}: strength must be a string, got {}", location, other));
            None
        }
    }
}

fn parse_threshold(value: Option<&Value>, location: &str, progress: &mut ConfigProgress) -> Option<Threshold> {
    match value? {
        Value::Null => Some(Threshold::Medium),
        Value::String(s) => match s.parse() {
            Ok(threshold) => Some(threshold),
            Err(e) => {
                progress.warn(format!("{}: {}", location, e));
                None
            }
        },
        other => {
            progress.warn(format!("{}: threshold must be a string, got {}", location, other));
            None
        }
    }
}

/// Compile a pattern list. `None` when any entry is unusable.
fn parse_patterns(
    value: Option<&Value>,
    location: &str,
    progress: &mut ConfigProgress,
) -> Option<Vec<TagPattern>> {
    let entries = match value {
        None | Some(Value::Null) => return Some(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            progress.error(
                ConfigurationError::MalformedPolicy(format!(
                    "{}: expected a list of patterns, got {}",
                    location, other
                ))
                .to_string(),
            );
            return None;
        }
    };

    let mut patterns = Vec::with_capacity(entries.len());
    let mut valid = true;
    for entry in entries {
        let Some(source) = entry.as_str() else {
            progress.error(
                ConfigurationError::MalformedPolicy(format!(
                    "{}: pattern must be a string, got {}",
                    location, entry
                ))
                .to_string(),
            );
            valid = false;
            continue;
        };
        match TagPattern::compile(source, location) {
            Ok(pattern) => patterns.push(pattern),
            Err(e) => {
                progress.error(e.to_string());
                valid = false;
            }
        }
    }
    valid.then_some(patterns)
}
