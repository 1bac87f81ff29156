// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Policy Module
 * Scan policy definitions and their resolution into an effective policy
 *
 * © 2026 Bountyy Oy
 */

pub mod definition;
pub mod effective;
pub mod resolver;

pub use definition::{AlertTagRule, ConfigProgress, PolicyDefinition, PolicyRuleOverride, TagPattern};
pub use effective::{EffectivePolicy, EntrySource, ResolvedEntry, RulePolicy};
pub use resolver::resolve;
