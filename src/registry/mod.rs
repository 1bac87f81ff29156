// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Registry Module
 * Rule registry and metadata management
 * © 2026 Bountyy Oy
 */

pub mod rule_registry;

pub use rule_registry::{RuleCategory, RuleDescriptor, RuleFactory, RuleRegistry, RuleStatus};
