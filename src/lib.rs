// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Engine Library
 * Scan policy resolution and active probe rules
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod config;
pub mod errors;
pub mod types;

// Policy resolution
pub mod policy;
pub mod registry;

// Probe execution
pub mod alerts;
pub mod http_client;
pub mod scanners;
pub mod transport;
pub mod worker;

pub use alerts::{Alert, AlertBuilder, AlertSink};
pub use errors::{ConfigurationError, EngineError, EngineResult, TransportError};
pub use policy::{resolve, EffectivePolicy, PolicyDefinition};
pub use registry::{RuleDescriptor, RuleRegistry};
pub use scanners::{RuleContext, ScanRule, StopFlag};
pub use transport::{HttpResponse, ProbeRequest, Transport};
pub use types::{Confidence, Risk, Strength, Threshold};
pub use worker::{ScanScheduler, ScanSummary};
