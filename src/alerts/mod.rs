// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Alerts Module
 * Alert value type, validating builder and the shared alert sink
 *
 * © 2026 Bountyy Oy
 */

pub mod alert;
pub mod sink;

pub use alert::{Alert, AlertBuilder};
pub use sink::AlertSink;
