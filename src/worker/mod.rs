// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Worker Module
 * Bounded, cancellable execution of scan rules
 *
 * © 2026 Bountyy Oy
 */

pub mod scheduler;

pub use scheduler::{ScanScheduler, ScanSummary};
