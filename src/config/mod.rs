// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod core;
pub mod loader;

pub use core::{EngineConfig, DEFAULT_USER_AGENT};
pub use loader::{apply_env_overrides, ConfigFormat, ConfigLoader};
