// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;

pub const DEFAULT_DEBUG_TAG: &str = "cadence";
pub const DEFAULT_IDLE_TIMEOUT_SECS: f64 = 3.0;
pub const DEFAULT_EXCEPTION_TIMEOUT_SECS: f64 = 30.0;
pub const DEFAULT_EXTRACT_INTERVAL_MS: u64 = 50;

/// Interval pacing applies to plain text by default; everything else
/// drains as fast as subscribers take it.
pub fn default_paced_element_types() -> HashSet<String> {
    HashSet::from(["text".to_string()])
}
