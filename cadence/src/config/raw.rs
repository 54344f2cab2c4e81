// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Raw serde layer. Everything optional; validation and defaulting happen
// in the loader.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct RawConfig {
    /// Version gate: `cadence: v1`.
    pub cadence: String,
    pub debug: Option<bool>,
    pub log_file_name: Option<String>,
    pub debug_tag: Option<String>,
    /// Seconds, fractional.
    pub idle_timeout_secs: Option<f64>,
    /// Seconds, fractional.
    pub exception_timeout_secs: Option<f64>,
    /// Milliseconds.
    pub extract_interval_ms: Option<u64>,
    /// Element types admitted to pacing.
    pub paced_element_types: Option<Vec<String>>,
    /// Request-path substrings for which idle detection is skipped.
    pub unchecked_connect_paths: Option<Vec<String>>,
}
