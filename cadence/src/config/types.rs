// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::time::Duration;

use super::defaults;

/// Parsed and validated engine configuration.
///
/// Runtime-only collaborators (the permanent filter, a replacement frame
/// adapter, the transport, the bridge router) are not configuration;
/// they are injected through `EngineDeps`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Contract version. Always "v1".
    pub version: String,
    pub debug: bool,
    pub log_file_name: String,
    /// Tag attached to engine-level log events.
    pub debug_tag: String,
    /// Quiet time before the connection is considered idle.
    pub idle_timeout: Duration,
    /// Quiet time before the connection is considered exceptional.
    pub exception_timeout: Duration,
    /// Delay between paced pops; also the idle-checker tick.
    pub extract_interval: Duration,
    /// Element types the pacing interval applies to.
    pub paced_element_types: HashSet<String>,
    /// Request-path substrings for which idle detection is skipped.
    pub unchecked_connect_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            debug: false,
            log_file_name: String::new(),
            debug_tag: defaults::DEFAULT_DEBUG_TAG.to_string(),
            idle_timeout: Duration::from_secs_f64(defaults::DEFAULT_IDLE_TIMEOUT_SECS),
            exception_timeout: Duration::from_secs_f64(defaults::DEFAULT_EXCEPTION_TIMEOUT_SECS),
            extract_interval: Duration::from_millis(defaults::DEFAULT_EXTRACT_INTERVAL_MS),
            paced_element_types: defaults::default_paced_element_types(),
            unchecked_connect_paths: Vec::new(),
        }
    }
}

impl Config {
    /// Whether idle detection applies to a request path.
    pub fn checks_connect_state(&self, path: &str) -> bool {
        !self
            .unchecked_connect_paths
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }
}
