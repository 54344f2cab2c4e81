// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator -- defined in M1.2
//
// Loads cadence.yaml, validates structure, and converts timeouts and
// intervals into typed durations.

mod defaults;
mod error;
mod loader;
pub(crate) mod raw;
mod source;
mod types;

pub use defaults::{
    default_paced_element_types, DEFAULT_DEBUG_TAG, DEFAULT_EXCEPTION_TIMEOUT_SECS,
    DEFAULT_EXTRACT_INTERVAL_MS, DEFAULT_IDLE_TIMEOUT_SECS,
};
pub use error::ConfigError;
pub use loader::load_config;
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::Config;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const EXAMPLE_YAML: &str = r#"cadence: v1

debug: true
log_file_name: "cadence.log"
debug_tag: "chat-engine"
idle_timeout_secs: 2.5
exception_timeout_secs: 20
extract_interval_ms: 40
paced_element_types: ["text", "markdown"]
unchecked_connect_paths: ["/history", "/title"]
"#;

    fn make_source(yaml: &str) -> StringSource {
        StringSource {
            content: yaml.to_string(),
        }
    }

    // ---------------------------------------------------------------
    // 1. Valid config parses into typed struct -- check key fields
    // ---------------------------------------------------------------

    #[test]
    fn valid_config_parses_all_key_fields() {
        let config = load_config(&make_source(EXAMPLE_YAML)).unwrap();

        assert_eq!(config.version, "v1");
        assert!(config.debug);
        assert_eq!(config.log_file_name, "cadence.log");
        assert_eq!(config.debug_tag, "chat-engine");
        assert_eq!(config.idle_timeout, Duration::from_millis(2500));
        assert_eq!(config.exception_timeout, Duration::from_secs(20));
        assert_eq!(config.extract_interval, Duration::from_millis(40));
        assert!(config.paced_element_types.contains("text"));
        assert!(config.paced_element_types.contains("markdown"));
        assert_eq!(config.unchecked_connect_paths.len(), 2);
    }

    // ---------------------------------------------------------------
    // 2. Minimal config is valid (cadence: v1 is all you need)
    // ---------------------------------------------------------------

    #[test]
    fn minimal_config_uses_defaults() {
        let config = load_config(&make_source("cadence: v1\n")).unwrap();

        assert!(!config.debug);
        assert_eq!(config.debug_tag, DEFAULT_DEBUG_TAG);
        assert_eq!(
            config.idle_timeout,
            Duration::from_secs_f64(DEFAULT_IDLE_TIMEOUT_SECS)
        );
        assert_eq!(
            config.exception_timeout,
            Duration::from_secs_f64(DEFAULT_EXCEPTION_TIMEOUT_SECS)
        );
        assert_eq!(
            config.extract_interval,
            Duration::from_millis(DEFAULT_EXTRACT_INTERVAL_MS)
        );
        assert_eq!(config.paced_element_types, default_paced_element_types());
        assert!(config.unchecked_connect_paths.is_empty());
    }

    // ---------------------------------------------------------------
    // 3. Version gate
    // ---------------------------------------------------------------

    #[test]
    fn unsupported_version_rejected() {
        let err = load_config(&make_source("cadence: v2\n")).unwrap_err();
        assert!(err.to_string().contains("v2"), "got: {err}");
    }

    // ---------------------------------------------------------------
    // 4. Validation errors name the offending value
    // ---------------------------------------------------------------

    #[test]
    fn non_positive_idle_timeout_rejected() {
        let yaml = "cadence: v1\nidle_timeout_secs: 0\n";
        let err = load_config(&make_source(yaml)).unwrap_err();
        assert!(err.to_string().contains("idle_timeout_secs"), "got: {err}");
    }

    #[test]
    fn exception_timeout_shorter_than_idle_rejected() {
        let yaml = "cadence: v1\nidle_timeout_secs: 10\nexception_timeout_secs: 5\n";
        let err = load_config(&make_source(yaml)).unwrap_err();
        assert!(
            err.to_string().contains("exception_timeout_secs"),
            "got: {err}"
        );
    }

    #[test]
    fn zero_extract_interval_rejected() {
        let yaml = "cadence: v1\nextract_interval_ms: 0\n";
        let err = load_config(&make_source(yaml)).unwrap_err();
        assert!(err.to_string().contains("extract_interval_ms"), "got: {err}");
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = load_config(&make_source("cadence: [unterminated")).unwrap_err();
        assert!(matches!(err, ConfigError::YamlError(_)));
    }

    // ---------------------------------------------------------------
    // 5. Path checks
    // ---------------------------------------------------------------

    #[test]
    fn unchecked_paths_match_by_substring() {
        let config = load_config(&make_source(EXAMPLE_YAML)).unwrap();
        assert!(!config.checks_connect_state("/v1/history?page=2"));
        assert!(config.checks_connect_state("/v1/chat"));
    }

    #[test]
    fn config_source_string_source_works() {
        let source = StringSource {
            content: "cadence: v1\n".to_string(),
        };
        assert!(source.load().unwrap().contains("cadence: v1"));
    }
}
