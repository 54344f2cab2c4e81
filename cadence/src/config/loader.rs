// Copyright 2026 The Cadence Project
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use super::defaults;
use super::error::ConfigError;
use super::raw::RawConfig;
use super::source::ConfigSource;
use super::types::Config;

/// Load, validate, and convert a YAML config.
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let yaml = source.load()?;
    let raw: RawConfig = serde_yaml::from_str(&yaml)?;

    if raw.cadence != "v1" {
        return Err(ConfigError::UnsupportedVersion(raw.cadence));
    }

    let idle_timeout_secs = raw
        .idle_timeout_secs
        .unwrap_or(defaults::DEFAULT_IDLE_TIMEOUT_SECS);
    if !idle_timeout_secs.is_finite() || idle_timeout_secs <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "idle_timeout_secs must be positive, got {idle_timeout_secs}"
        )));
    }

    let exception_timeout_secs = raw
        .exception_timeout_secs
        .unwrap_or(defaults::DEFAULT_EXCEPTION_TIMEOUT_SECS);
    if !exception_timeout_secs.is_finite() || exception_timeout_secs <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "exception_timeout_secs must be positive, got {exception_timeout_secs}"
        )));
    }
    if exception_timeout_secs < idle_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "exception_timeout_secs ({exception_timeout_secs}) must not be shorter than \
             idle_timeout_secs ({idle_timeout_secs})"
        )));
    }

    let extract_interval_ms = raw
        .extract_interval_ms
        .unwrap_or(defaults::DEFAULT_EXTRACT_INTERVAL_MS);
    if extract_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "extract_interval_ms must be at least 1".to_string(),
        ));
    }

    Ok(Config {
        version: raw.cadence,
        debug: raw.debug.unwrap_or(false),
        log_file_name: raw.log_file_name.unwrap_or_default(),
        debug_tag: raw
            .debug_tag
            .unwrap_or_else(|| defaults::DEFAULT_DEBUG_TAG.to_string()),
        idle_timeout: Duration::from_secs_f64(idle_timeout_secs),
        exception_timeout: Duration::from_secs_f64(exception_timeout_secs),
        extract_interval: Duration::from_millis(extract_interval_ms),
        paced_element_types: raw
            .paced_element_types
            .map(|types| types.into_iter().collect())
            .unwrap_or_else(defaults::default_paced_element_types),
        unchecked_connect_paths: raw.unchecked_connect_paths.unwrap_or_default(),
    })
}
