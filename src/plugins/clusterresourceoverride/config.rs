// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! ClusterResourceOverride configuration document.
//!
//! ```yaml
//! apiVersion: v1
//! kind: ClusterResourceOverrideConfig
//! limitCPUToMemoryPercent: 100
//! cpuRequestToLimitPercent: 10
//! memoryRequestToLimitPercent: 25
//! ```

use super::PLUGIN_NAME;
use crate::admission::errors::{field_forbidden, field_invalid, FieldError};
use serde::Deserialize;
use std::io::Read;
use thiserror::Error;

/// Kind expected in the `kind` field of the document, when present.
pub const CONFIG_KIND: &str = "ClusterResourceOverrideConfig";

/// ConfigError is returned when the configuration document cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read ClusterResourceOverrideConfig: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode ClusterResourceOverrideConfig: {0}")]
    Decode(#[from] serde_yaml::Error),

    #[error("unexpected kind {0:?}, expected ClusterResourceOverrideConfig")]
    UnexpectedKind(String),

    #[error("invalid ClusterResourceOverrideConfig: [{}]", join_field_errors(.0))]
    Invalid(Vec<FieldError>),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// ClusterResourceOverrideConfig holds the three override ratios, as integer
/// percentages. A percentage of zero turns that particular override off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResourceOverrideConfig {
    /// CPU limit as a percentage of the memory limit, where 1Gi of memory at
    /// 100% maps to one core. Values above 100 are allowed.
    #[serde(default, rename = "limitCPUToMemoryPercent")]
    pub limit_cpu_to_memory_percent: i64,

    /// CPU request as a percentage of the CPU limit, in [0, 100].
    #[serde(default)]
    pub cpu_request_to_limit_percent: i64,

    /// Memory request as a percentage of the memory limit, in [0, 100].
    #[serde(default)]
    pub memory_request_to_limit_percent: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigDocument {
    #[serde(default)]
    #[allow(dead_code)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(flatten)]
    config: ClusterResourceOverrideConfig,
}

impl ClusterResourceOverrideConfig {
    pub fn new(
        limit_cpu_to_memory_percent: i64,
        cpu_request_to_limit_percent: i64,
        memory_request_to_limit_percent: i64,
    ) -> Self {
        Self {
            limit_cpu_to_memory_percent,
            cpu_request_to_limit_percent,
            memory_request_to_limit_percent,
        }
    }

    /// Check the ratios, reporting every violation at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = validate_config(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

/// Field-level validation of a configuration.
pub fn validate_config(config: &ClusterResourceOverrideConfig) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if config.limit_cpu_to_memory_percent == 0
        && config.cpu_request_to_limit_percent == 0
        && config.memory_request_to_limit_percent == 0
    {
        errors.push(field_forbidden(
            PLUGIN_NAME,
            "plugin enabled but no percentages were specified",
        ));
    }
    if config.limit_cpu_to_memory_percent < 0 {
        errors.push(field_invalid(
            &format!("{}.limitCPUToMemoryPercent", PLUGIN_NAME),
            config.limit_cpu_to_memory_percent,
            "must be positive",
        ));
    }
    for (field, value) in [
        ("cpuRequestToLimitPercent", config.cpu_request_to_limit_percent),
        ("memoryRequestToLimitPercent", config.memory_request_to_limit_percent),
    ] {
        if !(0..=100).contains(&value) {
            errors.push(field_invalid(
                &format!("{}.{}", PLUGIN_NAME, field),
                value,
                "must be between 0 and 100",
            ));
        }
    }

    errors
}

/// Decode the configuration document. No reader, or an empty document, means
/// the plugin was not configured.
pub fn read_config(
    reader: Option<&mut dyn Read>,
) -> Result<Option<ClusterResourceOverrideConfig>, ConfigError> {
    let Some(reader) = reader else {
        return Ok(None);
    };

    let mut data = String::new();
    reader.read_to_string(&mut data)?;
    if data.trim().is_empty() {
        return Ok(None);
    }

    let document: ConfigDocument = serde_yaml::from_str(&data)?;
    if let Some(kind) = document.kind {
        if kind != CONFIG_KIND {
            return Err(ConfigError::UnexpectedKind(kind));
        }
    }
    Ok(Some(document.config))
}

/// Decode and validate the configuration document.
pub fn load_config(
    reader: Option<&mut dyn Read>,
) -> Result<Option<ClusterResourceOverrideConfig>, ConfigError> {
    let config = read_config(reader)?;
    if let Some(config) = &config {
        config.validate()?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML_CONFIG: &str = "
apiVersion: v1
kind: ClusterResourceOverrideConfig
limitCPUToMemoryPercent: 100
cpuRequestToLimitPercent: 10
memoryRequestToLimitPercent: 25
";

    const OUT_OF_BOUNDS_CONFIG: &str = "
apiVersion: v1
kind: ClusterResourceOverrideConfig
cpuRequestToLimitPercent: 200
";

    const NO_SETTINGS_CONFIG: &str = "
apiVersion: v1
kind: ClusterResourceOverrideConfig
";

    fn read(doc: &str) -> Result<Option<ClusterResourceOverrideConfig>, ConfigError> {
        let mut reader = doc.as_bytes();
        read_config(Some(&mut reader as &mut dyn Read))
    }

    #[test]
    fn test_read_no_config() {
        assert_eq!(read_config(None).unwrap(), None);
        assert_eq!(read("  \n").unwrap(), None);
    }

    #[test]
    fn test_read_yaml_config() {
        let config = read(YAML_CONFIG).unwrap().unwrap();
        assert_eq!(config, ClusterResourceOverrideConfig::new(100, 10, 25));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_read_without_type_meta() {
        let config = read("memoryRequestToLimitPercent: 60\n").unwrap().unwrap();
        assert_eq!(config, ClusterResourceOverrideConfig::new(0, 0, 60));
    }

    #[test]
    fn test_read_broken_config() {
        assert!(matches!(read("asdfasdfasdF"), Err(ConfigError::Decode(_))));
        assert!(matches!(
            read("cpuRequestToLimitPercent: lots\n"),
            Err(ConfigError::Decode(_))
        ));
    }

    #[test]
    fn test_read_wrong_kind() {
        let err = read("kind: LimitRange\ncpuRequestToLimitPercent: 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnexpectedKind(ref kind) if kind == "LimitRange"));
    }

    #[test]
    fn test_out_of_bounds_ratio_is_invalid() {
        let config = read(OUT_OF_BOUNDS_CONFIG).unwrap().unwrap();
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "ClusterResourceOverride.cpuRequestToLimitPercent");

        let mut reader = OUT_OF_BOUNDS_CONFIG.as_bytes();
        assert!(matches!(
            load_config(Some(&mut reader as &mut dyn Read)),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_no_settings_is_invalid() {
        let config = read(NO_SETTINGS_CONFIG).unwrap().unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no percentages were specified"));
    }

    #[test]
    fn test_validate_reports_every_violation() {
        let errors = validate_config(&ClusterResourceOverrideConfig::new(-1, 101, -5));
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "ClusterResourceOverride.limitCPUToMemoryPercent",
                "ClusterResourceOverride.cpuRequestToLimitPercent",
                "ClusterResourceOverride.memoryRequestToLimitPercent",
            ]
        );
    }

    #[test]
    fn test_limit_cpu_to_memory_above_100_is_valid() {
        assert!(ClusterResourceOverrideConfig::new(500, 10, 60).validate().is_ok());
        assert!(ClusterResourceOverrideConfig::new(0, 100, 0).validate().is_ok());
    }
}
