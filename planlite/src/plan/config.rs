// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Optimizer configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::optimizer::{OptimizationLevel, OptimizerError, OptimizerResult};

/// Environment variable overriding the configured optimization level
pub const OPTIMIZATION_LEVEL_ENV: &str = "PLANLITE_OPTIMIZATION_LEVEL";

/// Which pushdown rules the optimizer pipeline runs. A rule runs only when
/// both the level and its own flag allow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub optimization_level: OptimizationLevel,
    pub filter_pushdown: bool,
    pub subquery_alias_pushdown: bool,
    pub index_pushdown: bool,
    pub projection_pushdown: bool,
    /// Record a per-rule trace on the optimizer result
    pub trace: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimization_level: OptimizationLevel::default(),
            filter_pushdown: true,
            subquery_alias_pushdown: true,
            index_pushdown: true,
            projection_pushdown: true,
            trace: false,
        }
    }
}

impl OptimizerConfig {
    pub fn with_level(level: OptimizationLevel) -> Self {
        Self {
            optimization_level: level,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> OptimizerResult<Self> {
        serde_json::from_str(json).map_err(|e| OptimizerError::InvalidConfig(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> OptimizerResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            OptimizerError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Apply `PLANLITE_OPTIMIZATION_LEVEL` when it is set
    pub fn with_env_overrides(mut self) -> OptimizerResult<Self> {
        if let Ok(level) = std::env::var(OPTIMIZATION_LEVEL_ENV) {
            self.optimization_level = level.parse()?;
        }
        Ok(self)
    }

    pub fn filter_pushdown_enabled(&self) -> bool {
        self.filter_pushdown && self.optimization_level.allows_filter_pushdown()
    }

    pub fn subquery_alias_pushdown_enabled(&self) -> bool {
        self.subquery_alias_pushdown && self.optimization_level.allows_filter_pushdown()
    }

    pub fn index_pushdown_enabled(&self) -> bool {
        self.index_pushdown && self.optimization_level.allows_index_pushdown()
    }

    pub fn projection_pushdown_enabled(&self) -> bool {
        self.projection_pushdown && self.optimization_level.allows_projection_pushdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_every_rule() {
        let config = OptimizerConfig::default();
        assert_eq!(config.optimization_level, OptimizationLevel::Advanced);
        assert!(config.filter_pushdown_enabled());
        assert!(config.index_pushdown_enabled());
        assert!(config.projection_pushdown_enabled());
        assert!(!config.trace);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            OptimizerConfig::from_json_str(r#"{"optimization_level": "basic", "trace": true}"#)
                .unwrap();
        assert_eq!(config.optimization_level, OptimizationLevel::Basic);
        assert!(config.trace);
        assert!(config.filter_pushdown_enabled());
        assert!(!config.index_pushdown_enabled());
    }

    #[test]
    fn test_rule_flag_disables_rule() {
        let config = OptimizerConfig {
            projection_pushdown: false,
            ..OptimizerConfig::default()
        };
        assert!(!config.projection_pushdown_enabled());
        assert!(config.index_pushdown_enabled());
    }

    #[test]
    fn test_malformed_json_is_invalid_config() {
        let err = OptimizerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidConfig(_)));
    }
}
