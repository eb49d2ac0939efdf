//! Executor configuration

use crate::error::{ConfigError, ConfigResult};
use quill_module::{Validator, DEFAULT_BASE_TYPE, DEFAULT_MAX_CODE_SIZE};
use quill_vm::VmConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Executor limits. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Deepest contract-to-contract nesting
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
    /// Largest accepted module, in bytes
    #[serde(default = "default_max_code_size")]
    pub max_code_size: usize,
    /// Values one frame's stack may hold
    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,
    /// Longest byte string a VM value may hold
    #[serde(default = "default_max_value_size")]
    pub max_value_size: usize,
    /// Type every contract must derive from
    #[serde(default = "default_base_contract_type")]
    pub base_contract_type: String,
    /// Record executor metrics
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_max_call_depth() -> usize {
    8
}

fn default_max_code_size() -> usize {
    DEFAULT_MAX_CODE_SIZE
}

fn default_max_stack_depth() -> usize {
    1024
}

fn default_max_value_size() -> usize {
    VmConfig::default().max_value_size
}

fn default_base_contract_type() -> String {
    DEFAULT_BASE_TYPE.to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_call_depth: default_max_call_depth(),
            max_code_size: default_max_code_size(),
            max_stack_depth: default_max_stack_depth(),
            max_value_size: default_max_value_size(),
            base_contract_type: default_base_contract_type(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ExecutorConfig {
    /// Parse and validate JSON
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject limits that would make every transaction fail
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_call_depth == 0 {
            return Err(ConfigError::Invalid("max_call_depth must be at least 1".into()));
        }
        if self.max_code_size == 0 {
            return Err(ConfigError::Invalid("max_code_size must be at least 1".into()));
        }
        if self.max_stack_depth == 0 {
            return Err(ConfigError::Invalid("max_stack_depth must be at least 1".into()));
        }
        if self.max_value_size < 32 {
            return Err(ConfigError::Invalid("max_value_size must be at least 32".into()));
        }
        if self.base_contract_type.is_empty() {
            return Err(ConfigError::Invalid("base_contract_type must not be empty".into()));
        }
        Ok(())
    }

    /// VM limits
    pub fn vm_config(&self) -> VmConfig {
        VmConfig {
            max_call_depth: self.max_call_depth,
            max_stack_depth: self.max_stack_depth,
            max_value_size: self.max_value_size,
        }
    }

    /// Validator for this configuration
    pub fn validator(&self) -> Validator {
        Validator::new(&self.base_contract_type, self.max_code_size)
    }
}
