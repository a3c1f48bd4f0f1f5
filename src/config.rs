use crate::device::{DeviceSelector, ParseDeviceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_CHECK_SHAPE_AND_TYPE: &str = "TENSOR_BRIDGE_CHECK_SHAPE_AND_TYPE";
pub const ENV_DEFAULT_DEVICE: &str = "TENSOR_BRIDGE_DEFAULT_DEVICE";
pub const ENV_INSPECT_LIMIT: &str = "TENSOR_BRIDGE_INSPECT_LIMIT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {var}: {reason}")]
    Env { var: String, value: String, reason: String },
    #[error(transparent)]
    Device(#[from] ParseDeviceError),
}

/// Per-instance bridge behaviour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Introspect every produced handle and compare it with the expected spec.
    pub check_shape_and_type: bool,
    /// Prefix inspection output with the engine and device.
    pub add_backend_on_inspect: bool,
    pub inspect_limit: usize,
    pub default_device: DeviceSelector,
    /// Matrices whose determinant magnitude is at or below this are singular.
    pub singularity_epsilon: f64,
    pub random_seed: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            check_shape_and_type: false,
            add_backend_on_inspect: true,
            inspect_limit: 50,
            default_device: DeviceSelector::CPU,
            singularity_epsilon: 1e-10,
            random_seed: None,
        }
    }
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var: var.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Applies `TENSOR_BRIDGE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_CHECK_SHAPE_AND_TYPE) {
            self.check_shape_and_type = parse_bool(ENV_CHECK_SHAPE_AND_TYPE, &value)?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_DEVICE) {
            self.default_device = value.parse()?;
        }
        if let Some(value) = lookup(ENV_INSPECT_LIMIT) {
            self.inspect_limit = value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
                var: ENV_INSPECT_LIMIT.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        log::debug!("bridge configuration: {self:?}");
        Ok(self)
    }
}
