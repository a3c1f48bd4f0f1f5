use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Cuda,
    Mps,
}

/// Device selector threaded through creation and transfer operations.
///
/// An index of `-1` means "the engine's default device of this kind".
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeviceSelector {
    pub kind: DeviceKind,
    pub index: i64,
}

impl DeviceSelector {
    pub const CPU: DeviceSelector = DeviceSelector {
        kind: DeviceKind::Cpu,
        index: -1,
    };

    pub fn new(kind: DeviceKind, index: i64) -> Self {
        Self { kind, index }
    }

    pub fn cuda(index: i64) -> Self {
        Self::new(DeviceKind::Cuda, index)
    }

    pub fn is_cpu(&self) -> bool {
        self.kind == DeviceKind::Cpu
    }
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::CPU
    }
}

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.index < 0 {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}:{}", self.kind, self.index)
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid device selector {0:?}, expected \"<kind>\" or \"<kind>:<index>\"")]
pub struct ParseDeviceError(String);

impl FromStr for DeviceSelector {
    type Err = ParseDeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDeviceError(s.to_string());
        let (kind, index) = match s.split_once(':') {
            Some((kind, index)) => (kind, index.parse::<i64>().map_err(|_| err())?),
            None => (s, -1),
        };
        let kind = DeviceKind::from_str(&kind.to_lowercase()).map_err(|_| err())?;
        Ok(Self { kind, index })
    }
}
