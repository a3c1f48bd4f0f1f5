//! Translates operations on host logical tensors into calls against an
//! external tensor engine.

pub mod bridge;
pub mod capability;
pub mod config;
pub mod device;
pub mod dtype;
pub mod engine;
pub mod error;
mod inspect;
pub mod tensor;

pub use bridge::Bridge;
pub use capability::{Capability, OpName};
pub use config::BridgeConfig;
pub use device::{DeviceKind, DeviceSelector};
pub use dtype::DType;
pub use engine::{NDArrayEngine, ScalarType, TensorEngine};
pub use error::{BridgeError, Result, UnsupportedTypeError};
pub use tensor::{Deallocation, DeviceHandle, LogicalTensor, Scalar, TensorData, TensorSpec};
