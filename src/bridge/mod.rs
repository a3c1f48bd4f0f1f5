//! The dispatcher: translates host operations on [`LogicalTensor`]s into
//! sequences of engine calls and wraps the results.

mod batching;
mod convert;
mod creation;
mod elementwise;
mod indexing;
mod linalg;
pub mod options;
mod reduce;
mod shape;
pub mod type_map;
mod unsupported;

pub use options::*;

use crate::capability::{Capability, OpName};
use crate::config::BridgeConfig;
use crate::device::DeviceSelector;
use crate::engine::{NDArrayEngine, NativeRef, ScalarType, TensorEngine};
use crate::error::{BridgeError, Result};
use crate::tensor::{DeviceHandle, LogicalTensor, TensorData, TensorSpec};
use std::sync::Arc;

/// An engine reference the bridge is holding while composing an operation.
///
/// Owned references are released when the guard drops, so intermediates are
/// freed on every exit path. Only [`ScopedRef::into_raw`] lets one escape.
pub(crate) struct ScopedRef<'a> {
    engine: &'a dyn TensorEngine,
    native: NativeRef,
    owned: bool,
}

impl<'a> ScopedRef<'a> {
    fn owned(engine: &'a dyn TensorEngine, native: NativeRef) -> Self {
        Self {
            engine,
            native,
            owned: true,
        }
    }

    fn borrowed(engine: &'a dyn TensorEngine, native: NativeRef) -> Self {
        Self {
            engine,
            native,
            owned: false,
        }
    }

    pub(crate) fn get(&self) -> NativeRef {
        self.native
    }

    pub(crate) fn is_owned(&self) -> bool {
        self.owned
    }

    pub(crate) fn into_raw(mut self) -> NativeRef {
        self.owned = false;
        self.native
    }
}

impl Drop for ScopedRef<'_> {
    fn drop(&mut self) {
        if self.owned {
            if let Err(err) = self.engine.delete(self.native) {
                log::warn!("failed to release intermediate {:?}: {err}", self.native);
            }
        }
    }
}

pub(crate) fn dims(shape: &[u64]) -> Vec<i64> {
    shape.iter().map(|d| *d as i64).collect()
}

pub(crate) fn axes_i64(axes: &[usize]) -> Vec<i64> {
    axes.iter().map(|a| *a as i64).collect()
}

pub struct Bridge {
    engine: Arc<dyn TensorEngine>,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(engine: Arc<dyn TensorEngine>, config: BridgeConfig) -> Self {
        log::debug!("bridge targeting the {} engine", engine.name());
        Self { engine, config }
    }

    /// A bridge over the reference engine, seeded from the configuration.
    pub fn with_ndarray_engine(config: BridgeConfig) -> Self {
        let engine = match config.random_seed {
            Some(seed) => NDArrayEngine::with_seed(seed),
            None => NDArrayEngine::new(),
        };
        Self::new(Arc::new(engine), config)
    }

    pub fn engine(&self) -> &dyn TensorEngine {
        self.engine.as_ref()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn default_device(&self) -> DeviceSelector {
        self.config.default_device
    }

    /// Fails unless `op` is registered as implemented.
    pub fn gate(&self, op: OpName) -> Result<()> {
        match op.capability() {
            Capability::Implemented => {
                log::debug!("dispatching {op}");
                Ok(())
            }
            Capability::Unsupported => Err(BridgeError::OperationNotSupported(op)),
            Capability::NotYetSupported => Err(BridgeError::OperationNotYetSupported(op)),
        }
    }

    pub(crate) fn out_type(&self, out: &TensorSpec) -> Result<ScalarType> {
        Ok(type_map::to_scalar_type(out.dtype)?)
    }

    pub(crate) fn scoped(&self, native: NativeRef) -> ScopedRef<'_> {
        ScopedRef::owned(self.engine.as_ref(), native)
    }

    /// The engine reference behind `t`, uploading host data first.
    pub(crate) fn operand(&self, t: &LogicalTensor) -> Result<ScopedRef<'_>> {
        match t.data() {
            TensorData::Device(handle) => Ok(ScopedRef::borrowed(self.engine.as_ref(), handle.native)),
            TensorData::Host(bytes) => {
                let scalar_type = type_map::to_scalar_type(t.dtype())?;
                let native = self
                    .engine
                    .from_blob(bytes, &dims(t.shape()), scalar_type, self.config.default_device)?;
                Ok(self.scoped(native))
            }
        }
    }

    pub(crate) fn operand_as(&self, t: &LogicalTensor, scalar_type: ScalarType) -> Result<ScopedRef<'_>> {
        let x = self.operand(t)?;
        self.cast(x, scalar_type)
    }

    pub(crate) fn cast<'a>(&'a self, x: ScopedRef<'a>, scalar_type: ScalarType) -> Result<ScopedRef<'a>> {
        if self.engine.scalar_type(x.get())? == scalar_type {
            Ok(x)
        } else {
            Ok(self.scoped(self.engine.to_type(x.get(), scalar_type)?))
        }
    }

    pub(crate) fn reshape_ref(&self, x: &ScopedRef<'_>, shape: &[u64]) -> Result<ScopedRef<'_>> {
        Ok(self.scoped(self.engine.reshape(x.get(), &dims(shape))?))
    }

    pub(crate) fn device_of(&self, x: &ScopedRef<'_>) -> Result<DeviceSelector> {
        Ok(self.engine.device(x.get())?)
    }

    /// Casts `result` to the template's dtype and hands it to the host.
    pub(crate) fn finish(&self, out: &TensorSpec, result: ScopedRef<'_>) -> Result<LogicalTensor> {
        let target = self.out_type(out)?;
        let result = if !result.is_owned() || self.engine.scalar_type(result.get())? != target {
            self.scoped(self.engine.to_type(result.get(), target)?)
        } else {
            result
        };
        let handle = DeviceHandle {
            device: self.engine.device(result.get())?,
            native: result.get(),
        };
        let tensor = self.to_logical(handle, out)?;
        result.into_raw();
        Ok(tensor)
    }

    /// Like [`Bridge::finish`] for several results; nothing escapes on failure.
    pub(crate) fn finish_all(&self, results: Vec<(&TensorSpec, ScopedRef<'_>)>) -> Result<Vec<LogicalTensor>> {
        let mut done: Vec<LogicalTensor> = Vec::with_capacity(results.len());
        for (out, result) in results {
            match self.finish(out, result) {
                Ok(t) => done.push(t),
                Err(err) => {
                    for t in &done {
                        if let Err(e) = self.release(t) {
                            log::warn!("failed to release partial result: {e}");
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(done)
    }
}
