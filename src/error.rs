use crate::capability::OpName;
use crate::config::ConfigError;
use crate::engine::EngineError;

/// Raised for unsigned integer types the engine has no representation for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "the tensor engine does not support unsigned {bits} bit integer types{}",
    .hint.as_deref().map(|h| format!(". {h}")).unwrap_or_default()
)]
pub struct UnsupportedTypeError {
    pub bits: usize,
    pub hint: Option<String>,
}

impl UnsupportedTypeError {
    pub fn new(bits: usize) -> Self {
        Self { bits, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),
    #[error("{0} is not supported by the tensor engine")]
    OperationNotSupported(OpName),
    #[error("{0} is not yet supported by the tensor engine bridge")]
    OperationNotYetSupported(OpName),
    /// The engine disagrees with what the bridge expected; always a bridge bug.
    #[error("internal mismatch: {0}")]
    InternalMismatch(String),
    #[error("{op}: can't solve for a singular matrix")]
    SingularMatrix { op: OpName },
    #[error("{op}: {option} is not supported")]
    UnsupportedOption { op: OpName, option: String },
    #[error("{op}: {detail}")]
    InvalidArgument { op: String, detail: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BridgeError {
    pub fn is_internal(&self) -> bool {
        matches!(self, BridgeError::InternalMismatch(_))
    }

    pub(crate) fn invalid(op: OpName, detail: impl Into<String>) -> Self {
        BridgeError::InvalidArgument {
            op: op.to_string(),
            detail: detail.into(),
        }
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
