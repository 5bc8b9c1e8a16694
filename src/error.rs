use thiserror::Error;

use crate::device::DeviceError;
use crate::effects::PropertyKey;
use crate::graph::NodeId;

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Cyclic effect graph: the effect is already being resolved")]
    CyclicGraph,

    #[error("Effect source #{index} is null")]
    NullSource { index: u32 },

    #[error("Effect source #{index} could not be resolved")]
    SourceUnavailable { index: u32 },

    #[error("The effect could not be realized")]
    RealizationFailed,

    #[error("Image source is associated with a different device")]
    DeviceMismatch,

    #[error("Index {index} is out of range for {count} entries")]
    IndexOutOfRange { index: u32, count: u32 },

    #[error("Constant buffer must be {expected} bytes, got {actual}")]
    ConstantBufferSize { expected: usize, actual: usize },

    #[error("Resource texture #{index} expects {expected} dimensions, got {actual}")]
    ResourceTextureDimensions {
        index: u32,
        expected: u32,
        actual: u32,
    },

    #[error("Property {0:?} is not supported by this effect")]
    UnsupportedProperty(PropertyKey),

    #[error("Reading the target DPI requires a device context")]
    MissingDeviceContext,

    #[error("Node {0} is already registered")]
    DuplicateNode(NodeId),

    #[error("Node {0} is not registered")]
    UnregisteredNode(NodeId),

    #[error("The effect graph was built without an output node")]
    MissingOutputNode,

    #[error("The effect has been disposed")]
    Disposed,

    #[error("Effect state lock was poisoned")]
    Poisoned,
}

impl EffectError {
    /// Whether the error may be absorbed by unrealizing, as requested by
    /// [`GetImageFlags::UNREALIZE_ON_FAILURE`](shaderfx_core::GetImageFlags::UNREALIZE_ON_FAILURE).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EffectError::Device(_)
                | EffectError::DeviceMismatch
                | EffectError::SourceUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EffectError>;
