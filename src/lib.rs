//! Lazily realized shader effect graphs.
//!
//! Effects are described and wired together without a device, then realized
//! into native effects the first time the graph is resolved for drawing.
//! Devices are pluggable through the traits in [`device`]; a Direct2D backend
//! is available on Windows behind the `d2d` feature.

pub mod device;
pub mod effects;
pub mod error;
pub mod graph;

#[cfg(all(windows, feature = "d2d"))]
pub mod d2d;

pub use device::{
    Device, DeviceContext, DeviceError, DeviceHandle, NativeEffect, NativeImage, same_device,
};
pub use effects::{
    Effect, EffectDescriptor, EffectInstance, EffectMetadata, EffectProperty, ImageRequest,
    ImageSource, NativeImageSource, PropertyKey, ResolvedImage, ResourceTextureDescription,
    ResourceTextureManager, ShaderEffect, TransformMapper,
};
pub use error::{EffectError, Result};
pub use graph::{
    CanvasEffect, CompositeEffect, EffectNode, GraphBuilder, GraphConfigurator, NodeId,
};
pub use shaderfx_core::{
    BufferPrecision, DEFAULT_DPI, EffectTypeId, GetImageFlags, InvalidationType, Rect,
    Transform2D,
};
