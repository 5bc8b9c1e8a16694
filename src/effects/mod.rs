//! Shader effects realized lazily into native effects.
//!
//! This module provides the realization engine: an [`Effect`] holds its
//! properties and sources on its own until it is first resolved against a
//! device, then mirrors them into a native effect which it reuses for as long
//! as the device stays the same.
//!
//! # Overview
//!
//! To create a custom effect:
//!
//! 1. Compile an HLSL pixel shader to bytecode
//! 2. Define a struct implementing [`ShaderEffect`]
//! 3. Create instances with [`EffectInstance::new`]
//! 4. Resolve the root of the graph with [`ImageSource::get_image`] when drawing
//!
//! # Example
//!
//! ```ignore
//! pub struct GrayscaleEffect {
//!     pub intensity: f32,
//! }
//!
//! impl ShaderEffect for GrayscaleEffect {
//!     const TYPE_ID: EffectTypeId = EffectTypeId::from_u128(0x...);
//!     const INPUT_COUNT: u32 = 1;
//!
//!     fn metadata() -> EffectMetadata {
//!         EffectMetadata {
//!             name: "GrayscaleEffect",
//!             author: "shaderfx",
//!             category: "Color",
//!             description: "Converts image to grayscale",
//!             shader_bytecode: include_bytes!("grayscale.cso"),
//!             constant_buffer_size: 4,
//!             resource_textures: &[],
//!         }
//!     }
//!
//!     fn constant_buffer(&self) -> Vec<u8> {
//!         self.intensity.to_le_bytes().to_vec()
//!     }
//! }
//!
//! let grayscale = EffectInstance::<GrayscaleEffect>::with_parameters(&GrayscaleEffect { intensity: 1.0 })?;
//! grayscale.set_input(bitmap)?;
//!
//! let request = ImageRequest::new(&device)
//!     .with_context(&context)
//!     .with_flags(GetImageFlags::READ_DPI_FROM_DEVICE_CONTEXT);
//! let output = grayscale.get_image(&request)?;
//! ```

mod effect;
mod image_source;
mod instance;
mod properties;
mod sources;
mod traits;

pub use effect::Effect;
pub(crate) use image_source::output_bounds;
pub use image_source::{ImageRequest, ImageSource, NativeImageSource, ResolvedImage};
pub use instance::EffectInstance;
pub use traits::{
    DPI_COMPENSATION_TYPE_ID, EffectDescriptor, EffectMetadata, EffectProperty, PropertyKey,
    ResourceTextureDescription, ResourceTextureManager, ShaderEffect, TransformMapper,
};
