//! Trait and descriptor definitions for user-authored shader effects.

use std::fmt;
use std::sync::Arc;

use shaderfx_core::{BufferPrecision, EffectTypeId};

/// Identity of the built-in DPI compensation effect.
pub const DPI_COMPENSATION_TYPE_ID: EffectTypeId =
    EffectTypeId::from_u128(0x6c26c5c7_34e0_46fc_9cfd_e5823706e215);

/// Metadata describing a shader effect type.
#[derive(Debug, Clone)]
pub struct EffectMetadata {
    /// Human-readable name of the effect
    pub name: &'static str,
    /// Author of the effect
    pub author: &'static str,
    /// Category for organization (e.g., "Color", "Blur", "Distortion")
    pub category: &'static str,
    /// Description of what the effect does
    pub description: &'static str,
    /// Compiled pixel shader bytecode
    pub shader_bytecode: &'static [u8],
    /// Size in bytes of the constant buffer the shader reads its parameters from
    pub constant_buffer_size: usize,
    /// Resource textures the shader samples besides its inputs
    pub resource_textures: &'static [ResourceTextureDescription],
}

/// Declares one resource texture slot of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTextureDescription {
    pub index: u32,
    /// 1, 2 or 3
    pub dimensions: u32,
}

/// Runtime description of an effect type, used to create native effects.
#[derive(Debug, Clone, Copy)]
pub struct EffectDescriptor {
    pub type_id: EffectTypeId,
    pub name: &'static str,
    pub input_count: u32,
    pub constant_buffer_size: usize,
    pub resource_textures: &'static [ResourceTextureDescription],
    pub shader_bytecode: &'static [u8],
    /// Built-in effects are provided by the backend and need no registration.
    pub builtin: bool,
}

impl EffectDescriptor {
    pub fn of<E: ShaderEffect>() -> Self {
        let metadata = E::metadata();
        Self {
            type_id: E::TYPE_ID,
            name: metadata.name,
            input_count: E::INPUT_COUNT,
            constant_buffer_size: metadata.constant_buffer_size,
            resource_textures: metadata.resource_textures,
            shader_bytecode: metadata.shader_bytecode,
            builtin: false,
        }
    }

    /// The interposed node scaling an input from its own DPI to the target DPI.
    pub const fn dpi_compensation() -> Self {
        Self {
            type_id: DPI_COMPENSATION_TYPE_ID,
            name: "DpiCompensation",
            input_count: 1,
            constant_buffer_size: 0,
            resource_textures: &[],
            shader_bytecode: &[],
            builtin: true,
        }
    }

    pub fn resource_texture(&self, index: u32) -> Option<&ResourceTextureDescription> {
        self.resource_textures.iter().find(|r| r.index == index)
    }
}

/// Trait for defining custom shader effects.
///
/// # Example
///
/// ```ignore
/// pub struct SepiaEffect {
///     pub intensity: f32,
/// }
///
/// impl ShaderEffect for SepiaEffect {
///     const TYPE_ID: EffectTypeId = EffectTypeId::from_u128(0x12345678_1234_1234_1234_123456789abc);
///     const INPUT_COUNT: u32 = 1;
///
///     fn metadata() -> EffectMetadata {
///         EffectMetadata {
///             name: "SepiaEffect",
///             author: "shaderfx",
///             category: "Color",
///             description: "Applies sepia tone to an image",
///             shader_bytecode: include_bytes!("shaders/sepia.cso"),
///             constant_buffer_size: 4,
///             resource_textures: &[],
///         }
///     }
///
///     fn constant_buffer(&self) -> Vec<u8> {
///         self.intensity.to_le_bytes().to_vec()
///     }
/// }
/// ```
pub trait ShaderEffect: Send + Sync + 'static {
    /// Unique identifier for this effect type.
    const TYPE_ID: EffectTypeId;

    /// Number of input images this effect accepts.
    const INPUT_COUNT: u32 = 1;

    /// Returns metadata describing this effect type.
    fn metadata() -> EffectMetadata
    where
        Self: Sized;

    /// Packs the current parameters into the shader's constant buffer layout.
    ///
    /// The returned buffer must be exactly `metadata().constant_buffer_size`
    /// bytes long.
    fn constant_buffer(&self) -> Vec<u8>;
}

/// Coordinate mapping supplied by an effect author.
///
/// The engine only carries the mapper between the property cache and the
/// native effect; the device backend is what invokes it.
pub trait TransformMapper: Send + Sync + fmt::Debug {}

/// An external texture resource sampled by an effect.
pub trait ResourceTextureManager: Send + Sync + fmt::Debug {
    /// Number of dimensions of the managed texture (1, 2 or 3).
    fn dimensions(&self) -> u32;
}

/// A property value that can be passed to a native effect.
#[derive(Debug, Clone)]
pub enum EffectProperty {
    /// Single floating-point value
    Float { index: u32, value: f32 },
    /// Two-component float vector
    Float2 { index: u32, value: [f32; 2] },
    /// Three-component float vector
    Float3 { index: u32, value: [f32; 3] },
    /// Four-component float vector (e.g., color)
    Float4 { index: u32, value: [f32; 4] },
    /// Integer value
    Int { index: u32, value: i32 },
    /// Boolean value
    Bool { index: u32, value: bool },
    /// Unsigned integer value
    UInt { index: u32, value: u32 },
    /// Raw constant buffer of a shader effect
    ConstantBuffer(Vec<u8>),
    TransformMapper(Option<Arc<dyn TransformMapper>>),
    ResourceTextureManager {
        index: u32,
        manager: Option<Arc<dyn ResourceTextureManager>>,
    },
    /// Whether the native runtime caches the effect's output
    Cached(bool),
    Precision(Option<BufferPrecision>),
}

impl EffectProperty {
    pub fn key(&self) -> PropertyKey {
        match self {
            EffectProperty::Float { index, .. }
            | EffectProperty::Float2 { index, .. }
            | EffectProperty::Float3 { index, .. }
            | EffectProperty::Float4 { index, .. }
            | EffectProperty::Int { index, .. }
            | EffectProperty::Bool { index, .. }
            | EffectProperty::UInt { index, .. } => PropertyKey::Index(*index),
            EffectProperty::ConstantBuffer(_) => PropertyKey::ConstantBuffer,
            EffectProperty::TransformMapper(_) => PropertyKey::TransformMapper,
            EffectProperty::ResourceTextureManager { index, .. } => {
                PropertyKey::ResourceTextureManager(*index)
            }
            EffectProperty::Cached(_) => PropertyKey::Cached,
            EffectProperty::Precision(_) => PropertyKey::Precision,
        }
    }
}

/// Addresses one property of a native effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Effect-specific property by index
    Index(u32),
    ConstantBuffer,
    TransformMapper,
    ResourceTextureManager(u32),
    Cached,
    Precision,
}
