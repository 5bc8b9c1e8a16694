//! Contracts of the host graphics runtime.
//!
//! The engine never talks to a GPU API directly. A backend implements
//! [`Device`], [`DeviceContext`] and [`NativeEffect`] over its own objects and
//! hands out [`NativeImage`] handles; the engine only wires those together.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use shaderfx_core::{EffectTypeId, Rect};
use thiserror::Error;

use crate::effects::{EffectDescriptor, EffectProperty, PropertyKey};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Effect type {0} is not registered with the device")]
    UnregisteredEffect(EffectTypeId),

    #[error("Native effect does not support property {0:?}")]
    UnsupportedProperty(PropertyKey),

    #[error("Native property {0:?} holds a value of the wrong type")]
    PropertyTypeMismatch(PropertyKey),

    #[error("The device was lost")]
    DeviceLost,

    #[error("Native effect creation failed: {0}")]
    CreationFailed(String),

    #[error("Image belongs to a different backend")]
    ForeignImage,

    #[cfg(all(windows, feature = "d2d"))]
    #[error("Windows API error: {0}")]
    WindowsApi(#[from] windows_core::Error),
}

/// Shared handle to a device. Devices are compared by identity, never by value.
pub type DeviceHandle = Arc<dyn Device>;

/// Returns `true` when both handles refer to the same device object.
pub fn same_device(a: &DeviceHandle, b: &DeviceHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A device able to create native effects.
pub trait Device: Send + Sync {
    /// Creates a native effect of the given type, bound to this device.
    fn create_effect(
        &self,
        descriptor: &EffectDescriptor,
    ) -> Result<Arc<dyn NativeEffect>, DeviceError>;

    /// Bounds of `image` in its own coordinate space.
    fn image_local_bounds(&self, image: &NativeImage) -> Result<Rect, DeviceError>;
}

/// The drawing target an image is being resolved for.
pub trait DeviceContext: Send + Sync {
    fn dpi(&self) -> f32;

    /// `false` for DPI-independent targets such as command lists.
    fn has_fixed_target_surface(&self) -> bool;
}

/// A native effect object owned by a device.
pub trait NativeEffect: Send + Sync {
    fn set_input(&self, index: u32, image: Option<&NativeImage>);

    fn input(&self, index: u32) -> Option<NativeImage>;

    fn set_value(&self, property: EffectProperty) -> Result<(), DeviceError>;

    fn value(&self, key: PropertyKey) -> Result<EffectProperty, DeviceError>;

    /// The effect's output image. Repeated calls return the same image.
    fn output(&self) -> NativeImage;
}

/// Reference-counted handle to a backend image.
///
/// Two handles are equal when they refer to the same native object, which a
/// backend may express through an explicit identity (for example a COM
/// pointer) when it re-wraps the same object in a new handle.
#[derive(Clone)]
pub struct NativeImage {
    identity: usize,
    object: Arc<dyn Any + Send + Sync>,
}

impl NativeImage {
    pub fn new<T: Any + Send + Sync>(object: T) -> Self {
        let object: Arc<dyn Any + Send + Sync> = Arc::new(object);
        Self {
            identity: Arc::as_ptr(&object) as *const () as usize,
            object,
        }
    }

    pub fn with_identity<T: Any + Send + Sync>(identity: usize, object: T) -> Self {
        Self {
            identity,
            object: Arc::new(object),
        }
    }

    pub fn identity(&self) -> usize {
        self.identity
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref()
    }
}

impl PartialEq for NativeImage {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for NativeImage {}

impl fmt::Debug for NativeImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeImage({:#x})", self.identity)
    }
}
