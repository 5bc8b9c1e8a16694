//! Direct2D backend.
//!
//! [`D2dDevice`] wraps an `ID2D1DeviceContext` and serves as both the
//! [`Device`] effects are realized on and the [`DeviceContext`] they are drawn
//! into. Shader effects must be registered with the device's
//! [`EffectRegistry`] before an effect graph referencing them is resolved.
//!
//! ```ignore
//! let device = Arc::new(D2dDevice::new(context.clone()));
//! device.register::<GrayscaleEffect>(&factory)?;
//!
//! let handle: DeviceHandle = device.clone();
//! let request = ImageRequest::new(&handle)
//!     .with_context(device.as_ref())
//!     .with_flags(GetImageFlags::READ_DPI_FROM_DEVICE_CONTEXT);
//! if let Some(image) = effect.get_image(&request)?.image {
//!     device.draw(&image);
//! }
//! ```

mod native;
mod registration;

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use shaderfx_core::Rect;
use windows::Win32::Graphics::Direct2D::Common::{D2D1_COMPOSITE_MODE_SOURCE_OVER, D2D_RECT_F};
use windows::Win32::Graphics::Direct2D::{
    CLSID_D2D1DpiCompensation, D2D1_INTERPOLATION_MODE_LINEAR, ID2D1Bitmap, ID2D1DeviceContext,
    ID2D1Factory1,
};
use windows_core::Interface;

pub use native::{D2dEffect, D2dImage};
pub use registration::{CONSTANT_BUFFER_PROPERTY, EffectFactory, EffectRegistry, SyncPropertyBinding};

use crate::device::{
    Device, DeviceContext, DeviceError, DeviceHandle, NativeEffect, NativeImage, same_device,
};
use crate::effects::{
    DPI_COMPENSATION_TYPE_ID, EffectDescriptor, ImageRequest, ImageSource, ResolvedImage,
    ShaderEffect,
};
use crate::error::{EffectError, Result};

/// A Direct2D device context acting as effect device and draw target.
pub struct D2dDevice {
    context: ID2D1DeviceContext,
    registry: Mutex<EffectRegistry>,
}

// SAFETY: The context must come from a factory created with
// D2D1_FACTORY_TYPE_MULTI_THREADED, which serializes calls internally.
unsafe impl Send for D2dDevice {}
unsafe impl Sync for D2dDevice {}

impl D2dDevice {
    pub fn new(context: ID2D1DeviceContext) -> Self {
        Self {
            context,
            registry: Mutex::new(EffectRegistry::new()),
        }
    }

    pub fn context(&self) -> &ID2D1DeviceContext {
        &self.context
    }

    pub fn register<E: ShaderEffect + EffectFactory>(
        &self,
        factory: &ID2D1Factory1,
    ) -> std::result::Result<(), DeviceError> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register::<E>(factory)?;
        Ok(())
    }

    /// Draws a resolved image at the origin of the current target.
    pub fn draw(&self, image: &NativeImage) {
        if let Some(image) = image.downcast_ref::<D2dImage>() {
            unsafe {
                self.context.DrawImage(
                    &image.0,
                    None,
                    None,
                    D2D1_INTERPOLATION_MODE_LINEAR,
                    D2D1_COMPOSITE_MODE_SOURCE_OVER,
                );
            }
        }
    }
}

impl Device for D2dDevice {
    fn create_effect(
        &self,
        descriptor: &EffectDescriptor,
    ) -> std::result::Result<Arc<dyn NativeEffect>, DeviceError> {
        let clsid = if descriptor.type_id == DPI_COMPENSATION_TYPE_ID {
            CLSID_D2D1DpiCompensation
        } else {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            if !registry.can_create(descriptor) {
                return Err(DeviceError::UnregisteredEffect(descriptor.type_id));
            }
            registration::guid(descriptor.type_id)
        };

        debug!("creating native effect {}", descriptor.name);
        let effect = unsafe { self.context.CreateEffect(&clsid)? };
        Ok(Arc::new(D2dEffect::new(effect)?))
    }

    fn image_local_bounds(&self, image: &NativeImage) -> std::result::Result<Rect, DeviceError> {
        let image = image
            .downcast_ref::<D2dImage>()
            .ok_or(DeviceError::ForeignImage)?;
        let bounds: D2D_RECT_F = unsafe { self.context.GetImageLocalBounds(&image.0)? };
        Ok(Rect::new(bounds.left, bounds.top, bounds.right, bounds.bottom))
    }
}

impl DeviceContext for D2dDevice {
    fn dpi(&self) -> f32 {
        let (mut dpi_x, mut dpi_y) = (0.0, 0.0);
        unsafe { self.context.GetDpi(&mut dpi_x, &mut dpi_y) };
        dpi_x
    }

    fn has_fixed_target_surface(&self) -> bool {
        unsafe { self.context.GetTarget() }
            .is_ok_and(|target| target.cast::<ID2D1Bitmap>().is_ok())
    }
}

/// A bitmap created on a [`D2dDevice`], usable as an effect input.
///
/// Bitmaps carry their own DPI, so effects may interpose DPI compensation in
/// front of them.
pub struct D2dBitmap {
    bitmap: ID2D1Bitmap,
    device: DeviceHandle,
}

// SAFETY: See D2dDevice.
unsafe impl Send for D2dBitmap {}
unsafe impl Sync for D2dBitmap {}

impl D2dBitmap {
    pub fn new(bitmap: ID2D1Bitmap, device: DeviceHandle) -> Self {
        Self { bitmap, device }
    }
}

impl ImageSource for D2dBitmap {
    fn get_image(&self, request: &ImageRequest<'_>) -> Result<ResolvedImage> {
        if !same_device(&self.device, request.device) {
            return Err(EffectError::DeviceMismatch);
        }

        let (mut dpi_x, mut dpi_y) = (0.0, 0.0);
        unsafe { self.bitmap.GetDpi(&mut dpi_x, &mut dpi_y) };
        let image = self.bitmap.cast().map_err(DeviceError::from)?;
        Ok(ResolvedImage::new(D2dImage::into_native(image), dpi_x))
    }
}
