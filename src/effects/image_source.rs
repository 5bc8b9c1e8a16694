use shaderfx_core::{DEFAULT_DPI, GetImageFlags, Rect, Transform2D};

use crate::device::{DeviceContext, DeviceHandle, NativeImage, same_device};
use crate::error::{EffectError, Result};

/// Parameters of a single image resolution.
#[derive(Clone, Copy)]
pub struct ImageRequest<'a> {
    pub device: &'a DeviceHandle,
    pub context: Option<&'a dyn DeviceContext>,
    pub flags: GetImageFlags,
    pub target_dpi: f32,
}

impl<'a> ImageRequest<'a> {
    pub fn new(device: &'a DeviceHandle) -> Self {
        Self {
            device,
            context: None,
            flags: GetImageFlags::NONE,
            target_dpi: DEFAULT_DPI,
        }
    }

    pub fn with_context(mut self, context: &'a dyn DeviceContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_flags(mut self, flags: GetImageFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_target_dpi(mut self, target_dpi: f32) -> Self {
        self.target_dpi = target_dpi;
        self
    }
}

/// Result of resolving an image source.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// `None` when resolution failed softly under
    /// [`GetImageFlags::UNREALIZE_ON_FAILURE`].
    pub image: Option<NativeImage>,
    /// DPI the image was realized at, `0.0` when it has no fixed DPI.
    pub dpi: f32,
}

impl ResolvedImage {
    pub fn new(image: NativeImage, dpi: f32) -> Self {
        Self {
            image: Some(image),
            dpi,
        }
    }

    pub fn failed() -> Self {
        Self {
            image: None,
            dpi: 0.0,
        }
    }
}

/// Anything that can be used as an effect input.
pub trait ImageSource: Send + Sync {
    fn get_image(&self, request: &ImageRequest<'_>) -> Result<ResolvedImage>;
}

/// Local bounds of `source`'s output on `device`, resolved at the default DPI.
pub(crate) fn output_bounds(
    source: &dyn ImageSource,
    device: &DeviceHandle,
    transform: Option<&Transform2D>,
) -> Result<Rect> {
    let resolved = source.get_image(&ImageRequest::new(device))?;
    let image = resolved.image.ok_or(EffectError::RealizationFailed)?;
    let bounds = device.image_local_bounds(&image)?;

    Ok(match transform {
        Some(transform) => transform.transform_bounds(&bounds),
        None => bounds,
    })
}

/// A bare native image that was attached to an effect input behind the
/// engine's back, wrapped so it can be handed out as an [`ImageSource`].
pub struct NativeImageSource {
    image: NativeImage,
    device: DeviceHandle,
}

impl NativeImageSource {
    pub fn new(image: NativeImage, device: DeviceHandle) -> Self {
        Self { image, device }
    }

    pub fn image(&self) -> &NativeImage {
        &self.image
    }
}

impl ImageSource for NativeImageSource {
    fn get_image(&self, request: &ImageRequest<'_>) -> Result<ResolvedImage> {
        if !same_device(&self.device, request.device) {
            return Err(EffectError::DeviceMismatch);
        }

        Ok(ResolvedImage::new(self.image.clone(), 0.0))
    }
}
