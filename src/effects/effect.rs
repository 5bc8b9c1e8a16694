//! Realization of shader effects into native effects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, warn};
use shaderfx_core::{BufferPrecision, GetImageFlags, Rect, Transform2D};

use super::properties::PropertyCache;
use super::sources::{InputUpdate, SourceTable};
use super::{
    EffectDescriptor, EffectProperty, ImageRequest, ImageSource, PropertyKey, ResolvedImage,
    ResourceTextureManager, ShaderEffect, TransformMapper, output_bounds,
};
use crate::device::{DeviceError, DeviceHandle, NativeEffect, same_device};
use crate::error::{EffectError, Result};

/// A shader effect that realizes itself into a native effect on demand.
///
/// The effect keeps its properties and sources while it has no native
/// counterpart, creates one the first time it is resolved against a device,
/// and moves its state back out when the device changes or it is torn down.
///
/// Resolution recurses into the effect's sources. Re-entering an effect that
/// is already being resolved fails with [`EffectError::CyclicGraph`].
pub struct Effect {
    descriptor: EffectDescriptor,
    resolving: AtomicBool,
    state: Mutex<EffectState>,
}

struct EffectState {
    realization: Realization,
    sources: SourceTable,
    disposed: bool,
}

/// Whichever side currently owns the effect's properties.
enum Realization {
    Unrealized(PropertyCache),
    Realized(RealizedEffect),
}

struct RealizedEffect {
    device: DeviceHandle,
    native: Arc<dyn NativeEffect>,
}

impl Realization {
    fn property(&self, key: PropertyKey) -> Result<EffectProperty> {
        match self {
            Realization::Unrealized(cache) => cache.get(key),
            Realization::Realized(realized) => Ok(realized.native.value(key)?),
        }
    }

    fn set_property(&mut self, property: EffectProperty) -> Result<()> {
        match self {
            Realization::Unrealized(cache) => cache.set(property),
            Realization::Realized(realized) => Ok(realized.native.set_value(property)?),
        }
    }
}

/// Clears the resolution flag on every exit path.
struct ResolveGuard<'a>(&'a AtomicBool);

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Effect {
    pub fn new(descriptor: EffectDescriptor) -> Self {
        Self {
            resolving: AtomicBool::new(false),
            state: Mutex::new(EffectState {
                realization: Realization::Unrealized(PropertyCache::new(&descriptor)),
                sources: SourceTable::new(descriptor.input_count),
                disposed: false,
            }),
            descriptor,
        }
    }

    pub fn of<E: ShaderEffect>() -> Self {
        Self::new(EffectDescriptor::of::<E>())
    }

    pub fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    pub fn source_count(&self) -> u32 {
        self.descriptor.input_count
    }

    fn enter(&self) -> Result<ResolveGuard<'_>> {
        if self.resolving.swap(true, Ordering::Acquire) {
            return Err(EffectError::CyclicGraph);
        }
        Ok(ResolveGuard(&self.resolving))
    }

    fn lock(&self) -> Result<MutexGuard<'_, EffectState>> {
        let state = self.state.lock().map_err(|_| EffectError::Poisoned)?;
        if state.disposed {
            return Err(EffectError::Disposed);
        }
        Ok(state)
    }

    pub fn is_realized(&self) -> bool {
        self.state
            .lock()
            .is_ok_and(|state| matches!(state.realization, Realization::Realized(_)))
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().map_or(true, |state| state.disposed)
    }

    /// The device the effect is currently realized on.
    pub fn realized_device(&self) -> Option<DeviceHandle> {
        let state = self.state.lock().ok()?;
        match &state.realization {
            Realization::Realized(realized) => Some(realized.device.clone()),
            Realization::Unrealized(_) => None,
        }
    }

    /// The native effect backing this effect, if realized.
    pub fn native_effect(&self) -> Option<Arc<dyn NativeEffect>> {
        let state = self.state.lock().ok()?;
        match &state.realization {
            Realization::Realized(realized) => Some(realized.native.clone()),
            Realization::Unrealized(_) => None,
        }
    }

    /// Bounds of the effect's output on `device`, optionally transformed.
    pub fn get_bounds(&self, device: &DeviceHandle, transform: Option<&Transform2D>) -> Result<Rect> {
        output_bounds(self, device, transform)
    }

    /// The source attached to input `index`.
    ///
    /// While realized, the input is read from the native effect, so an image
    /// attached natively by someone else is reported as a
    /// [`NativeImageSource`](super::NativeImageSource).
    pub fn source(&self, index: u32) -> Result<Option<Arc<dyn ImageSource>>> {
        let mut state = self.lock()?;
        let state = &mut *state;

        match &state.realization {
            Realization::Realized(realized) => {
                state
                    .sources
                    .pull_back(index, realized.native.as_ref(), &realized.device)
            }
            Realization::Unrealized(_) => state.sources.cached_source(index),
        }
    }

    /// Attaches `source` to input `index`.
    ///
    /// On a realized effect the source is resolved immediately. If that fails
    /// recoverably the effect unrealizes, keeping the new source, and realizes
    /// again on the next draw.
    pub fn set_source(&self, index: u32, source: Option<Arc<dyn ImageSource>>) -> Result<()> {
        let _guard = self.enter()?;
        let mut state = self.lock()?;
        let state = &mut *state;

        let Realization::Realized(realized) = &state.realization else {
            return state.sources.store(index, source);
        };
        let native = realized.native.clone();
        let device = realized.device.clone();

        let previous = state.sources.cached_source(index)?;
        state.sources.store(index, source)?;

        let request = ImageRequest::new(&device)
            .with_flags(
                GetImageFlags::MINIMAL_REALIZATION
                    | GetImageFlags::ALLOW_NULL_EFFECT_INPUTS
                    | GetImageFlags::UNREALIZE_ON_FAILURE,
            )
            .with_target_dpi(0.0);

        match state.sources.update_input(index, native.as_ref(), &request) {
            Ok(InputUpdate::Failed) => {
                state.unrealize(&self.descriptor, Some(index));
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if e.is_recoverable() => {
                warn!(
                    "{}: source #{index} could not be attached, unrealizing: {e}",
                    self.descriptor.name
                );
                state.unrealize(&self.descriptor, Some(index));
                Ok(())
            }
            Err(e) => {
                state.sources.store(index, previous)?;
                Err(e)
            }
        }
    }

    /// Whether a DPI compensation node currently sits in front of input `index`.
    pub fn has_dpi_compensation(&self, index: u32) -> bool {
        self.lock()
            .is_ok_and(|state| state.sources.has_compensation(index))
    }

    fn property(&self, key: PropertyKey) -> Result<EffectProperty> {
        self.lock()?.realization.property(key)
    }

    fn set_property(&self, property: EffectProperty) -> Result<()> {
        self.lock()?.realization.set_property(property)
    }

    pub fn constant_buffer(&self) -> Result<Vec<u8>> {
        match self.property(PropertyKey::ConstantBuffer)? {
            EffectProperty::ConstantBuffer(bytes) => Ok(bytes),
            _ => Err(DeviceError::PropertyTypeMismatch(PropertyKey::ConstantBuffer).into()),
        }
    }

    pub fn set_constant_buffer(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.descriptor.constant_buffer_size {
            return Err(EffectError::ConstantBufferSize {
                expected: self.descriptor.constant_buffer_size,
                actual: bytes.len(),
            });
        }
        self.set_property(EffectProperty::ConstantBuffer(bytes.to_vec()))
    }

    pub fn transform_mapper(&self) -> Result<Option<Arc<dyn TransformMapper>>> {
        match self.property(PropertyKey::TransformMapper)? {
            EffectProperty::TransformMapper(mapper) => Ok(mapper),
            _ => Err(DeviceError::PropertyTypeMismatch(PropertyKey::TransformMapper).into()),
        }
    }

    /// Once set, a mapper can only be replaced by another one.
    pub fn set_transform_mapper(&self, mapper: Arc<dyn TransformMapper>) -> Result<()> {
        self.set_property(EffectProperty::TransformMapper(Some(mapper)))
    }

    pub fn is_cached(&self) -> Result<bool> {
        match self.property(PropertyKey::Cached)? {
            EffectProperty::Cached(cached) => Ok(cached),
            _ => Err(DeviceError::PropertyTypeMismatch(PropertyKey::Cached).into()),
        }
    }

    pub fn set_cached(&self, cached: bool) -> Result<()> {
        self.set_property(EffectProperty::Cached(cached))
    }

    pub fn precision(&self) -> Result<Option<BufferPrecision>> {
        match self.property(PropertyKey::Precision)? {
            EffectProperty::Precision(precision) => Ok(precision),
            _ => Err(DeviceError::PropertyTypeMismatch(PropertyKey::Precision).into()),
        }
    }

    pub fn set_precision(&self, precision: Option<BufferPrecision>) -> Result<()> {
        self.set_property(EffectProperty::Precision(precision))
    }

    pub fn resource_texture_manager(
        &self,
        index: u32,
    ) -> Result<Option<Arc<dyn ResourceTextureManager>>> {
        let key = PropertyKey::ResourceTextureManager(index);
        if self.descriptor.resource_texture(index).is_none() {
            return Err(EffectError::UnsupportedProperty(key));
        }

        match self.property(key)? {
            EffectProperty::ResourceTextureManager { manager, .. } => Ok(manager),
            _ => Err(DeviceError::PropertyTypeMismatch(key).into()),
        }
    }

    pub fn set_resource_texture_manager(
        &self,
        index: u32,
        manager: Arc<dyn ResourceTextureManager>,
    ) -> Result<()> {
        let description = self
            .descriptor
            .resource_texture(index)
            .ok_or(EffectError::UnsupportedProperty(
                PropertyKey::ResourceTextureManager(index),
            ))?;

        if manager.dimensions() != description.dimensions {
            return Err(EffectError::ResourceTextureDimensions {
                index,
                expected: description.dimensions,
                actual: manager.dimensions(),
            });
        }

        self.set_property(EffectProperty::ResourceTextureManager {
            index,
            manager: Some(manager),
        })
    }

    /// Releases the native effect, moving its state back into the effect.
    pub fn unrealize(&self) -> Result<()> {
        self.lock()?.unrealize(&self.descriptor, None);
        Ok(())
    }

    /// Releases the native effect and every source. Later calls fail with
    /// [`EffectError::Disposed`].
    pub fn dispose(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.disposed {
            return;
        }

        state.unrealize(&self.descriptor, None);
        state.realization = Realization::Unrealized(PropertyCache::new(&self.descriptor));
        state.sources.clear();
        state.disposed = true;
    }
}

impl ImageSource for Effect {
    fn get_image(&self, request: &ImageRequest<'_>) -> Result<ResolvedImage> {
        let _guard = self.enter()?;
        let mut state = self.lock()?;

        match state.resolve(&self.descriptor, request) {
            Err(e)
                if e.is_recoverable()
                    && request.flags.contains(GetImageFlags::UNREALIZE_ON_FAILURE) =>
            {
                warn!("{}: unrealizing after failed resolution: {e}", self.descriptor.name);
                state.unrealize(&self.descriptor, None);
                Ok(ResolvedImage::failed())
            }
            result => result,
        }
    }
}

impl EffectState {
    fn resolve(
        &mut self,
        descriptor: &EffectDescriptor,
        request: &ImageRequest<'_>,
    ) -> Result<ResolvedImage> {
        let mut request = *request;

        if request
            .flags
            .contains(GetImageFlags::READ_DPI_FROM_DEVICE_CONTEXT)
        {
            let context = request.context.ok_or(EffectError::MissingDeviceContext)?;
            if context.has_fixed_target_surface() {
                request.target_dpi = context.dpi();
            } else {
                request
                    .flags
                    .insert(GetImageFlags::ALWAYS_INSERT_DPI_COMPENSATION);
            }
            request
                .flags
                .remove(GetImageFlags::READ_DPI_FROM_DEVICE_CONTEXT);
        }

        if let Realization::Realized(realized) = &self.realization {
            if !same_device(&realized.device, request.device) {
                debug!("{}: device changed, rebinding", descriptor.name);
                self.unrealize(descriptor, None);
            }
        }

        let native = match &self.realization {
            Realization::Unrealized(_) => self.realize(descriptor, &request)?,
            Realization::Realized(realized) => {
                let native = realized.native.clone();
                if !request.flags.contains(GetImageFlags::MINIMAL_REALIZATION) {
                    for index in 0..self.sources.len() {
                        if self.sources.update_input(index, native.as_ref(), &request)?
                            == InputUpdate::Failed
                        {
                            return Err(EffectError::SourceUnavailable { index });
                        }
                    }
                }
                native
            }
        };

        Ok(ResolvedImage::new(native.output(), 0.0))
    }

    fn realize(
        &mut self,
        descriptor: &EffectDescriptor,
        request: &ImageRequest<'_>,
    ) -> Result<Arc<dyn NativeEffect>> {
        let Realization::Unrealized(cache) = &self.realization else {
            return Err(EffectError::RealizationFailed);
        };

        debug!("{}: realizing", descriptor.name);
        let native = request.device.create_effect(descriptor)?;

        if let Err(e) = attach(cache, &mut self.sources, native.as_ref(), request) {
            self.sources.release_all();
            return Err(e);
        }

        self.realization = Realization::Realized(RealizedEffect {
            device: request.device.clone(),
            native: native.clone(),
        });
        Ok(native)
    }

    /// Moves the native state back into a cache. Input `skip` is released
    /// without being read back, for a caller that has just replaced it.
    ///
    /// The native effect is always released. Properties that cannot be read
    /// back, for instance from a lost device, fall back to their defaults.
    fn unrealize(&mut self, descriptor: &EffectDescriptor, skip: Option<u32>) {
        let Realization::Realized(realized) = &self.realization else {
            return;
        };

        debug!("{}: unrealizing", descriptor.name);
        let (cache, failure) = PropertyCache::read_back(descriptor, realized.native.as_ref());
        if let Some(e) = failure {
            error!(
                "{}: could not read back native properties, using defaults: {e}",
                descriptor.name
            );
        }

        for index in 0..self.sources.len() {
            if Some(index) != skip {
                if let Err(e) =
                    self.sources
                        .pull_back(index, realized.native.as_ref(), &realized.device)
                {
                    error!("{}: could not read back input #{index}: {e}", descriptor.name);
                }
            }
            self.sources.release(index);
        }

        self.realization = Realization::Unrealized(cache);
    }
}

/// Pushes cached properties and resolved inputs into a new native effect.
fn attach(
    cache: &PropertyCache,
    sources: &mut SourceTable,
    native: &dyn NativeEffect,
    request: &ImageRequest<'_>,
) -> Result<()> {
    cache.apply_properties(native)?;

    for index in 0..sources.len() {
        if sources.update_input(index, native, request)? == InputUpdate::Failed {
            return Err(EffectError::SourceUnavailable { index });
        }
    }

    cache.apply_resource_textures(native)
}
