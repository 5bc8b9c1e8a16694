//! Property storage of an unrealized effect.
//!
//! While an effect has no native object, its properties live in a
//! [`PropertyCache`]. Realizing pushes the cache into the new native object;
//! unrealizing reads the native values back into a fresh cache.

use std::sync::Arc;

use log::trace;
use shaderfx_core::BufferPrecision;

use super::{
    EffectDescriptor, EffectProperty, PropertyKey, ResourceTextureManager, TransformMapper,
};
use crate::device::{DeviceError, NativeEffect};
use crate::error::{EffectError, Result};

#[derive(Debug, Clone)]
pub(crate) struct PropertyCache {
    constant_buffer: Vec<u8>,
    transform_mapper: Option<Arc<dyn TransformMapper>>,
    /// One entry per declared resource texture, in declaration order.
    resource_texture_managers: Vec<(u32, Option<Arc<dyn ResourceTextureManager>>)>,
    cached: bool,
    precision: Option<BufferPrecision>,
}

impl PropertyCache {
    pub fn new(descriptor: &EffectDescriptor) -> Self {
        Self {
            constant_buffer: vec![0; descriptor.constant_buffer_size],
            transform_mapper: None,
            resource_texture_managers: descriptor
                .resource_textures
                .iter()
                .map(|r| (r.index, None))
                .collect(),
            cached: false,
            precision: None,
        }
    }

    pub fn get(&self, key: PropertyKey) -> Result<EffectProperty> {
        match key {
            PropertyKey::ConstantBuffer => {
                Ok(EffectProperty::ConstantBuffer(self.constant_buffer.clone()))
            }
            PropertyKey::TransformMapper => {
                Ok(EffectProperty::TransformMapper(self.transform_mapper.clone()))
            }
            PropertyKey::ResourceTextureManager(index) => self
                .resource_texture_managers
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(index, manager)| EffectProperty::ResourceTextureManager {
                    index: *index,
                    manager: manager.clone(),
                })
                .ok_or(EffectError::UnsupportedProperty(key)),
            PropertyKey::Cached => Ok(EffectProperty::Cached(self.cached)),
            PropertyKey::Precision => Ok(EffectProperty::Precision(self.precision)),
            PropertyKey::Index(_) => Err(EffectError::UnsupportedProperty(key)),
        }
    }

    pub fn set(&mut self, property: EffectProperty) -> Result<()> {
        match property {
            EffectProperty::ConstantBuffer(bytes) => self.constant_buffer = bytes,
            EffectProperty::TransformMapper(mapper) => self.transform_mapper = mapper,
            EffectProperty::ResourceTextureManager { index, manager } => {
                let slot = self
                    .resource_texture_managers
                    .iter_mut()
                    .find(|(i, _)| *i == index)
                    .ok_or(EffectError::UnsupportedProperty(
                        PropertyKey::ResourceTextureManager(index),
                    ))?;
                slot.1 = manager;
            }
            EffectProperty::Cached(cached) => self.cached = cached,
            EffectProperty::Precision(precision) => self.precision = precision,
            other => return Err(EffectError::UnsupportedProperty(other.key())),
        }
        Ok(())
    }

    /// Pushes the scalar properties and the transform mapper into `native`.
    pub fn apply_properties(&self, native: &dyn NativeEffect) -> Result<()> {
        native.set_value(EffectProperty::ConstantBuffer(self.constant_buffer.clone()))?;
        if let Some(mapper) = &self.transform_mapper {
            native.set_value(EffectProperty::TransformMapper(Some(mapper.clone())))?;
        }
        native.set_value(EffectProperty::Cached(self.cached))?;
        native.set_value(EffectProperty::Precision(self.precision))?;
        Ok(())
    }

    /// Attaches the bound resource texture managers to `native`.
    pub fn apply_resource_textures(&self, native: &dyn NativeEffect) -> Result<()> {
        for (index, manager) in &self.resource_texture_managers {
            if let Some(manager) = manager {
                trace!("attaching resource texture manager #{index}");
                native.set_value(EffectProperty::ResourceTextureManager {
                    index: *index,
                    manager: Some(manager.clone()),
                })?;
            }
        }
        Ok(())
    }

    /// Reads every property back from a native effect.
    ///
    /// A property that cannot be read keeps its default. The cache is always
    /// complete; the first failure is returned beside it.
    pub fn read_back(
        descriptor: &EffectDescriptor,
        native: &dyn NativeEffect,
    ) -> (Self, Option<EffectError>) {
        let mut cache = Self::new(descriptor);
        let mut failure = None;

        for key in cache.keys() {
            let read = native
                .value(key)
                .map_err(EffectError::from)
                .and_then(|value| {
                    if value.key() != key {
                        return Err(DeviceError::PropertyTypeMismatch(key).into());
                    }
                    cache.set(value)
                });
            if let Err(e) = read {
                failure.get_or_insert(e);
            }
        }

        (cache, failure)
    }

    fn keys(&self) -> Vec<PropertyKey> {
        let mut keys = vec![
            PropertyKey::ConstantBuffer,
            PropertyKey::TransformMapper,
            PropertyKey::Cached,
            PropertyKey::Precision,
        ];
        keys.extend(
            self.resource_texture_managers
                .iter()
                .map(|(index, _)| PropertyKey::ResourceTextureManager(*index)),
        );
        keys
    }
}
