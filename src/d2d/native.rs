//! `NativeEffect` over `ID2D1Effect`.

use std::sync::{Arc, Mutex, PoisonError};

use shaderfx_core::BufferPrecision;
use windows::Win32::Graphics::Direct2D::{
    D2D1_PROPERTY_CACHED, D2D1_PROPERTY_PRECISION, D2D1_PROPERTY_TYPE,
    D2D1_PROPERTY_TYPE_BLOB, D2D1_PROPERTY_TYPE_BOOL, D2D1_PROPERTY_TYPE_ENUM,
    D2D1_PROPERTY_TYPE_FLOAT, D2D1_PROPERTY_TYPE_INT32, D2D1_PROPERTY_TYPE_UINT32,
    D2D1_PROPERTY_TYPE_VECTOR2, D2D1_PROPERTY_TYPE_VECTOR3, D2D1_PROPERTY_TYPE_VECTOR4,
    ID2D1Effect, ID2D1Image,
};
use windows_core::{BOOL, Interface};

use super::registration::CONSTANT_BUFFER_PROPERTY;
use crate::device::{DeviceError, NativeEffect, NativeImage};
use crate::effects::{EffectProperty, PropertyKey, ResourceTextureManager, TransformMapper};

/// An `ID2D1Image` shared through a [`NativeImage`].
#[derive(Clone)]
pub struct D2dImage(pub ID2D1Image);

// SAFETY: Direct2D objects created from a multithreaded factory may be used
// from any thread; the engine serializes access per effect.
unsafe impl Send for D2dImage {}
unsafe impl Sync for D2dImage {}

impl D2dImage {
    pub fn into_native(image: ID2D1Image) -> NativeImage {
        NativeImage::with_identity(image.as_raw() as usize, D2dImage(image))
    }
}

/// A realized Direct2D effect.
///
/// Transform mappers and resource texture managers have no Direct2D property
/// to live in, so they are kept beside the effect.
pub struct D2dEffect {
    effect: ID2D1Effect,
    output: NativeImage,
    transform_mapper: Mutex<Option<Arc<dyn TransformMapper>>>,
    resource_texture_managers: Mutex<Vec<(u32, Arc<dyn ResourceTextureManager>)>>,
}

// SAFETY: See D2dImage.
unsafe impl Send for D2dEffect {}
unsafe impl Sync for D2dEffect {}

impl D2dEffect {
    pub fn new(effect: ID2D1Effect) -> Result<Self, DeviceError> {
        let output = unsafe { effect.GetOutput()? };
        Ok(Self {
            effect,
            output: D2dImage::into_native(output),
            transform_mapper: Mutex::new(None),
            resource_texture_managers: Mutex::new(Vec::new()),
        })
    }

    pub fn as_raw(&self) -> &ID2D1Effect {
        &self.effect
    }

    fn set_raw(
        &self,
        index: u32,
        kind: D2D1_PROPERTY_TYPE,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        unsafe { self.effect.SetValue(index, kind, data)? };
        Ok(())
    }

    /// Reads a value of at most `N` bytes; trailing bytes stay zero.
    fn get_raw<const N: usize>(
        &self,
        index: u32,
        kind: D2D1_PROPERTY_TYPE,
    ) -> Result<[u8; N], DeviceError> {
        let mut data = [0u8; N];
        let size = unsafe { self.effect.GetValueSize(index) } as usize;
        unsafe { self.effect.GetValue(index, kind, &mut data[..size.min(N)])? };
        Ok(data)
    }
}

fn f32s<const N: usize>(bytes: &[u8; 16]) -> [f32; N] {
    std::array::from_fn(|i| {
        let at = i * 4;
        f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    })
}

fn bytes_of(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl NativeEffect for D2dEffect {
    fn set_input(&self, index: u32, image: Option<&NativeImage>) {
        let image = image
            .and_then(|image| image.downcast_ref::<D2dImage>())
            .map(|image| &image.0);
        unsafe {
            self.effect.SetInput(index, image, false);
        }
    }

    fn input(&self, index: u32) -> Option<NativeImage> {
        let mut input: Option<ID2D1Image> = None;
        unsafe {
            self.effect.GetInput(index, Some(&mut input));
        }
        input.map(D2dImage::into_native)
    }

    fn set_value(&self, property: EffectProperty) -> Result<(), DeviceError> {
        match property {
            EffectProperty::Float { index, value } => {
                self.set_raw(index, D2D1_PROPERTY_TYPE_FLOAT, &value.to_le_bytes())
            }
            EffectProperty::Float2 { index, value } => {
                self.set_raw(index, D2D1_PROPERTY_TYPE_VECTOR2, &bytes_of(&value))
            }
            EffectProperty::Float3 { index, value } => {
                self.set_raw(index, D2D1_PROPERTY_TYPE_VECTOR3, &bytes_of(&value))
            }
            EffectProperty::Float4 { index, value } => {
                self.set_raw(index, D2D1_PROPERTY_TYPE_VECTOR4, &bytes_of(&value))
            }
            EffectProperty::Int { index, value } => {
                self.set_raw(index, D2D1_PROPERTY_TYPE_INT32, &value.to_le_bytes())
            }
            EffectProperty::UInt { index, value } => {
                self.set_raw(index, D2D1_PROPERTY_TYPE_UINT32, &value.to_le_bytes())
            }
            EffectProperty::Bool { index, value } => {
                self.set_raw(index, D2D1_PROPERTY_TYPE_BOOL, &BOOL::from(value).0.to_le_bytes())
            }
            EffectProperty::ConstantBuffer(bytes) => {
                self.set_raw(CONSTANT_BUFFER_PROPERTY, D2D1_PROPERTY_TYPE_BLOB, &bytes)
            }
            EffectProperty::Cached(cached) => self.set_raw(
                D2D1_PROPERTY_CACHED.0 as u32,
                D2D1_PROPERTY_TYPE_BOOL,
                &BOOL::from(cached).0.to_le_bytes(),
            ),
            EffectProperty::Precision(precision) => self.set_raw(
                D2D1_PROPERTY_PRECISION.0 as u32,
                D2D1_PROPERTY_TYPE_ENUM,
                &precision.map_or(0, BufferPrecision::to_raw).to_le_bytes(),
            ),
            EffectProperty::TransformMapper(mapper) => {
                *self.transform_mapper.lock().unwrap_or_else(PoisonError::into_inner) = mapper;
                Ok(())
            }
            EffectProperty::ResourceTextureManager { index, manager } => {
                let mut managers = self
                    .resource_texture_managers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                managers.retain(|(i, _)| *i != index);
                if let Some(manager) = manager {
                    managers.push((index, manager));
                }
                Ok(())
            }
        }
    }

    fn value(&self, key: PropertyKey) -> Result<EffectProperty, DeviceError> {
        match key {
            PropertyKey::ConstantBuffer => {
                let size = unsafe { self.effect.GetValueSize(CONSTANT_BUFFER_PROPERTY) };
                let mut bytes = vec![0u8; size as usize];
                unsafe {
                    self.effect
                        .GetValue(CONSTANT_BUFFER_PROPERTY, D2D1_PROPERTY_TYPE_BLOB, &mut bytes)?
                };
                Ok(EffectProperty::ConstantBuffer(bytes))
            }
            PropertyKey::Cached => {
                let raw =
                    self.get_raw::<4>(D2D1_PROPERTY_CACHED.0 as u32, D2D1_PROPERTY_TYPE_BOOL)?;
                Ok(EffectProperty::Cached(i32::from_le_bytes(raw) != 0))
            }
            PropertyKey::Precision => {
                let raw =
                    self.get_raw::<4>(D2D1_PROPERTY_PRECISION.0 as u32, D2D1_PROPERTY_TYPE_ENUM)?;
                Ok(EffectProperty::Precision(BufferPrecision::from_raw(
                    u32::from_le_bytes(raw),
                )))
            }
            PropertyKey::TransformMapper => Ok(EffectProperty::TransformMapper(
                self.transform_mapper
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            )),
            PropertyKey::ResourceTextureManager(index) => {
                let managers = self
                    .resource_texture_managers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(EffectProperty::ResourceTextureManager {
                    index,
                    manager: managers
                        .iter()
                        .find(|(i, _)| *i == index)
                        .map(|(_, manager)| manager.clone()),
                })
            }
            PropertyKey::Index(index) => {
                let kind = unsafe { self.effect.GetType(index) };
                let raw = self.get_raw::<16>(index, kind)?;
                let word = [raw[0], raw[1], raw[2], raw[3]];
                match kind {
                    D2D1_PROPERTY_TYPE_FLOAT => Ok(EffectProperty::Float {
                        index,
                        value: f32::from_le_bytes(word),
                    }),
                    D2D1_PROPERTY_TYPE_VECTOR2 => Ok(EffectProperty::Float2 { index, value: f32s(&raw) }),
                    D2D1_PROPERTY_TYPE_VECTOR3 => Ok(EffectProperty::Float3 { index, value: f32s(&raw) }),
                    D2D1_PROPERTY_TYPE_VECTOR4 => Ok(EffectProperty::Float4 { index, value: f32s(&raw) }),
                    D2D1_PROPERTY_TYPE_INT32 => Ok(EffectProperty::Int {
                        index,
                        value: i32::from_le_bytes(word),
                    }),
                    D2D1_PROPERTY_TYPE_BOOL => Ok(EffectProperty::Bool {
                        index,
                        value: i32::from_le_bytes(word) != 0,
                    }),
                    D2D1_PROPERTY_TYPE_UINT32 | D2D1_PROPERTY_TYPE_ENUM => Ok(EffectProperty::UInt {
                        index,
                        value: u32::from_le_bytes(word),
                    }),
                    _ => Err(DeviceError::UnsupportedProperty(key)),
                }
            }
        }
    }

    fn output(&self) -> NativeImage {
        self.output.clone()
    }
}
