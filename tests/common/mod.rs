#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use shaderfx::{
    Device, DeviceContext, DeviceError, DeviceHandle, EffectDescriptor, EffectMetadata,
    EffectProperty, EffectTypeId, ImageRequest, ImageSource, NativeEffect, NativeImage,
    PropertyKey, Rect, ResolvedImage, ResourceTextureDescription, ResourceTextureManager,
    ShaderEffect,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Payload of every image the stub backend hands out.
#[derive(Debug, Clone, Copy)]
pub struct StubImage {
    pub width: f32,
    pub height: f32,
}

pub const EFFECT_OUTPUT: StubImage = StubImage {
    width: 64.0,
    height: 32.0,
};

pub struct StubNativeEffect {
    pub type_id: EffectTypeId,
    inputs: Mutex<Vec<Option<NativeImage>>>,
    values: Mutex<HashMap<PropertyKey, EffectProperty>>,
    set_input_calls: AtomicUsize,
    output: NativeImage,
    reads_fail: Arc<AtomicBool>,
}

impl StubNativeEffect {
    fn new(descriptor: &EffectDescriptor, reads_fail: Arc<AtomicBool>) -> Self {
        Self {
            type_id: descriptor.type_id,
            inputs: Mutex::new(vec![None; descriptor.input_count as usize]),
            values: Mutex::new(HashMap::new()),
            set_input_calls: AtomicUsize::new(0),
            output: NativeImage::new(EFFECT_OUTPUT),
            reads_fail,
        }
    }

    pub fn set_input_calls(&self) -> usize {
        self.set_input_calls.load(Ordering::SeqCst)
    }

    pub fn current_input(&self, index: u32) -> Option<NativeImage> {
        self.inputs.lock().unwrap()[index as usize].clone()
    }

    /// Replaces an input without going through the engine.
    pub fn replace_input(&self, index: u32, image: Option<NativeImage>) {
        self.inputs.lock().unwrap()[index as usize] = image;
    }

    pub fn stored(&self, key: PropertyKey) -> Option<EffectProperty> {
        self.values.lock().unwrap().get(&key).cloned()
    }
}

impl NativeEffect for StubNativeEffect {
    fn set_input(&self, index: u32, image: Option<&NativeImage>) {
        self.set_input_calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap()[index as usize] = image.cloned();
    }

    fn input(&self, index: u32) -> Option<NativeImage> {
        self.current_input(index)
    }

    fn set_value(&self, property: EffectProperty) -> Result<(), DeviceError> {
        self.values.lock().unwrap().insert(property.key(), property);
        Ok(())
    }

    fn value(&self, key: PropertyKey) -> Result<EffectProperty, DeviceError> {
        if self.reads_fail.load(Ordering::SeqCst) {
            return Err(DeviceError::DeviceLost);
        }
        if let Some(value) = self.stored(key) {
            return Ok(value);
        }

        match key {
            PropertyKey::TransformMapper => Ok(EffectProperty::TransformMapper(None)),
            PropertyKey::ResourceTextureManager(index) => {
                Ok(EffectProperty::ResourceTextureManager {
                    index,
                    manager: None,
                })
            }
            _ => Err(DeviceError::UnsupportedProperty(key)),
        }
    }

    fn output(&self) -> NativeImage {
        self.output.clone()
    }
}

/// Device that records every native effect it creates.
#[derive(Default)]
pub struct StubDevice {
    created: Mutex<Vec<Arc<StubNativeEffect>>>,
    fail_creation: AtomicBool,
    reads_fail: Arc<AtomicBool>,
}

impl StubDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn handle(self: &Arc<Self>) -> DeviceHandle {
        self.clone()
    }

    pub fn fail_creation(&self, fail: bool) {
        self.fail_creation.store(fail, Ordering::SeqCst);
    }

    /// Makes every property read on this device's native effects fail, as
    /// after a lost device.
    pub fn fail_reads(&self, fail: bool) {
        self.reads_fail.store(fail, Ordering::SeqCst);
    }

    pub fn creations(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn natives_of(&self, type_id: EffectTypeId) -> Vec<Arc<StubNativeEffect>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|native| native.type_id == type_id)
            .cloned()
            .collect()
    }

    pub fn creations_of(&self, type_id: EffectTypeId) -> usize {
        self.natives_of(type_id).len()
    }

    pub fn native_of(&self, type_id: EffectTypeId) -> Arc<StubNativeEffect> {
        self.natives_of(type_id)
            .pop()
            .expect("no native effect of this type was created")
    }
}

impl Device for StubDevice {
    fn create_effect(
        &self,
        descriptor: &EffectDescriptor,
    ) -> Result<Arc<dyn NativeEffect>, DeviceError> {
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(DeviceError::DeviceLost);
        }

        let native = Arc::new(StubNativeEffect::new(descriptor, self.reads_fail.clone()));
        self.created.lock().unwrap().push(native.clone());
        Ok(native)
    }

    fn image_local_bounds(&self, image: &NativeImage) -> Result<Rect, DeviceError> {
        let image = image
            .downcast_ref::<StubImage>()
            .ok_or(DeviceError::ForeignImage)?;
        Ok(Rect::from_size(image.width, image.height))
    }
}

pub struct StubContext {
    pub dpi: f32,
    pub fixed_target: bool,
}

impl DeviceContext for StubContext {
    fn dpi(&self) -> f32 {
        self.dpi
    }

    fn has_fixed_target_surface(&self) -> bool {
        self.fixed_target
    }
}

/// A bitmap with a DPI of its own, optionally tied to one device.
pub struct StubBitmap {
    image: NativeImage,
    device: Mutex<Option<DeviceHandle>>,
    dpi: Mutex<f32>,
}

impl StubBitmap {
    pub fn on(device: &DeviceHandle, dpi: f32) -> Arc<Self> {
        Arc::new(Self {
            image: NativeImage::new(StubImage {
                width: 16.0,
                height: 16.0,
            }),
            device: Mutex::new(Some(device.clone())),
            dpi: Mutex::new(dpi),
        })
    }

    /// A bitmap usable with any device.
    pub fn shared(dpi: f32) -> Arc<Self> {
        Arc::new(Self {
            image: NativeImage::new(StubImage {
                width: 16.0,
                height: 16.0,
            }),
            device: Mutex::new(None),
            dpi: Mutex::new(dpi),
        })
    }

    pub fn set_dpi(&self, dpi: f32) {
        *self.dpi.lock().unwrap() = dpi;
    }

    /// Ties the bitmap to another device.
    pub fn move_to(&self, device: &DeviceHandle) {
        *self.device.lock().unwrap() = Some(device.clone());
    }

    pub fn image(&self) -> NativeImage {
        self.image.clone()
    }
}

impl ImageSource for StubBitmap {
    fn get_image(&self, request: &ImageRequest<'_>) -> shaderfx::Result<ResolvedImage> {
        if let Some(device) = &*self.device.lock().unwrap() {
            if !shaderfx::same_device(device, request.device) {
                return Err(shaderfx::EffectError::DeviceMismatch);
            }
        }
        Ok(ResolvedImage::new(
            self.image.clone(),
            *self.dpi.lock().unwrap(),
        ))
    }
}

#[derive(Debug)]
pub struct Texture(pub u32);

impl ResourceTextureManager for Texture {
    fn dimensions(&self) -> u32 {
        self.0
    }
}

/// Single-input effect with a 4-byte constant buffer.
pub struct Tint {
    pub amount: f32,
}

impl ShaderEffect for Tint {
    const TYPE_ID: EffectTypeId = EffectTypeId::from_u128(0x1b2e_0000_0000_0000_0000_0000_0000_0001);

    fn metadata() -> EffectMetadata {
        EffectMetadata {
            name: "Tint",
            author: "shaderfx",
            category: "Color",
            description: "Scales color channels",
            shader_bytecode: &[],
            constant_buffer_size: 4,
            resource_textures: &[],
        }
    }

    fn constant_buffer(&self) -> Vec<u8> {
        self.amount.to_le_bytes().to_vec()
    }
}

/// Two-input effect without parameters.
pub struct Blend;

impl ShaderEffect for Blend {
    const TYPE_ID: EffectTypeId = EffectTypeId::from_u128(0x1b2e_0000_0000_0000_0000_0000_0000_0002);
    const INPUT_COUNT: u32 = 2;

    fn metadata() -> EffectMetadata {
        EffectMetadata {
            name: "Blend",
            author: "shaderfx",
            category: "Composition",
            description: "Blends two images",
            shader_bytecode: &[],
            constant_buffer_size: 0,
            resource_textures: &[],
        }
    }

    fn constant_buffer(&self) -> Vec<u8> {
        Vec::new()
    }
}

/// Generator effect without inputs.
pub struct Flood {
    pub color: [f32; 4],
}

impl ShaderEffect for Flood {
    const TYPE_ID: EffectTypeId = EffectTypeId::from_u128(0x1b2e_0000_0000_0000_0000_0000_0000_0003);
    const INPUT_COUNT: u32 = 0;

    fn metadata() -> EffectMetadata {
        EffectMetadata {
            name: "Flood",
            author: "shaderfx",
            category: "Generator",
            description: "Fills with a solid color",
            shader_bytecode: &[],
            constant_buffer_size: 16,
            resource_textures: &[],
        }
    }

    fn constant_buffer(&self) -> Vec<u8> {
        self.color.iter().flat_map(|c| c.to_le_bytes()).collect()
    }
}

/// Single-input effect sampling a 2D lookup texture.
pub struct Lookup;

impl ShaderEffect for Lookup {
    const TYPE_ID: EffectTypeId = EffectTypeId::from_u128(0x1b2e_0000_0000_0000_0000_0000_0000_0004);

    fn metadata() -> EffectMetadata {
        EffectMetadata {
            name: "Lookup",
            author: "shaderfx",
            category: "Color",
            description: "Maps colors through a lookup texture",
            shader_bytecode: &[],
            constant_buffer_size: 0,
            resource_textures: &[ResourceTextureDescription {
                index: 0,
                dimensions: 2,
            }],
        }
    }

    fn constant_buffer(&self) -> Vec<u8> {
        Vec::new()
    }
}
