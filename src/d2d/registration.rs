//! Effect registration with Direct2D.

use std::collections::HashSet;

use shaderfx_core::EffectTypeId;
use windows::Win32::Graphics::Direct2D::{D2D1_PROPERTY_BINDING, ID2D1Factory1};
use windows::core::{GUID, HRESULT, HSTRING};
use windows_core::{IUnknown, OutRef};

use crate::effects::{EffectDescriptor, EffectMetadata, ShaderEffect};

/// Index of the constant buffer blob in every registered effect's XML.
pub const CONSTANT_BUFFER_PROPERTY: u32 = 0;

/// Wrapper around `D2D1_PROPERTY_BINDING` that is `Sync`.
#[repr(transparent)]
pub struct SyncPropertyBinding(pub D2D1_PROPERTY_BINDING);

// SAFETY: The D2D1_PROPERTY_BINDING struct contains:
// - propertyName: PCWSTR - a static string pointer that doesn't change
// - setFunction/getFunction: function pointers that are inherently thread-safe
// These are all read-only after creation, making it safe to share across threads.
unsafe impl Sync for SyncPropertyBinding {}
unsafe impl Send for SyncPropertyBinding {}

impl SyncPropertyBinding {
    pub const fn new(binding: D2D1_PROPERTY_BINDING) -> Self {
        Self(binding)
    }
}

/// COM glue of a shader effect: the `ID2D1EffectImpl` factory and the
/// binding of its `ConstantBuffer` property.
pub trait EffectFactory {
    fn effect_factory() -> unsafe extern "system" fn(OutRef<'_, IUnknown>) -> HRESULT;

    fn property_bindings() -> &'static [SyncPropertyBinding];
}

pub(crate) fn guid(type_id: EffectTypeId) -> GUID {
    GUID::from_u128(type_id.as_u128())
}

/// Tracks which effect types have been registered with a factory.
///
/// Devices refuse to create effects whose type is missing here, so a graph
/// that names an unregistered effect fails at realization instead of deep
/// inside Direct2D.
#[derive(Default)]
pub struct EffectRegistry {
    registered: HashSet<EffectTypeId>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shader effect type with Direct2D.
    ///
    /// Repeated calls for the same type are ignored.
    ///
    /// ```ignore
    /// registry.register::<GrayscaleEffect>(&factory)?;
    /// ```
    pub fn register<E: ShaderEffect + EffectFactory>(
        &mut self,
        factory: &ID2D1Factory1,
    ) -> windows::core::Result<()> {
        if self.registered.contains(&E::TYPE_ID) {
            return Ok(());
        }

        let xml = build_effect_xml(&E::metadata(), E::INPUT_COUNT);
        let sync_bindings = E::property_bindings();

        // SAFETY: SyncPropertyBinding is #[repr(transparent)] around D2D1_PROPERTY_BINDING,
        // so we can safely transmute the slice.
        let bindings: &[D2D1_PROPERTY_BINDING] = unsafe { std::mem::transmute(sync_bindings) };

        unsafe {
            factory.RegisterEffectFromString(
                &guid(E::TYPE_ID),
                &HSTRING::from(&xml),
                Some(bindings),
                Some(E::effect_factory()),
            )?;
        }

        log::debug!("registered effect {} ({})", E::metadata().name, E::TYPE_ID);
        self.registered.insert(E::TYPE_ID);
        Ok(())
    }

    /// Whether effects of this descriptor's type can be created.
    pub fn can_create(&self, descriptor: &EffectDescriptor) -> bool {
        descriptor.builtin || self.registered.contains(&descriptor.type_id)
    }

    pub fn unregister<E: ShaderEffect>(
        &mut self,
        factory: &ID2D1Factory1,
    ) -> windows::core::Result<()> {
        if !self.registered.remove(&E::TYPE_ID) {
            return Ok(());
        }

        unsafe { factory.UnregisterEffect(&guid(E::TYPE_ID)) }
    }

    /// Forgets every registration, for when the factory is destroyed.
    pub fn clear(&mut self) {
        self.registered.clear();
    }
}

/// Builds the XML registration string for a shader effect.
fn build_effect_xml(metadata: &EffectMetadata, input_count: u32) -> String {
    let inputs = (0..input_count)
        .map(|i| format!("<Input name='Source{i}'/>"))
        .collect::<Vec<_>>()
        .join("\n        ");

    format!(
        r#"<?xml version='1.0'?>
<Effect>
    <Property name='DisplayName' type='string' value='{name}'/>
    <Property name='Author' type='string' value='{author}'/>
    <Property name='Category' type='string' value='{category}'/>
    <Property name='Description' type='string' value='{description}'/>
    <Inputs>
        {inputs}
    </Inputs>
    <Property name='ConstantBuffer' type='blob'>
        <Property name='DisplayName' type='string' value='ConstantBuffer'/>
    </Property>
</Effect>"#,
        name = metadata.name,
        author = metadata.author,
        category = metadata.category,
        description = metadata.description,
    )
}
