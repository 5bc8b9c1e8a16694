//! Input slots of an effect.
//!
//! A slot observes the user-level source, remembers the native image the
//! source last resolved to, and owns the DPI compensation node interposed in
//! front of it. The three are only ever updated together.

use std::sync::Arc;

use log::trace;
use shaderfx_core::dpi::{
    COMPENSATION_BORDER, COMPENSATION_INTERPOLATION, DPI_COMPENSATION_PROP_BORDER_MODE,
    DPI_COMPENSATION_PROP_INPUT_DPI, DPI_COMPENSATION_PROP_INTERPOLATION_MODE,
};
use shaderfx_core::{GetImageFlags, compensation_needed};

use super::{EffectDescriptor, EffectProperty, ImageRequest, ImageSource, NativeImageSource};
use crate::device::{DeviceHandle, NativeEffect, NativeImage};
use crate::error::{EffectError, Result};

/// Outcome of re-resolving one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputUpdate {
    Unchanged,
    Updated,
    /// The source reported a soft failure.
    Failed,
}

struct DpiCompensation {
    effect: Arc<dyn NativeEffect>,
    /// DPI last written to the node, `0.0` before the first write.
    input_dpi: f32,
}

impl DpiCompensation {
    fn create(device: &DeviceHandle) -> Result<Self> {
        let effect = device.create_effect(&EffectDescriptor::dpi_compensation())?;
        effect.set_value(EffectProperty::UInt {
            index: DPI_COMPENSATION_PROP_INTERPOLATION_MODE,
            value: COMPENSATION_INTERPOLATION as u32,
        })?;
        effect.set_value(EffectProperty::UInt {
            index: DPI_COMPENSATION_PROP_BORDER_MODE,
            value: COMPENSATION_BORDER as u32,
        })?;

        Ok(Self {
            effect,
            input_dpi: 0.0,
        })
    }

    fn update(&mut self, image: &NativeImage, input_dpi: f32, input_changed: bool) -> Result<()> {
        if input_changed {
            self.effect.set_input(0, Some(image));
        }
        if self.input_dpi != input_dpi {
            self.effect.set_value(EffectProperty::Float2 {
                index: DPI_COMPENSATION_PROP_INPUT_DPI,
                value: [input_dpi, input_dpi],
            })?;
            self.input_dpi = input_dpi;
        }
        Ok(())
    }
}

#[derive(Default)]
struct SourceSlot {
    source: Option<Arc<dyn ImageSource>>,
    resolved: Option<NativeImage>,
    dpi_compensation: Option<DpiCompensation>,
}

impl SourceSlot {
    /// The image actually attached to the native effect.
    fn effective_input(&self) -> Option<NativeImage> {
        match (&self.dpi_compensation, &self.resolved) {
            (Some(compensation), Some(_)) => Some(compensation.effect.output()),
            (_, resolved) => resolved.clone(),
        }
    }

    /// Returns whether compensation was added or removed.
    fn apply_dpi_compensation(
        &mut self,
        image: &NativeImage,
        input_dpi: f32,
        request: &ImageRequest<'_>,
    ) -> Result<bool> {
        let has_compensation = self.dpi_compensation.is_some();
        let needed = compensation_needed(
            request.flags,
            has_compensation,
            input_dpi,
            request.target_dpi,
        );
        let changed = needed != has_compensation;

        if !needed {
            if has_compensation {
                trace!("removing DPI compensation ({input_dpi} dpi input)");
                self.dpi_compensation = None;
            }
            return Ok(changed);
        }

        let input_changed = changed || self.resolved.as_ref() != Some(image);

        if self.dpi_compensation.is_none() {
            trace!(
                "inserting DPI compensation ({input_dpi} dpi input, {} dpi target)",
                request.target_dpi
            );
            self.dpi_compensation = Some(DpiCompensation::create(request.device)?);
        }

        if let Some(compensation) = &mut self.dpi_compensation {
            compensation.update(image, input_dpi, input_changed)?;
        }

        Ok(changed)
    }

    fn release(&mut self) {
        self.resolved = None;
        self.dpi_compensation = None;
    }
}

pub(crate) struct SourceTable {
    slots: Vec<SourceSlot>,
}

impl SourceTable {
    pub fn new(count: u32) -> Self {
        Self {
            slots: (0..count).map(|_| SourceSlot::default()).collect(),
        }
    }

    pub fn len(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn check_index(&self, index: u32) -> Result<()> {
        if index < self.len() {
            Ok(())
        } else {
            Err(EffectError::IndexOutOfRange {
                index,
                count: self.len(),
            })
        }
    }

    /// The stored user-level source, without consulting any native object.
    pub fn cached_source(&self, index: u32) -> Result<Option<Arc<dyn ImageSource>>> {
        self.check_index(index)?;
        Ok(self.slots[index as usize].source.clone())
    }

    /// Replaces the user-level source. Native bookkeeping is left untouched
    /// so the next resolution can tell whether anything changed.
    pub fn store(&mut self, index: u32, source: Option<Arc<dyn ImageSource>>) -> Result<()> {
        self.check_index(index)?;
        self.slots[index as usize].source = source;
        Ok(())
    }

    /// Resolves the slot's source and attaches the result to `native` if the
    /// resolved image or its DPI compensation changed.
    pub fn update_input(
        &mut self,
        index: u32,
        native: &dyn NativeEffect,
        request: &ImageRequest<'_>,
    ) -> Result<InputUpdate> {
        self.check_index(index)?;
        let slot = &mut self.slots[index as usize];

        let resolved = match &slot.source {
            None if !request.flags.contains(GetImageFlags::ALLOW_NULL_EFFECT_INPUTS) => {
                return Err(EffectError::NullSource { index });
            }
            None => None,
            Some(source) => {
                let resolved = source.get_image(request)?;
                match resolved.image {
                    Some(image) => Some((image, resolved.dpi)),
                    None => return Ok(InputUpdate::Failed),
                }
            }
        };

        let compensation_changed = match &resolved {
            Some((image, dpi)) => slot.apply_dpi_compensation(image, *dpi, request)?,
            None => slot.dpi_compensation.take().is_some(),
        };

        let image = resolved.map(|(image, _)| image);
        if image == slot.resolved && !compensation_changed {
            return Ok(InputUpdate::Unchanged);
        }

        slot.resolved = image;
        native.set_input(index, slot.effective_input().as_ref());
        Ok(InputUpdate::Updated)
    }

    /// Reads the slot's input back from `native`.
    ///
    /// An owned DPI compensation node is looked through. When the native
    /// input is not what this slot attached, the slot adopts it, wrapped as a
    /// [`NativeImageSource`] bound to `device`.
    pub fn pull_back(
        &mut self,
        index: u32,
        native: &dyn NativeEffect,
        device: &DeviceHandle,
    ) -> Result<Option<Arc<dyn ImageSource>>> {
        self.check_index(index)?;
        let slot = &mut self.slots[index as usize];

        let current = match (&slot.dpi_compensation, native.input(index)) {
            (Some(compensation), Some(image)) if image == compensation.effect.output() => {
                slot.resolved.clone()
            }
            (_, current) => current,
        };

        if current == slot.resolved {
            return Ok(slot.source.clone());
        }

        trace!("effect input #{index} was replaced natively, adopting it");
        let adopted = current.clone().map(|image| {
            Arc::new(NativeImageSource::new(image, device.clone())) as Arc<dyn ImageSource>
        });
        slot.source = adopted.clone();
        slot.resolved = current;
        slot.dpi_compensation = None;
        Ok(adopted)
    }

    /// Drops the native references held by one slot.
    pub fn release(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            slot.release();
        }
    }

    pub fn release_all(&mut self) {
        self.slots.iter_mut().for_each(SourceSlot::release);
    }

    /// Drops every source along with its native references.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.release();
            slot.source = None;
        }
    }

    pub fn has_compensation(&self, index: u32) -> bool {
        self.slots
            .get(index as usize)
            .is_some_and(|slot| slot.dpi_compensation.is_some())
    }
}
