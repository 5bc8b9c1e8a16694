//! Typed effect handles.

use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use super::{Effect, ImageRequest, ImageSource, ResolvedImage, ShaderEffect};
use crate::error::Result;

/// A shader effect of a known type.
///
/// This wrapper provides type-safe parameter updates on top of [`Effect`].
/// Cloning shares the underlying effect.
///
/// # Example
///
/// ```ignore
/// let blur = EffectInstance::<BoxBlurEffect>::new();
/// blur.set_input(bitmap.clone())?;
/// blur.update(&BoxBlurEffect { radius: 4.0, intensity: 1.0 })?;
///
/// let tint = EffectInstance::<TintEffect>::new();
/// tint.set_input(blur.as_source())?;
/// ```
pub struct EffectInstance<E: ShaderEffect> {
    effect: Arc<Effect>,
    _marker: PhantomData<E>,
}

impl<E: ShaderEffect> EffectInstance<E> {
    /// Creates an unrealized effect with a zeroed constant buffer.
    pub fn new() -> Self {
        Self {
            effect: Arc::new(Effect::of::<E>()),
            _marker: PhantomData,
        }
    }

    /// Creates an unrealized effect with the given parameters.
    pub fn with_parameters(parameters: &E) -> Result<Self> {
        let instance = Self::new();
        instance.update(parameters)?;
        Ok(instance)
    }

    /// Writes the effect's parameters into its constant buffer.
    pub fn update(&self, parameters: &E) -> Result<()> {
        self.effect.set_constant_buffer(&parameters.constant_buffer())
    }

    /// Sets the first input (convenience method for single-input effects).
    pub fn set_input(&self, source: Arc<dyn ImageSource>) -> Result<()> {
        self.effect.set_source(0, Some(source))
    }

    /// Returns the effect as an input for other effects.
    pub fn as_source(&self) -> Arc<dyn ImageSource> {
        self.effect.clone()
    }

    pub fn effect(&self) -> &Arc<Effect> {
        &self.effect
    }

    pub fn into_inner(self) -> Arc<Effect> {
        self.effect
    }
}

impl<E: ShaderEffect> Default for EffectInstance<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ShaderEffect> Clone for EffectInstance<E> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E: ShaderEffect> Deref for EffectInstance<E> {
    type Target = Effect;

    fn deref(&self) -> &Effect {
        &self.effect
    }
}

impl<E: ShaderEffect> From<EffectInstance<E>> for Arc<Effect> {
    fn from(instance: EffectInstance<E>) -> Self {
        instance.effect
    }
}

impl<E: ShaderEffect> AsRef<Effect> for EffectInstance<E> {
    fn as_ref(&self) -> &Effect {
        &self.effect
    }
}

impl<E: ShaderEffect> ImageSource for EffectInstance<E> {
    fn get_image(&self, request: &ImageRequest<'_>) -> Result<ResolvedImage> {
        self.effect.get_image(request)
    }
}
