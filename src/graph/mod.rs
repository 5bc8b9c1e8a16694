//! Composite effects built from a graph of other effects.
//!
//! A [`CompositeEffect`] describes its graph in two passes. [`build`] runs
//! once to register nodes and pick an output, [`configure`] runs whenever the
//! effect's parameters change to push them into the registered nodes.
//! [`CanvasEffect`] drives both passes lazily from [`ImageSource::get_image`].
//!
//! # Example
//!
//! ```ignore
//! struct DropShadow {
//!     source: Arc<dyn ImageSource>,
//!     blur_amount: f32,
//!     blur: EffectNode<EffectInstance<GaussianBlur>>,
//! }
//!
//! impl CompositeEffect for DropShadow {
//!     fn build(&self, graph: &mut GraphBuilder<'_>) -> Result<()> {
//!         let blur = EffectInstance::<GaussianBlur>::new();
//!         blur.set_input(self.source.clone())?;
//!         graph.register_output_node(&self.blur, blur)
//!     }
//!
//!     fn configure(&self, graph: &mut GraphConfigurator<'_>) -> Result<()> {
//!         graph.get_node(&self.blur)?.update(&GaussianBlur { amount: self.blur_amount })
//!     }
//! }
//!
//! let shadow = CanvasEffect::new(DropShadow { .. });
//! shadow.update(InvalidationType::Update, |s| s.blur_amount = 8.0)?;
//! ```
//!
//! [`build`]: CompositeEffect::build
//! [`configure`]: CompositeEffect::configure

mod registry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use shaderfx_core::{InvalidationType, Rect, Transform2D};

use crate::device::DeviceHandle;
use crate::effects::{ImageRequest, ImageSource, ResolvedImage, output_bounds};
use crate::error::{EffectError, Result};

pub(crate) use registry::EffectGraph;
pub use registry::{EffectNode, GraphBuilder, GraphConfigurator, NodeId};

/// An effect expressed as a graph of other image sources.
pub trait CompositeEffect: Send + Sync + 'static {
    /// Registers the graph's nodes and designates its output.
    fn build(&self, graph: &mut GraphBuilder<'_>) -> Result<()>;

    /// Pushes the current parameters into the registered nodes.
    fn configure(&self, graph: &mut GraphConfigurator<'_>) -> Result<()>;
}

/// Drives a [`CompositeEffect`], building its graph on first use and
/// configuring it again after every invalidation.
pub struct CanvasEffect<C> {
    resolving: AtomicBool,
    state: Mutex<CanvasState<C>>,
}

struct CanvasState<C> {
    composite: C,
    graph: EffectGraph,
    invalidated: bool,
    disposed: bool,
}

struct ResolveGuard<'a>(&'a AtomicBool);

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C: CompositeEffect> CanvasEffect<C> {
    pub fn new(composite: C) -> Self {
        Self {
            resolving: AtomicBool::new(false),
            state: Mutex::new(CanvasState {
                composite,
                graph: EffectGraph::default(),
                invalidated: true,
                disposed: false,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, CanvasState<C>>> {
        let state = self.state.lock().map_err(|_| EffectError::Poisoned)?;
        if state.disposed {
            return Err(EffectError::Disposed);
        }
        Ok(state)
    }

    /// Marks the graph stale. [`InvalidationType::Creation`] also drops every
    /// node so the graph is built again on the next resolution.
    pub fn invalidate(&self, kind: InvalidationType) -> Result<()> {
        self.lock()?.invalidate(kind);
        Ok(())
    }

    /// Mutates the composite effect and invalidates it with `kind`.
    pub fn update<R>(&self, kind: InvalidationType, f: impl FnOnce(&mut C) -> R) -> Result<R> {
        let mut state = self.lock()?;
        let result = f(&mut state.composite);
        state.invalidate(kind);
        Ok(result)
    }

    /// Reads the composite effect without invalidating it.
    pub fn read<R>(&self, f: impl FnOnce(&C) -> R) -> Result<R> {
        Ok(f(&self.lock()?.composite))
    }

    pub fn has_graph(&self) -> bool {
        self.lock().is_ok_and(|state| state.graph.has_graph())
    }

    pub fn is_invalidated(&self) -> bool {
        self.lock().is_ok_and(|state| state.invalidated)
    }

    pub fn node_count(&self) -> usize {
        self.lock().map_or(0, |state| state.graph.len())
    }

    /// Bounds of the graph's output on `device`, optionally transformed.
    pub fn get_bounds(&self, device: &DeviceHandle, transform: Option<&Transform2D>) -> Result<Rect> {
        output_bounds(self, device, transform)
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().map_or(true, |state| state.disposed)
    }

    /// Drops the graph. Later calls fail with [`EffectError::Disposed`].
    pub fn dispose(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.graph.clear();
        state.disposed = true;
    }
}

impl<C: CompositeEffect> ImageSource for CanvasEffect<C> {
    fn get_image(&self, request: &ImageRequest<'_>) -> Result<ResolvedImage> {
        if self.resolving.swap(true, Ordering::Acquire) {
            return Err(EffectError::CyclicGraph);
        }
        let _guard = ResolveGuard(&self.resolving);

        let mut state = self.lock()?;
        let output = state.prepare()?;
        output.get_image(request)
    }
}

impl<C: CompositeEffect> CanvasState<C> {
    fn invalidate(&mut self, kind: InvalidationType) {
        if kind == InvalidationType::Creation {
            self.graph.clear();
        }
        self.invalidated = true;
    }

    /// Builds and configures the graph as needed and returns its output.
    fn prepare(&mut self) -> Result<Arc<dyn ImageSource>> {
        if !self.graph.has_graph() {
            debug!("building effect graph");
            let result = self.composite.build(&mut GraphBuilder::new(&mut self.graph));
            if let Err(e) = result {
                self.graph.clear();
                return Err(e);
            }
            if self.graph.output().is_none() {
                self.graph.clear();
                return Err(EffectError::MissingOutputNode);
            }
            debug!("effect graph built with {} nodes", self.graph.len());
        }

        if self.invalidated {
            debug!("configuring effect graph");
            self.composite
                .configure(&mut GraphConfigurator::new(&mut self.graph))?;
            self.invalidated = false;
        }

        self.graph.output().ok_or(EffectError::MissingOutputNode)
    }
}
