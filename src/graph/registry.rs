use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use slotmap::{SlotMap, new_key_type};

use crate::effects::ImageSource;
use crate::error::{EffectError, Result};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`EffectNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Token naming one node of a composite effect's graph.
///
/// Tokens are usually created once per composite effect and used both to
/// register the node while building and to look it up while configuring.
pub struct EffectNode<T> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EffectNode<T> {
    pub fn new() -> Self {
        Self {
            id: NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl<T> Default for EffectNode<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EffectNode<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EffectNode<T> {}

impl<T> fmt::Debug for EffectNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectNode({})", self.id)
    }
}

new_key_type! {
    struct NodeKey;
}

struct GraphNode {
    source: Arc<dyn ImageSource>,
    object: Arc<dyn Any + Send + Sync>,
}

/// Registered nodes of one composite effect.
#[derive(Default)]
pub(crate) struct EffectGraph {
    nodes: SlotMap<NodeKey, GraphNode>,
    index: HashMap<NodeId, NodeKey>,
    output: Option<NodeKey>,
}

impl EffectGraph {
    pub fn has_graph(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.output = None;
    }

    pub fn output(&self) -> Option<Arc<dyn ImageSource>> {
        self.output
            .and_then(|key| self.nodes.get(key))
            .map(|node| node.source.clone())
    }

    fn register<T: ImageSource + 'static>(
        &mut self,
        node: &EffectNode<T>,
        source: Arc<T>,
    ) -> Result<NodeKey> {
        if self.index.contains_key(&node.id) {
            return Err(EffectError::DuplicateNode(node.id));
        }

        let object: Arc<dyn Any + Send + Sync> = source.clone();
        let key = self.nodes.insert(GraphNode { source, object });
        self.index.insert(node.id, key);
        Ok(key)
    }

    fn set_output(&mut self, id: NodeId) -> Result<()> {
        let key = self
            .index
            .get(&id)
            .copied()
            .ok_or(EffectError::UnregisteredNode(id))?;
        self.output = Some(key);
        Ok(())
    }

    fn get<T: ImageSource + 'static>(&self, node: &EffectNode<T>) -> Result<Arc<T>> {
        self.index
            .get(&node.id)
            .and_then(|key| self.nodes.get(*key))
            .and_then(|entry| entry.object.clone().downcast::<T>().ok())
            .ok_or(EffectError::UnregisteredNode(node.id))
    }
}

/// Access to the graph while a composite effect builds it.
pub struct GraphBuilder<'a> {
    graph: &'a mut EffectGraph,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(graph: &'a mut EffectGraph) -> Self {
        Self { graph }
    }

    pub fn register_node<T: ImageSource + 'static>(
        &mut self,
        node: &EffectNode<T>,
        source: impl Into<Arc<T>>,
    ) -> Result<()> {
        self.graph.register(node, source.into()).map(|_| ())
    }

    /// Registers a node and makes it the graph's output.
    pub fn register_output_node<T: ImageSource + 'static>(
        &mut self,
        node: &EffectNode<T>,
        source: impl Into<Arc<T>>,
    ) -> Result<()> {
        let key = self.graph.register(node, source.into())?;
        self.graph.output = Some(key);
        Ok(())
    }

    pub fn set_output_node<T>(&mut self, node: &EffectNode<T>) -> Result<()> {
        self.graph.set_output(node.id)
    }

    pub fn get_node<T: ImageSource + 'static>(&self, node: &EffectNode<T>) -> Result<Arc<T>> {
        self.graph.get(node)
    }
}

/// Access to an already built graph while a composite effect configures it.
///
/// Nodes can be looked up and the output switched, but not registered.
pub struct GraphConfigurator<'a> {
    graph: &'a mut EffectGraph,
}

impl<'a> GraphConfigurator<'a> {
    pub(crate) fn new(graph: &'a mut EffectGraph) -> Self {
        Self { graph }
    }

    pub fn set_output_node<T>(&mut self, node: &EffectNode<T>) -> Result<()> {
        self.graph.set_output(node.id)
    }

    pub fn get_node<T: ImageSource + 'static>(&self, node: &EffectNode<T>) -> Result<Arc<T>> {
        self.graph.get(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{ImageRequest, ResolvedImage};

    struct Placeholder(u32);

    impl ImageSource for Placeholder {
        fn get_image(&self, _request: &ImageRequest<'_>) -> Result<ResolvedImage> {
            Ok(ResolvedImage::failed())
        }
    }

    struct Other;

    impl ImageSource for Other {
        fn get_image(&self, _request: &ImageRequest<'_>) -> Result<ResolvedImage> {
            Ok(ResolvedImage::failed())
        }
    }

    #[test]
    fn tokens_are_unique() {
        let a = EffectNode::<Placeholder>::new();
        let b = EffectNode::<Placeholder>::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let node = EffectNode::new();
        let mut graph = EffectGraph::default();
        let mut builder = GraphBuilder::new(&mut graph);

        builder.register_node(&node, Placeholder(1)).unwrap();
        let result = builder.register_node(&node, Placeholder(2));

        assert!(matches!(result, Err(EffectError::DuplicateNode(id)) if id == node.id()));
        assert_eq!(builder.get_node(&node).unwrap().0, 1);
    }

    #[test]
    fn output_must_be_registered() {
        let registered = EffectNode::new();
        let missing = EffectNode::<Other>::new();
        let mut graph = EffectGraph::default();

        let mut builder = GraphBuilder::new(&mut graph);
        builder.register_node(&registered, Placeholder(0)).unwrap();
        assert!(matches!(
            builder.set_output_node(&missing),
            Err(EffectError::UnregisteredNode(_))
        ));
        assert!(graph.output().is_none());
        assert!(graph.has_graph());
    }

    #[test]
    fn configurator_switches_output() {
        let first = EffectNode::new();
        let second = EffectNode::new();
        let mut graph = EffectGraph::default();

        let mut builder = GraphBuilder::new(&mut graph);
        builder.register_output_node(&first, Placeholder(1)).unwrap();
        builder.register_node(&second, Other).unwrap();

        let mut configurator = GraphConfigurator::new(&mut graph);
        configurator.set_output_node(&second).unwrap();
        assert!(configurator.get_node(&first).is_ok());
        assert_eq!(graph.len(), 2);

        let output = graph.output().unwrap();
        let expected: Arc<dyn ImageSource> = graph.get(&second).unwrap();
        assert!(Arc::ptr_eq(&output, &expected));
    }

    #[test]
    fn clear_drops_everything() {
        let node = EffectNode::new();
        let mut graph = EffectGraph::default();
        GraphBuilder::new(&mut graph)
            .register_output_node(&node, Placeholder(0))
            .unwrap();

        graph.clear();
        assert!(!graph.has_graph());
        assert!(graph.output().is_none());
        assert!(graph.get(&node).is_err());
    }
}
