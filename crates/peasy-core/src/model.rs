//! The user-authored model tree
//!
//! A [`Model`] is an ordered map from key to [`Node`]. Each node is exactly
//! one of plain data, a mutator, an effect or a nested namespace. A map that
//! should be stored as state is written as `Node::Data(Value::Map(..))`; only
//! `Node::Namespace` is walked by the compiler.
//!
//! ```
//! use peasy_core::{Model, Outcome};
//!
//! let model = Model::new().namespace(
//!     "counter",
//!     Model::new()
//!         .data("value", 0i64)
//!         .mutator("increment", |draft, amount, _ctx| {
//!             let value = draft.get_int("value")?;
//!             draft.set("value", value + amount.as_int().unwrap_or(1))?;
//!             Ok(Outcome::Commit)
//!         }),
//! );
//! assert_eq!(model.len(), 1);
//! ```

use crate::{Draft, EffectContext, MutatorContext, Outcome, Result, TaskFuture, Value};
use crate::Dispatcher;
use indexmap::IndexMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A synchronous transition over the draft of its namespace's state
pub type MutatorFn = Arc<dyn Fn(&mut Draft, &Value, &MutatorContext) -> Result<Outcome> + Send + Sync>;

/// An asynchronous side effect that may dispatch further messages
pub type EffectFn = Arc<dyn Fn(Dispatcher, Value, EffectContext) -> TaskFuture + Send + Sync>;

/// One node of the model tree
#[derive(Clone)]
pub enum Node {
    /// Plain state, copied into the initial state as-is
    Data(Value),
    /// State transition
    Mutator(MutatorFn),
    /// Asynchronous side effect
    Effect(EffectFn),
    /// Nested namespace
    Namespace(Model),
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Node::Mutator(_) => f.write_str("Mutator(..)"),
            Node::Effect(_) => f.write_str("Effect(..)"),
            Node::Namespace(model) => f.debug_tuple("Namespace").field(model).finish(),
        }
    }
}

/// Ordered tree of data, mutators, effects and namespaces
#[derive(Debug, Clone, Default)]
pub struct Model {
    nodes: IndexMap<String, Node>,
}

impl Model {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data node
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.nodes.insert(key.into(), Node::Data(value.into()));
        self
    }

    /// Add a mutator
    pub fn mutator<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Draft, &Value, &MutatorContext) -> Result<Outcome> + Send + Sync + 'static,
    {
        self.nodes.insert(key.into(), Node::Mutator(Arc::new(f)));
        self
    }

    /// Add an effect
    pub fn effect<F, Fut>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Dispatcher, Value, EffectContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let effect: EffectFn = Arc::new(move |dispatcher, payload, ctx| {
            Box::pin(f(dispatcher, payload, ctx)) as TaskFuture
        });
        self.nodes.insert(key.into(), Node::Effect(effect));
        self
    }

    /// Add a nested namespace
    pub fn namespace(mut self, key: impl Into<String>, model: Model) -> Self {
        self.nodes.insert(key.into(), Node::Namespace(model));
        self
    }

    /// Insert a node, returning the one it replaced
    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> Option<Node> {
        self.nodes.insert(key.into(), node)
    }

    /// Get a direct child
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Iterate over direct children in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
