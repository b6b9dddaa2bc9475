//! Mutator and effect compilation
//!
//! [`compile`] walks the model once and produces a [`Handlers`] tree: the
//! mutator/effect skeleton of the model with every function wrapped and
//! tagged with its action name. Namespaces without any action below them are
//! pruned here; they still appear in the initial state.

use crate::model::{EffectFn, MutatorFn};
use crate::{
    apply_patches, ActionMessage, Dispatched, Dispatcher, Draft, Error, Message, Model, Node, Path,
    Result, Task, Value,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// What a mutator asks the store to do with its edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    /// Keep the edit
    #[default]
    Commit,
    /// Compute the edit, then roll it back. The real change is expected to
    /// arrive later through another dispatch (optimistic updates).
    Defer,
}

/// Per-dispatch environment threaded through the reducer tree
#[derive(Debug, Clone)]
pub struct Env {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) state: Value,
}

impl Env {
    pub fn new(dispatcher: Dispatcher, state: Value) -> Self {
        Self { dispatcher, state }
    }
}

/// Capabilities handed to a running mutator
#[derive(Debug)]
pub struct MutatorContext {
    dispatcher: Dispatcher,
    namespace: Path,
    state: Value,
}

impl MutatorContext {
    /// Dispatch any message. Actions are queued and run after the current
    /// update has been committed.
    pub fn dispatch(&self, message: impl Into<Message>) -> Result<Dispatched> {
        self.dispatcher.dispatch(message)
    }

    /// Call an action declared in this mutator's namespace or below it,
    /// e.g. `"award"` or `"stats.record"`
    pub fn dispatch_local(
        &self,
        path: impl Into<Path>,
        payload: impl Into<Value>,
    ) -> Result<Dispatched> {
        self.dispatcher.call(self.namespace.join(&path.into()), payload)
    }

    /// The global state as it was when this dispatch started
    pub fn get_state(&self) -> &Value {
        &self.state
    }

    /// Path of the namespace this mutator is declared in
    pub fn namespace(&self) -> &Path {
        &self.namespace
    }
}

/// Capabilities handed to a running effect
#[derive(Debug, Clone)]
pub struct EffectContext {
    dispatcher: Dispatcher,
}

impl EffectContext {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// The store's current global state
    pub fn get_state(&self) -> Result<Value> {
        self.dispatcher.get_state()
    }
}

/// A mutator bound to its action name
#[derive(Clone)]
pub struct CompiledMutator {
    name: String,
    namespace: Path,
    f: MutatorFn,
}

impl CompiledMutator {
    pub fn new(name: impl Into<String>, namespace: Path, f: MutatorFn) -> Self {
        Self {
            name: name.into(),
            namespace,
            f,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &Path {
        &self.namespace
    }

    /// Run the mutator against its namespace's slice of the state.
    ///
    /// A failing mutator leaves no trace: the draft is dropped and the error
    /// returned. A [`Outcome::Defer`] with at least one recorded write is
    /// rolled back through the inverse patches before returning.
    pub fn apply(&self, state: &Value, payload: &Value, env: &Env) -> Result<Value> {
        let mut draft = Draft::new(state.clone());
        let ctx = MutatorContext {
            dispatcher: env.dispatcher.clone(),
            namespace: self.namespace.clone(),
            state: env.state.clone(),
        };
        let outcome = (self.f)(&mut draft, payload, &ctx).map_err(|e| match e {
            Error::Mutator { .. } => e,
            other => Error::mutator(&self.name, other.to_string()),
        })?;
        let (next, inverse) = draft.finish();

        match outcome {
            Outcome::Defer if !inverse.is_empty() => {
                trace!(action = %self.name, patches = inverse.len(), "rolling back deferred edit");
                apply_patches(&next, &inverse)
            }
            Outcome::Commit | Outcome::Defer => Ok(next),
        }
    }

    /// The message that targets this mutator
    pub fn message(&self, payload: impl Into<Value>) -> ActionMessage {
        ActionMessage::new(self.name.clone(), payload)
    }
}

impl fmt::Debug for CompiledMutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledMutator")
            .field("name", &self.name)
            .finish()
    }
}

/// An effect bound to its action name
#[derive(Clone)]
pub struct CompiledEffect {
    name: String,
    namespace: Path,
    f: EffectFn,
}

impl CompiledEffect {
    pub fn new(name: impl Into<String>, namespace: Path, f: EffectFn) -> Self {
        Self {
            name: name.into(),
            namespace,
            f,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &Path {
        &self.namespace
    }

    /// Wrap one invocation as a task; the effect body runs only when the
    /// returned future is polled.
    pub fn task(&self, payload: Value) -> Task {
        let f = self.f.clone();
        Box::new(move |dispatcher: Dispatcher| {
            let ctx = EffectContext::new(dispatcher.clone());
            f(dispatcher, payload, ctx)
        })
    }
}

impl fmt::Debug for CompiledEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledEffect")
            .field("name", &self.name)
            .finish()
    }
}

/// One entry of the compiled skeleton
#[derive(Debug, Clone)]
pub enum Handler {
    Mutator(CompiledMutator),
    Effect(CompiledEffect),
    Namespace(Handlers),
}

/// The mutator/effect skeleton of a model namespace
#[derive(Debug, Clone, Default)]
pub struct Handlers {
    path: Path,
    entries: IndexMap<String, Handler>,
}

impl Handlers {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Handler)> {
        self.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Handler> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mutators declared directly in this namespace
    pub fn mutators(&self) -> impl Iterator<Item = &CompiledMutator> {
        self.entries.values().filter_map(|h| match h {
            Handler::Mutator(m) => Some(m),
            _ => None,
        })
    }

    /// Child namespaces in declaration order
    pub fn namespaces(&self) -> impl Iterator<Item = (&String, &Handlers)> {
        self.entries.iter().filter_map(|(k, h)| match h {
            Handler::Namespace(ns) => Some((k, ns)),
            _ => None,
        })
    }

    /// Whether any mutator exists in this namespace or below
    pub fn has_mutators(&self) -> bool {
        self.entries.values().any(|h| match h {
            Handler::Mutator(_) => true,
            Handler::Namespace(ns) => ns.has_mutators(),
            Handler::Effect(_) => false,
        })
    }

    /// Action name to full path of every compiled function, in declaration order
    pub fn action_table(&self) -> IndexMap<String, Path> {
        let mut table = IndexMap::new();
        self.collect_names(&mut table);
        table
    }

    fn collect_names(&self, table: &mut IndexMap<String, Path>) {
        for (key, handler) in &self.entries {
            match handler {
                Handler::Mutator(m) => {
                    table.insert(m.name.clone(), self.path.child(key.as_str()));
                }
                Handler::Effect(e) => {
                    table.insert(e.name.clone(), self.path.child(key.as_str()));
                }
                Handler::Namespace(ns) => ns.collect_names(table),
            }
        }
    }
}

/// Compile a model into its handler skeleton.
///
/// Fails if two functions at different paths would share an action name.
pub fn compile(model: &Model) -> Result<Handlers> {
    let mut seen = HashMap::new();
    compile_namespace(model, Path::root(), &mut seen)
}

fn compile_namespace(
    model: &Model,
    path: Path,
    seen: &mut HashMap<String, Path>,
) -> Result<Handlers> {
    let mut entries = IndexMap::new();
    for (key, node) in model.iter() {
        let handler = match node {
            Node::Data(_) => continue,
            Node::Mutator(f) => {
                let name = claim_name(&path, key, seen)?;
                Handler::Mutator(CompiledMutator::new(name, path.clone(), f.clone()))
            }
            Node::Effect(f) => {
                let name = claim_name(&path, key, seen)?;
                Handler::Effect(CompiledEffect::new(name, path.clone(), f.clone()))
            }
            Node::Namespace(inner) => {
                let nested = compile_namespace(inner, path.child(key.as_str()), seen)?;
                if nested.is_empty() {
                    trace!(path = %path.child(key.as_str()), "pruning namespace without actions");
                    continue;
                }
                Handler::Namespace(nested)
            }
        };
        entries.insert(key.clone(), handler);
    }
    Ok(Handlers { path, entries })
}

fn claim_name(namespace: &Path, key: &str, seen: &mut HashMap<String, Path>) -> Result<String> {
    let name = namespace.action_name(key);
    let full = namespace.child(key);
    if let Some(first) = seen.get(&name) {
        return Err(Error::ActionNameCollision {
            name,
            first: format!("{:?}", first.keys()),
            second: format!("{:?}", full.keys()),
        });
    }
    seen.insert(name.clone(), full);
    Ok(name)
}
