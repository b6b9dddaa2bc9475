//! The callable action tree
//!
//! Mirrors the mutator/effect skeleton of the model. Every leaf is an
//! [`Action`]: calling a mutator action dispatches `{ type, payload }`,
//! calling an effect action dispatches a task wrapping the effect.

use crate::compile::{CompiledEffect, Handler, Handlers};
use crate::{Dispatched, Dispatcher, Error, Message, Path, Result, Value};
use indexmap::IndexMap;
use std::fmt;

/// Which kind of function an action triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Mutator,
    Effect,
}

#[derive(Clone)]
enum Target {
    Mutator,
    Effect(CompiledEffect),
}

/// A callable leaf of the action tree
#[derive(Clone)]
pub struct Action {
    name: String,
    target: Target,
    dispatcher: Dispatcher,
}

impl Action {
    /// Action name, e.g. `counter.increment`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ActionKind {
        match self.target {
            Target::Mutator => ActionKind::Mutator,
            Target::Effect(_) => ActionKind::Effect,
        }
    }

    /// Dispatch this action with `payload`
    pub fn call(&self, payload: impl Into<Value>) -> Result<Dispatched> {
        let payload = payload.into();
        let message = match &self.target {
            Target::Mutator => Message::action(self.name.clone(), payload),
            Target::Effect(effect) => Message::Task(effect.task(payload)),
        };
        self.dispatcher.dispatch(message)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Nested actions, shaped like the model's mutators and effects
#[derive(Debug, Clone)]
pub enum ActionTree {
    Action(Action),
    Namespace(IndexMap<String, ActionTree>),
}

impl ActionTree {
    /// Build the tree for compiled handlers, bound to `dispatcher`
    pub fn build(handlers: &Handlers, dispatcher: &Dispatcher) -> Self {
        let mut children = IndexMap::new();
        for (key, handler) in handlers.iter() {
            let node = match handler {
                Handler::Mutator(m) => ActionTree::Action(Action {
                    name: m.name().to_string(),
                    target: Target::Mutator,
                    dispatcher: dispatcher.clone(),
                }),
                Handler::Effect(e) => ActionTree::Action(Action {
                    name: e.name().to_string(),
                    target: Target::Effect(e.clone()),
                    dispatcher: dispatcher.clone(),
                }),
                Handler::Namespace(ns) => ActionTree::build(ns, dispatcher),
            };
            children.insert(key.clone(), node);
        }
        ActionTree::Namespace(children)
    }

    /// Resolve a subtree by path
    pub fn get(&self, path: impl Into<Path>) -> Option<&ActionTree> {
        let path = path.into();
        let mut node = self;
        for key in path.keys() {
            node = node.child(key)?;
        }
        Some(node)
    }

    /// Resolve a leaf action by path
    pub fn action(&self, path: impl Into<Path>) -> Result<&Action> {
        let path = path.into();
        match self.get(&path) {
            Some(ActionTree::Action(action)) => Ok(action),
            _ => Err(Error::ActionNotFound(path.to_string())),
        }
    }

    /// Direct child by key
    pub fn child(&self, key: &str) -> Option<&ActionTree> {
        match self {
            ActionTree::Namespace(children) => children.get(key),
            ActionTree::Action(_) => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            ActionTree::Action(action) => Some(action),
            ActionTree::Namespace(_) => None,
        }
    }

    /// Every action name in declaration order
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect(&mut names);
        names
    }

    fn collect(&self, names: &mut Vec<String>) {
        match self {
            ActionTree::Action(action) => names.push(action.name.clone()),
            ActionTree::Namespace(children) => {
                for child in children.values() {
                    child.collect(names);
                }
            }
        }
    }

    /// Structural outline: keys, nesting and leaf kinds
    pub fn shape(&self) -> Vec<(Path, Option<ActionKind>)> {
        let mut out = Vec::new();
        self.outline(&Path::root(), &mut out);
        out
    }

    fn outline(&self, path: &Path, out: &mut Vec<(Path, Option<ActionKind>)>) {
        if let ActionTree::Namespace(children) = self {
            for (key, child) in children {
                let child_path = path.child(key.as_str());
                out.push((child_path.clone(), child.as_action().map(Action::kind)));
                child.outline(&child_path, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, Model, Outcome};

    fn tree() -> ActionTree {
        let model = Model::new()
            .namespace(
                "counter",
                Model::new()
                    .data("value", 0i64)
                    .mutator("increment", |_, _, _| Ok(Outcome::Commit))
                    .effect("sync", |_, _, _| async { Ok(()) }),
            )
            .namespace("settings", Model::new().data("dark", false));
        let handlers = compile(&model).unwrap();
        ActionTree::build(&handlers, &Dispatcher::detached())
    }

    #[test]
    fn test_tree_mirrors_model() {
        let tree = tree();
        assert_eq!(tree.names(), vec!["counter.increment", "counter.sync"]);
        assert_eq!(
            tree.action("counter.increment").unwrap().kind(),
            ActionKind::Mutator
        );
        assert_eq!(tree.action("counter.sync").unwrap().kind(), ActionKind::Effect);
        assert!(tree.get("settings").is_none());
        assert!(tree.child("counter").is_some());
    }

    #[test]
    fn test_missing_action_is_an_error() {
        let tree = tree();
        assert!(matches!(
            tree.action("counter.decrement"),
            Err(Error::ActionNotFound(_))
        ));
        assert!(tree.action("counter").is_err());
    }

    #[test]
    fn test_detached_dispatch_fails() {
        let tree = tree();
        let result = tree.action("counter.increment").unwrap().call(1i64);
        assert!(matches!(result, Err(Error::StoreDropped)));
    }
}
