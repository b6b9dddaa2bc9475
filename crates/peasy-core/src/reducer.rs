//! Update-function synthesis
//!
//! One reducer is built per namespace that has a mutator somewhere below it:
//!
//! - A namespace declaring mutators directly gets a [`Reducer::Namespace`]:
//!   a direct name match wins outright; otherwise the child reducers are
//!   tried in declaration order and the first child whose slice changes
//!   ends the walk.
//! - A namespace that only nests mutator-bearing children gets a
//!   [`Reducer::Combined`]: every child is applied to every message and each
//!   slice is replaced independently.
//! - Namespaces with no mutator below them get no reducer at all; their
//!   state is carried along untouched.

use crate::compile::{CompiledMutator, Env, Handlers};
use crate::{ActionMessage, Result, Value};
use indexmap::IndexMap;

/// The synthesized update function of one namespace
#[derive(Debug, Clone)]
pub enum Reducer {
    /// Direct mutators first, then the first child whose slice changes
    Namespace {
        /// Direct mutators keyed by action name
        mutators: IndexMap<String, CompiledMutator>,
        /// Child reducers in declaration order
        children: Vec<(String, Reducer)>,
    },
    /// Independent per-key reducers, all applied
    Combined {
        /// Child reducers keyed by state key
        children: Vec<(String, Reducer)>,
    },
}

impl Reducer {
    /// Synthesize the reducer for `handlers`, or `None` when no mutator
    /// exists in this namespace or below.
    pub fn synthesize(handlers: &Handlers) -> Option<Reducer> {
        if !handlers.has_mutators() {
            return None;
        }
        let children: Vec<(String, Reducer)> = handlers
            .namespaces()
            .filter_map(|(key, ns)| Reducer::synthesize(ns).map(|r| (key.clone(), r)))
            .collect();
        let mutators: IndexMap<String, CompiledMutator> = handlers
            .mutators()
            .map(|m| (m.name().to_string(), m.clone()))
            .collect();

        if mutators.is_empty() {
            Some(Reducer::Combined { children })
        } else {
            Some(Reducer::Namespace { mutators, children })
        }
    }

    /// Apply `msg` to `state`. An unchanged result is the same value as
    /// `state` (see [`Value::same`]).
    pub fn reduce(&self, state: &Value, msg: &ActionMessage, env: &Env) -> Result<Value> {
        match self {
            Reducer::Namespace { mutators, children } => {
                if let Some(mutator) = mutators.get(&msg.kind) {
                    return mutator.apply(state, &msg.payload, env);
                }
                for (key, child) in children {
                    let slice = slice_of(state, key);
                    let next = child.reduce(&slice, msg, env)?;
                    if !next.same(&slice) {
                        return state.with_key(key, next);
                    }
                }
                Ok(state.clone())
            }
            Reducer::Combined { children } => {
                let mut result = state.clone();
                for (key, child) in children {
                    let slice = slice_of(state, key);
                    let next = child.reduce(&slice, msg, env)?;
                    if !next.same(&slice) {
                        result = result.with_key(key, next)?;
                    }
                }
                Ok(result)
            }
        }
    }

    /// Whether this reducer handles `name` directly or through a child
    pub fn handles(&self, name: &str) -> bool {
        match self {
            Reducer::Namespace { mutators, children } => {
                mutators.contains_key(name) || children.iter().any(|(_, c)| c.handles(name))
            }
            Reducer::Combined { children } => children.iter().any(|(_, c)| c.handles(name)),
        }
    }
}

fn slice_of(state: &Value, key: &str) -> Value {
    state.child(key).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile, Handler};
    use crate::{Dispatcher, Model, Outcome};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn env() -> Env {
        Env::new(Dispatcher::detached(), Value::Null)
    }

    fn counter() -> Model {
        Model::new()
            .data("value", 0i64)
            .mutator("increment", |draft, amount, _| {
                let value = draft.get_int("value")?;
                draft.set("value", value + amount.as_int().unwrap_or(1))?;
                Ok(Outcome::Commit)
            })
    }

    fn setter(calls: Arc<AtomicUsize>) -> CompiledMutator {
        let model = Model::new().mutator("set", move |draft, payload, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            draft.set("value", payload.clone())?;
            Ok(Outcome::Commit)
        });
        let handlers = compile(&model).unwrap();
        let Some(Handler::Mutator(m)) = handlers.get("set") else {
            panic!("expected mutator");
        };
        m.clone()
    }

    #[test]
    fn test_shapes() {
        let model = Model::new()
            .mutator("reset", |_, _, _| Ok(Outcome::Commit))
            .namespace("group", Model::new().namespace("counter", counter()))
            .namespace("remote", Model::new().effect("fetch", |_, _, _| async { Ok(()) }));
        let handlers = compile(&model).unwrap();
        let reducer = Reducer::synthesize(&handlers).unwrap();
        let Reducer::Namespace { children, mutators } = &reducer else {
            panic!("root declares a mutator");
        };
        assert_eq!(mutators.len(), 1);
        // effect-only namespace gets no reducer
        assert_eq!(children.len(), 1);
        assert!(matches!(children[0].1, Reducer::Combined { .. }));
        assert!(reducer.handles("group.counter.increment"));
        assert!(!reducer.handles("remote.fetch"));
    }

    #[test]
    fn test_unknown_action_returns_same_state() {
        let model = Model::new().namespace("counter", counter());
        let handlers = compile(&model).unwrap();
        let reducer = Reducer::synthesize(&handlers).unwrap();
        let state = Value::map([("counter", Value::map([("value", 0i64)]))]);
        let next = reducer
            .reduce(&state, &ActionMessage::new("nope", Value::Null), &env())
            .unwrap();
        assert!(next.same(&state));
    }

    #[test]
    fn test_combined_keeps_data_siblings() {
        let model = Model::new().namespace(
            "group",
            Model::new().data("label", "g").namespace("counter", counter()),
        );
        let handlers = compile(&model).unwrap();
        let reducer = Reducer::synthesize(&handlers).unwrap();
        let state = Value::map([(
            "group",
            Value::map([
                ("label", Value::from("g")),
                ("counter", Value::map([("value", 0i64)])),
            ]),
        )]);
        let next = reducer
            .reduce(
                &state,
                &ActionMessage::new("group.counter.increment", 2i64),
                &env(),
            )
            .unwrap();
        assert_eq!(
            next.get_path(&"group.counter.value".into()),
            Some(&Value::Int(2))
        );
        assert_eq!(
            next.get_path(&"group.label".into()),
            Some(&Value::from("g"))
        );
    }

    #[test]
    fn test_first_changed_child_wins() {
        // Two children answering the same name cannot come out of `compile`;
        // build them by hand to pin the ordering rule.
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let child = |m: CompiledMutator| Reducer::Namespace {
            mutators: IndexMap::from([("set".to_string(), m)]),
            children: Vec::new(),
        };
        let root = Reducer::Namespace {
            mutators: IndexMap::new(),
            children: vec![
                ("a".to_string(), child(setter(first_calls.clone()))),
                ("b".to_string(), child(setter(second_calls.clone()))),
            ],
        };
        let state = Value::map([
            ("a", Value::map([("value", 0i64)])),
            ("b", Value::map([("value", 0i64)])),
        ]);
        let next = root
            .reduce(&state, &ActionMessage::new("set", 9i64), &env())
            .unwrap();

        assert_eq!(next.get_path(&"a.value".into()), Some(&Value::Int(9)));
        assert_eq!(next.get_path(&"b.value".into()), Some(&Value::Int(0)));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
        assert!(next.child("b").unwrap().same(state.child("b").unwrap()));
    }

    #[test]
    fn test_combined_applies_every_child() {
        // Same children and message as above: here both slices change
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let child = |m: CompiledMutator| Reducer::Namespace {
            mutators: IndexMap::from([("set".to_string(), m)]),
            children: Vec::new(),
        };
        let root = Reducer::Combined {
            children: vec![
                ("a".to_string(), child(setter(first_calls.clone()))),
                ("b".to_string(), child(setter(second_calls.clone()))),
            ],
        };
        let state = Value::map([
            ("a", Value::map([("value", 0i64)])),
            ("b", Value::map([("value", 0i64)])),
            ("label", Value::from("pair")),
        ]);
        let next = root
            .reduce(&state, &ActionMessage::new("set", 9i64), &env())
            .unwrap();

        assert_eq!(next.get_path(&"a.value".into()), Some(&Value::Int(9)));
        assert_eq!(next.get_path(&"b.value".into()), Some(&Value::Int(9)));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert!(next.child("label").unwrap().same(state.child("label").unwrap()));
    }

    #[test]
    fn test_unchanged_first_child_falls_through() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let child = |m: CompiledMutator| Reducer::Namespace {
            mutators: IndexMap::from([("set".to_string(), m)]),
            children: Vec::new(),
        };
        let root = Reducer::Namespace {
            mutators: IndexMap::new(),
            children: vec![
                ("a".to_string(), child(setter(first_calls.clone()))),
                ("b".to_string(), child(setter(second_calls.clone()))),
            ],
        };
        // "a" already holds the value, so its draft records nothing
        let state = Value::map([
            ("a", Value::map([("value", 9i64)])),
            ("b", Value::map([("value", 0i64)])),
        ]);
        let next = root
            .reduce(&state, &ActionMessage::new("set", 9i64), &env())
            .unwrap();
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(next.get_path(&"b.value".into()), Some(&Value::Int(9)));
    }
}
