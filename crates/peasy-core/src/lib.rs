//! Peasy Core - compile a model tree into a unidirectional state store
//!
//! Application code declares one nested [`Model`]: plain data, mutators,
//! effects and namespaces. [`Store::new`] turns it into:
//! - an initial state snapshot (the data-only projection of the model)
//! - one update function merged from every namespace's mutators
//! - an [`ActionTree`] shaped like the model, whose leaves dispatch
//! - change subscriptions and an optional [`Inspector`] hook
//!
//! ## Mutators
//!
//! A mutator edits a [`Draft`] of its namespace's state as if in place.
//! The draft copies only what is written, so untouched namespaces keep
//! their identity across updates. Returning [`Outcome::Defer`] computes the
//! edit and then rolls it back (optimistic updates confirmed by a later
//! dispatch).
//!
//! ## Effects
//!
//! An effect is an async function receiving a [`Dispatcher`]. With a
//! [`Spawner`] in the [`StoreConfig`], calling an effect action starts it
//! right away. Without one the call returns its future unpolled and nothing
//! changes until the caller runs it and it dispatches mutators of its own.

mod action;
mod classify;
mod compile;
mod config;
mod draft;
mod error;
mod model;
mod msg;
mod patch;
mod path;
mod reducer;
mod store;
mod value;

pub use action::{Action, ActionKind, ActionTree};
pub use classify::{classify, classify_tree, has_actions, has_mutators, initial_state, Kind};
pub use compile::{
    compile, CompiledEffect, CompiledMutator, EffectContext, Env, Handler, Handlers,
    MutatorContext, Outcome,
};
pub use config::{Inspector, Spawner, StoreConfig};
pub use draft::Draft;
pub use error::{Error, Result};
pub use model::{EffectFn, Model, MutatorFn, Node};
pub use msg::{ActionMessage, Dispatched, Message, Task, TaskFuture};
pub use patch::{apply_patches, Patch};
pub use path::Path;
pub use reducer::Reducer;
pub use store::{Dispatcher, Listener, Store, SubscriptionId, LOG_STATE};
pub use value::{Value, ValueMap};
