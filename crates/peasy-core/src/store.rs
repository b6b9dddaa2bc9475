//! Store assembly and the dispatch pipeline
//!
//! The store owns the current state snapshot and applies one action at a
//! time. A dispatching thread takes the writer turn, applies its action and
//! then drains the follow-ups queued by its own call stack (dispatches made
//! from inside a mutator or a listener) in FIFO order. Dispatches from other
//! threads wait for the writer turn and get their own result.
//!
//! Tasks never hold the writer turn. With a [`Spawner`] configured they are
//! started immediately; otherwise the caller gets the future and decides
//! where to run it.

use crate::action::{Action, ActionTree};
use crate::classify::initial_state;
use crate::compile::{compile, Env};
use crate::config::{Inspector, Spawner, StoreConfig};
use crate::reducer::Reducer;
use crate::{
    ActionMessage, Dispatched, Draft, Error, Message, Model, MutatorContext, Node, Outcome, Path,
    Result, TaskFuture, Value,
};
use futures::channel::oneshot;
use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};

/// Key of the diagnostic mutator injected at the root of every store
pub const LOG_STATE: &str = "logState";

/// A change listener
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`Store::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
struct Pipeline {
    /// Follow-ups dispatched by the writer's own call stack
    pending: VecDeque<ActionMessage>,
    /// Thread holding the writer turn
    owner: Option<ThreadId>,
}

/// The right to apply actions, held for one top-level dispatch
struct WriterTurn<'a> {
    pipeline: &'a Mutex<Pipeline>,
    _writer: MutexGuard<'a, ()>,
}

impl<'a> WriterTurn<'a> {
    /// Block until no other thread is applying actions
    fn take(inner: &'a Inner, thread: ThreadId) -> Self {
        let writer = inner.writer.lock();
        inner.pipeline.lock().owner = Some(thread);
        Self {
            pipeline: &inner.pipeline,
            _writer: writer,
        }
    }

    fn next(&self) -> Option<ActionMessage> {
        self.pipeline.lock().pending.pop_front()
    }

    /// Drop the remaining follow-ups and return how many there were
    fn discard(&self) -> usize {
        let mut pipeline = self.pipeline.lock();
        let dropped = pipeline.pending.len();
        pipeline.pending.clear();
        dropped
    }
}

impl Drop for WriterTurn<'_> {
    fn drop(&mut self) {
        let mut pipeline = self.pipeline.lock();
        pipeline.owner = None;
        pipeline.pending.clear();
    }
}

struct Inner {
    state: RwLock<Value>,
    reducer: Option<Reducer>,
    actions: ActionTree,
    table: IndexMap<String, Path>,
    pipeline: Mutex<Pipeline>,
    writer: Mutex<()>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    inspector: Option<Arc<dyn Inspector>>,
    spawner: Option<Arc<dyn Spawner>>,
}

/// A compiled model: state, dispatch, subscriptions and the action tree
///
/// # Example
///
/// ```
/// use peasy_core::{Model, Outcome, Store, StoreConfig, Value};
///
/// let model = Model::new().namespace(
///     "counter",
///     Model::new()
///         .data("value", 0i64)
///         .mutator("increment", |draft, amount, _| {
///             let value = draft.get_int("value")?;
///             draft.set("value", value + amount.as_int().unwrap_or(1))?;
///             Ok(Outcome::Commit)
///         }),
/// );
/// let store = Store::new(model, StoreConfig::default()).unwrap();
/// store.action("counter.increment").unwrap().call(5i64).unwrap();
///
/// let expected = Value::map([("counter", Value::map([("value", 5i64)]))]);
/// assert_eq!(store.get_state(), expected);
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Compile `model` into a store
    pub fn new(model: Model, config: StoreConfig) -> Result<Store> {
        let model = with_log_state(model)?;
        let initial = initial_state(&model);
        let handlers = compile(&model)?;
        let reducer = Reducer::synthesize(&handlers);
        let table = handlers.action_table();
        let inspector = config.active_inspector();
        debug!(
            actions = table.len(),
            dev_tools = inspector.is_some(),
            "compiled store"
        );

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let dispatcher = Dispatcher {
                inner: weak.clone(),
            };
            Inner {
                state: RwLock::new(initial),
                reducer,
                actions: ActionTree::build(&handlers, &dispatcher),
                table,
                pipeline: Mutex::new(Pipeline::default()),
                writer: Mutex::new(()),
                listeners: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(0),
                inspector,
                spawner: config.spawner(),
            }
        });
        if let Some(inspector) = &inner.inspector {
            inspector.on_init(&inner.state.read());
        }
        Ok(Store { inner })
    }

    /// Dispatch an action or a task
    pub fn dispatch(&self, message: impl Into<Message>) -> Result<Dispatched> {
        self.inner.dispatch(message.into())
    }

    /// The current state snapshot
    pub fn get_state(&self) -> Value {
        self.inner.state.read().clone()
    }

    /// Register a listener called after every applied action
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// The root of the action tree
    pub fn actions(&self) -> &ActionTree {
        &self.inner.actions
    }

    /// A single action by path, e.g. `"counter.increment"`
    pub fn action(&self, path: impl Into<Path>) -> Result<&Action> {
        self.inner.actions.action(path)
    }

    /// Shorthand for `action(path)?.call(payload)`
    pub fn call(&self, path: impl Into<Path>, payload: impl Into<Value>) -> Result<Dispatched> {
        self.action(path)?.call(payload)
    }

    /// Action name to path of every compiled mutator and effect
    pub fn action_table(&self) -> &IndexMap<String, Path> {
        &self.inner.table
    }

    /// A weak handle for effects and background tasks
    pub fn dispatcher(&self) -> Dispatcher {
        self.inner.dispatcher()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("actions", &self.inner.table.len())
            .field("listeners", &self.inner.listeners.lock().len())
            .finish()
    }
}

impl Inner {
    fn dispatcher(self: &Arc<Self>) -> Dispatcher {
        Dispatcher {
            inner: Arc::downgrade(self),
        }
    }

    fn dispatch(self: &Arc<Self>, message: Message) -> Result<Dispatched> {
        match message {
            Message::Task(task) => Ok(self.start(task(self.dispatcher()))),
            Message::Action(msg) => {
                let me = thread::current().id();
                {
                    let mut pipeline = self.pipeline.lock();
                    if pipeline.owner == Some(me) {
                        pipeline.pending.push_back(msg);
                        return Ok(Dispatched::Queued);
                    }
                }
                let turn = WriterTurn::take(self, me);
                let mut current = msg;
                loop {
                    if let Err(err) = self.apply(&current) {
                        let dropped = turn.discard();
                        warn!(action = %current.kind, dropped, error = %err, "dispatch failed");
                        return Err(err);
                    }
                    match turn.next() {
                        Some(next) => current = next,
                        None => return Ok(Dispatched::Applied),
                    }
                }
            }
        }
    }

    fn start(&self, task: TaskFuture) -> Dispatched {
        let Some(spawner) = &self.spawner else {
            trace!("handing out task");
            return Dispatched::Task(task);
        };
        let (done, finished) = oneshot::channel();
        spawner.spawn_task(
            async move {
                if let Err(Err(err)) = done.send(task.await) {
                    warn!(error = %err, "spawned task failed");
                }
            }
            .boxed(),
        );
        trace!("spawned task");
        Dispatched::Spawned(finished)
    }

    fn apply(self: &Arc<Self>, msg: &ActionMessage) -> Result<()> {
        let state = self.state.read().clone();
        let next = match &self.reducer {
            Some(reducer) => {
                let env = Env::new(self.dispatcher(), state.clone());
                reducer.reduce(&state, msg, &env)?
            }
            None => state.clone(),
        };
        if !self.table.contains_key(&msg.kind) {
            debug!(action = %msg.kind, "no action registered under this name");
        }

        let changed = !next.same(&state);
        trace!(action = %msg.kind, changed, "applied action");
        if changed {
            *self.state.write() = next.clone();
        }
        if let Some(inspector) = &self.inspector {
            inspector.on_action(msg, &next);
        }
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

/// A cloneable, non-owning handle to a store
///
/// Effects receive one; it stops working once the store is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Weak<Inner>,
}

impl Dispatcher {
    /// A handle bound to no store
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    fn upgrade(&self) -> Result<Arc<Inner>> {
        self.inner.upgrade().ok_or(Error::StoreDropped)
    }

    /// Dispatch an action or a task
    pub fn dispatch(&self, message: impl Into<Message>) -> Result<Dispatched> {
        self.upgrade()?.dispatch(message.into())
    }

    /// Call the action at `path`
    pub fn call(&self, path: impl Into<Path>, payload: impl Into<Value>) -> Result<Dispatched> {
        let inner = self.upgrade()?;
        let action = inner.actions.action(path)?.clone();
        drop(inner);
        action.call(payload)
    }

    /// The store's current state snapshot
    pub fn get_state(&self) -> Result<Value> {
        Ok(self.upgrade()?.state.read().clone())
    }

    /// Whether the store is still alive
    pub fn is_attached(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Add the root `logState` mutator, which prints the whole state as JSON
fn with_log_state(mut model: Model) -> Result<Model> {
    if model.contains_key(LOG_STATE) {
        return Err(Error::ActionNameCollision {
            name: Path::root().action_name(LOG_STATE),
            first: format!("{:?}", [LOG_STATE]),
            second: "<built-in>".to_string(),
        });
    }
    model.insert(
        LOG_STATE,
        Node::Mutator(Arc::new(
            |draft: &mut Draft, _payload: &Value, _ctx: &MutatorContext| -> Result<Outcome> {
                let text = serde_json::to_string_pretty(draft.current())
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                println!("{}", text);
                Ok(Outcome::Commit)
            },
        )),
    );
    Ok(model)
}
