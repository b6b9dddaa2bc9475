//! Store configuration, the inspection hook and the task spawner
//!
//! Inspection is opt-in twice over: `dev_tools` must be enabled and an
//! [`Inspector`] must have been supplied. Either alone attaches nothing.

use crate::{ActionMessage, Value};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Observer attached to the update pipeline for debugging and replay tools
pub trait Inspector: Send + Sync {
    /// Called once with the initial state when the store is created
    fn on_init(&self, state: &Value);

    /// Called after every applied action with the resulting state
    fn on_action(&self, msg: &ActionMessage, state: &Value);
}

/// Runs dispatched tasks in the background
///
/// With a spawner configured, dispatching a task starts it right away and
/// the caller may drop the returned handle. Any
/// `Fn(BoxFuture<'static, ()>)` closure is a spawner; with the `tokio`
/// feature so is a [`tokio::runtime::Handle`].
pub trait Spawner: Send + Sync {
    fn spawn_task(&self, task: BoxFuture<'static, ()>);
}

impl<F> Spawner for F
where
    F: Fn(BoxFuture<'static, ()>) + Send + Sync,
{
    fn spawn_task(&self, task: BoxFuture<'static, ()>) {
        self(task)
    }
}

#[cfg(feature = "tokio")]
impl Spawner for tokio::runtime::Handle {
    fn spawn_task(&self, task: BoxFuture<'static, ()>) {
        // Detached; completion is reported through Dispatched::Spawned
        drop(self.spawn(task));
    }
}

/// Configuration for [`Store::new`](crate::Store::new)
///
/// # Example
///
/// ```
/// use peasy_core::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert!(!config.dev_tools());
/// assert!(config.active_inspector().is_none());
/// assert!(config.spawner().is_none());
/// ```
#[derive(Clone, Default)]
pub struct StoreConfig {
    /// Attach the inspector, if one is available
    dev_tools: bool,
    inspector: Option<Arc<dyn Inspector>>,
    spawner: Option<Arc<dyn Spawner>>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable dev tools
    pub fn with_dev_tools(mut self, enabled: bool) -> Self {
        self.dev_tools = enabled;
        self
    }

    /// Supply the inspector used when dev tools are enabled
    pub fn with_inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Start dispatched tasks on `spawner` instead of handing them back
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn dev_tools(&self) -> bool {
        self.dev_tools
    }

    /// The inspector to attach, if dev tools are on and one was supplied
    pub fn active_inspector(&self) -> Option<Arc<dyn Inspector>> {
        if self.dev_tools {
            self.inspector.clone()
        } else {
            None
        }
    }

    pub fn spawner(&self) -> Option<Arc<dyn Spawner>> {
        self.spawner.clone()
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("dev_tools", &self.dev_tools)
            .field("inspector", &self.inspector.is_some())
            .field("spawner", &self.spawner.is_some())
            .finish()
    }
}
