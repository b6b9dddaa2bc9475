//! Messages accepted by the store's dispatch entry point

use crate::{Dispatcher, Error, Result, Value};
use futures::channel::oneshot;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The future produced by running a task
pub type TaskFuture = BoxFuture<'static, Result<()>>;

/// A deferred unit of asynchronous work. It receives a dispatcher when the
/// store accepts it and returns the future that performs the work.
pub type Task = Box<dyn FnOnce(Dispatcher) -> TaskFuture + Send>;

/// A request to run the mutator registered under `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    /// Action name of the target mutator
    #[serde(rename = "type")]
    pub kind: String,
    /// Argument passed to the mutator
    pub payload: Value,
}

impl ActionMessage {
    /// Create a new action message
    pub fn new(kind: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

/// Anything that can be dispatched
pub enum Message {
    /// Run a mutator against the current state
    Action(ActionMessage),
    /// Hand a task to the async middleware
    Task(Task),
}

impl Message {
    /// Create an action message
    pub fn action(kind: impl Into<String>, payload: impl Into<Value>) -> Self {
        Message::Action(ActionMessage::new(kind, payload))
    }

    /// Create a task message from a closure
    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce(Dispatcher) -> TaskFuture + Send + 'static,
    {
        Message::Task(Box::new(f))
    }
}

impl From<ActionMessage> for Message {
    fn from(msg: ActionMessage) -> Self {
        Message::Action(msg)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Action(msg) => f.debug_tuple("Action").field(msg).finish(),
            Message::Task(_) => f.write_str("Task(..)"),
        }
    }
}

/// What a dispatch call produced
pub enum Dispatched {
    /// The action was run and the state updated (or left unchanged)
    Applied,
    /// Dispatched from inside a running update; the action runs after it
    Queued,
    /// The task's future, returned when the store has no spawner.
    /// Nothing runs until it is polled.
    Task(TaskFuture),
    /// The task is already running on the configured spawner; the receiver
    /// resolves with its result. Dropping it does not stop the task.
    Spawned(oneshot::Receiver<Result<()>>),
}

impl Dispatched {
    /// Check whether this is a pending task
    pub fn is_task(&self) -> bool {
        matches!(self, Dispatched::Task(_))
    }

    /// Take the task future, if any
    pub fn into_task(self) -> Option<TaskFuture> {
        match self {
            Dispatched::Task(fut) => Some(fut),
            _ => None,
        }
    }

    /// Check whether the task was started on a spawner
    pub fn is_spawned(&self) -> bool {
        matches!(self, Dispatched::Spawned(_))
    }

    /// Run a task to completion, or wait for a spawned one; resolves
    /// immediately for actions
    pub async fn settle(self) -> Result<()> {
        match self {
            Dispatched::Task(fut) => fut.await,
            Dispatched::Spawned(done) => done
                .await
                .unwrap_or_else(|_| Err(Error::effect("spawned task was dropped before finishing"))),
            Dispatched::Applied | Dispatched::Queued => Ok(()),
        }
    }
}

impl fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatched::Applied => f.write_str("Applied"),
            Dispatched::Queued => f.write_str("Queued"),
            Dispatched::Task(_) => f.write_str("Task(..)"),
            Dispatched::Spawned(_) => f.write_str("Spawned(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_message_wire_shape() {
        let msg = ActionMessage::new("counter.increment", 5i64);
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"counter.increment","payload":5}"#);
    }

    #[test]
    fn test_settle_without_task() {
        let result = futures::executor::block_on(Dispatched::Applied.settle());
        assert!(result.is_ok());
        assert!(!Dispatched::Queued.is_task());
    }

    #[test]
    fn test_settle_spawned() {
        let (tx, rx) = oneshot::channel();
        tx.send(Err(Error::effect("offline"))).unwrap();
        let err = futures::executor::block_on(Dispatched::Spawned(rx).settle()).unwrap_err();
        assert!(matches!(err, Error::Effect(_)));

        // the spawner dropped the task without running it
        let (tx, rx) = oneshot::channel::<Result<()>>();
        drop(tx);
        let dispatched = Dispatched::Spawned(rx);
        assert!(dispatched.is_spawned());
        assert!(futures::executor::block_on(dispatched.settle()).is_err());
    }
}
