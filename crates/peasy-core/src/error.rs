//! Error types for peasy-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Two different model paths compile to the same action name
    #[error("action name collision: {name:?} declared at both {first} and {second}")]
    ActionNameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    /// A user mutator failed; the edit session was discarded
    #[error("mutator {action} failed: {message}")]
    Mutator { action: String, message: String },

    /// A user effect failed inside its task
    #[error("effect failed: {0}")]
    Effect(String),

    /// A dispatcher handle was used after its store was dropped
    #[error("store has been dropped")]
    StoreDropped,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build a mutator failure for the given action name
    pub fn mutator(action: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Mutator {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Build an effect failure
    pub fn effect(message: impl Into<String>) -> Self {
        Error::Effect(message.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

// Fails to compile if Error loses Send + Sync; effect futures carry it across threads.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
