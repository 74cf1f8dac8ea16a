//! Error handling for the packetflow runtime.
//!
//! Construction and lifecycle failures propagate to the caller; per-cycle
//! failures (cast misses, arity gates, panicking component methods) are
//! contained by the dispatcher, logged, and surfaced as an empty output
//! packet for that cycle.

use thiserror::Error;

/// Main error type for packetflow operations.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The node registry has no entry under this name.
    #[error("Unknown node type: {0}")]
    UnknownNode(String),

    /// A registered constructor could not produce a component.
    #[error("Construction error for '{node}': {message}")]
    Construction { node: String, message: String },

    /// Graph wiring is inconsistent (e.g. connecting an unbuilt upstream).
    #[error("Wiring error: {0}")]
    Wiring(String),

    /// A payload could not be cast or converted to the declared type.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A method was handed the wrong number of input packets.
    #[error("Method '{method}' expects {expected} inputs, got {got}")]
    Arity {
        method: String,
        expected: usize,
        got: usize,
    },

    /// No method with this name is registered on the component.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// A component method failed while executing.
    #[error("Invocation of '{method}' failed: {message}")]
    Invocation { method: String, message: String },

    /// An `Open`/`Close` hook failed.
    #[error("Lifecycle error in '{node}': {message}")]
    Lifecycle { node: String, message: String },

    /// Generic errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for packetflow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
