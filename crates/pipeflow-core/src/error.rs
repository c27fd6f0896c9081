//! Error types for the pipeflow execution and interface-binding engine.
//!
//! Every kind here corresponds to a row in the spec's error-kind table: each
//! carries a diagnostic message and none are silently swallowed. Propagation
//! policy lives with the callers (`pipeflow-exec`), not here — this module
//! only defines the vocabulary.

use std::fmt;

/// Errors raised while parsing, binding, or executing pipes.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The annotation parser rejected a pipe's declared signature.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Declared inputs did not match a pipe's slot names.
    #[error("invalid input assignment: {0}")]
    InvalidInputAssignment(String),

    /// A required slot has no block, or no slot has new work this
    /// iteration.
    #[error("input exhausted: {0}")]
    InputExhausted(String),

    /// No runtime in the execution context matches the pipe's
    /// compatibility set.
    #[error("no compatible runtime for pipe `{0}`")]
    NoCompatibleRuntime(String),

    /// The pipe has no definition for the selected runtime class.
    #[error("no definition for pipe `{pipe_key}` on runtime class {runtime_class:?}")]
    NoSuchDefinition {
        pipe_key: String,
        runtime_class: crate::context::RuntimeClass,
    },

    /// The Worker was asked to conform output with `target_storage = None`.
    #[error("missing target storage for node `{0}`")]
    MissingTargetStorage(String),

    /// A pipe returned a value that does not match its declared output
    /// format class.
    #[error("unsupported output type for pipe `{pipe_key}`: {detail}")]
    UnsupportedOutputType { pipe_key: String, detail: String },

    /// The pipe callable raised/returned an error.
    #[error("pipe `{node_key}` failed: {message}")]
    PipeFailure { node_key: String, message: String },
}

impl CoreError {
    /// True for the one error kind the run loop recovers from internally
    /// (see §7 propagation policy).
    pub fn is_input_exhausted(&self) -> bool {
        matches!(self, CoreError::InputExhausted(_))
    }
}

/// `{message, traceback}` captured on a `PipeLog` when a pipe invocation
/// fails. The traceback is truncated to 5000 characters, mirroring the
/// source behavior (`dags.core.node.PipeLog.set_error`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipeError {
    pub message: String,
    pub traceback: String,
}

impl PipeError {
    pub fn new(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        let mut traceback = traceback.into();
        traceback.truncate(5000);
        Self {
            message: message.into(),
            traceback,
        }
    }
}

impl fmt::Display for PipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
