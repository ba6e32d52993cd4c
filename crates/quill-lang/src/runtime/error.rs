use crate::value::Name;
use std::fmt;
use thiserror::Error;

/// The operation that required a blessed function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Call,
    Bind,
    Pipe,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Call => write!(f, "call"),
            Action::Bind => write!(f, "bind"),
            Action::Pipe => write!(f, "pipe to"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Module \"{0}\" not resolved")]
    ModuleNotResolved(Name),
    #[error("Attempting to {action} an unblessed function")]
    NotBlessed { action: Action, type_name: &'static str },
    #[error("Pipe function \"{0}\" not found")]
    PipeNotFound(Name),
    #[error("{0}")]
    Host(String),
}

impl RuntimeError {
    /// Creates an error reported by a host function.
    pub fn host(message: impl Into<String>) -> Self {
        RuntimeError::Host(message.into())
    }
}
