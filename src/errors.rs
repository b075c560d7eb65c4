use std::fmt;
use thiserror::Error;

/// Construction and lifecycle errors.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum PoolError {
    #[error("callback is nil")]
    CallbackMissing,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("receive started")]
    RecvStarted,
    #[error("receive not started")]
    RecvNotStarted,
    #[error("no tokio runtime to spawn workers on")]
    NoRuntime,
    #[error("pool terminated")]
    Terminated,
}

/// Rejected submission. The value is handed back so the caller can retry or drop it.
#[derive(Error, PartialEq, Eq, Clone, Copy)]
pub enum SendError<T> {
    #[error("chan block")]
    Block(T),
    #[error("pool terminated")]
    Terminated(T),
}

impl<T> SendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SendError::Block(v) | SendError::Terminated(v) => v,
        }
    }

    #[inline]
    pub fn is_block(&self) -> bool {
        matches!(self, SendError::Block(_))
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Block(_) => f.write_str("Block(..)"),
            SendError::Terminated(_) => f.write_str("Terminated(..)"),
        }
    }
}

pub type Result<T = ()> = std::result::Result<T, PoolError>;
