//! Errors raised by channels, guards and the choice operator, and the error
//! type returned by process bodies.
//!
//! Only three conditions ever cross a process boundary: [`ChannelError::Poisoned`],
//! [`ChannelError::NoGuardInAlt`] and application failures ([`ProcessError::Failed`]).
//! All three are caught by the process wrapper (see [`process`](crate::process)),
//! which cascades poison or reports the failure.

use std::error::Error as StdError;

/// Failure of a channel, guard or [`Alt`](crate::alt::Alt) operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// The channel (or guard) has been permanently terminated.
    #[error("poisoned channel")]
    Poisoned,
    /// [`Alt`](crate::alt::Alt) was asked to choose among zero guards.
    #[error("every Alt must have at least one guard")]
    NoGuardInAlt,
    /// An authenticated channel received a message whose tag failed to verify.
    #[error("data sent with incorrect authentication key")]
    CorruptedData,
    /// A byte codec could not encode or decode a value.
    #[error("codec error: {0}")]
    Codec(String),
}

impl ChannelError {
    pub fn is_poisoned(&self) -> bool {
        matches!(self, ChannelError::Poisoned)
    }
}

impl From<bincode::Error> for ChannelError {
    fn from(err: bincode::Error) -> Self {
        ChannelError::Codec(err.to_string())
    }
}

/// What a process body may fail with.
///
/// Channel errors convert with `?`; anything else implementing [`std::error::Error`]
/// can be wrapped with [`ProcessError::failed`].
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("process failed: {0}")]
    Failed(#[source] Box<dyn StdError + Send + Sync>),
}

impl ProcessError {
    pub fn failed(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        ProcessError::Failed(err.into())
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(self, ProcessError::Channel(ChannelError::Poisoned))
    }
}

pub type Result<T, E = ChannelError> = std::result::Result<T, E>;
