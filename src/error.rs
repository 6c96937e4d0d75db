//! Error types for the widget driver.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the non-pure parts of the driver (the registry, the
/// orchestrator and its collaborators).
///
/// The reducer itself never returns this type -- it encodes failures as
/// [`crate::state_machine::Action::SendToWidget`] error actions instead (see
/// [`ErrorCode`]).
#[derive(Debug, Error)]
pub enum Error {
    /// [`crate::pending::PendingRegistry::insert`] was called with the registry
    /// already at capacity.
    #[error("too many pending requests (max {max})")]
    TooManyPending {
        /// The configured capacity that was exceeded.
        max: usize,
    },

    /// Catch-all for collaborator failures (transport faults, client RPC
    /// errors) that don't warrant their own variant.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Build a [`Error::Custom`] from anything string-like.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// The `M_*` error codes surfaced to a widget in an `error` action's
/// `data.code` field (see spec §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Missing capability, or a crypto event was targeted by `send_event`/`send_to_device`.
    Forbidden,
    /// Malformed request body or missing required fields.
    InvalidRequest,
    /// Read of an absent event or piece of state.
    NotFound,
    /// [`crate::pending::PendingRegistry`] is at capacity.
    LimitExceeded,
    /// A pending request expired before it was answered.
    Timeout,
    /// The transport faulted while an action was being executed.
    TransportError,
    /// The action was received while the machine was in the wrong capability state.
    InvalidState,
    /// Unknown action, or a recognized action that isn't supported.
    Unrecognized,
    /// Uncategorized failure during action dispatch (orchestrator-side).
    Unknown,
}

impl ErrorCode {
    /// The wire form of this code, as sent in `data.code`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forbidden => "M_FORBIDDEN",
            Self::InvalidRequest => "M_INVALID_REQUEST",
            Self::NotFound => "M_NOT_FOUND",
            Self::LimitExceeded => "M_LIMIT_EXCEEDED",
            Self::Timeout => "M_TIMEOUT",
            Self::TransportError => "M_TRANSPORT_ERROR",
            Self::InvalidState => "M_INVALID_STATE",
            Self::Unrecognized => "M_UNRECOGNIZED",
            Self::Unknown => "M_UNKNOWN",
        }
    }

    /// Whether a request that failed with this code is safe to retry.
    ///
    /// `TransportError` and `Timeout` are always retriable; everything else
    /// (including `LimitExceeded`, which carries an explicit `retry_after_ms`
    /// instead) is treated as fatal for that request (spec §7).
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::TransportError | Self::Timeout)
    }
}
