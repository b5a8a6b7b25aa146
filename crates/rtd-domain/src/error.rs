use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every layer of the dialogue pipeline.
///
/// Only [`Error::GeneratorFailed`] ever becomes a client-visible `error`
/// event; the rest are trapped by the component that produced them.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed inbound JSON or an out-of-range control value.
    #[error("invalid control: {0}")]
    InvalidControl(String),

    /// Connect to a session id the registry does not hold.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// An upstream generator failed mid-turn.
    #[error("{stage} generator failed: {message}")]
    GeneratorFailed { stage: &'static str, message: String },

    /// Turn cancelled by interrupt or a fresh `user_text`. Never surfaced
    /// to the client as an event.
    #[error("turn cancelled")]
    Cancelled,

    /// The client transport went away.
    #[error("transport lost: {0}")]
    TransportLost(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The wire `code` field for client-visible `error` events.
    ///
    /// [`Error::Cancelled`] has no wire code: callers must not emit an
    /// event for it.
    pub fn wire_code(&self) -> &'static str {
        match self {
            Error::InvalidControl(_) => "input_invalid",
            Error::SessionNotFound(_) => "session_not_found",
            Error::GeneratorFailed { .. } => "turn_error",
            Error::Cancelled => "cancelled",
            Error::TransportLost(_) => "transport_lost",
            Error::Io(_) => "io_error",
            Error::Json(_) => "input_invalid",
        }
    }
}
