//! Error taxonomy shared by the provider client, stores and player

use thiserror::Error;

use crate::models::MediaKind;

/// Credential fields that cannot be turned into a usable provider address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("provider URL is empty")]
    EmptyUrl,
    #[error("provider URL has no host: {0}")]
    MissingHost(String),
    #[error("username is empty")]
    EmptyUsername,
    #[error("password is empty")]
    EmptyPassword,
}

/// Transport or payload failure talking to the provider. Always retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("{action}: request failed: {reason}")]
    Transport { action: String, reason: String },
    #[error("{action}: provider returned HTTP {status}")]
    Status { action: String, status: u16 },
    #[error("{action}: malformed response: {reason}")]
    Decode { action: String, reason: String },
}

/// Authentication outcome that is not a session.
///
/// `Rejected` means the provider answered and said no; `Network` means we never got
/// a usable answer. The two are kept apart so callers can decide whether to ask for
/// new credentials or just retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("credentials rejected by provider{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Rejected { message: Option<String> },
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Raw record that cannot become a `MediaItem`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("{kind} record has no identifier")]
    MissingId { kind: MediaKind },
    #[error("{kind} record {id} has no title")]
    MissingTitle { kind: MediaKind, id: String },
}

/// Persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Terminal failure of one playback session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("no playback path for this source (decoder unsupported, no native support)")]
    UnsupportedFormat,
    #[error("fatal decoder error: {0}")]
    Fatal(String),
    #[error("media sink error: {0}")]
    Sink(String),
    #[error("source did not start within {0:?}")]
    Timeout(std::time::Duration),
    #[error("stream kept stalling ({0} recoverable errors)")]
    Stalled(u32),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("{0} has no playable source")]
    NotPlayable(String),
    #[error("no {kind} item with id {id}")]
    UnknownItem { kind: MediaKind, id: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
