// Error taxonomy shared by the library modules. The binary side (`ui`,
// `run`) wraps these in `anyhow` with extra context; the library keeps
// them typed so callers can tell an expected absence from a real failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reading or writing one of the local JSON files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file does not exist yet. This is the normal first-run state.
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, StoreError::Decode { .. })
    }
}

/// Failures of the interactive authorization exchange. All of them end
/// the current run.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization was cancelled")]
    Cancelled,

    #[error("failed to read the authorization code: {0}")]
    Prompt(#[source] io::Error),

    #[error("invalid OAuth client configuration: {0}")]
    Config(String),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("token exchange request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Failures building the authenticated handle.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cached credentials are unusable: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Failures talking to the remote video service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("video {0} was not found")]
    NotFound(String),

    #[error("the remote service rejected the credentials ({0}); run `ytup --clear-token` to authorize again")]
    Unauthorized(String),

    #[error("remote service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("request to the remote service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to read media file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures of the catalog listing.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Error held in one of the two upload slots.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown category `{0}`")]
    UnknownCategory(String),

    #[error("invalid publish timestamp `{value}`: {source}")]
    InvalidPublishAt {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}
