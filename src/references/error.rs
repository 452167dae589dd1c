use crate::{compilation::LibraryError, emit::LoadError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no library image at `{location}`")]
    NotFound { location: String },
    #[error("failed to read `{location}`")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bundled library `{location}` failed to build")]
    Build {
        location: String,
        #[source]
        source: LibraryError,
    },
    #[error("`{location}` is unavailable: {reason}")]
    Unavailable { location: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to fetch reference `{location}`")]
    Fetch {
        location: String,
        #[source]
        source: FetchError,
    },
    #[error("reference `{location}` is not a valid library image")]
    Malformed {
        location: String,
        #[source]
        source: LoadError,
    },
    #[error("reference `{location}` is a submission image, not a library")]
    UnexpectedKind { location: String },
    #[error("namespace `{namespace}` is provided by both `{first}` and `{second}`")]
    DuplicateNamespace {
        namespace: String,
        first: String,
        second: String,
    },
    #[error("reference loading was cancelled")]
    Cancelled,
}
