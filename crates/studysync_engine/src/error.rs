//! Error types for the sync engine.

use studysync_types::Domain;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No network connectivity; runs are skipped, not failed.
    #[error("offline")]
    Offline,

    /// Authentication failed (HTTP 401-class).
    #[error("authentication failed ({status}): {message}")]
    Auth {
        /// HTTP-style status code, normally 401.
        status: u16,
        /// Server-provided detail.
        message: String,
    },

    /// A remote operation failed.
    #[error("remote error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Remote {
        /// HTTP-style status code, if the request got that far.
        status: Option<u16>,
        /// Failure description.
        message: String,
    },

    /// A local storage operation failed.
    #[error("local store error: {0}")]
    Local(String),

    /// A domain's snapshot fetch failed; other domains still run.
    #[error("sync failed for domain {domain}: {source}")]
    Domain {
        /// The domain whose fetch failed.
        domain: Domain,
        /// The underlying failure.
        #[source]
        source: Box<SyncError>,
    },

    /// Persisted sync state could not be read or written.
    #[error("state error: {0}")]
    State(#[from] studysync_state::StateError),

    /// The domain has no registered store/client pair.
    #[error("no stores registered for domain {0}")]
    UnknownDomain(Domain),
}

impl SyncError {
    /// Creates an auth error with the conventional 401 status.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            status: 401,
            message: message.into(),
        }
    }

    /// Creates a remote error from an optional status code.
    ///
    /// A 401-class status is promoted to [`SyncError::Auth`] so auth
    /// failures classify the same way wherever they surface.
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        match status {
            Some(401) => Self::Auth {
                status: 401,
                message: message.into(),
            },
            _ => Self::Remote {
                status,
                message: message.into(),
            },
        }
    }

    /// Creates a local store error.
    pub fn local(message: impl Into<String>) -> Self {
        Self::Local(message.into())
    }

    /// Wraps an error as a whole-domain failure.
    pub fn for_domain(domain: Domain, source: SyncError) -> Self {
        Self::Domain {
            domain,
            source: Box::new(source),
        }
    }

    /// Returns true if this error (or its domain-wrapped source) is an
    /// authentication failure.
    pub fn is_auth(&self) -> bool {
        match self {
            SyncError::Auth { .. } => true,
            SyncError::Domain { source, .. } => source.is_auth(),
            _ => false,
        }
    }
}
