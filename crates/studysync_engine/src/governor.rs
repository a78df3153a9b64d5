//! Failure classification and pause policy.

use crate::error::SyncError;
use studysync_types::Domain;

/// The classification of an error surfaced during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No network; the run is skipped, nothing is recorded as a failure.
    Connectivity,
    /// Authentication failed; automatic runs must pause.
    Auth,
    /// An isolated record-scope failure, already contained by the
    /// reconciliation batch.
    PerRecord,
    /// Anything else; surfaced and logged, never crashes the caller.
    Unknown,
}

/// Classifies run failures and decides when the scheduler must pause.
///
/// The governor is stateless policy: the scheduler owns the paused flag and
/// asks the governor what a run's aggregated errors mean. Pausing on auth
/// stops the timer from hammering the backend with doomed requests every
/// interval while credentials are invalid.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailureGovernor;

impl FailureGovernor {
    /// Classifies a single error.
    pub fn classify(error: &SyncError) -> ErrorKind {
        match error {
            SyncError::Offline => ErrorKind::Connectivity,
            SyncError::Auth { .. } => ErrorKind::Auth,
            SyncError::Remote { .. } | SyncError::Local(_) => ErrorKind::PerRecord,
            SyncError::Domain { source, .. } => Self::classify(source),
            SyncError::State(_) | SyncError::UnknownDomain(_) => ErrorKind::Unknown,
        }
    }

    /// Scans a run's per-domain errors for an auth failure.
    ///
    /// Returns the pause reason to apply, or `None` if automatic runs may
    /// continue.
    pub fn pause_reason(errors: &[(Domain, SyncError)]) -> Option<String> {
        errors
            .iter()
            .find(|(_, e)| Self::classify(e) == ErrorKind::Auth)
            .map(|(domain, e)| format!("authentication failed while syncing {domain}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(
            FailureGovernor::classify(&SyncError::Offline),
            ErrorKind::Connectivity
        );
        assert_eq!(
            FailureGovernor::classify(&SyncError::auth("token expired")),
            ErrorKind::Auth
        );
        assert_eq!(
            FailureGovernor::classify(&SyncError::remote(Some(500), "boom")),
            ErrorKind::PerRecord
        );
        assert_eq!(
            FailureGovernor::classify(&SyncError::local("disk full")),
            ErrorKind::PerRecord
        );
        assert_eq!(
            FailureGovernor::classify(&SyncError::UnknownDomain(Domain::Exam)),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn domain_wrapped_errors_classify_as_their_source() {
        let err = SyncError::for_domain(Domain::ChatSession, SyncError::auth("token expired"));
        assert_eq!(FailureGovernor::classify(&err), ErrorKind::Auth);
    }

    #[test]
    fn pause_only_on_auth() {
        let errors = vec![
            (Domain::Exam, SyncError::remote(Some(500), "boom")),
            (
                Domain::FlashcardDeck,
                SyncError::for_domain(Domain::FlashcardDeck, SyncError::auth("token expired")),
            ),
        ];

        let reason = FailureGovernor::pause_reason(&errors).unwrap();
        assert!(reason.contains("flashcardDeck"));
        assert!(reason.contains("token expired"));
    }

    #[test]
    fn no_pause_without_auth() {
        let errors = vec![(Domain::Exam, SyncError::remote(Some(503), "unavailable"))];
        assert!(FailureGovernor::pause_reason(&errors).is_none());
        assert!(FailureGovernor::pause_reason(&[]).is_none());
    }
}
