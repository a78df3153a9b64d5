//! Record domains.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the independently-synchronized record collections.
///
/// Each domain has its own local store and remote client; domains never
/// share records and are reconciled independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    /// Completed exam attempts.
    #[serde(rename = "exam")]
    Exam,
    /// Flashcard decks.
    #[serde(rename = "flashcardDeck")]
    FlashcardDeck,
    /// Chat sessions.
    #[serde(rename = "chatSession")]
    ChatSession,
}

impl Domain {
    /// All domains, in the order they are reconciled.
    pub const ALL: [Domain; 3] = [Domain::Exam, Domain::FlashcardDeck, Domain::ChatSession];

    /// Returns the wire name of the domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Exam => "exam",
            Domain::FlashcardDeck => "flashcardDeck",
            Domain::ChatSession => "chatSession",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
