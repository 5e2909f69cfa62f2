use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a letter.
///
/// Transitions are monotonic: queued → delivered → (replied | archived),
/// replied → archived. Archived is terminal. A letter is queued iff it has
/// no receiver assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterStatus {
    Queued,
    Delivered,
    Replied,
    Archived,
}

impl LetterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterStatus::Queued => "queued",
            LetterStatus::Delivered => "delivered",
            LetterStatus::Replied => "replied",
            LetterStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<LetterStatus> {
        match s {
            "queued" => Some(LetterStatus::Queued),
            "delivered" => Some(LetterStatus::Delivered),
            "replied" => Some(LetterStatus::Replied),
            "archived" => Some(LetterStatus::Archived),
            _ => None,
        }
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: LetterStatus) -> bool {
        matches!(
            (self, next),
            (LetterStatus::Queued, LetterStatus::Delivered)
                | (LetterStatus::Delivered, LetterStatus::Replied)
                | (LetterStatus::Delivered, LetterStatus::Archived)
                | (LetterStatus::Replied, LetterStatus::Archived)
        )
    }

    /// Delivered and replied letters count against the receiver's unread
    /// load while unread and unarchived.
    pub fn counts_toward_inbox(&self) -> bool {
        matches!(self, LetterStatus::Delivered | LetterStatus::Replied)
    }
}

/// A song letter: one track plus a message, sent toward a randomly
/// selected recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Letter {
    pub id: String,
    pub sender_id: usize,
    pub receiver_id: Option<usize>,
    pub song_id: String,
    /// Name shown to the receiver; the profile username or an anonymous label.
    pub sender_name: String,
    pub is_anonymous: bool,
    pub message: String,
    pub status: LetterStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Letter {
    pub fn is_visible_to(&self, user_id: usize) -> bool {
        self.sender_id == user_id || self.receiver_id == Some(user_id)
    }
}

/// Letter fields known at compose time. Letters are always created queued
/// and unassigned; the recipient selector assigns them afterwards.
#[derive(Debug, Clone)]
pub struct NewLetter {
    pub sender_id: usize,
    pub song_id: String,
    pub sender_name: String,
    pub is_anonymous: bool,
    pub message: String,
}

/// An immutable reply from the receiver; the first reply on a letter moves
/// it from delivered to replied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub letter_id: String,
    pub replier_id: usize,
    pub content: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}
