use super::models::{Letter, NewLetter, Reply};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Outcome of the quota-guarded letter insert. Both arms report the day's
/// send count as the insert transaction saw it, so "N / limit" display never
/// trails a concurrent send.
#[derive(Debug, Clone)]
pub enum ComposeInsert {
    Created { letter: Letter, sent_today: i64 },
    /// The sender was already at the daily limit when the insert ran.
    QuotaExceeded { sent_today: i64 },
}

pub trait LetterStore: Send + Sync {
    /// Counts letters by `sender_id` with `created_at` in `[start, end)`.
    fn count_letters_sent_between(
        &self,
        sender_id: usize,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64>;

    /// Counts the user's delivered/replied, non-archived, unread letters,
    /// the metric inbox capacity is measured against.
    fn unread_load(&self, user_id: usize) -> Result<i64>;

    /// Inserts a queued letter, re-checking the sender's daily quota inside
    /// the same transaction so a concurrent submission cannot double-pass the
    /// check. `start`/`end` bound the sender's current calendar day.
    fn create_letter_checked(
        &self,
        letter: &NewLetter,
        daily_limit: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ComposeInsert>;

    /// Returns a letter by id, or Ok(None) if unknown.
    fn get_letter(&self, letter_id: &str) -> Result<Option<Letter>>;

    /// The receiver's non-archived letters, most recently delivered first.
    fn inbox_letters(&self, receiver_id: usize) -> Result<Vec<Letter>>;

    /// The sender's letters, newest first.
    fn sent_letters(&self, sender_id: usize) -> Result<Vec<Letter>>;

    /// Ids of letters still awaiting assignment, oldest first.
    fn queued_letter_ids(&self) -> Result<Vec<String>>;

    /// Assigns a queued letter to `receiver_id` and marks it delivered,
    /// re-checking the receiver's unread load against `max_inbox_letters`
    /// inside the same transaction. Returns false (and changes nothing) if
    /// the receiver is at capacity or the letter is no longer queued.
    fn assign_letter(
        &self,
        letter_id: &str,
        receiver_id: usize,
        max_inbox_letters: i64,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Stamps `read_at` on first receiver open; later calls are no-ops.
    /// Returns whether the stamp was written by this call.
    fn mark_read(&self, letter_id: &str, receiver_id: usize, now: DateTime<Utc>) -> Result<bool>;

    /// Archives a delivered or replied letter for its receiver. Returns
    /// false (and changes nothing) if the letter is not archivable by this
    /// caller.
    fn archive_letter(
        &self,
        letter_id: &str,
        receiver_id: usize,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Inserts a reply and, if this is the first reply on a delivered
    /// letter, flips the letter's status to replied in the same transaction.
    fn add_reply(
        &self,
        letter_id: &str,
        replier_id: usize,
        content: &str,
        is_anonymous: bool,
        now: DateTime<Utc>,
    ) -> Result<Reply>;

    /// Replies on a letter, oldest first.
    fn replies_for_letter(&self, letter_id: &str) -> Result<Vec<Reply>>;
}
