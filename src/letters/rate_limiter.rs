//! Daily send-rate limiting.
//!
//! "Today" is a calendar day in the server's local timezone, not a rolling
//! 24 hours; the bounds form a half-open interval. The check runs twice per
//! compose: an optimistic pre-check before song resolution, and a final
//! check inside the insert transaction (see `LetterStore::create_letter_checked`).

use super::store::LetterStore;
use crate::settings::DeliveryLimits;
use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};

/// Result of a rate check. `sent_today` is returned even when the send is
/// allowed, for "N / limit" display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendAllowance {
    pub allowed: bool,
    pub sent_today: i64,
}

/// The half-open `[midnight, next midnight)` interval containing `now`,
/// expressed in UTC for storage queries.
pub fn calendar_day_bounds<Tz: TimeZone>(now: DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let day = now.date_naive();
    let tz = now.timezone();
    let start_naive = day.and_hms_opt(0, 0, 0).unwrap();
    let end_naive = start_naive + chrono::Duration::days(1);
    // earliest(): on a DST gap the day starts at the first representable instant
    let start = tz
        .from_local_datetime(&start_naive)
        .earliest()
        .unwrap_or_else(|| now.clone());
    let end = tz
        .from_local_datetime(&end_naive)
        .earliest()
        .unwrap_or_else(|| start.clone() + chrono::Duration::days(1));
    (start.with_timezone(&Utc), end.with_timezone(&Utc))
}

/// Checks the sender's remaining quota for the current local calendar day.
/// A failing count query is a hard error, the limiter never fails open.
pub fn can_send(
    store: &dyn LetterStore,
    sender_id: usize,
    limits: &DeliveryLimits,
    now: DateTime<Utc>,
) -> Result<SendAllowance> {
    let (start, end) = calendar_day_bounds(now.with_timezone(&Local));
    let sent_today = store.count_letters_sent_between(sender_id, start, end)?;
    Ok(SendAllowance {
        allowed: sent_today < limits.max_daily_letters,
        sent_today,
    })
}
