//! Letter delivery orchestration.
//!
//! `DeliveryService` drives the compose flow (validate → rate pre-check →
//! song upsert → quota-guarded insert → delivery attempt), the receiver-side
//! lifecycle operations (read, reply, archive) with ownership guards, and the
//! periodic sweep that retries queued letters once inbox capacity frees up.

use super::error::LetterError;
use super::models::{Letter, NewLetter, Reply};
use super::rate_limiter::{calendar_day_bounds, can_send, SendAllowance};
use super::selector::{CandidateLoad, RecipientSelectionPolicy};
use super::store::ComposeInsert;
use crate::server::metrics;
use crate::settings::DeliveryLimits;
use crate::songs::{extract_track_id, NewSong, Provider};
use crate::store::ComusicStore;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ANONYMOUS_SENDER_NAME: &str = "Anonymous";

/// An artist attribution supplied with a compose request (optional
/// enrichment; failures never abort the send).
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeArtist {
    pub name: String,
    pub provider_artist_id: String,
}

/// A compose request as it arrives from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeRequest {
    pub provider: Provider,
    /// Share URL or bare provider track id.
    pub track_input: String,
    pub title: String,
    pub message: String,
    pub is_anonymous: bool,
    #[serde(default)]
    pub artists: Vec<ComposeArtist>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

/// What happened to a composed letter.
#[derive(Debug, Clone, Serialize)]
pub struct ComposeOutcome {
    pub letter: Letter,
    pub sent_today: i64,
    pub assigned: bool,
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub assigned: bool,
    pub receiver_id: Option<usize>,
}

pub struct DeliveryService {
    store: Arc<dyn ComusicStore>,
    policy: Box<dyn RecipientSelectionPolicy>,
}

impl DeliveryService {
    pub fn new(store: Arc<dyn ComusicStore>, policy: Box<dyn RecipientSelectionPolicy>) -> Self {
        info!("Recipient selection policy: {}", policy.name());
        Self { store, policy }
    }

    /// Current quota usage for display ("N / limit sent").
    pub fn send_allowance(
        &self,
        sender_id: usize,
        now: DateTime<Utc>,
    ) -> Result<(SendAllowance, DeliveryLimits), LetterError> {
        let limits = self.store.delivery_limits()?;
        let allowance = can_send(self.store.as_letter_store(), sender_id, &limits, now)?;
        Ok((allowance, limits))
    }

    /// Composes a new letter for `sender_id` and attempts delivery.
    ///
    /// The rate limiter runs twice: optimistically here, before song
    /// resolution, and again inside the insert transaction. A failed
    /// delivery attempt leaves the letter queued for the sweep.
    pub fn compose(
        &self,
        sender_id: usize,
        request: &ComposeRequest,
        now: DateTime<Utc>,
    ) -> Result<ComposeOutcome, LetterError> {
        if request.message.trim().is_empty() {
            return Err(LetterError::validation("Message must not be empty"));
        }
        if request.title.trim().is_empty() {
            return Err(LetterError::validation("Song title must not be empty"));
        }
        let track_id = extract_track_id(request.provider, &request.track_input)
            .ok_or_else(|| LetterError::validation("Song URL or id must not be empty"))?;

        let profile = self
            .store
            .get_profile(sender_id)?
            .ok_or(LetterError::Forbidden)?;
        let sender_name = if request.is_anonymous {
            ANONYMOUS_SENDER_NAME.to_string()
        } else {
            profile.username.clone()
        };

        let limits = self.store.delivery_limits()?;
        let pre_check = can_send(self.store.as_letter_store(), sender_id, &limits, now)?;
        if !pre_check.allowed {
            metrics::QUOTA_REJECTIONS_TOTAL.inc();
            return Err(LetterError::QuotaExceeded {
                sent_today: pre_check.sent_today,
                limit: limits.max_daily_letters,
            });
        }

        let trimmed_input = request.track_input.trim();
        let url = if trimmed_input.starts_with("http") {
            trimmed_input.to_string()
        } else {
            request.provider.track_url(&track_id)
        };
        let song = self.store.upsert_song(&NewSong {
            provider: request.provider,
            provider_track_id: track_id,
            title: request.title.trim().to_string(),
            artist_names: join_artist_names(&request.artists),
            url: Some(url),
            thumbnail_url: request.thumbnail_url.clone(),
            duration_ms: request.duration_ms,
        })?;

        // Secondary enrichment; a failure here degrades to a warning.
        for artist in &request.artists {
            match self
                .store
                .upsert_artist(&artist.name, request.provider, &artist.provider_artist_id)
                .and_then(|a| self.store.link_song_artist(&song.id, &a.id))
            {
                Ok(()) => {}
                Err(err) => warn!("Failed to record artist '{}': {:#}", artist.name, err),
            }
        }

        let (day_start, day_end) = calendar_day_bounds(now.with_timezone(&Local));
        let new_letter = NewLetter {
            sender_id,
            song_id: song.id.clone(),
            sender_name,
            is_anonymous: request.is_anonymous,
            message: request.message.trim().to_string(),
        };
        let (letter, sent_today) = match self.store.create_letter_checked(
            &new_letter,
            limits.max_daily_letters,
            day_start,
            day_end,
            now,
        )? {
            ComposeInsert::Created { letter, sent_today } => (letter, sent_today),
            ComposeInsert::QuotaExceeded { sent_today } => {
                metrics::QUOTA_REJECTIONS_TOTAL.inc();
                return Err(LetterError::QuotaExceeded {
                    sent_today,
                    limit: limits.max_daily_letters,
                });
            }
        };
        metrics::LETTERS_SENT_TOTAL.inc();

        // Assignment failures must not undo an otherwise successful send;
        // the letter stays queued and the sweep retries it.
        let delivery = match self.attempt_delivery(&letter.id, now) {
            Ok(delivery) => delivery,
            Err(err) => {
                warn!("Delivery attempt for letter {} failed: {}", letter.id, err);
                Delivery {
                    assigned: false,
                    receiver_id: None,
                }
            }
        };

        let letter = self
            .store
            .get_letter(&letter.id)?
            .ok_or(LetterError::NotFound)?;
        Ok(ComposeOutcome {
            letter,
            sent_today,
            assigned: delivery.assigned,
        })
    }

    /// Tries to assign a queued letter to an eligible receiver. Not finding
    /// one is a valid outcome, not an error; the letter stays queued.
    pub fn attempt_delivery(
        &self,
        letter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Delivery, LetterError> {
        let letter = self
            .store
            .get_letter(letter_id)?
            .ok_or(LetterError::NotFound)?;
        if letter.receiver_id.is_some() {
            return Ok(Delivery {
                assigned: true,
                receiver_id: letter.receiver_id,
            });
        }

        let limits = self.store.delivery_limits()?;
        let candidate_ids = self.store.profile_ids_except(letter.sender_id)?;
        if candidate_ids.is_empty() {
            debug!("No candidate receivers for letter {}", letter_id);
            return Ok(Delivery {
                assigned: false,
                receiver_id: None,
            });
        }

        let mut candidates = Vec::with_capacity(candidate_ids.len());
        for user_id in candidate_ids {
            candidates.push(CandidateLoad {
                user_id,
                unread_load: self.store.unread_load(user_id)?,
            });
        }

        // The atomic re-check in assign_letter can still turn a pick down;
        // drop that candidate and let the policy choose again.
        while let Some(receiver_id) = self.policy.select(&candidates, limits.max_inbox_letters) {
            if self
                .store
                .assign_letter(letter_id, receiver_id, limits.max_inbox_letters, now)?
            {
                info!("Letter {} delivered to user {}", letter_id, receiver_id);
                metrics::LETTERS_DELIVERED_TOTAL.inc();
                return Ok(Delivery {
                    assigned: true,
                    receiver_id: Some(receiver_id),
                });
            }
            candidates.retain(|c| c.user_id != receiver_id);
        }

        debug!("No eligible receiver for letter {}; staying queued", letter_id);
        Ok(Delivery {
            assigned: false,
            receiver_id: None,
        })
    }

    /// Fetches a letter for its sender or receiver. A receiver's first open
    /// stamps `read_at`; later opens leave it unchanged.
    pub fn open_letter(
        &self,
        caller_id: usize,
        letter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Letter, LetterError> {
        let letter = self
            .store
            .get_letter(letter_id)?
            .ok_or(LetterError::NotFound)?;
        if !letter.is_visible_to(caller_id) {
            return Err(LetterError::Forbidden);
        }

        if letter.receiver_id == Some(caller_id) && letter.read_at.is_none() {
            if self.store.mark_read(letter_id, caller_id, now)? {
                debug!("Letter {} read by user {}", letter_id, caller_id);
            }
            return Ok(self
                .store
                .get_letter(letter_id)?
                .ok_or(LetterError::NotFound)?);
        }
        Ok(letter)
    }

    /// Adds a reply as the receiver; the first reply moves the letter from
    /// delivered to replied, later replies leave the status alone.
    pub fn reply(
        &self,
        caller_id: usize,
        letter_id: &str,
        content: &str,
        is_anonymous: bool,
        now: DateTime<Utc>,
    ) -> Result<Reply, LetterError> {
        if content.trim().is_empty() {
            return Err(LetterError::validation("Reply must not be empty"));
        }
        let letter = self
            .store
            .get_letter(letter_id)?
            .ok_or(LetterError::NotFound)?;
        if letter.receiver_id != Some(caller_id) {
            return Err(LetterError::Forbidden);
        }
        if letter.archived_at.is_some() {
            return Err(LetterError::validation("Letter is archived"));
        }

        Ok(self
            .store
            .add_reply(letter_id, caller_id, content.trim(), is_anonymous, now)?)
    }

    /// Archives a delivered or replied letter as its receiver. Archiving an
    /// already archived letter is a no-op.
    pub fn archive(
        &self,
        caller_id: usize,
        letter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LetterError> {
        let letter = self
            .store
            .get_letter(letter_id)?
            .ok_or(LetterError::NotFound)?;
        if letter.receiver_id != Some(caller_id) {
            return Err(LetterError::Forbidden);
        }
        if letter.archived_at.is_some() {
            return Ok(());
        }
        if !self.store.archive_letter(letter_id, caller_id, now)? {
            return Err(LetterError::validation("Letter cannot be archived"));
        }
        Ok(())
    }

    /// Retries assignment for every queued letter. Returns how many letters
    /// were delivered by this pass.
    pub fn sweep_queued(&self, now: DateTime<Utc>) -> Result<usize, LetterError> {
        let queued = self.store.queued_letter_ids()?;
        let mut delivered = 0;
        for letter_id in queued {
            if self.attempt_delivery(&letter_id, now)?.assigned {
                delivered += 1;
            }
        }
        if delivered > 0 {
            info!("Sweep delivered {} queued letter(s)", delivered);
        }
        Ok(delivered)
    }
}

fn join_artist_names(artists: &[ComposeArtist]) -> Option<String> {
    if artists.is_empty() {
        None
    } else {
        Some(
            artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}
