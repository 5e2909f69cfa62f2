//! SQLite-backed implementation of every store trait, sharing a single
//! serialized connection. Multi-step operations (signup, quota-guarded
//! insert, assignment, reply) run inside transactions on that connection.

use super::schema::VERSIONED_SCHEMAS;
use crate::letters::{ComposeInsert, Letter, LetterStatus, LetterStore, NewLetter, Reply};
use crate::settings::{AppSetting, SettingsStore};
use crate::songs::{Artist, NewSong, Provider, Song, SongStore};
use crate::sqlite_persistence::open_versioned;
use crate::user::{
    AuthToken, AuthTokenStore, AuthTokenValue, PasswordHasher, Profile, ProfilePatch,
    UserCredentials, UserCredentialsStore, UserStore,
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const UNREAD_LOAD_SQL: &str = "SELECT COUNT(*) FROM song_letters
     WHERE receiver_id = ?1
       AND status IN ('delivered', 'replied')
       AND archived_at IS NULL
       AND read_at IS NULL";

const LETTER_COLUMNS: &str = "id, sender_id, receiver_id, song_id, sender_name, is_anonymous,
     message, status, created_at, delivered_at, read_at, archived_at";

#[derive(Clone)]
pub struct SqliteComusicStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteComusicStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let is_new_db = !db_path.as_ref().exists();
        let mut conn = Connection::open(db_path).context("Failed to open database")?;
        open_versioned(&mut conn, VERSIONED_SCHEMAS, is_new_db)?;
        Ok(SqliteComusicStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn to_unix(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn from_unix(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn opt_ts(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.map(ts)
}

fn column_error(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("Unexpected {} value '{}'", column, value).into(),
    )
}

fn letter_from_row(row: &Row) -> rusqlite::Result<Letter> {
    let status_str: String = row.get(7)?;
    let status = LetterStatus::parse(&status_str).ok_or_else(|| column_error("status", &status_str))?;
    Ok(Letter {
        id: row.get(0)?,
        sender_id: row.get::<_, i64>(1)? as usize,
        receiver_id: row.get::<_, Option<i64>>(2)?.map(|id| id as usize),
        song_id: row.get(3)?,
        sender_name: row.get(4)?,
        is_anonymous: row.get(5)?,
        message: row.get(6)?,
        status,
        created_at: ts(row.get(8)?),
        delivered_at: opt_ts(row.get(9)?),
        read_at: opt_ts(row.get(10)?),
        archived_at: opt_ts(row.get(11)?),
    })
}

fn reply_from_row(row: &Row) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: row.get(0)?,
        letter_id: row.get(1)?,
        replier_id: row.get::<_, i64>(2)? as usize,
        content: row.get(3)?,
        is_anonymous: row.get(4)?,
        created_at: ts(row.get(5)?),
    })
}

fn song_from_row(row: &Row) -> rusqlite::Result<Song> {
    let provider_str: String = row.get(1)?;
    let provider =
        Provider::parse(&provider_str).ok_or_else(|| column_error("provider", &provider_str))?;
    Ok(Song {
        id: row.get(0)?,
        provider,
        provider_track_id: row.get(2)?,
        title: row.get(3)?,
        artist_names: row.get(4)?,
        url: row.get(5)?,
        thumbnail_url: row.get(6)?,
        duration_ms: row.get(7)?,
    })
}

fn artist_from_row(row: &Row) -> rusqlite::Result<Artist> {
    let provider_str: String = row.get(2)?;
    let provider =
        Provider::parse(&provider_str).ok_or_else(|| column_error("provider", &provider_str))?;
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
        provider,
        provider_artist_id: row.get(3)?,
    })
}

fn unread_load_with(conn: &Connection, user_id: usize) -> Result<i64> {
    Ok(conn.query_row(UNREAD_LOAD_SQL, params![user_id as i64], |row| row.get(0))?)
}

impl UserCredentialsStore for SqliteComusicStore {
    fn get_user_credentials(&self, handle: &str) -> Result<Option<UserCredentials>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.user_id, c.hasher, c.salt, c.hash
             FROM auth_credentials c JOIN profiles p ON p.id = c.user_id
             WHERE p.handle = ?1",
        )?;
        let mut rows = stmt.query(params![handle])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let hasher_str: String = row.get(1)?;
        Ok(Some(UserCredentials {
            user_id: row.get::<_, i64>(0)? as usize,
            hasher: PasswordHasher::from_str(&hasher_str)?,
            salt: row.get(2)?,
            hash: row.get(3)?,
        }))
    }
}

impl AuthTokenStore for SqliteComusicStore {
    fn get_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, created, last_used, value FROM auth_tokens WHERE value = ?1",
        )?;
        let mut rows = stmt.query(params![token.0])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(AuthToken {
            user_id: row.get::<_, i64>(0)? as usize,
            created: from_unix(row.get(1)?),
            last_used: row.get::<_, Option<i64>>(2)?.map(from_unix),
            value: AuthTokenValue(row.get(3)?),
        }))
    }

    fn add_auth_token(&self, token: AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_tokens (user_id, value, created, last_used) VALUES (?1, ?2, ?3, ?4)",
            params![
                token.user_id as i64,
                token.value.0,
                to_unix(token.created),
                token.last_used.map(to_unix),
            ],
        )?;
        Ok(())
    }

    fn delete_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let existing = self.get_auth_token(token)?;
        if existing.is_some() {
            let conn = self.conn.lock().unwrap();
            conn.execute("DELETE FROM auth_tokens WHERE value = ?1", params![token.0])?;
        }
        Ok(existing)
    }

    fn touch_auth_token(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_tokens SET last_used = ?1 WHERE value = ?2",
            params![to_unix(SystemTime::now()), token.0],
        )?;
        Ok(())
    }
}

impl UserStore for SqliteComusicStore {
    fn create_user(&self, handle: &str, username: &str, password: &str) -> Result<usize> {
        let hasher = PasswordHasher::preferred();
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_bytes(), &salt)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO profiles (handle, username) VALUES (?1, ?2)",
            params![handle, username],
        )
        .with_context(|| format!("Failed to create user {}", handle))?;
        let user_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO auth_credentials (user_id, hasher, salt, hash) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, hasher.to_string(), salt, hash],
        )?;
        tx.commit()?;
        Ok(user_id as usize)
    }

    fn get_profile(&self, user_id: usize) -> Result<Option<Profile>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, username, handle, has_seen_tutorial FROM profiles WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![user_id as i64])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(Profile {
            id: row.get::<_, i64>(0)? as usize,
            username: row.get(1)?,
            handle: row.get(2)?,
            has_seen_tutorial: row.get(3)?,
        }))
    }

    fn update_profile(&self, user_id: usize, patch: &ProfilePatch) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        if let Some(username) = &patch.username {
            conn.execute(
                "UPDATE profiles SET username = ?1 WHERE id = ?2",
                params![username, user_id as i64],
            )?;
        }
        if let Some(seen) = patch.has_seen_tutorial {
            conn.execute(
                "UPDATE profiles SET has_seen_tutorial = ?1 WHERE id = ?2",
                params![seen, user_id as i64],
            )?;
        }
        Ok(())
    }

    fn profile_ids_except(&self, excluded_user_id: usize) -> Result<Vec<usize>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM profiles WHERE id != ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![excluded_user_id as i64], |row| {
                Ok(row.get::<_, i64>(0)? as usize)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn delete_user(&self, user_id: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM profiles WHERE id = ?1", params![user_id as i64])?;
        if deleted == 0 {
            bail!("No user with id {}", user_id);
        }
        Ok(())
    }
}

impl SongStore for SqliteComusicStore {
    fn upsert_song(&self, song: &NewSong) -> Result<Song> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let existing = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM songs WHERE provider = ?1 AND provider_track_id = ?2",
                "id, provider, provider_track_id, title, artist_names, url, thumbnail_url, duration_ms"
            ))?;
            let mut rows = stmt.query(params![song.provider.as_str(), song.provider_track_id])?;
            match rows.next()? {
                Some(row) => Some(song_from_row(row)?),
                None => None,
            }
        };
        if let Some(existing) = existing {
            tx.commit()?;
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO songs (id, provider, provider_track_id, title, artist_names, url,
             thumbnail_url, duration_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                song.provider.as_str(),
                song.provider_track_id,
                song.title,
                song.artist_names,
                song.url,
                song.thumbnail_url,
                song.duration_ms,
            ],
        )?;
        tx.commit()?;
        Ok(Song {
            id,
            provider: song.provider,
            provider_track_id: song.provider_track_id.clone(),
            title: song.title.clone(),
            artist_names: song.artist_names.clone(),
            url: song.url.clone(),
            thumbnail_url: song.thumbnail_url.clone(),
            duration_ms: song.duration_ms,
        })
    }

    fn get_song(&self, song_id: &str) -> Result<Option<Song>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, provider, provider_track_id, title, artist_names, url, thumbnail_url,
             duration_ms FROM songs WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![song_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(song_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn upsert_artist(
        &self,
        name: &str,
        provider: Provider,
        provider_artist_id: &str,
    ) -> Result<Artist> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let existing = {
            let mut stmt = tx.prepare(
                "SELECT id, name, provider, provider_artist_id FROM artists
                 WHERE provider = ?1 AND provider_artist_id = ?2",
            )?;
            let mut rows = stmt.query(params![provider.as_str(), provider_artist_id])?;
            match rows.next()? {
                Some(row) => Some(artist_from_row(row)?),
                None => None,
            }
        };
        if let Some(existing) = existing {
            tx.commit()?;
            return Ok(existing);
        }

        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO artists (id, name, provider, provider_artist_id) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, provider.as_str(), provider_artist_id],
        )?;
        tx.commit()?;
        Ok(Artist {
            id,
            name: name.to_string(),
            provider,
            provider_artist_id: provider_artist_id.to_string(),
        })
    }

    fn link_song_artist(&self, song_id: &str, artist_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO songs_artists (song_id, artist_id) VALUES (?1, ?2)",
            params![song_id, artist_id],
        )?;
        Ok(())
    }

    fn get_song_artists(&self, song_id: &str) -> Result<Vec<Artist>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.id, a.name, a.provider, a.provider_artist_id
             FROM artists a JOIN songs_artists sa ON sa.artist_id = a.id
             WHERE sa.song_id = ?1 ORDER BY a.name",
        )?;
        let artists = stmt
            .query_map(params![song_id], artist_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(artists)
    }
}

impl LetterStore for SqliteComusicStore {
    fn count_letters_sent_between(
        &self,
        sender_id: usize,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM song_letters
             WHERE sender_id = ?1 AND created_at >= ?2 AND created_at < ?3",
            params![sender_id as i64, start.timestamp(), end.timestamp()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn unread_load(&self, user_id: usize) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        unread_load_with(&conn, user_id)
    }

    fn create_letter_checked(
        &self,
        letter: &NewLetter,
        daily_limit: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ComposeInsert> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let sent_today: i64 = tx.query_row(
            "SELECT COUNT(*) FROM song_letters
             WHERE sender_id = ?1 AND created_at >= ?2 AND created_at < ?3",
            params![letter.sender_id as i64, start.timestamp(), end.timestamp()],
            |row| row.get(0),
        )?;
        if sent_today >= daily_limit {
            return Ok(ComposeInsert::QuotaExceeded { sent_today });
        }

        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO song_letters (id, sender_id, song_id, sender_name, is_anonymous,
             message, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                letter.sender_id as i64,
                letter.song_id,
                letter.sender_name,
                letter.is_anonymous,
                letter.message,
                LetterStatus::Queued.as_str(),
                now.timestamp(),
            ],
        )?;
        tx.commit()?;
        Ok(ComposeInsert::Created {
            letter: Letter {
                id,
                sender_id: letter.sender_id,
                receiver_id: None,
                song_id: letter.song_id.clone(),
                sender_name: letter.sender_name.clone(),
                is_anonymous: letter.is_anonymous,
                message: letter.message.clone(),
                status: LetterStatus::Queued,
                created_at: ts(now.timestamp()),
                delivered_at: None,
                read_at: None,
                archived_at: None,
            },
            sent_today: sent_today + 1,
        })
    }

    fn get_letter(&self, letter_id: &str) -> Result<Option<Letter>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM song_letters WHERE id = ?1",
            LETTER_COLUMNS
        ))?;
        let mut rows = stmt.query(params![letter_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(letter_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn inbox_letters(&self, receiver_id: usize) -> Result<Vec<Letter>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM song_letters
             WHERE receiver_id = ?1 AND status IN ('delivered', 'replied')
             ORDER BY delivered_at DESC",
            LETTER_COLUMNS
        ))?;
        let letters = stmt
            .query_map(params![receiver_id as i64], letter_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(letters)
    }

    fn sent_letters(&self, sender_id: usize) -> Result<Vec<Letter>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM song_letters WHERE sender_id = ?1 ORDER BY created_at DESC",
            LETTER_COLUMNS
        ))?;
        let letters = stmt
            .query_map(params![sender_id as i64], letter_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(letters)
    }

    fn queued_letter_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM song_letters WHERE status = 'queued' ORDER BY created_at ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn assign_letter(
        &self,
        letter_id: &str,
        receiver_id: usize,
        max_inbox_letters: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        // Capacity re-check inside the transaction; the caller's earlier
        // load snapshot may be stale.
        if unread_load_with(&tx, receiver_id)? >= max_inbox_letters {
            return Ok(false);
        }
        let updated = tx.execute(
            "UPDATE song_letters SET receiver_id = ?1, status = 'delivered', delivered_at = ?2
             WHERE id = ?3 AND status = 'queued' AND sender_id != ?1",
            params![receiver_id as i64, now.timestamp(), letter_id],
        )?;
        tx.commit()?;
        Ok(updated == 1)
    }

    fn mark_read(&self, letter_id: &str, receiver_id: usize, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE song_letters SET read_at = ?1
             WHERE id = ?2 AND receiver_id = ?3 AND read_at IS NULL
               AND status IN ('delivered', 'replied')",
            params![now.timestamp(), letter_id, receiver_id as i64],
        )?;
        Ok(updated == 1)
    }

    fn archive_letter(
        &self,
        letter_id: &str,
        receiver_id: usize,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE song_letters SET status = 'archived', archived_at = ?1
             WHERE id = ?2 AND receiver_id = ?3 AND status IN ('delivered', 'replied')",
            params![now.timestamp(), letter_id, receiver_id as i64],
        )?;
        Ok(updated == 1)
    }

    fn add_reply(
        &self,
        letter_id: &str,
        replier_id: usize,
        content: &str,
        is_anonymous: bool,
        now: DateTime<Utc>,
    ) -> Result<Reply> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO song_letter_replies (id, letter_id, replier_id, content, is_anonymous,
             created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                letter_id,
                replier_id as i64,
                content,
                is_anonymous,
                now.timestamp(),
            ],
        )?;
        // First reply on a delivered letter flips it to replied.
        tx.execute(
            "UPDATE song_letters SET status = 'replied' WHERE id = ?1 AND status = 'delivered'",
            params![letter_id],
        )?;
        tx.commit()?;
        Ok(Reply {
            id,
            letter_id: letter_id.to_string(),
            replier_id,
            content: content.to_string(),
            is_anonymous,
            created_at: ts(now.timestamp()),
        })
    }

    fn replies_for_letter(&self, letter_id: &str) -> Result<Vec<Reply>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            // Tiebreak on rowid; uuid ordering would scramble same-second replies.
            "SELECT id, letter_id, replier_id, content, is_anonymous, created_at
             FROM song_letter_replies WHERE letter_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let replies = stmt
            .query_map(params![letter_id], reply_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(replies)
    }
}

impl SettingsStore for SqliteComusicStore {
    fn get_app_setting(&self, key: &str) -> Result<Option<AppSetting>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            "SELECT value_int FROM app_settings WHERE key = ?1",
            params![key],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(value) => match AppSetting::from_key_value(key, value) {
                Ok(setting) => Ok(Some(setting)),
                Err(err) => bail!(err),
            },
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn put_app_setting(&self, setting: AppSetting) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO app_settings (key, value_int) VALUES (?1, ?2)",
            params![setting.key(), setting.value()],
        )?;
        Ok(())
    }
}
