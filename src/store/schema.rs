//! Declarative schema for the comusic database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnDelete, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const PROFILE_FK: ForeignKey = ForeignKey {
    foreign_table: "profiles",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Cascade,
};

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "songs",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Restrict,
};

const LETTER_FK: ForeignKey = ForeignKey {
    foreign_table: "song_letters",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Cascade,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Cascade,
};

/// V 1
pub const PROFILES_TABLE: Table = Table {
    name: "profiles",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!(
            "has_seen_tutorial",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_profiles_handle", "handle")],
};

pub const AUTH_CREDENTIALS_TABLE: Table = Table {
    name: "auth_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&PROFILE_FK)
        ),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const AUTH_TOKENS_TABLE: Table = Table {
    name: "auth_tokens",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PROFILE_FK)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_auth_tokens_value", "value")],
};

pub const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("provider", &SqlType::Text, non_null = true),
        sqlite_column!("provider_track_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist_names", &SqlType::Text),
        sqlite_column!("url", &SqlType::Text),
        sqlite_column!("thumbnail_url", &SqlType::Text),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[&["provider", "provider_track_id"]],
    indices: &[("idx_songs_provider_track", "provider, provider_track_id")],
};

pub const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("provider", &SqlType::Text, non_null = true),
        sqlite_column!("provider_artist_id", &SqlType::Text, non_null = true),
    ],
    unique_constraints: &[&["provider", "provider_artist_id"]],
    indices: &[],
};

pub const SONGS_ARTISTS_TABLE: Table = Table {
    name: "songs_artists",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
    ],
    unique_constraints: &[&["song_id", "artist_id"]],
    indices: &[],
};

pub const SONG_LETTERS_TABLE: Table = Table {
    name: "song_letters",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!(
            "sender_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PROFILE_FK)
        ),
        sqlite_column!(
            "receiver_id",
            &SqlType::Integer,
            foreign_key = Some(&PROFILE_FK)
        ),
        sqlite_column!(
            "song_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!("sender_name", &SqlType::Text, non_null = true),
        sqlite_column!("is_anonymous", &SqlType::Integer, non_null = true),
        sqlite_column!("message", &SqlType::Text, non_null = true),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("delivered_at", &SqlType::Integer),
        sqlite_column!("read_at", &SqlType::Integer),
        sqlite_column!("archived_at", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[
        ("idx_song_letters_sender", "sender_id, created_at"),
        ("idx_song_letters_receiver", "receiver_id"),
        ("idx_song_letters_status", "status"),
    ],
};

pub const SONG_LETTER_REPLIES_TABLE: Table = Table {
    name: "song_letter_replies",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!(
            "letter_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&LETTER_FK)
        ),
        sqlite_column!(
            "replier_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PROFILE_FK)
        ),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!("is_anonymous", &SqlType::Integer, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[("idx_song_letter_replies_letter", "letter_id")],
};

pub const APP_SETTINGS_TABLE: Table = Table {
    name: "app_settings",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true, non_null = true),
        sqlite_column!("value_int", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        PROFILES_TABLE,
        AUTH_CREDENTIALS_TABLE,
        AUTH_TOKENS_TABLE,
        SONGS_TABLE,
        ARTISTS_TABLE,
        SONGS_ARTISTS_TABLE,
        SONG_LETTERS_TABLE,
        SONG_LETTER_REPLIES_TABLE,
        APP_SETTINGS_TABLE,
    ],
    migration: None,
}];
