//! Application settings types and serialization.
//!
//! Delivery limits are stored as integer key/value pairs in the
//! `app_settings` table and resolved into a [`DeliveryLimits`] value object
//! that is passed explicitly into the rate limiter and recipient selector.

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_DAILY_LETTERS: i64 = 5;
pub const DEFAULT_MAX_INBOX_LETTERS: i64 = 10;

/// All supported application settings with their typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value")]
pub enum AppSetting {
    /// Maximum number of letters a single sender may create per calendar day.
    #[serde(rename = "max_daily_letters")]
    MaxDailyLetters(i64),
    /// Maximum unread-load a receiver may carry before becoming ineligible
    /// for new assignments.
    #[serde(rename = "max_inbox_letters")]
    MaxInboxLetters(i64),
}

impl AppSetting {
    /// Get the storage key for this setting.
    pub fn key(&self) -> &'static str {
        match self {
            Self::MaxDailyLetters(_) => "max_daily_letters",
            Self::MaxInboxLetters(_) => "max_inbox_letters",
        }
    }

    pub fn value(&self) -> i64 {
        match self {
            Self::MaxDailyLetters(v) | Self::MaxInboxLetters(v) => *v,
        }
    }

    /// Deserialize from key/value (used by the store implementation).
    pub fn from_key_value(key: &str, value: i64) -> Result<Self, String> {
        match key {
            "max_daily_letters" => Ok(Self::MaxDailyLetters(value)),
            "max_inbox_letters" => Ok(Self::MaxInboxLetters(value)),
            _ => Err(format!("Unknown setting key: {}", key)),
        }
    }

    pub fn default_for_key(key: &str) -> Option<Self> {
        match key {
            "max_daily_letters" => Some(Self::MaxDailyLetters(DEFAULT_MAX_DAILY_LETTERS)),
            "max_inbox_letters" => Some(Self::MaxInboxLetters(DEFAULT_MAX_INBOX_LETTERS)),
            _ => None,
        }
    }
}

/// Tunable limits governing letter delivery, resolved from `app_settings`
/// with defaults applied for unset keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLimits {
    pub max_daily_letters: i64,
    pub max_inbox_letters: i64,
}

impl Default for DeliveryLimits {
    fn default() -> Self {
        Self {
            max_daily_letters: DEFAULT_MAX_DAILY_LETTERS,
            max_inbox_letters: DEFAULT_MAX_INBOX_LETTERS,
        }
    }
}

/// Read/write access to the `app_settings` key/value table.
pub trait SettingsStore: Send + Sync {
    /// Returns the stored setting for the key, or `Ok(None)` if unset.
    fn get_app_setting(&self, key: &str) -> Result<Option<AppSetting>>;

    /// Inserts or replaces a setting.
    fn put_app_setting(&self, setting: AppSetting) -> Result<()>;

    /// Resolves the current delivery limits, applying defaults for unset keys.
    fn delivery_limits(&self) -> Result<DeliveryLimits> {
        let max_daily_letters = self
            .get_app_setting("max_daily_letters")?
            .map(|s| s.value())
            .unwrap_or(DEFAULT_MAX_DAILY_LETTERS);
        let max_inbox_letters = self
            .get_app_setting("max_inbox_letters")?
            .map(|s| s.value())
            .unwrap_or(DEFAULT_MAX_INBOX_LETTERS);
        Ok(DeliveryLimits {
            max_daily_letters,
            max_inbox_letters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(AppSetting::MaxDailyLetters(5).key(), "max_daily_letters");
        assert_eq!(AppSetting::MaxInboxLetters(10).key(), "max_inbox_letters");
    }

    #[test]
    fn test_from_key_value_valid() {
        assert_eq!(
            AppSetting::from_key_value("max_daily_letters", 3),
            Ok(AppSetting::MaxDailyLetters(3))
        );
        assert_eq!(
            AppSetting::from_key_value("max_inbox_letters", 7),
            Ok(AppSetting::MaxInboxLetters(7))
        );
    }

    #[test]
    fn test_from_key_value_unknown_key() {
        let result = AppSetting::from_key_value("unknown_key", 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Unknown setting key"));
    }

    #[test]
    fn test_default_for_key() {
        assert_eq!(
            AppSetting::default_for_key("max_daily_letters"),
            Some(AppSetting::MaxDailyLetters(5))
        );
        assert_eq!(
            AppSetting::default_for_key("max_inbox_letters"),
            Some(AppSetting::MaxInboxLetters(10))
        );
        assert_eq!(AppSetting::default_for_key("unknown_key"), None);
    }

    #[test]
    fn test_serde_roundtrip() {
        let setting = AppSetting::MaxDailyLetters(5);
        let json = serde_json::to_string(&setting).unwrap();
        assert_eq!(json, r#"{"key":"max_daily_letters","value":5}"#);
        let parsed: AppSetting = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, setting);
    }

    #[test]
    fn test_default_limits() {
        let limits = DeliveryLimits::default();
        assert_eq!(limits.max_daily_letters, 5);
        assert_eq!(limits.max_inbox_letters, 10);
    }
}
