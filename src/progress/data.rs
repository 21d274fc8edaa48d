//! Persisted player progress: a few universal counters plus a small
//! integer key/value store for project-specific flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current schema version written with every save.
pub const PROGRESS_VERSION: u32 = 1;

/// Everything a progress blob holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressData {
    /// False for blobs that were never written by a completed first run.
    #[serde(default)]
    pub initialized: bool,
    /// Schema version the blob was written with.
    pub version: u32,
    /// Never negative.
    pub coins: i64,
    /// Never negative.
    pub high_score: i64,
    /// Highest unlocked level, at least 1.
    pub unlocked_level: i64,
    /// Extra integers keyed by name, e.g. `tutorial_done`.
    pub ints: BTreeMap<String, i64>,
}

impl Default for ProgressData {
    fn default() -> Self {
        Self {
            initialized: true,
            version: PROGRESS_VERSION,
            coins: 0,
            high_score: 0,
            unlocked_level: 1,
            ints: BTreeMap::new(),
        }
    }
}

impl ProgressData {
    /// Bring the counters into their valid ranges.
    pub fn clamp(&mut self) {
        self.coins = self.coins.max(0);
        self.high_score = self.high_score.max(0);
        self.unlocked_level = self.unlocked_level.max(1);
    }

    /// Upgrade older blobs in place. Version 1 is the only schema so far.
    pub fn migrate(&mut self) {
        if self.version != PROGRESS_VERSION {
            self.version = PROGRESS_VERSION;
        }
    }

    /// Value stored under `key`, or `default` when absent or the key is blank.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        if key.is_empty() {
            return default;
        }
        self.ints.get(key).copied().unwrap_or(default)
    }

    /// Insert or replace `key`. Blank keys are ignored and return `false`.
    pub fn set_int(&mut self, key: &str, value: i64) -> bool {
        if key.is_empty() {
            return false;
        }
        self.ints.insert(key.to_string(), value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_start_at_level_one() {
        let data = ProgressData::default();
        assert!(data.initialized);
        assert_eq!(data.version, PROGRESS_VERSION);
        assert_eq!((data.coins, data.high_score, data.unlocked_level), (0, 0, 1));
        assert!(data.ints.is_empty());
    }

    #[test]
    fn clamp_floors_counters() {
        let mut data = ProgressData {
            coins: -5,
            high_score: -1,
            unlocked_level: 0,
            ..ProgressData::default()
        };
        data.clamp();
        assert_eq!((data.coins, data.high_score, data.unlocked_level), (0, 0, 1));
    }

    #[test]
    fn blank_int_keys_are_ignored() {
        let mut data = ProgressData::default();
        assert!(!data.set_int("", 3));
        assert_eq!(data.get_int("", 7), 7);
        assert!(data.set_int("stars", 2));
        assert!(data.set_int("stars", 3));
        assert_eq!(data.get_int("stars", 0), 3);
        assert_eq!(data.ints.len(), 1);
    }

    #[test]
    fn old_blob_without_ints_migrates() {
        let mut data: ProgressData =
            serde_json::from_str(r#"{"initialized":true,"version":0,"coins":12}"#).unwrap();
        data.migrate();
        assert_eq!(data.version, PROGRESS_VERSION);
        assert_eq!(data.coins, 12);
        assert_eq!(data.unlocked_level, 1);
    }
}
