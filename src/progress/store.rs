//! Progress store: loads or creates the progress blob, and writes it back
//! after every change.
//!
//! A failed write keeps the change in memory and leaves the store dirty, so
//! the next `save_all` retries it.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::core::errors::{Result, UiError};
use crate::progress::data::ProgressData;
use crate::session::save::SaveParticipant;
use crate::settings::storage::{Storage, StoredBlob};
use crate::settings::transaction::{LoadOutcome, LoadReport};

/// What changed, delivered to subscribers after the write was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressChange {
    /// New coin balance.
    Coins(i64),
    /// New high score.
    HighScore(i64),
    /// New highest unlocked level.
    LevelUnlocked(i64),
    /// A keyed integer was set.
    Int {
        /// Key that was written.
        key: String,
        /// Value stored under it.
        value: i64,
    },
    /// Everything went back to defaults.
    Reset,
}

/// Owns the live [`ProgressData`] and its storage key.
pub struct ProgressStore {
    data: ProgressData,
    dirty: bool,
    storage: Box<dyn Storage>,
    key: String,
    load_report: LoadReport,
    observers: Vec<Sender<ProgressChange>>,
}

impl ProgressStore {
    /// Load `key`, or create and persist defaults when nothing usable is stored.
    pub fn open(mut storage: Box<dyn Storage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let (data, load_report) = load_or_create(storage.as_mut(), &key);
        Self {
            data,
            dirty: false,
            storage,
            key,
            load_report,
            observers: Vec::new(),
        }
    }

    /// The live value.
    #[must_use]
    pub fn data(&self) -> &ProgressData {
        &self.data
    }

    /// Storage key the blob lives under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `true` when the last write failed and has not been retried.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// How the initial value was obtained.
    #[must_use]
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Add coins. Non-positive amounts change nothing.
    pub fn add_coins(&mut self, amount: i64) -> Result<bool> {
        if amount <= 0 {
            return Ok(false);
        }
        self.data.coins = self.data.coins.saturating_add(amount);
        self.changed(ProgressChange::Coins(self.data.coins))?;
        Ok(true)
    }

    /// Spend coins if the balance covers `amount`.
    ///
    /// Non-positive amounts succeed without a write; an uncovered amount
    /// returns `Ok(false)` and leaves the balance alone.
    pub fn try_spend_coins(&mut self, amount: i64) -> Result<bool> {
        if amount <= 0 {
            return Ok(true);
        }
        if self.data.coins < amount {
            return Ok(false);
        }
        self.data.coins -= amount;
        self.changed(ProgressChange::Coins(self.data.coins))?;
        Ok(true)
    }

    /// Record `score` when it beats the current high score.
    pub fn set_high_score_if_better(&mut self, score: i64) -> Result<bool> {
        if score <= self.data.high_score {
            return Ok(false);
        }
        self.data.high_score = score;
        self.changed(ProgressChange::HighScore(score))?;
        Ok(true)
    }

    /// Raise the unlocked level. Lower or equal levels change nothing.
    pub fn unlock_level(&mut self, level: i64) -> Result<bool> {
        if level <= self.data.unlocked_level {
            return Ok(false);
        }
        self.data.unlocked_level = level;
        self.changed(ProgressChange::LevelUnlocked(level))?;
        Ok(true)
    }

    /// Keyed integer, or `default`.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.data.get_int(key, default)
    }

    /// Store a keyed integer. Blank keys are ignored.
    pub fn set_int(&mut self, key: &str, value: i64) -> Result<bool> {
        if !self.data.set_int(key, value) {
            return Ok(false);
        }
        self.changed(ProgressChange::Int {
            key: key.to_string(),
            value,
        })?;
        Ok(true)
    }

    /// Back to defaults, persisted immediately.
    pub fn reset(&mut self) -> Result<()> {
        self.data = ProgressData::default();
        self.changed(ProgressChange::Reset)
    }

    /// Write the live value even when nothing changed.
    pub fn save_now(&mut self) -> Result<()> {
        let saved = self.persist();
        self.dirty = saved.is_err();
        saved
    }

    /// Receive every later change. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<ProgressChange> {
        let (tx, rx) = unbounded();
        self.observers.push(tx);
        rx
    }

    /// Live subscriptions, counting receivers dropped since the last change.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn changed(&mut self, change: ProgressChange) -> Result<()> {
        let saved = self.save_now();
        self.observers.retain(|tx| tx.send(change.clone()).is_ok());
        saved
    }

    fn persist(&mut self) -> Result<()> {
        self.data.clamp();
        let blob = serde_json::to_vec_pretty(&self.data)?;
        self.storage.save(&self.key, &blob)
    }
}

impl SaveParticipant for ProgressStore {
    fn save_key(&self) -> &str {
        &self.key
    }

    /// Progress is written on every change, so only a failed write is retried.
    fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save_now()?;
        Ok(true)
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("key", &self.key)
            .field("dirty", &self.dirty)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

fn load_or_create(storage: &mut dyn Storage, key: &str) -> (ProgressData, LoadReport) {
    let outcome = match storage.load(key) {
        StoredBlob::Found(bytes) => match serde_json::from_slice::<ProgressData>(&bytes) {
            Ok(mut data) if data.initialized => {
                data.migrate();
                data.clamp();
                return (
                    data,
                    LoadReport {
                        outcome: LoadOutcome::Loaded,
                        save_error: None,
                    },
                );
            }
            Ok(_) => LoadOutcome::Uninitialized,
            Err(e) => LoadOutcome::Corrupt {
                details: e.to_string(),
            },
        },
        StoredBlob::Missing => LoadOutcome::Missing,
        StoredBlob::Unreadable { details } => LoadOutcome::IoError { details },
    };

    let defaults = ProgressData::default();
    let save_error = serde_json::to_vec_pretty(&defaults)
        .map_err(UiError::from)
        .and_then(|blob| storage.save(key, &blob))
        .err()
        .map(|e| e.to_string());
    (
        defaults,
        LoadReport {
            outcome,
            save_error,
        },
    )
}
