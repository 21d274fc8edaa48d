//! Settings transaction: live value, dirty flag, baseline snapshot, and the
//! display keep-or-revert sub-flow.
//!
//! - `preview` pushes the live value to the appliers without persisting.
//! - `apply` persists the live value and rebases the baseline on it.
//! - `cancel` restores the baseline without touching storage.
//!
//! Display changes are risky: they preview immediately, and the display
//! sub-state last confirmed by the user is kept aside so a revert can restore
//! the display alone, leaving audio and controls edits intact.

#![allow(missing_docs)]

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::core::errors::{Result, UiError};
use crate::session::save::SaveParticipant;
use crate::settings::appliers::Appliers;
use crate::settings::data::{SettingsData, VideoLimits, VideoSettings};
use crate::settings::storage::{Storage, StoredBlob};

// ──────────────────── snapshot ────────────────────

/// Deep copy of the settings value captured at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    data: SettingsData,
}

impl SettingsSnapshot {
    #[must_use]
    pub fn data(&self) -> &SettingsData {
        &self.data
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.data)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map(|data| Self { data })
            .map_err(|e| UiError::InvalidSnapshot {
                details: e.to_string(),
            })
    }
}

// ──────────────────── load reporting ────────────────────

/// How the initial value was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Nothing stored yet (first launch).
    Missing,
    /// A blob without the first-run marker.
    Uninitialized,
    Corrupt { details: String },
    IoError { details: String },
}

impl LoadOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Missing => "missing",
            Self::Uninitialized => "uninitialized",
            Self::Corrupt { .. } => "corrupt",
            Self::IoError { .. } => "io_error",
        }
    }

    #[must_use]
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Corrupt { details } | Self::IoError { details } => Some(details),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub outcome: LoadOutcome,
    /// Set when defaults were substituted but could not be written back.
    pub save_error: Option<String>,
}

// ──────────────────── observers ────────────────────

/// What changed, delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsChange {
    Edited,
    Imported { dirty: bool },
    Applied,
    Reset,
    DisplayConfirmed,
    DisplayReverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// A live subscription. Hand the id back to `unsubscribe` on teardown.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub changes: Receiver<SettingsChange>,
}

/// Result of a display edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEdit {
    /// The display now differs from the confirmed one; ask the user.
    NeedsConfirmation,
    /// A confirmation is already outstanding; keep previewing.
    AlreadyPending,
    /// The edit left the display equal to the confirmed one.
    Unchanged,
}

// ──────────────────── transaction ────────────────────

pub struct SettingsTransaction {
    current: SettingsData,
    dirty: bool,
    baseline: SettingsSnapshot,
    confirmed_video: VideoSettings,
    display_pending: bool,
    storage: Box<dyn Storage>,
    key: String,
    appliers: Appliers,
    limits: VideoLimits,
    observers: Vec<(SubscriptionId, Sender<SettingsChange>)>,
    next_subscription: u64,
    load_report: LoadReport,
}

impl SettingsTransaction {
    /// Load (or create and persist defaults), preview once, and start clean.
    pub fn open(
        mut storage: Box<dyn Storage>,
        appliers: Appliers,
        key: impl Into<String>,
        limits: VideoLimits,
    ) -> Self {
        let key = key.into();
        let (current, load_report) = load_or_create(storage.as_mut(), &key, &limits);
        let mut tx = Self {
            baseline: SettingsSnapshot {
                data: current.clone(),
            },
            confirmed_video: current.video.clone(),
            current,
            dirty: false,
            display_pending: false,
            storage,
            key,
            appliers,
            limits,
            observers: Vec::new(),
            next_subscription: 1,
            load_report,
        };
        tx.preview();
        tx
    }

    #[must_use]
    pub fn current(&self) -> &SettingsData {
        &self.current
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn baseline(&self) -> &SettingsSnapshot {
        &self.baseline
    }

    #[must_use]
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    #[must_use]
    pub fn limits(&self) -> VideoLimits {
        self.limits
    }

    /// Start an editing session: capture the baseline and the confirmed display.
    pub fn begin(&mut self) {
        self.baseline = self.export_snapshot();
        self.confirmed_video = self.current.video.clone();
        self.display_pending = false;
    }

    #[must_use]
    pub fn export_snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            data: self.current.clone(),
        }
    }

    /// Replace the live value with a copy of `snapshot`, preview it, and notify.
    pub fn import_snapshot(&mut self, snapshot: &SettingsSnapshot, mark_dirty: bool) {
        self.current = snapshot.data.clone();
        self.dirty = mark_dirty;
        self.preview();
        self.notify(SettingsChange::Imported { dirty: mark_dirty });
    }

    /// Import from JSON. Blank input is a no-op (`Ok(false)`); malformed input
    /// is rejected and leaves the live value untouched.
    pub fn import_json(&mut self, raw: &str, mark_dirty: bool) -> Result<bool> {
        if raw.trim().is_empty() {
            return Ok(false);
        }
        let snapshot = SettingsSnapshot::from_json(raw)?;
        self.import_snapshot(&snapshot, mark_dirty);
        Ok(true)
    }

    /// Flag unsaved changes without persisting.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.notify(SettingsChange::Edited);
    }

    /// Mutate the live value, then clamp, preview and mark dirty.
    pub fn edit(&mut self, f: impl FnOnce(&mut SettingsData)) {
        f(&mut self.current);
        self.preview();
        self.mark_dirty();
    }

    /// Clamp the live value and push it to every applier. Never persists.
    pub fn preview(&mut self) {
        self.current.clamp(&self.limits);
        self.appliers.audio(self.current.audio.effective_levels());
        self.appliers.video(&self.current.video);
        self.appliers.controls(&self.current.controls);
    }

    /// Persist the live value unconditionally and rebase the baseline on it.
    ///
    /// On a storage failure the dirty flag and the baseline are left as they were.
    pub fn apply(&mut self) -> Result<()> {
        self.persist()?;
        self.dirty = false;
        self.baseline = self.export_snapshot();
        if !self.display_pending {
            self.confirmed_video = self.current.video.clone();
        }
        self.notify(SettingsChange::Applied);
        Ok(())
    }

    /// Persist only when dirty. Returns whether a write happened.
    pub fn save_if_dirty(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.persist()?;
        self.dirty = false;
        Ok(true)
    }

    /// Restore the baseline captured by `begin` (or the last `apply`).
    pub fn cancel(&mut self) {
        let baseline = self.baseline.clone();
        self.import_snapshot(&baseline, false);
        if !self.display_pending {
            self.confirmed_video = self.current.video.clone();
        }
    }

    /// Replace everything with defaults, preview and persist them.
    pub fn reset_to_default(&mut self) -> Result<()> {
        self.current = SettingsData::default();
        self.preview();
        self.display_pending = false;
        self.confirmed_video = self.current.video.clone();
        let persisted = self.persist();
        self.dirty = persisted.is_err();
        if persisted.is_ok() {
            self.baseline = self.export_snapshot();
        }
        self.notify(SettingsChange::Reset);
        persisted
    }

    // ── display keep-or-revert ──

    /// Edit the display sub-state with live preview.
    pub fn edit_display(&mut self, f: impl FnOnce(&mut VideoSettings)) -> DisplayEdit {
        f(&mut self.current.video);
        self.preview();
        self.mark_dirty();
        if self.display_pending {
            DisplayEdit::AlreadyPending
        } else if self.current.video == self.confirmed_video {
            DisplayEdit::Unchanged
        } else {
            self.display_pending = true;
            DisplayEdit::NeedsConfirmation
        }
    }

    /// Keep the previewed display as the new confirmed display.
    pub fn confirm_display(&mut self) {
        self.confirmed_video = self.current.video.clone();
        self.display_pending = false;
        self.notify(SettingsChange::DisplayConfirmed);
    }

    /// Restore only the display sub-state from the last confirmation.
    pub fn revert_display(&mut self) {
        self.current.video = self.confirmed_video.clone();
        self.display_pending = false;
        self.preview();
        self.notify(SettingsChange::DisplayReverted);
    }

    #[must_use]
    pub fn display_pending(&self) -> bool {
        self.display_pending
    }

    #[must_use]
    pub fn confirmed_display(&self) -> &VideoSettings {
        &self.confirmed_video
    }

    // ── observers ──

    pub fn subscribe(&mut self) -> Subscription {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        let (tx, rx) = unbounded();
        self.observers.push((id, tx));
        Subscription { id, changes: rx }
    }

    /// Detach a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // ──────────────────── internals ────────────────────

    fn persist(&mut self) -> Result<()> {
        let blob = serde_json::to_vec_pretty(&self.current)?;
        self.storage.save(&self.key, &blob)
    }

    fn notify(&mut self, change: SettingsChange) {
        // Receivers dropped without unsubscribing are pruned here.
        self.observers.retain(|(_, tx)| tx.send(change).is_ok());
    }
}

impl SaveParticipant for SettingsTransaction {
    fn save_key(&self) -> &str {
        &self.key
    }

    fn save(&mut self) -> Result<bool> {
        self.save_if_dirty()
    }
}

impl std::fmt::Debug for SettingsTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsTransaction")
            .field("key", &self.key)
            .field("dirty", &self.dirty)
            .field("display_pending", &self.display_pending)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// Read the stored value; anything other than an initialized blob becomes
/// defaults, which are written back immediately.
fn load_or_create(
    storage: &mut dyn Storage,
    key: &str,
    limits: &VideoLimits,
) -> (SettingsData, LoadReport) {
    let outcome = match storage.load(key) {
        StoredBlob::Found(bytes) => match serde_json::from_slice::<SettingsData>(&bytes) {
            Ok(mut data) if data.initialized => {
                data.migrate();
                data.clamp(limits);
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

    let mut defaults = SettingsData::default();
    defaults.clamp(limits);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::storage::MemoryStorage;

    const KEY: &str = "settings_main";

    fn open_with(storage: &MemoryStorage) -> SettingsTransaction {
        SettingsTransaction::open(
            Box::new(storage.clone()),
            Appliers::noop(),
            KEY,
            VideoLimits::default(),
        )
    }

    #[test]
    fn first_launch_persists_defaults() {
        let storage = MemoryStorage::new();
        let tx = open_with(&storage);
        assert_eq!(tx.load_report().outcome, LoadOutcome::Missing);
        assert_eq!(tx.current(), &SettingsData::default());
        assert!(!tx.is_dirty());
        assert_eq!(storage.write_count(), 1);
        assert!(storage.get(KEY).is_some());
    }

    #[test]
    fn corrupt_blob_is_replaced_with_defaults() {
        let storage = MemoryStorage::new();
        storage.insert_raw(KEY, "{not json");
        let tx = open_with(&storage);
        assert!(matches!(tx.load_report().outcome, LoadOutcome::Corrupt { .. }));
        let stored: SettingsData = serde_json::from_slice(&storage.get(KEY).unwrap()).unwrap();
        assert_eq!(stored, SettingsData::default());
    }

    #[test]
    fn uninitialized_blob_is_replaced_with_defaults() {
        let storage = MemoryStorage::new();
        storage.insert_raw(KEY, r#"{"initialized":false,"audio":{"master":0.1}}"#);
        let tx = open_with(&storage);
        assert_eq!(tx.load_report().outcome, LoadOutcome::Uninitialized);
        assert_eq!(tx.current().audio.master, 1.0);
    }

    #[test]
    fn stored_values_are_clamped_on_load() {
        let storage = MemoryStorage::new();
        storage.insert_raw(
            KEY,
            r#"{"initialized":true,"version":0,"audio":{"master":3.0},"video":{"width":10}}"#,
        );
        let tx = open_with(&storage);
        assert_eq!(tx.load_report().outcome, LoadOutcome::Loaded);
        assert_eq!(tx.current().audio.master, 1.0);
        assert_eq!(tx.current().video.width, 640);
        assert_eq!(tx.current().version, 1);
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn save_failure_on_first_launch_is_reported_not_fatal() {
        let storage = MemoryStorage::new();
        storage.set_fail_saves(true);
        let tx = open_with(&storage);
        assert_eq!(tx.load_report().outcome, LoadOutcome::Missing);
        assert!(tx.load_report().save_error.is_some());
        assert_eq!(tx.current(), &SettingsData::default());
    }

    #[test]
    fn export_import_restores_without_dirty_or_write() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        let writes = storage.write_count();
        let snap = tx.export_snapshot();
        let before = tx.current().audio.master;
        tx.edit(|d| d.audio.master = 0.1);
        assert!(tx.is_dirty());
        tx.import_snapshot(&snap, false);
        assert_eq!(tx.current().audio.master, before);
        assert!(!tx.is_dirty());
        assert_eq!(storage.write_count(), writes);
    }

    #[test]
    fn apply_persists_current_and_rebases() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        tx.begin();
        tx.edit(|d| d.audio.sfx = 0.4);
        tx.apply().unwrap();
        assert!(!tx.is_dirty());
        assert_eq!(tx.baseline().data().audio.sfx, 0.4);
        let stored: SettingsData = serde_json::from_slice(&storage.get(KEY).unwrap()).unwrap();
        assert_eq!(stored.audio.sfx, 0.4);

        tx.edit(|d| d.audio.sfx = 0.9);
        tx.cancel();
        assert_eq!(tx.current().audio.sfx, 0.4);
    }

    #[test]
    fn apply_failure_keeps_dirty_and_baseline() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        tx.begin();
        tx.edit(|d| d.audio.bgm = 0.2);
        storage.set_fail_saves(true);
        assert!(tx.apply().is_err());
        assert!(tx.is_dirty());
        assert_eq!(tx.baseline().data().audio.bgm, 1.0);
    }

    #[test]
    fn apply_failure_on_clean_value_stays_clean() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        let sub = tx.subscribe();
        storage.set_fail_saves(true);
        assert!(tx.apply().is_err());
        assert!(!tx.is_dirty());
        assert!(sub.changes.try_recv().is_err());
    }

    #[test]
    fn save_if_dirty_skips_clean_state() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        let writes = storage.write_count();
        assert!(!tx.save_if_dirty().unwrap());
        tx.mark_dirty();
        assert!(tx.save_if_dirty().unwrap());
        assert_eq!(storage.write_count(), writes + 1);
    }

    #[test]
    fn import_json_blank_is_noop_and_garbage_rejected() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        let sub = tx.subscribe();
        assert!(!tx.import_json("   ", true).unwrap());
        assert!(!tx.is_dirty());
        let err = tx.import_json("[1,2", true).unwrap_err();
        assert_eq!(err.code(), "UIA-2003");
        assert!(!tx.is_dirty());
        assert!(sub.changes.try_recv().is_err());

        assert!(tx.import_json(r#"{"initialized":true,"audio":{"bgm":0.3}}"#, true).unwrap());
        assert_eq!(tx.current().audio.bgm, 0.3);
        assert!(tx.is_dirty());
    }

    #[test]
    fn display_edit_opens_one_confirmation() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        tx.begin();
        assert_eq!(
            tx.edit_display(|v| v.width = 1280),
            DisplayEdit::NeedsConfirmation
        );
        assert_eq!(
            tx.edit_display(|v| v.height = 720),
            DisplayEdit::AlreadyPending
        );
        assert_eq!((tx.current().video.width, tx.current().video.height), (1280, 720));
        tx.confirm_display();
        assert!(!tx.display_pending());
        assert_eq!(tx.confirmed_display().width, 1280);
    }

    #[test]
    fn display_edit_to_confirmed_value_needs_no_gate() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        tx.begin();
        assert_eq!(tx.edit_display(|v| v.width = 1920), DisplayEdit::Unchanged);
        assert!(!tx.display_pending());
    }

    #[test]
    fn revert_display_restores_only_video() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        tx.begin();
        tx.edit(|d| d.audio.master = 0.3);
        let _ = tx.edit_display(|v| {
            v.fullscreen = false;
            v.width = 1280;
        });
        tx.revert_display();
        assert_eq!(tx.current().video, VideoSettings::default());
        assert_eq!(tx.current().audio.master, 0.3);
        assert!(!tx.display_pending());
    }

    #[test]
    fn reset_persists_defaults_and_notifies() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        let sub = tx.subscribe();
        tx.edit(|d| d.audio.master = 0.2);
        tx.reset_to_default().unwrap();
        assert_eq!(tx.current(), &SettingsData::default());
        assert!(!tx.is_dirty());
        let changes: Vec<_> = sub.changes.try_iter().collect();
        assert_eq!(changes, vec![SettingsChange::Edited, SettingsChange::Reset]);
    }

    #[test]
    fn dropped_and_unsubscribed_observers_are_removed() {
        let storage = MemoryStorage::new();
        let mut tx = open_with(&storage);
        let kept = tx.subscribe();
        let dropped = tx.subscribe();
        let gone = tx.subscribe();
        assert_eq!(tx.observer_count(), 3);
        assert!(tx.unsubscribe(gone.id));
        assert!(!tx.unsubscribe(gone.id));
        drop(dropped);
        tx.mark_dirty();
        assert_eq!(tx.observer_count(), 1);
        assert_eq!(kept.changes.try_recv(), Ok(SettingsChange::Edited));
    }

    #[test]
    fn snapshot_json_round_trip() {
        let snap = SettingsSnapshot {
            data: SettingsData::default(),
        };
        let json = snap.to_json().unwrap();
        assert_eq!(SettingsSnapshot::from_json(&json).unwrap(), snap);
    }
}
