//! Save coordination: one `save_all` persists every participant.
//!
//! Participants are identified by the storage key they write, so two
//! participants can never race on one blob. The settings transaction and the
//! progress store are resident (owned by the session's services); hosts may
//! register more.

use crate::core::errors::{Result, UiError};

/// Something `save_all` persists.
pub trait SaveParticipant {
    /// Storage key written by this participant. Doubles as its identity.
    fn save_key(&self) -> &str;

    /// Persist pending state and report whether a write happened. Must be
    /// safe to call repeatedly, including when nothing changed.
    fn save(&mut self) -> Result<bool>;
}

/// Per-participant results of one `save_all`, in call order.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Keys that were written.
    pub written: Vec<String>,
    /// Keys with nothing to write.
    pub clean: Vec<String>,
    /// Keys whose write failed, with the error.
    pub failed: Vec<(String, UiError)>,
}

impl SaveReport {
    /// No participant failed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    /// At least one participant wrote.
    #[must_use]
    pub fn wrote_any(&self) -> bool {
        !self.written.is_empty()
    }

    /// Keys of the failed participants.
    #[must_use]
    pub fn failed_keys(&self) -> Vec<String> {
        self.failed.iter().map(|(key, _)| key.clone()).collect()
    }

    fn record(&mut self, participant: &mut dyn SaveParticipant) {
        let key = participant.save_key().to_string();
        match participant.save() {
            Ok(true) => self.written.push(key),
            Ok(false) => self.clean.push(key),
            Err(e) => self.failed.push((key, e)),
        }
    }
}

/// Registered participants plus the keys of the resident ones.
#[derive(Default)]
pub struct SaveCoordinator {
    resident: Vec<String>,
    participants: Vec<Box<dyn SaveParticipant>>,
}

impl SaveCoordinator {
    /// A coordinator that already accounts for the resident participants' keys.
    #[must_use]
    pub fn new(resident: impl IntoIterator<Item = String>) -> Self {
        Self {
            resident: resident.into_iter().collect(),
            participants: Vec::new(),
        }
    }

    /// Add a participant. A key that is already taken is rejected (`UIA-2002`).
    pub fn register(&mut self, participant: Box<dyn SaveParticipant>) -> Result<()> {
        let key = participant.save_key();
        if self.contains(key) {
            return Err(UiError::DuplicateRegistration {
                what: "save participant",
                name: key.to_string(),
            });
        }
        self.participants.push(participant);
        Ok(())
    }

    /// Remove and return the registered participant writing `key`. Resident
    /// participants cannot be removed.
    pub fn unregister(&mut self, key: &str) -> Option<Box<dyn SaveParticipant>> {
        let index = self.participants.iter().position(|p| p.save_key() == key)?;
        Some(self.participants.remove(index))
    }

    /// `key` belongs to a resident or registered participant.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.resident.iter().any(|k| k == key)
            || self.participants.iter().any(|p| p.save_key() == key)
    }

    /// Every key in save order: resident first, then registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.resident
            .iter()
            .map(String::as_str)
            .chain(self.participants.iter().map(|p| p.save_key()))
            .collect()
    }

    /// Number of registered (non-resident) participants.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.participants.len()
    }

    /// Save `resident` in order, then every registered participant. A failure
    /// is recorded and the remaining participants still run.
    pub fn save_all(&mut self, resident: &mut [&mut dyn SaveParticipant]) -> SaveReport {
        let mut report = SaveReport::default();
        for participant in resident.iter_mut() {
            report.record(&mut **participant);
        }
        for participant in &mut self.participants {
            report.record(participant.as_mut());
        }
        report
    }
}

impl std::fmt::Debug for SaveCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveCoordinator")
            .field("keys", &self.keys())
            .finish()
    }
}
