//! Runtime appliers: push a settings sub-section into the live environment.
//!
//! Appliers must be idempotent. The transaction clamps every value before
//! calling them, and applies audio with mute already folded in.

use crate::settings::data::{AudioLevels, ControlsSettings, VideoSettings};

/// Receives effective audio levels.
pub trait AudioApplier {
    /// Apply levels; muted channels arrive as 0.
    fn apply_audio(&mut self, levels: AudioLevels);
}

/// Receives video settings.
pub trait VideoApplier {
    /// Apply resolution, fullscreen and vsync.
    fn apply_video(&mut self, video: &VideoSettings);
}

/// Receives control settings.
pub trait ControlsApplier {
    /// Apply bindings and sensitivity.
    fn apply_controls(&mut self, controls: &ControlsSettings);
}

/// The three appliers the transaction previews into.
pub struct Appliers {
    audio: Box<dyn AudioApplier>,
    video: Box<dyn VideoApplier>,
    controls: Box<dyn ControlsApplier>,
}

impl Appliers {
    /// Bundle the three appliers.
    #[must_use]
    pub fn new(
        audio: Box<dyn AudioApplier>,
        video: Box<dyn VideoApplier>,
        controls: Box<dyn ControlsApplier>,
    ) -> Self {
        Self {
            audio,
            video,
            controls,
        }
    }

    /// Appliers that ignore everything.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(Noop), Box::new(Noop), Box::new(Noop))
    }

    pub(crate) fn audio(&mut self, levels: AudioLevels) {
        self.audio.apply_audio(levels);
    }

    pub(crate) fn video(&mut self, video: &VideoSettings) {
        self.video.apply_video(video);
    }

    pub(crate) fn controls(&mut self, controls: &ControlsSettings) {
        self.controls.apply_controls(controls);
    }
}

impl std::fmt::Debug for Appliers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Appliers")
    }
}

struct Noop;

impl AudioApplier for Noop {
    fn apply_audio(&mut self, _levels: AudioLevels) {}
}

impl VideoApplier for Noop {
    fn apply_video(&mut self, _video: &VideoSettings) {}
}

impl ControlsApplier for Noop {
    fn apply_controls(&mut self, _controls: &ControlsSettings) {}
}
