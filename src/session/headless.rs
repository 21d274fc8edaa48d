//! Recording collaborators for headless sessions: the `replay` command and
//! the tests drive a full session against these instead of a real runtime.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::arbiter::input_mode::{InputMode, ModeBackend};
use crate::arbiter::pause::PauseEffect;
use crate::session::scene::{LoadPoll, SceneLoad, SceneLoader};
use crate::settings::appliers::{Appliers, AudioApplier, ControlsApplier, VideoApplier};
use crate::settings::data::{AudioLevels, ControlsSettings, VideoSettings};

/// Every call the runtime side received, in order per collaborator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuntimeLog {
    /// Effective audio levels applied.
    pub audio: Vec<AudioLevels>,
    /// Video settings applied.
    pub video: Vec<VideoSettings>,
    /// Controls applied.
    pub controls: Vec<ControlsSettings>,
    /// Pause transitions.
    pub pause: Vec<bool>,
    /// Input-mode transitions.
    pub input_modes: Vec<InputMode>,
}

/// Cloneable recorder; every clone appends to the same log.
#[derive(Debug, Clone, Default)]
pub struct RuntimeRecorder {
    log: Arc<Mutex<RuntimeLog>>,
}

impl RuntimeRecorder {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appliers that record into this log.
    #[must_use]
    pub fn appliers(&self) -> Appliers {
        Appliers::new(
            Box::new(self.clone()),
            Box::new(self.clone()),
            Box::new(self.clone()),
        )
    }

    /// Pause effect that records into this log.
    #[must_use]
    pub fn pause_effect(&self) -> Box<dyn PauseEffect> {
        let log = Arc::clone(&self.log);
        Box::new(move |paused: bool| log.lock().pause.push(paused))
    }

    /// Input backend that records into this log.
    #[must_use]
    pub fn input_backend(&self) -> Box<dyn ModeBackend<InputMode>> {
        let log = Arc::clone(&self.log);
        Box::new(move |mode: InputMode| log.lock().input_modes.push(mode))
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> RuntimeLog {
        self.log.lock().clone()
    }

    /// Last audio levels applied.
    #[must_use]
    pub fn last_audio(&self) -> Option<AudioLevels> {
        self.log.lock().audio.last().copied()
    }

    /// Last video settings applied.
    #[must_use]
    pub fn last_video(&self) -> Option<VideoSettings> {
        self.log.lock().video.last().cloned()
    }
}

impl AudioApplier for RuntimeRecorder {
    fn apply_audio(&mut self, levels: AudioLevels) {
        self.log.lock().audio.push(levels);
    }
}

impl VideoApplier for RuntimeRecorder {
    fn apply_video(&mut self, video: &VideoSettings) {
        self.log.lock().video.push(video.clone());
    }
}

impl ControlsApplier for RuntimeRecorder {
    fn apply_controls(&mut self, controls: &ControlsSettings) {
        self.log.lock().controls.push(controls.clone());
    }
}

// ──────────────────── scripted scene loads ────────────────────

/// Scenes the scripted loader was asked for.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoaderLog {
    /// Scenes in load order.
    pub begun: Vec<String>,
    /// Loads cancelled by a newer one.
    pub cancelled: Vec<String>,
}

/// Loader whose loads stay pending for a fixed number of polls. Scenes marked
/// failing fail instead of becoming ready.
#[derive(Debug, Clone)]
pub struct ScriptedLoader {
    pending_polls: u32,
    failing: BTreeSet<String>,
    log: Arc<Mutex<LoaderLog>>,
}

impl ScriptedLoader {
    /// Every load stays pending for `pending_polls` polls.
    #[must_use]
    pub fn new(pending_polls: u32) -> Self {
        Self {
            pending_polls,
            failing: BTreeSet::new(),
            log: Arc::default(),
        }
    }

    /// Make loads of `scene` fail.
    #[must_use]
    pub fn failing(mut self, scene: &str) -> Self {
        self.failing.insert(scene.to_string());
        self
    }

    /// Shared handle to the begin/cancel log.
    #[must_use]
    pub fn log(&self) -> Arc<Mutex<LoaderLog>> {
        Arc::clone(&self.log)
    }
}

impl SceneLoader for ScriptedLoader {
    fn begin(&mut self, scene: &str) -> Box<dyn SceneLoad> {
        self.log.lock().begun.push(scene.to_string());
        Box::new(ScriptedLoad {
            scene: scene.to_string(),
            remaining: self.pending_polls,
            fail: self.failing.contains(scene),
            log: Arc::clone(&self.log),
        })
    }
}

struct ScriptedLoad {
    scene: String,
    remaining: u32,
    fail: bool,
    log: Arc<Mutex<LoaderLog>>,
}

impl SceneLoad for ScriptedLoad {
    fn poll(&mut self) -> LoadPoll {
        if self.remaining > 0 {
            self.remaining -= 1;
            LoadPoll::Pending
        } else if self.fail {
            LoadPoll::Failed(format!("scene '{}' is marked failing", self.scene))
        } else {
            LoadPoll::Ready
        }
    }

    fn cancel(&mut self) {
        self.log.lock().cancelled.push(self.scene.clone());
    }
}
