//! Scene transitions as an explicit, cancellable load handle.
//!
//! At most one load is in flight. Beginning a new load while another is
//! pending cancels the old one; its completion is never observed.

use std::fmt;

/// Result of polling an in-flight load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPoll {
    /// Still loading.
    Pending,
    /// Done.
    Ready,
    /// Gave up, with details.
    Failed(String),
}

/// One in-flight scene load.
pub trait SceneLoad {
    /// Advance the load by one frame.
    fn poll(&mut self) -> LoadPoll;

    /// Called when a newer load supersedes this one.
    fn cancel(&mut self) {}
}

/// Starts scene loads.
pub trait SceneLoader {
    /// Start loading `scene`.
    fn begin(&mut self, scene: &str) -> Box<dyn SceneLoad>;
}

impl<F: FnMut(&str) -> Box<dyn SceneLoad>> SceneLoader for F {
    fn begin(&mut self, scene: &str) -> Box<dyn SceneLoad> {
        self(scene)
    }
}

/// Loader whose loads are ready on the first poll.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantLoader;

struct Ready;

impl SceneLoad for Ready {
    fn poll(&mut self) -> LoadPoll {
        LoadPoll::Ready
    }
}

impl SceneLoader for InstantLoader {
    fn begin(&mut self, _scene: &str) -> Box<dyn SceneLoad> {
        Box::new(Ready)
    }
}

/// How a load ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneOutcome {
    /// The scene became active.
    Finished {
        /// Scene that loaded.
        scene: String,
        /// Polls it took, including the final one.
        polls: u32,
    },
    /// The load failed.
    Failed {
        /// Scene that was requested.
        scene: String,
        /// Loader's reason.
        details: String,
    },
}

struct InFlight {
    scene: String,
    load: Box<dyn SceneLoad>,
    polls: u32,
}

/// Runs at most one scene load at a time.
pub struct SceneDirector {
    loader: Box<dyn SceneLoader>,
    in_flight: Option<InFlight>,
}

impl SceneDirector {
    /// Idle director using `loader`.
    #[must_use]
    pub fn new(loader: Box<dyn SceneLoader>) -> Self {
        Self {
            loader,
            in_flight: None,
        }
    }

    /// Start loading `scene`. Returns the scene whose pending load was cancelled, if any.
    pub fn begin(&mut self, scene: &str) -> Option<String> {
        let superseded = self.in_flight.take().map(|mut old| {
            old.load.cancel();
            old.scene
        });
        self.in_flight = Some(InFlight {
            scene: scene.to_string(),
            load: self.loader.begin(scene),
            polls: 0,
        });
        superseded
    }

    /// Poll the in-flight load once. `None` while pending or idle.
    pub fn poll(&mut self) -> Option<SceneOutcome> {
        let flight = self.in_flight.as_mut()?;
        flight.polls = flight.polls.saturating_add(1);
        let outcome = match flight.load.poll() {
            LoadPoll::Pending => return None,
            LoadPoll::Ready => SceneOutcome::Finished {
                scene: flight.scene.clone(),
                polls: flight.polls,
            },
            LoadPoll::Failed(details) => SceneOutcome::Failed {
                scene: flight.scene.clone(),
                details,
            },
        };
        self.in_flight = None;
        Some(outcome)
    }

    /// A load is pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Scene being loaded.
    #[must_use]
    pub fn loading_scene(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|f| f.scene.as_str())
    }
}

impl fmt::Debug for SceneDirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneDirector")
            .field("loading", &self.loading_scene())
            .finish_non_exhaustive()
    }
}
