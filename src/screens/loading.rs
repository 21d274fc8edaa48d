//! Loading indicator shown on its own overlay channel while a scene loads.

use std::any::Any;
use std::time::Duration;

use crate::screen::{Screen, ScreenAction, ScreenContext};

/// Loading indicator for a pending scene load.
#[derive(Debug, Clone, Default)]
pub struct LoadingView {
    scene: String,
    elapsed: Duration,
}

impl LoadingView {
    /// Catalog kind.
    pub const KIND: &'static str = "loading";

    /// Indicator for `scene`.
    #[must_use]
    pub fn new(scene: &str) -> Self {
        Self {
            scene: scene.to_string(),
            elapsed: Duration::ZERO,
        }
    }

    /// Scene being loaded.
    #[must_use]
    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// Unscaled time the indicator has been visible.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Screen for LoadingView {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn tick(&mut self, dt: Duration, _cx: &mut ScreenContext<'_>) -> ScreenAction {
        self.elapsed += dt;
        ScreenAction::Stay
    }

    fn status(&self) -> String {
        if self.scene.is_empty() {
            "loading".to_string()
        } else {
            format!("loading {}", self.scene)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
