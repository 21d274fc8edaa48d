//! Gameplay HUD overlay: one status line refreshed every frame.

use std::any::Any;
use std::time::Duration;

use crate::screen::{Screen, ScreenAction, ScreenContext};

/// Heads-up status line, rebuilt every frame.
#[derive(Debug, Clone, Default)]
pub struct Hud {
    line: String,
    refreshes: u64,
}

impl Hud {
    /// Catalog kind.
    pub const KIND: &'static str = "hud";

    /// Last rendered line.
    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    /// How many times the line was rebuilt.
    #[must_use]
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    fn refresh(&mut self, cx: &ScreenContext<'_>) {
        self.line = format!(
            "scene={} paused={} input={}",
            cx.active_scene().unwrap_or("-"),
            cx.is_paused(),
            cx.input_mode()
        );
        self.refreshes += 1;
    }
}

impl Screen for Hud {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_opened(&mut self, cx: &mut ScreenContext<'_>) {
        self.refresh(cx);
    }

    fn tick(&mut self, _dt: Duration, cx: &mut ScreenContext<'_>) -> ScreenAction {
        self.refresh(cx);
        ScreenAction::Stay
    }

    fn status(&self) -> String {
        self.line.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::session::SessionBuilder;

    #[test]
    fn hud_tracks_pause_and_mode() {
        let mut s = SessionBuilder::new(Config::with_default_scenes()).build();
        s.load_scene("Game");
        s.tick(Duration::ZERO);
        s.toggle_pause_menu();
        s.tick(Duration::from_millis(16));
        let hud = s.overlays().get::<Hud>("HUD").unwrap();
        assert_eq!(hud.line(), "scene=Game paused=true input=ui");
    }
}
