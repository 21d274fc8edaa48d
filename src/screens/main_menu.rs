//! Title screen: start the game, open settings, or quit.

use std::any::Any;

use crate::screen::{Screen, ScreenAction, ScreenContext, ScreenEvent};
use crate::session::services::UiRequest;

/// Start, settings and quit buttons.
#[derive(Debug, Clone, Copy, Default)]
pub struct MainMenu;

impl MainMenu {
    /// Catalog kind.
    pub const KIND: &'static str = "main_menu";
}

impl Screen for MainMenu {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn handle(&mut self, event: &ScreenEvent, cx: &mut ScreenContext<'_>) -> ScreenAction {
        let ScreenEvent::Click { control } = event else {
            return ScreenAction::Stay;
        };
        match control.as_str() {
            "start" => {
                let scene = cx.config().screens.game_scene.clone();
                cx.request(UiRequest::LoadScene(scene));
            }
            "settings" => cx.request(UiRequest::Push("settings".to_string())),
            "quit" => cx.request(UiRequest::Quit),
            _ => {}
        }
        ScreenAction::Stay
    }

    fn status(&self) -> String {
        "[start] [settings] [quit]".to_string()
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
    use std::time::Duration;

    use crate::arbiter::input_mode::InputMode;
    use crate::core::config::Config;
    use crate::screen::ScreenEvent;
    use crate::session::SessionBuilder;

    #[test]
    fn start_loads_game_and_quit_sets_flag() {
        let mut s = SessionBuilder::new(Config::with_default_scenes()).build();
        s.load_scene("MainMenu");
        s.tick(Duration::ZERO);
        assert_eq!(s.stack().kinds(), vec!["main_menu"]);
        assert_eq!(s.input_mode(), InputMode::Ui);

        s.dispatch(&ScreenEvent::click("settings"));
        assert_eq!(s.stack().kinds(), vec!["main_menu", "settings"]);
        s.dispatch(&ScreenEvent::Back);

        s.dispatch(&ScreenEvent::click("start"));
        assert_eq!(s.loading_scene(), Some("Game"));
        assert!(s.stack().is_empty());
        s.tick(Duration::ZERO);
        assert_eq!(s.active_scene(), Some("Game"));
        assert_eq!(s.input_mode(), InputMode::Gameplay);

        s.load_scene("MainMenu");
        s.tick(Duration::ZERO);
        s.dispatch(&ScreenEvent::click("quit"));
        assert!(s.quit_requested());
    }
}
