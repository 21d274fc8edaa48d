//! In-game pause menu. Holds a pause claim and forces UI input for as long
//! as it is mounted, including while settings is open on top of it.

use std::any::Any;

use crate::arbiter::input_mode::InputMode;
use crate::screen::{Screen, ScreenAction, ScreenContext, ScreenEvent};
use crate::session::services::UiRequest;

const REASON: &str = "PauseMenu";

/// Pauses the game while open.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauseMenu;

impl PauseMenu {
    /// Catalog kind.
    pub const KIND: &'static str = "pause_menu";

    /// Fresh menu.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Screen for PauseMenu {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_opened(&mut self, cx: &mut ScreenContext<'_>) {
        cx.hold_pause(REASON);
        cx.hold_input_mode(InputMode::Ui, REASON);
    }

    fn handle(&mut self, event: &ScreenEvent, cx: &mut ScreenContext<'_>) -> ScreenAction {
        match event {
            ScreenEvent::Back => ScreenAction::Close,
            ScreenEvent::Click { control } => match control.as_str() {
                "resume" => ScreenAction::Close,
                "settings" => {
                    cx.request(UiRequest::Push("settings".to_string()));
                    ScreenAction::Stay
                }
                "quit" => {
                    let scene = cx.config().screens.menu_scene.clone();
                    cx.request(UiRequest::LoadScene(scene));
                    ScreenAction::Stay
                }
                _ => ScreenAction::Stay,
            },
            _ => ScreenAction::Stay,
        }
    }

    fn status(&self) -> String {
        "[resume] [settings] [quit]".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
