//! Built-in screens registered in every default catalog.

pub mod hud;
pub mod loading;
pub mod main_menu;
pub mod pause_menu;
pub mod settings_screen;

use crate::screen::catalog::ScreenCatalog;
use crate::screen::toast::ToastView;

use self::hud::Hud;
use self::loading::LoadingView;
use self::main_menu::MainMenu;
use self::pause_menu::PauseMenu;
use self::settings_screen::SettingsScreen;

/// Register every built-in kind. Fails if one is already registered.
pub fn register_builtins(catalog: &mut ScreenCatalog) -> crate::core::errors::Result<()> {
    catalog.register(PauseMenu::KIND, |_| Box::new(PauseMenu::new()))?;
    catalog.register(SettingsScreen::KIND, |cfg| Box::new(SettingsScreen::new(cfg)))?;
    catalog.register(MainMenu::KIND, |_| Box::new(MainMenu))?;
    catalog.register(Hud::KIND, |_| Box::new(Hud::default()))?;
    catalog.register(LoadingView::KIND, |_| Box::new(LoadingView::new("")))?;
    catalog.register("toast", |_| Box::new(ToastView::default()))?;
    Ok(())
}

/// A fresh catalog holding the built-in kinds.
#[must_use]
pub fn builtin_catalog() -> ScreenCatalog {
    let mut catalog = ScreenCatalog::new();
    // An empty catalog has no duplicates to reject.
    let _ = register_builtins(&mut catalog);
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_register_once() {
        let mut catalog = builtin_catalog();
        assert_eq!(
            catalog.kinds(),
            vec!["hud", "loading", "main_menu", "pause_menu", "settings", "toast"]
        );
        assert!(register_builtins(&mut catalog).is_err());
    }
}
