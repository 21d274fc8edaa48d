//! Screens and the two places they live: the modal stack and overlay channels.
//!
//! A [`Screen`] is any type implementing the lifecycle hooks. The stack and the
//! registry mount screens through [`Mounted`], which owns the screen together
//! with the claims it took. Unmounting always runs `on_closed` first and then
//! releases every remaining claim, so a screen can never leak a pause or
//! input-mode claim past its own destruction, whichever path closed it.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::arbiter::input_mode::{InputMode, ModeToken};
use crate::arbiter::ledger::TokenId;
use crate::arbiter::pause::PauseToken;
use crate::core::config::Config;
use crate::logger::activity::ActivityEvent;
use crate::session::services::{Services, UiRequest};
use crate::settings::transaction::SettingsTransaction;

pub mod catalog;
pub mod confirm;
pub mod overlay;
pub mod stack;
pub mod toast;

static NEXT_SCREEN: AtomicU64 = AtomicU64::new(1);

/// Identity of one mounted screen instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenId(u64);

impl ScreenId {
    fn next() -> Self {
        Self(NEXT_SCREEN.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id; unique per process.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Discrete UI input delivered to the active screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScreenEvent {
    /// A button was pressed.
    Click {
        /// Control name.
        control: String,
    },
    /// A slider moved.
    Slider {
        /// Control name.
        control: String,
        /// New position.
        value: f32,
    },
    /// A toggle flipped.
    Toggle {
        /// Control name.
        control: String,
        /// New state.
        on: bool,
    },
    /// A dropdown entry was picked.
    Select {
        /// Control name.
        control: String,
        /// Picked entry.
        index: usize,
    },
    /// Back/escape.
    Back,
}

impl ScreenEvent {
    /// Click on `control`.
    #[must_use]
    pub fn click(control: &str) -> Self {
        Self::Click {
            control: control.to_string(),
        }
    }
}

/// What the screen wants after handling an event or a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenAction {
    /// Keep the screen open.
    #[default]
    Stay,
    /// Close this screen (pop it, or clear its overlay channel).
    Close,
}

/// A presentable screen. The host calls `on_opened` and `on_closed` exactly
/// once each, in that order; `handle` and `tick` only come in between.
pub trait Screen: Any {
    /// Catalog name of this screen type.
    fn kind(&self) -> &'static str;

    /// Runs once, right after the screen is mounted.
    fn on_opened(&mut self, _cx: &mut ScreenContext<'_>) {}

    /// Runs once, right before the screen is unmounted. Claims are released after it returns.
    fn on_closed(&mut self, _cx: &mut ScreenContext<'_>) {}

    /// Handle one input event. Only the top screen receives events.
    fn handle(&mut self, _event: &ScreenEvent, _cx: &mut ScreenContext<'_>) -> ScreenAction {
        ScreenAction::Stay
    }

    /// Per-frame update on the unscaled clock.
    fn tick(&mut self, _dt: Duration, _cx: &mut ScreenContext<'_>) -> ScreenAction {
        ScreenAction::Stay
    }

    /// One-line description of the visible state.
    fn status(&self) -> String {
        String::new()
    }

    /// Downcast support for typed lookups.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ──────────────────── claims ────────────────────

/// Handle to one claim a screen holds, for early release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKey {
    /// A pause claim.
    Pause(TokenId),
    /// An input-mode claim.
    Input(TokenId),
}

/// Tokens held on behalf of one mounted screen.
#[derive(Debug, Default)]
pub struct Claims {
    pause: Vec<PauseToken>,
    input: Vec<ModeToken>,
}

impl Claims {
    /// Number of held claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pause.len() + self.input.len()
    }

    /// Holds no claim.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&mut self, key: ClaimKey, services: &mut Services) -> bool {
        match key {
            ClaimKey::Pause(id) => {
                let Some(pos) = self.pause.iter().position(|t| t.id() == id) else {
                    return false;
                };
                services.release_pause(self.pause.remove(pos)).removed()
            }
            ClaimKey::Input(id) => {
                let Some(pos) = self.input.iter().position(|t| t.id() == id) else {
                    return false;
                };
                services.release_input(self.input.remove(pos)).removed()
            }
        }
    }

    /// Release everything, newest first.
    fn release_all(&mut self, services: &mut Services) -> usize {
        let mut released = 0;
        while let Some(token) = self.input.pop() {
            released += usize::from(services.release_input(token).removed());
        }
        while let Some(token) = self.pause.pop() {
            released += usize::from(services.release_pause(token).removed());
        }
        released
    }
}

// ──────────────────── context ────────────────────

/// What a screen may touch from inside a hook: its own claims, the settings
/// transaction, and the request queue. The stack itself is out of reach;
/// structural changes are queued and applied by the session afterwards.
pub struct ScreenContext<'a> {
    services: &'a mut Services,
    claims: &'a mut Claims,
    screen: ScreenId,
}

impl<'a> ScreenContext<'a> {
    pub(crate) fn new(services: &'a mut Services, claims: &'a mut Claims, screen: ScreenId) -> Self {
        Self {
            services,
            claims,
            screen,
        }
    }

    /// Screen the hook runs for.
    #[must_use]
    pub fn screen_id(&self) -> ScreenId {
        self.screen
    }

    /// Pause for as long as this screen is mounted (or until released).
    pub fn hold_pause(&mut self, reason: &str) -> ClaimKey {
        let token = self.services.acquire_pause(reason);
        let key = ClaimKey::Pause(token.id());
        self.claims.pause.push(token);
        key
    }

    /// Force an input mode for as long as this screen is mounted (or until released).
    pub fn hold_input_mode(&mut self, mode: InputMode, reason: &str) -> ClaimKey {
        let token = self.services.acquire_input(mode, reason);
        let key = ClaimKey::Input(token.id());
        self.claims.input.push(token);
        key
    }

    /// Release one held claim early. Unknown keys are ignored.
    pub fn release_claim(&mut self, key: ClaimKey) -> bool {
        self.claims.release(key, self.services)
    }

    /// Claims the current screen holds.
    #[must_use]
    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    /// Any pause claim is live.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.services.is_paused()
    }

    /// Input mode currently in effect.
    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        self.services.input_mode()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.services.config()
    }

    /// Scene that finished loading last.
    #[must_use]
    pub fn active_scene(&self) -> Option<&str> {
        self.services.active_scene()
    }

    /// The live settings transaction.
    #[must_use]
    pub fn settings(&self) -> &SettingsTransaction {
        self.services.settings()
    }

    /// Mutable settings transaction.
    pub fn settings_mut(&mut self) -> &mut SettingsTransaction {
        self.services.settings_mut()
    }

    /// Queue a toast; `None` uses the configured default hold.
    pub fn toast(&mut self, message: &str, hold_secs: Option<f64>) {
        self.services.toast(message, hold_secs);
    }

    /// Queue a structural change for the session to apply after this hook.
    pub fn request(&mut self, request: UiRequest) {
        self.services.request(request);
    }

    /// Send an event to the activity log.
    pub fn log(&self, event: ActivityEvent) {
        self.services.log(event);
    }
}

// ──────────────────── mounting ────────────────────

/// A live screen plus the claims it holds.
pub(crate) struct Mounted {
    pub(crate) id: ScreenId,
    pub(crate) screen: Box<dyn Screen>,
    claims: Claims,
}

impl Mounted {
    /// Instantiate and run `on_opened`.
    pub(crate) fn open(screen: Box<dyn Screen>, services: &mut Services) -> Self {
        let mut mounted = Self {
            id: ScreenId::next(),
            screen,
            claims: Claims::default(),
        };
        let mut cx = ScreenContext::new(services, &mut mounted.claims, mounted.id);
        mounted.screen.on_opened(&mut cx);
        mounted
    }

    /// Run `on_closed`, release leftover claims, then drop the screen.
    /// Returns the number of claims released on the screen's behalf.
    pub(crate) fn close(mut self, services: &mut Services) -> usize {
        {
            let mut cx = ScreenContext::new(services, &mut self.claims, self.id);
            self.screen.on_closed(&mut cx);
        }
        self.claims.release_all(services)
    }

    pub(crate) fn handle(&mut self, event: &ScreenEvent, services: &mut Services) -> ScreenAction {
        let mut cx = ScreenContext::new(services, &mut self.claims, self.id);
        self.screen.handle(event, &mut cx)
    }

    pub(crate) fn tick(&mut self, dt: Duration, services: &mut Services) -> ScreenAction {
        let mut cx = ScreenContext::new(services, &mut self.claims, self.id);
        self.screen.tick(dt, &mut cx)
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.screen.kind()
    }

    pub(crate) fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub(crate) fn downcast<T: Screen>(&self) -> Option<&T> {
        self.screen.as_any().downcast_ref::<T>()
    }

    pub(crate) fn downcast_mut<T: Screen>(&mut self) -> Option<&mut T> {
        self.screen.as_any_mut().downcast_mut::<T>()
    }
}
