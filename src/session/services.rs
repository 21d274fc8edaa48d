//! State shared with screens through [`ScreenContext`](crate::screen::ScreenContext):
//! the two arbiters, the settings transaction, the progress store, the toast
//! queue and the deferred request queue. Every arbiter transition is logged here.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::fmt;

use crate::arbiter::input_mode::{InputMode, InputModeArbiter, ModeToken};
use crate::arbiter::ledger::Released;
use crate::arbiter::pause::{PauseArbiter, PauseToken};
use crate::core::config::Config;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::progress::store::ProgressStore;
use crate::screen::Screen;
use crate::screen::toast::ToastQueue;
use crate::settings::transaction::SettingsTransaction;

/// Structural change queued by a screen, applied by the session after the
/// current hook returns.
pub enum UiRequest {
    /// Push a catalog screen by kind.
    Push(String),
    /// Push an already-built screen (e.g. a confirm gate).
    PushScreen(Box<dyn Screen>),
    Pop,
    LoadScene(String),
    ShowOverlay { channel: String, kind: String },
    ClearOverlay(String),
    /// Ask the host to end the session.
    Quit,
}

impl fmt::Debug for UiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push(kind) => f.debug_tuple("Push").field(kind).finish(),
            Self::PushScreen(screen) => f.debug_tuple("PushScreen").field(&screen.kind()).finish(),
            Self::Pop => f.write_str("Pop"),
            Self::LoadScene(scene) => f.debug_tuple("LoadScene").field(scene).finish(),
            Self::ShowOverlay { channel, kind } => f
                .debug_struct("ShowOverlay")
                .field("channel", channel)
                .field("kind", kind)
                .finish(),
            Self::ClearOverlay(channel) => f.debug_tuple("ClearOverlay").field(channel).finish(),
            Self::Quit => f.write_str("Quit"),
        }
    }
}

pub struct Services {
    pause: PauseArbiter,
    input: InputModeArbiter,
    settings: SettingsTransaction,
    progress: ProgressStore,
    toasts: ToastQueue,
    requests: VecDeque<UiRequest>,
    activity: ActivityLoggerHandle,
    config: Config,
    active_scene: Option<String>,
}

impl Services {
    pub(crate) fn new(
        pause: PauseArbiter,
        input: InputModeArbiter,
        settings: SettingsTransaction,
        progress: ProgressStore,
        toasts: ToastQueue,
        activity: ActivityLoggerHandle,
        config: Config,
    ) -> Self {
        Self {
            pause,
            input,
            settings,
            progress,
            toasts,
            requests: VecDeque::new(),
            activity,
            config,
            active_scene: None,
        }
    }

    // ── pause ──

    pub fn acquire_pause(&mut self, reason: &str) -> PauseToken {
        let was = self.pause.is_paused();
        let token = self.pause.acquire(reason);
        self.log_pause_transition(was);
        token
    }

    pub fn release_pause(&mut self, token: PauseToken) -> Released {
        let was = self.pause.is_paused();
        let released = self.pause.release(token);
        self.log_pause_transition(was);
        released
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    #[must_use]
    pub fn pause(&self) -> &PauseArbiter {
        &self.pause
    }

    // ── input mode ──

    pub fn acquire_input(&mut self, mode: InputMode, reason: &str) -> ModeToken {
        let was = self.input.effective();
        let token = self.input.acquire(mode, reason);
        self.log_mode_transition(was);
        token
    }

    /// Out-of-order releases are allowed and logged as a diagnostic.
    pub fn release_input(&mut self, token: ModeToken) -> Released {
        let was = self.input.effective();
        let reason = token.reason().to_string();
        let released = self.input.release(token);
        if released == Released::Buried {
            self.activity.send(ActivityEvent::OutOfOrderRelease {
                reason,
                effective: self.input.effective(),
            });
        }
        self.log_mode_transition(was);
        released
    }

    pub fn set_base_input_mode(&mut self, mode: InputMode) {
        let was = self.input.effective();
        self.input.set_base(mode);
        self.log_mode_transition(was);
    }

    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        self.input.effective()
    }

    #[must_use]
    pub fn input(&self) -> &InputModeArbiter {
        &self.input
    }

    // ── everything else ──

    #[must_use]
    pub fn settings(&self) -> &SettingsTransaction {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsTransaction {
        &mut self.settings
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut ProgressStore {
        &mut self.progress
    }

    /// Both resident save participants at once.
    pub(crate) fn save_residents(&mut self) -> (&mut SettingsTransaction, &mut ProgressStore) {
        (&mut self.settings, &mut self.progress)
    }

    #[must_use]
    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub(crate) fn toasts_mut(&mut self) -> &mut ToastQueue {
        &mut self.toasts
    }

    /// Queue a toast; blank messages are ignored.
    pub fn toast(&mut self, message: &str, hold_secs: Option<f64>) {
        self.toasts.push(message, hold_secs);
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn active_scene(&self) -> Option<&str> {
        self.active_scene.as_deref()
    }

    pub(crate) fn set_active_scene(&mut self, scene: Option<String>) {
        self.active_scene = scene;
    }

    pub fn request(&mut self, request: UiRequest) {
        self.requests.push_back(request);
    }

    pub(crate) fn next_request(&mut self) -> Option<UiRequest> {
        self.requests.pop_front()
    }

    pub(crate) fn discard_requests(&mut self) -> usize {
        let n = self.requests.len();
        self.requests.clear();
        n
    }

    pub fn log(&self, event: ActivityEvent) {
        self.activity.send(event);
    }

    #[must_use]
    pub fn activity(&self) -> &ActivityLoggerHandle {
        &self.activity
    }

    fn log_pause_transition(&self, was: bool) {
        let now = self.pause.is_paused();
        if now != was {
            self.activity.send(ActivityEvent::PauseChanged {
                paused: now,
                holders: self.pause.holders(),
            });
        }
    }

    fn log_mode_transition(&self, was: InputMode) {
        let now = self.input.effective();
        if now != was {
            self.activity.send(ActivityEvent::InputModeChanged {
                mode: now,
                holder: self.input.deciding_reason(),
            });
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("pause", &self.pause)
            .field("input", &self.input)
            .field("settings", &self.settings)
            .field("progress", &self.progress)
            .field("requests", &self.requests.len())
            .field("active_scene", &self.active_scene)
            .finish_non_exhaustive()
    }
}
