//! Composition root: builds every component from explicit collaborators and
//! drives them from discrete events and per-frame ticks.
//!
//! There is no global registry. [`SessionBuilder`] receives storage, appliers,
//! the input backend, the pause effect, the scene loader and the activity
//! logger, and the [`Session`] owns everything it builds from them.
//!
//! Screens never reach the stack or overlay registry themselves. Anything
//! structural they want goes through [`UiRequest`], and the session drains the
//! queue once the hook that queued it has returned.

pub mod headless;
pub mod save;
pub mod scene;
pub mod services;

use std::time::Duration;

use crate::arbiter::input_mode::{InputMode, InputModeArbiter, ModeBackend};
use crate::arbiter::pause::{PauseArbiter, PauseEffect};
use crate::core::config::Config;
use crate::core::errors::{Result, UiError};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::progress::store::ProgressStore;
use crate::screen::catalog::ScreenCatalog;
use crate::screen::overlay::{OverlayRegistry, normalize_channel};
use crate::screen::stack::ModalStack;
use crate::screen::toast::{ToastQueue, ToastStep, ToastTiming, ToastView};
use crate::screen::{Screen, ScreenAction, ScreenEvent, ScreenId};
use crate::screens::builtin_catalog;
use crate::screens::loading::LoadingView;
use crate::settings::appliers::Appliers;
use crate::settings::data::VideoLimits;
use crate::settings::storage::{MemoryStorage, Storage};
use crate::settings::transaction::{LoadReport, SettingsTransaction};

use self::save::{SaveCoordinator, SaveParticipant, SaveReport};
use self::scene::{InstantLoader, SceneDirector, SceneLoader, SceneOutcome};
use self::services::{Services, UiRequest};

/// Overlay channel holding the loading indicator during scene loads.
pub const LOADING_CHANNEL: &str = "Loading";

/// Requests applied per drain before the rest are dropped as runaway.
const MAX_REQUESTS_PER_DRAIN: usize = 64;

/// Frame delta on both clocks. `scaled` is zero while paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTimes {
    /// Real time since the last tick.
    pub unscaled: Duration,
    /// Game time; zero while paused.
    pub scaled: Duration,
}

// ──────────────────── builder ────────────────────

/// Wires a [`Session`] from config plus optional collaborators.
pub struct SessionBuilder {
    config: Config,
    storage: Option<Box<dyn Storage>>,
    appliers: Option<Appliers>,
    input_backend: Option<Box<dyn ModeBackend<InputMode>>>,
    pause_effect: Option<Box<dyn PauseEffect>>,
    scene_loader: Option<Box<dyn SceneLoader>>,
    activity: Option<ActivityLoggerHandle>,
    catalog: Option<ScreenCatalog>,
}

impl SessionBuilder {
    /// Unset collaborators default to in-memory storage, no-op runtime hooks,
    /// instant scene loads, no activity log, and the built-in screens.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            storage: None,
            appliers: None,
            input_backend: None,
            pause_effect: None,
            scene_loader: None,
            activity: None,
            catalog: None,
        }
    }

    /// Storage for settings and progress. Defaults to JSON files under the config's data dir.
    #[must_use]
    pub fn storage(mut self, storage: Box<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Audio, video and controls appliers.
    #[must_use]
    pub fn appliers(mut self, appliers: Appliers) -> Self {
        self.appliers = Some(appliers);
        self
    }

    /// Backend that enables input action maps.
    #[must_use]
    pub fn input_backend(mut self, backend: Box<dyn ModeBackend<InputMode>>) -> Self {
        self.input_backend = Some(backend);
        self
    }

    /// Runtime side of pausing.
    #[must_use]
    pub fn pause_effect(mut self, effect: Box<dyn PauseEffect>) -> Self {
        self.pause_effect = Some(effect);
        self
    }

    /// Scene loader used by `load_scene`.
    #[must_use]
    pub fn scene_loader(mut self, loader: Box<dyn SceneLoader>) -> Self {
        self.scene_loader = Some(loader);
        self
    }

    /// Activity log handle. Defaults to a disabled one.
    #[must_use]
    pub fn activity(mut self, handle: ActivityLoggerHandle) -> Self {
        self.activity = Some(handle);
        self
    }

    /// Replace the built-in catalog entirely.
    #[must_use]
    pub fn catalog(mut self, catalog: ScreenCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Build the session. Missing collaborators get no-op defaults.
    pub fn build(self) -> Session {
        let config = self.config;
        let activity = self.activity.unwrap_or_else(ActivityLoggerHandle::disabled);
        let storage = self
            .storage
            .unwrap_or_else(|| Box::new(MemoryStorage::new()));
        let appliers = self.appliers.unwrap_or_else(Appliers::noop);
        let backend = self
            .input_backend
            .unwrap_or_else(|| Box::new(|_: InputMode| {}));
        let effect = self.pause_effect.unwrap_or_else(|| Box::new(|_: bool| {}));
        let loader = self
            .scene_loader
            .unwrap_or_else(|| Box::new(InstantLoader));

        let config_hash = config
            .stable_hash()
            .unwrap_or_else(|e| format!("unavailable ({})", e.code()));
        activity.send(ActivityEvent::SessionStarted { config_hash });

        let progress = ProgressStore::open(storage.share(), config.storage.progress_key.clone());
        log_load(
            &activity,
            progress.key(),
            "progress",
            progress.load_report(),
        );

        let settings = SettingsTransaction::open(
            storage,
            appliers,
            config.storage.settings_key.clone(),
            VideoLimits::from(&config.video),
        );
        log_load(
            &activity,
            settings.key(),
            "settings",
            settings.load_report(),
        );
        let saves = SaveCoordinator::new([settings.key().to_string(), progress.key().to_string()]);

        let services = Services::new(
            PauseArbiter::new(effect),
            InputModeArbiter::new(config.input.base_mode, backend),
            settings,
            progress,
            ToastQueue::new(ToastTiming::from(&config.toast)),
            activity,
            config,
        );

        Session {
            services,
            stack: ModalStack::new(),
            overlays: OverlayRegistry::new(),
            catalog: self.catalog.unwrap_or_else(builtin_catalog),
            director: SceneDirector::new(loader),
            saves,
            quit_requested: false,
            shut_down: false,
        }
    }
}

fn log_load(
    activity: &ActivityLoggerHandle,
    key: &str,
    store: &'static str,
    report: &LoadReport,
) {
    activity.send(ActivityEvent::StoreLoaded {
        store,
        key: key.to_string(),
        outcome: report.outcome.label(),
        details: report.outcome.details().map(str::to_string),
    });
    if let Some(details) = &report.save_error {
        activity.send(ActivityEvent::from_error(&UiError::Storage {
            key: key.to_string(),
            details: details.clone(),
        }));
    }
}

// ──────────────────── session ────────────────────

/// Composition root: screens, arbiters, settings, progress and scene loads.
pub struct Session {
    services: Services,
    stack: ModalStack,
    overlays: OverlayRegistry,
    catalog: ScreenCatalog,
    director: SceneDirector,
    saves: SaveCoordinator,
    quit_requested: bool,
    shut_down: bool,
}

impl Session {
    // ── modal stack ──

    /// Push a catalog screen. Unknown kinds are logged and change nothing.
    pub fn push(&mut self, kind: &str) -> Option<ScreenId> {
        let id = self.push_kind(kind, "push");
        self.drain_requests();
        id
    }

    /// Mount `screen` on top of the stack.
    pub fn push_screen(&mut self, screen: Box<dyn Screen>) -> ScreenId {
        let id = self.stack.push(screen, &mut self.services);
        self.drain_requests();
        id
    }

    /// Close the top screen.
    pub fn pop(&mut self) -> Option<ScreenId> {
        let id = self.stack.pop(&mut self.services);
        self.drain_requests();
        id
    }

    /// Close every stacked screen, top first. Returns how many closed.
    pub fn clear_stack(&mut self) -> usize {
        let closed = self.stack.clear(&mut self.services);
        self.drain_requests();
        closed
    }

    /// Open the pause menu on an empty stack, close it when it is on top.
    /// Ignored while any other screen is on top.
    pub fn toggle_pause_menu(&mut self) -> bool {
        match self.stack.top_kind() {
            None => self.push("pause_menu").is_some(),
            Some("pause_menu") => self.pop().is_some(),
            Some(_) => false,
        }
    }

    // ── overlays ──

    /// Open a catalog screen on `channel`, replacing its occupant.
    pub fn show_overlay(&mut self, channel: &str, kind: &str) -> Option<ScreenId> {
        let id = self.show_overlay_kind(channel, kind);
        self.drain_requests();
        id
    }

    /// Close the occupant of `channel`. The loading indicator is held until
    /// its scene load completes.
    pub fn clear_overlay(&mut self, channel: &str) -> bool {
        let cleared = self.clear_overlay_channel(channel);
        self.drain_requests();
        cleared
    }

    /// Close every overlay except a loading indicator that is still needed.
    pub fn clear_overlays(&mut self) -> usize {
        let cleared = if self.director.is_loading() {
            self.overlays
                .clear_all_except(LOADING_CHANNEL, &mut self.services)
        } else {
            self.overlays.clear_all(&mut self.services)
        };
        self.services.toasts_mut().interrupt();
        self.drain_requests();
        cleared
    }

    // ── input and time ──

    /// Deliver `event` to the top of the stack. Returns `false` on an empty stack.
    pub fn dispatch(&mut self, event: &ScreenEvent) -> bool {
        let Some((id, action)) = self.stack.dispatch(event, &mut self.services) else {
            return false;
        };
        if action == ScreenAction::Close {
            self.stack.pop_if_top(id, &mut self.services);
        }
        self.drain_requests();
        true
    }

    /// Advance one frame by `dt` of real time.
    ///
    /// Order: scene load, stack top, overlays, toasts, then queued requests.
    /// Screens and toasts run on the unscaled clock; the scaled time returned
    /// is what gameplay would see.
    pub fn tick(&mut self, dt: Duration) -> FrameTimes {
        let times = FrameTimes {
            unscaled: dt,
            scaled: if self.services.is_paused() {
                Duration::ZERO
            } else {
                dt
            },
        };
        self.poll_scene();
        if let Some((id, ScreenAction::Close)) = self.stack.tick(dt, &mut self.services) {
            self.stack.pop_if_top(id, &mut self.services);
        }
        self.overlays.tick(dt, &mut self.services);
        self.pump_toasts(dt);
        self.drain_requests();
        times
    }

    /// Queue a toast. Blank messages are ignored, and nothing starts while a
    /// scene is loading.
    pub fn toast(&mut self, message: &str, hold_secs: Option<f64>) -> bool {
        let queued = self.services.toasts_mut().push(message, hold_secs);
        self.pump_toasts(Duration::ZERO);
        queued
    }

    // ── scenes ──

    /// Clear the UI, show the loading indicator, and start loading `scene`.
    /// A load already in flight is cancelled.
    pub fn load_scene(&mut self, scene: &str) {
        self.begin_scene(scene);
        self.drain_requests();
    }

    /// A scene load is pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.director.is_loading()
    }

    /// Scene being loaded.
    #[must_use]
    pub fn loading_scene(&self) -> Option<&str> {
        self.director.loading_scene()
    }

    /// Scene that finished loading last.
    #[must_use]
    pub fn active_scene(&self) -> Option<&str> {
        self.services.active_scene()
    }

    // ── persistence and lifecycle ──

    /// Ask every save participant to persist: settings, progress, then
    /// registered participants in registration order.
    pub fn save_all(&mut self) -> SaveReport {
        let (settings, progress) = self.services.save_residents();
        let mut resident: [&mut dyn SaveParticipant; 2] = [settings, progress];
        let report = self.saves.save_all(&mut resident);
        for (_, err) in &report.failed {
            self.services.log(ActivityEvent::from_error(err));
        }
        self.services.log(ActivityEvent::SaveCompleted {
            written: report.written.clone(),
            failed: report.failed_keys(),
        });
        report
    }

    /// Add a participant to `save_all`. A storage key that is already taken
    /// is rejected and logged.
    pub fn register_save_participant(
        &mut self,
        participant: Box<dyn SaveParticipant>,
    ) -> Result<()> {
        self.saves.register(participant).inspect_err(|e| {
            self.services.log(ActivityEvent::from_error(e));
        })
    }

    /// Remove a registered participant. Settings and progress stay.
    pub fn unregister_save_participant(&mut self, key: &str) -> bool {
        self.saves.unregister(key).is_some()
    }

    /// Participant keys in save order.
    #[must_use]
    pub fn save_keys(&self) -> Vec<&str> {
        self.saves.keys()
    }

    /// Tear the UI down, persist, and stop the activity log. Idempotent.
    pub fn shutdown(&mut self, reason: &str) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.stack.clear(&mut self.services);
        self.overlays.clear_all(&mut self.services);
        self.services.toasts_mut().clear();
        self.services.discard_requests();
        // Failures are already in the activity log.
        self.save_all();
        self.services.log(ActivityEvent::SessionStopped {
            reason: reason.to_string(),
        });
        self.services.activity().shutdown();
    }

    /// A screen asked the host to exit.
    #[must_use]
    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    // ── accessors ──

    /// Shared collaborators.
    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Mutable shared collaborators.
    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.services
    }

    /// The modal stack.
    #[must_use]
    pub fn stack(&self) -> &ModalStack {
        &self.stack
    }

    /// Mutable modal stack.
    pub fn stack_mut(&mut self) -> &mut ModalStack {
        &mut self.stack
    }

    /// Overlay channels.
    #[must_use]
    pub fn overlays(&self) -> &OverlayRegistry {
        &self.overlays
    }

    /// Screen factories.
    #[must_use]
    pub fn catalog(&self) -> &ScreenCatalog {
        &self.catalog
    }

    /// Mutable screen factories.
    pub fn catalog_mut(&mut self) -> &mut ScreenCatalog {
        &mut self.catalog
    }

    /// Any pause claim is live.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.services.is_paused()
    }

    /// Input mode in effect.
    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        self.services.input_mode()
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.services.config()
    }

    // ── internals ──

    fn push_kind(&mut self, kind: &str, context: &'static str) -> Option<ScreenId> {
        match self.catalog.create(kind, self.services.config()) {
            Ok(screen) => Some(self.stack.push(screen, &mut self.services)),
            Err(_) => {
                self.services.log(ActivityEvent::UnknownScreen {
                    kind: kind.to_string(),
                    context,
                });
                None
            }
        }
    }

    fn show_overlay_kind(&mut self, channel: &str, kind: &str) -> Option<ScreenId> {
        if self.holds_loading_channel(channel, "show") {
            return None;
        }
        match self.catalog.create(kind, self.services.config()) {
            Ok(screen) => Some(self.overlays.show(channel, screen, &mut self.services)),
            Err(_) => {
                self.services.log(ActivityEvent::UnknownScreen {
                    kind: kind.to_string(),
                    context: "overlay",
                });
                None
            }
        }
    }

    fn clear_overlay_channel(&mut self, channel: &str) -> bool {
        if self.holds_loading_channel(channel, "clear") {
            return false;
        }
        let cleared = self.overlays.clear(channel, &mut self.services);
        if cleared && channel == self.toast_channel() {
            self.services.toasts_mut().interrupt();
        }
        cleared
    }

    /// `true` (and logged) when `channel` is the indicator of a pending load.
    fn holds_loading_channel(&self, channel: &str, context: &'static str) -> bool {
        let held = self.director.is_loading() && normalize_channel(channel) == LOADING_CHANNEL;
        if held {
            self.services
                .log(ActivityEvent::LoadingIndicatorHeld { context });
        }
        held
    }

    fn toast_channel(&self) -> String {
        self.services.config().toast.channel.clone()
    }

    fn begin_scene(&mut self, scene: &str) {
        self.overlays.clear_all(&mut self.services);
        self.stack.clear(&mut self.services);
        self.services.toasts_mut().interrupt();
        // Requests queued by screens being torn down target the old scene.
        self.services.discard_requests();

        self.overlays.show(
            LOADING_CHANNEL,
            Box::new(LoadingView::new(scene)),
            &mut self.services,
        );
        self.services.log(ActivityEvent::SceneLoadStarted {
            scene: scene.to_string(),
        });
        if let Some(cancelled) = self.director.begin(scene) {
            self.services.log(ActivityEvent::SceneLoadSuperseded {
                cancelled,
                by: scene.to_string(),
            });
        }
    }

    fn poll_scene(&mut self) {
        let Some(outcome) = self.director.poll() else {
            return;
        };
        self.overlays.clear(LOADING_CHANNEL, &mut self.services);
        match outcome {
            SceneOutcome::Finished { scene, polls } => {
                self.services.set_active_scene(Some(scene.clone()));
                self.services.log(ActivityEvent::SceneLoadFinished {
                    scene: scene.clone(),
                    polls,
                });
                self.apply_scene_profile(&scene);
            }
            SceneOutcome::Failed { scene, details } => {
                let err = UiError::SceneLoad {
                    scene: scene.clone(),
                    details: details.clone(),
                };
                self.services
                    .log(ActivityEvent::SceneLoadFailed { scene, details });
                self.services.log(ActivityEvent::from_error(&err));
            }
        }
    }

    fn apply_scene_profile(&mut self, scene: &str) {
        let Some(profile) = self.services.config().scene_profile(scene).cloned() else {
            return;
        };
        if let Some(mode) = profile.base_mode {
            self.services.set_base_input_mode(mode);
        }
        for kind in &profile.push {
            self.push_kind(kind, "scene_profile");
        }
        for (channel, kind) in &profile.overlays {
            self.show_overlay_kind(channel, kind);
        }
    }

    fn pump_toasts(&mut self, dt: Duration) {
        // The queue waits out scene loads; `tick` pumps it again once
        // `poll_scene` has hidden the indicator.
        if self.director.is_loading() {
            return;
        }
        let steps = self.services.toasts_mut().tick(dt);
        if steps.is_empty() {
            return;
        }
        let channel = self.toast_channel();
        for step in steps {
            match step {
                ToastStep::Show { message } => {
                    self.overlays.show(
                        &channel,
                        Box::new(ToastView::new(&message)),
                        &mut self.services,
                    );
                }
                ToastStep::Alpha(alpha) => {
                    if let Some(view) = self.overlays.get_mut::<ToastView>(&channel) {
                        view.set_alpha(alpha);
                    }
                }
                ToastStep::Hide => {
                    self.overlays.clear(&channel, &mut self.services);
                }
            }
        }
    }

    fn drain_requests(&mut self) {
        for _ in 0..MAX_REQUESTS_PER_DRAIN {
            let Some(request) = self.services.next_request() else {
                self.pump_toasts(Duration::ZERO);
                return;
            };
            self.apply_request(request);
        }
        let dropped = self.services.discard_requests();
        if dropped > 0 {
            self.services.log(ActivityEvent::from_error(&UiError::Runtime {
                details: format!("request queue did not settle, dropped {dropped} requests"),
            }));
        }
        self.pump_toasts(Duration::ZERO);
    }

    fn apply_request(&mut self, request: UiRequest) {
        match request {
            UiRequest::Push(kind) => {
                self.push_kind(&kind, "request");
            }
            UiRequest::PushScreen(screen) => {
                self.stack.push(screen, &mut self.services);
            }
            UiRequest::Pop => {
                self.stack.pop(&mut self.services);
            }
            UiRequest::LoadScene(scene) => self.begin_scene(&scene),
            UiRequest::ShowOverlay { channel, kind } => {
                self.show_overlay_kind(&channel, &kind);
            }
            UiRequest::ClearOverlay(channel) => {
                self.clear_overlay_channel(&channel);
            }
            UiRequest::Quit => self.quit_requested = true,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("stack", &self.stack)
            .field("overlays", &self.overlays)
            .field("director", &self.director)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Services over in-memory storage with inert runtime hooks.
    pub(crate) fn services() -> Services {
        let config = Config::with_default_scenes();
        Services::new(
            PauseArbiter::new(Box::new(|_: bool| {})),
            InputModeArbiter::new(config.input.base_mode, Box::new(|_: InputMode| {})),
            SettingsTransaction::open(
                Box::new(MemoryStorage::new()),
                Appliers::noop(),
                config.storage.settings_key.clone(),
                VideoLimits::from(&config.video),
            ),
            ProgressStore::open(
                Box::new(MemoryStorage::new()),
                config.storage.progress_key.clone(),
            ),
            ToastQueue::new(ToastTiming::from(&config.toast)),
            ActivityLoggerHandle::disabled(),
            config,
        )
    }
}
