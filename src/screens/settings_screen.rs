//! Settings screen: audio, video and controls tabs over one settings
//! transaction, with apply/cancel and a keep-or-revert gate for display edits.
//!
//! Audio and controls edits preview immediately. A display edit (resolution,
//! fullscreen, quality) previews too, and the first one since the last
//! confirmation pushes a [`ConfirmGate`]. Keep confirms the display, revert or
//! timeout restores only the display from the last confirmed state.
//!
//! The screen keeps a mirror of what it shows and resyncs it from the
//! transaction's change feed, so edits made elsewhere (the gate's revert, a
//! reset) are reflected without the screen polling the value.

use std::any::Any;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::arbiter::input_mode::InputMode;
use crate::core::config::Config;
use crate::logger::activity::ActivityEvent;
use crate::screen::confirm::ConfirmGate;
use crate::screen::{Screen, ScreenAction, ScreenContext, ScreenEvent};
use crate::session::services::UiRequest;
use crate::settings::data::{AudioSettings, VideoSettings};
use crate::settings::transaction::{DisplayEdit, SettingsChange, SubscriptionId};

const REASON: &str = "SettingsScreen";

/// Used when the config lists no resolutions.
pub const FALLBACK_RESOLUTIONS: [(u32, u32); 3] = [(1920, 1080), (1600, 900), (1280, 720)];

/// Section shown by the settings screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsTab {
    /// Volumes and mute flags.
    #[default]
    Audio,
    /// Resolution, fullscreen and vsync.
    Video,
    /// Bindings and sensitivity.
    Controls,
}

/// What the screen currently displays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingsView {
    /// Audio as currently previewed.
    pub audio: AudioSettings,
    /// Video as currently previewed.
    pub video: VideoSettings,
    /// Index into the resolution list; falls back to 0 when the current size is not listed.
    pub resolution_index: usize,
    /// Any binding differs from the defaults.
    pub bindings_overridden: bool,
}

/// Tabbed settings editor over the live transaction.
pub struct SettingsScreen {
    tab: SettingsTab,
    resolutions: Vec<(u32, u32)>,
    pause_on_open: bool,
    subscription: Option<(SubscriptionId, Receiver<SettingsChange>)>,
    view: SettingsView,
    changes_seen: usize,
}

impl SettingsScreen {
    /// Catalog kind.
    pub const KIND: &'static str = "settings";

    /// Screen with the resolutions from `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            tab: SettingsTab::Audio,
            resolutions: resolution_options(&config.video.resolutions),
            pause_on_open: config.screens.settings_pause_on_open,
            subscription: None,
            view: SettingsView::default(),
            changes_seen: 0,
        }
    }

    /// Visible tab.
    #[must_use]
    pub fn tab(&self) -> SettingsTab {
        self.tab
    }

    /// What is displayed.
    #[must_use]
    pub fn view(&self) -> &SettingsView {
        &self.view
    }

    /// Resolution options, smallest first.
    #[must_use]
    pub fn resolutions(&self) -> &[(u32, u32)] {
        &self.resolutions
    }

    /// Change notifications received since opening.
    #[must_use]
    pub fn changes_seen(&self) -> usize {
        self.changes_seen
    }

    fn sync_view(&mut self, cx: &ScreenContext<'_>) {
        let data = cx.settings().current();
        self.view.audio = data.audio.clone();
        self.view.video = data.video.clone();
        self.view.resolution_index = self
            .resolutions
            .iter()
            .position(|&(w, h)| w == data.video.width && h == data.video.height)
            .unwrap_or(0);
        self.view.bindings_overridden = !data.controls.binding_overrides_json.is_empty();
    }

    /// Drain the change feed; resync once if anything arrived.
    fn pull_changes(&mut self, cx: &ScreenContext<'_>) {
        let Some((_, changes)) = &self.subscription else {
            return;
        };
        let arrived = changes.try_iter().count();
        if arrived > 0 {
            self.changes_seen += arrived;
            self.sync_view(cx);
        }
    }

    fn on_click(&mut self, control: &str, cx: &mut ScreenContext<'_>) -> ScreenAction {
        match control {
            "tab_audio" => self.tab = SettingsTab::Audio,
            "tab_video" => self.tab = SettingsTab::Video,
            "tab_controls" => self.tab = SettingsTab::Controls,
            "apply" => apply(cx),
            "cancel" => cancel(cx),
            "back" => {
                cancel(cx);
                return ScreenAction::Close;
            }
            "reset" => {
                let key = cx.settings().key().to_string();
                match cx.settings_mut().reset_to_default() {
                    Ok(()) => cx.log(ActivityEvent::SettingsReset { key }),
                    Err(e) => cx.log(ActivityEvent::from_error(&e)),
                }
            }
            "reset_bindings" => cx
                .settings_mut()
                .edit(|d| d.controls.binding_overrides_json.clear()),
            _ => {}
        }
        ScreenAction::Stay
    }
}

impl Screen for SettingsScreen {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_opened(&mut self, cx: &mut ScreenContext<'_>) {
        cx.hold_input_mode(InputMode::Ui, REASON);
        if self.pause_on_open {
            cx.hold_pause(REASON);
        }
        cx.settings_mut().begin();
        let sub = cx.settings_mut().subscribe();
        self.subscription = Some((sub.id, sub.changes));
        self.sync_view(cx);
    }

    fn on_closed(&mut self, cx: &mut ScreenContext<'_>) {
        if let Some((id, _)) = self.subscription.take() {
            cx.settings_mut().unsubscribe(id);
        }
    }

    fn handle(&mut self, event: &ScreenEvent, cx: &mut ScreenContext<'_>) -> ScreenAction {
        self.pull_changes(cx);
        let action = match event {
            ScreenEvent::Back => {
                cancel(cx);
                ScreenAction::Close
            }
            ScreenEvent::Click { control } => self.on_click(control, cx),
            ScreenEvent::Slider { control, value } => {
                let value = *value;
                match control.as_str() {
                    "master" => cx.settings_mut().edit(|d| d.audio.master = value),
                    "bgm" => cx.settings_mut().edit(|d| d.audio.bgm = value),
                    "sfx" => cx.settings_mut().edit(|d| d.audio.sfx = value),
                    _ => {}
                }
                ScreenAction::Stay
            }
            ScreenEvent::Toggle { control, on } => {
                let on = *on;
                match control.as_str() {
                    "master_muted" => cx.settings_mut().edit(|d| d.audio.master_muted = on),
                    "bgm_muted" => cx.settings_mut().edit(|d| d.audio.bgm_muted = on),
                    "sfx_muted" => cx.settings_mut().edit(|d| d.audio.sfx_muted = on),
                    "fullscreen" => edit_display(cx, |v| v.fullscreen = on),
                    _ => {}
                }
                ScreenAction::Stay
            }
            ScreenEvent::Select { control, index } => {
                let index = *index;
                match control.as_str() {
                    "resolution" => {
                        if let Some(&(w, h)) = self.resolutions.get(index) {
                            edit_display(cx, |v| {
                                v.width = w;
                                v.height = h;
                            });
                        }
                    }
                    "quality" => {
                        let quality = i32::try_from(index).unwrap_or(i32::MAX);
                        edit_display(cx, |v| v.quality_index = quality);
                    }
                    _ => {}
                }
                ScreenAction::Stay
            }
        };
        self.pull_changes(cx);
        action
    }

    fn tick(&mut self, _dt: Duration, cx: &mut ScreenContext<'_>) -> ScreenAction {
        self.pull_changes(cx);
        ScreenAction::Stay
    }

    fn status(&self) -> String {
        let a = &self.view.audio;
        let v = &self.view.video;
        format!(
            "{:?} master={:.2} bgm={:.2} sfx={:.2} {}x{} fullscreen={} quality={}",
            self.tab, a.master, a.bgm, a.sfx, v.width, v.height, v.fullscreen, v.quality_index
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn apply(cx: &mut ScreenContext<'_>) {
    let key = cx.settings().key().to_string();
    match cx.settings_mut().apply() {
        Ok(()) => {
            cx.log(ActivityEvent::SettingsApplied { key });
            cx.toast("Settings applied", Some(1.5));
        }
        Err(e) => cx.log(ActivityEvent::from_error(&e)),
    }
}

/// Preview a display edit; the first one since the last confirmation opens the gate.
fn edit_display(cx: &mut ScreenContext<'_>, f: impl FnOnce(&mut VideoSettings)) {
    if cx.settings_mut().edit_display(f) == DisplayEdit::NeedsConfirmation {
        let gate = display_gate(cx.config());
        cx.request(UiRequest::PushScreen(Box::new(gate)));
    }
}

fn cancel(cx: &mut ScreenContext<'_>) {
    cx.settings_mut().cancel();
    cx.log(ActivityEvent::SettingsCancelled);
}

/// The keep-or-revert gate for a previewed display change.
fn display_gate(config: &Config) -> ConfirmGate {
    ConfirmGate::new("Display Settings", "Keep changes?")
        .labels("Keep", "Revert")
        .timeout_secs(config.confirm.display_timeout_secs)
        .timeout_triggers_cancel(config.confirm.timeout_triggers_cancel)
        .on_confirm(|cx| {
            cx.settings_mut().confirm_display();
            cx.toast("Display changed", Some(2.0));
        })
        .on_cancel(|cx| {
            cx.settings_mut().revert_display();
            let v = cx.settings().current().video.clone();
            cx.log(ActivityEvent::DisplayReverted {
                width: v.width,
                height: v.height,
                fullscreen: v.fullscreen,
            });
            cx.toast("Display reverted", Some(2.0));
        })
}

/// Deduplicated, smallest pixel count first.
fn resolution_options(configured: &[[u32; 2]]) -> Vec<(u32, u32)> {
    let mut list: Vec<(u32, u32)> = Vec::new();
    for &[w, h] in configured {
        if !list.contains(&(w, h)) {
            list.push((w, h));
        }
    }
    if list.is_empty() {
        list.extend(FALLBACK_RESOLUTIONS);
    }
    list.sort_by_key(|&(w, h)| u64::from(w) * u64::from(h));
    list
}
