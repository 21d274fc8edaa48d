//! Confirm/cancel modal with an optional countdown.
//!
//! The countdown runs on the unscaled clock, so a gate opened while the game
//! is paused still resolves. Exactly one callback fires exactly once per gate:
//! a click, the timer, or teardown by the stack (which counts as cancel),
//! whichever comes first.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use crate::arbiter::input_mode::InputMode;
use crate::core::config::ConfirmConfig;
use crate::logger::activity::ActivityEvent;
use crate::screen::{Screen, ScreenAction, ScreenContext, ScreenEvent};

/// Control name of the confirm button.
pub const CONFIRM_CONTROL: &str = "confirm";
/// Control name of the cancel button.
pub const CANCEL_CONTROL: &str = "cancel";

type Callback = Box<dyn FnOnce(&mut ScreenContext<'_>)>;

/// How the question was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Confirm callback ran.
    Confirmed,
    /// Cancel callback ran.
    Cancelled,
}

impl GateOutcome {
    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// What resolved the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A button was pressed.
    Click,
    /// The countdown ran out.
    Timeout,
    /// Closed by the stack (clear, scene load) before any answer.
    Teardown,
}

impl Resolution {
    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Timeout => "timeout",
            Self::Teardown => "teardown",
        }
    }
}

/// Modal yes/no question with optional countdown.
pub struct ConfirmGate {
    title: String,
    message: String,
    confirm_label: String,
    cancel_label: String,
    on_confirm: Option<Callback>,
    on_cancel: Option<Callback>,
    remaining: Option<Duration>,
    timeout_triggers_cancel: bool,
    resolved: Option<(GateOutcome, Resolution)>,
}

impl ConfirmGate {
    /// A gate with "OK"/"Cancel" labels, no timeout, and no callbacks.
    #[must_use]
    pub fn new(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            confirm_label: "OK".to_string(),
            cancel_label: "Cancel".to_string(),
            on_confirm: None,
            on_cancel: None,
            remaining: None,
            timeout_triggers_cancel: true,
            resolved: None,
        }
    }

    /// A gate using the configured display timeout and labels.
    #[must_use]
    pub fn from_config(cfg: &ConfirmConfig, title: &str, message: &str) -> Self {
        Self::new(title, message)
            .labels(&cfg.confirm_label, &cfg.cancel_label)
            .timeout_secs(cfg.display_timeout_secs)
            .timeout_triggers_cancel(cfg.timeout_triggers_cancel)
    }

    /// Blank labels keep the defaults.
    #[must_use]
    pub fn labels(mut self, confirm: &str, cancel: &str) -> Self {
        if !confirm.trim().is_empty() {
            self.confirm_label = confirm.to_string();
        }
        if !cancel.trim().is_empty() {
            self.cancel_label = cancel.to_string();
        }
        self
    }

    /// Run `f` when the gate is confirmed.
    #[must_use]
    pub fn on_confirm(mut self, f: impl FnOnce(&mut ScreenContext<'_>) + 'static) -> Self {
        self.on_confirm = Some(Box::new(f));
        self
    }

    /// Run `f` when the gate is cancelled, including teardown.
    #[must_use]
    pub fn on_cancel(mut self, f: impl FnOnce(&mut ScreenContext<'_>) + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }

    /// Zero, negative, or non-finite disables the countdown.
    #[must_use]
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.remaining = if secs > 0.0 {
            Duration::try_from_secs_f64(secs).ok()
        } else {
            None
        };
        self
    }

    /// `true`: the timer fires cancel. `false`: it fires confirm.
    #[must_use]
    pub fn timeout_triggers_cancel(mut self, yes: bool) -> Self {
        self.timeout_triggers_cancel = yes;
        self
    }

    /// Heading text.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Label of the confirm button.
    #[must_use]
    pub fn confirm_label(&self) -> &str {
        &self.confirm_label
    }

    /// Label of the cancel button.
    #[must_use]
    pub fn cancel_label(&self) -> &str {
        &self.cancel_label
    }

    /// Countdown left, if the gate has one and is unresolved.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// `"(n)"` with whole seconds rounded up, empty without a running timer.
    #[must_use]
    pub fn countdown_label(&self) -> String {
        match self.remaining {
            Some(left) if !left.is_zero() => format!("({})", left.as_secs_f64().ceil()),
            _ => String::new(),
        }
    }

    /// How the gate resolved, once it has.
    #[must_use]
    pub fn outcome(&self) -> Option<(GateOutcome, Resolution)> {
        self.resolved
    }

    fn resolve(&mut self, outcome: GateOutcome, via: Resolution, cx: &mut ScreenContext<'_>) {
        if self.resolved.is_some() {
            return;
        }
        self.resolved = Some((outcome, via));
        // Both callbacks go away here so neither can run later.
        let confirm = self.on_confirm.take();
        let cancel = self.on_cancel.take();
        let callback = match outcome {
            GateOutcome::Confirmed => confirm,
            GateOutcome::Cancelled => cancel,
        };
        if let Some(f) = callback {
            f(cx);
        }
        cx.log(ActivityEvent::ConfirmResolved {
            title: self.title.clone(),
            outcome: outcome.as_str(),
            via: via.as_str(),
        });
    }
}

impl Screen for ConfirmGate {
    fn kind(&self) -> &'static str {
        "confirm_gate"
    }

    fn on_opened(&mut self, cx: &mut ScreenContext<'_>) {
        cx.hold_input_mode(InputMode::Ui, "ConfirmGate");
    }

    fn on_closed(&mut self, cx: &mut ScreenContext<'_>) {
        self.resolve(GateOutcome::Cancelled, Resolution::Teardown, cx);
    }

    fn handle(&mut self, event: &ScreenEvent, cx: &mut ScreenContext<'_>) -> ScreenAction {
        if self.resolved.is_some() {
            return ScreenAction::Close;
        }
        let outcome = match event {
            ScreenEvent::Click { control } if control == CONFIRM_CONTROL => GateOutcome::Confirmed,
            ScreenEvent::Click { control } if control == CANCEL_CONTROL => GateOutcome::Cancelled,
            ScreenEvent::Back => GateOutcome::Cancelled,
            _ => return ScreenAction::Stay,
        };
        self.resolve(outcome, Resolution::Click, cx);
        ScreenAction::Close
    }

    fn tick(&mut self, dt: Duration, cx: &mut ScreenContext<'_>) -> ScreenAction {
        if self.resolved.is_some() {
            return ScreenAction::Close;
        }
        let Some(left) = self.remaining else {
            return ScreenAction::Stay;
        };
        let left = left.saturating_sub(dt);
        self.remaining = Some(left);
        if !left.is_zero() {
            return ScreenAction::Stay;
        }
        let outcome = if self.timeout_triggers_cancel {
            GateOutcome::Cancelled
        } else {
            GateOutcome::Confirmed
        };
        self.resolve(outcome, Resolution::Timeout, cx);
        ScreenAction::Close
    }

    fn status(&self) -> String {
        format!(
            "{}: {} [{}] [{}] {}",
            self.title,
            self.message,
            self.confirm_label,
            self.cancel_label,
            self.countdown_label()
        )
        .trim_end()
        .to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl fmt::Debug for ConfirmGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmGate")
            .field("title", &self.title)
            .field("remaining", &self.remaining)
            .field("timeout_triggers_cancel", &self.timeout_triggers_cancel)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}
