//! Activity logger: a dedicated thread owns the [`JsonlWriter`]; the UI event
//! loop only ever calls the non-blocking [`ActivityLoggerHandle::send`].
//!
//! Back-pressure never reaches the frame loop. When the bounded channel is
//! full the event is dropped and counted, and the logger thread reports the
//! count on its next write.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::arbiter::input_mode::InputMode;
use crate::core::config::LoggingConfig;
use crate::core::errors::{Result, UiError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

// ──────────────────── public event type ────────────────────

/// Everything the session reports about claims, screens, settings and scenes.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    SessionStarted {
        config_hash: String,
    },
    SessionStopped {
        reason: String,
    },
    PauseChanged {
        paused: bool,
        holders: Vec<String>,
    },
    InputModeChanged {
        mode: InputMode,
        holder: Option<String>,
    },
    /// An input claim was released while a newer claim was still live.
    OutOfOrderRelease {
        reason: String,
        effective: InputMode,
    },
    ScreenOpened {
        kind: String,
        id: u64,
        channel: Option<String>,
        depth: usize,
    },
    ScreenClosed {
        kind: String,
        id: u64,
        channel: Option<String>,
        depth: usize,
        released_claims: usize,
    },
    OverlayReplaced {
        channel: String,
        previous: String,
        next: String,
    },
    UnknownScreen {
        kind: String,
        context: &'static str,
    },
    /// A show or clear aimed at the indicator of a pending scene load.
    LoadingIndicatorHeld {
        context: &'static str,
    },
    ConfirmResolved {
        title: String,
        outcome: &'static str,
        via: &'static str,
    },
    /// A persisted store (`settings` or `progress`) was opened.
    StoreLoaded {
        store: &'static str,
        key: String,
        outcome: &'static str,
        details: Option<String>,
    },
    SettingsApplied {
        key: String,
    },
    SettingsCancelled,
    SettingsReset {
        key: String,
    },
    DisplayReverted {
        width: u32,
        height: u32,
        fullscreen: bool,
    },
    /// One `save_all` finished; keys that were clean are omitted.
    SaveCompleted {
        written: Vec<String>,
        failed: Vec<String>,
    },
    SceneLoadStarted {
        scene: String,
    },
    SceneLoadSuperseded {
        cancelled: String,
        by: String,
    },
    SceneLoadFinished {
        scene: String,
        polls: u32,
    },
    SceneLoadFailed {
        scene: String,
        details: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

impl ActivityEvent {
    /// Error event carrying the error's stable code.
    #[must_use]
    pub fn from_error(err: &UiError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ──────────────────── public handle ────────────────────

/// Cheaply cloneable sending side of the activity log.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// A handle whose events go nowhere. Used by headless runs with logging disabled.
    #[must_use]
    pub fn disabled() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A handle paired with its raw receiver, for inspecting emitted events.
    #[must_use]
    pub fn capture(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Queue an event without blocking. A full channel drops and counts it.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected: logging is off or already shut down.
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to drain and exit. Join its handle afterwards.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

impl std::fmt::Debug for ActivityLoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLoggerHandle")
            .field("queued", &self.tx.len())
            .field("dropped_events", &self.dropped_events())
            .finish()
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread. It runs until `shutdown()` or until every handle is dropped.
pub fn spawn_logger(
    config: &LoggingConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: Arc::clone(&dropped),
    };
    let jsonl_config = JsonlConfig::from(config);

    let join = thread::Builder::new()
        .name("uiarb-logger".to_string())
        .spawn(move || logger_thread_main(&rx, jsonl_config, &dropped))
        .map_err(|e| UiError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let lost = dropped.swap(0, Ordering::Relaxed);
        if lost > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{lost} activity events dropped under back-pressure"));
            jsonl.write_entry(&warn);
        }

        if event == ActivityEvent::Shutdown {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

/// Structured log line for `event`, stamped now.
#[allow(clippy::too_many_lines)]
pub fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::SessionStarted { config_hash } => {
            let mut e = LogEntry::new(EventType::SessionStart, Severity::Info);
            e.details = Some(format!(
                "version={} config_hash={config_hash}",
                env!("CARGO_PKG_VERSION")
            ));
            e
        }
        ActivityEvent::SessionStopped { reason } => {
            let mut e = LogEntry::new(EventType::SessionStop, Severity::Info);
            e.reason = Some(reason.clone());
            e
        }
        ActivityEvent::PauseChanged { paused, holders } => {
            let mut e = LogEntry::new(EventType::PauseChanged, Severity::Info);
            e.paused = Some(*paused);
            if !holders.is_empty() {
                e.reason = Some(holders.join(","));
            }
            e
        }
        ActivityEvent::InputModeChanged { mode, holder } => {
            let mut e = LogEntry::new(EventType::InputModeChanged, Severity::Info);
            e.mode = Some(mode.to_string());
            e.reason = Some(holder.clone().unwrap_or_else(|| "base".to_string()));
            e
        }
        ActivityEvent::OutOfOrderRelease { reason, effective } => {
            let mut e = LogEntry::new(EventType::OutOfOrderRelease, Severity::Warning);
            e.reason = Some(reason.clone());
            e.mode = Some(effective.to_string());
            e
        }
        ActivityEvent::ScreenOpened {
            kind,
            id,
            channel,
            depth,
        } => {
            let mut e = LogEntry::new(EventType::ScreenOpened, Severity::Info);
            e.screen = Some(kind.clone());
            e.screen_id = Some(*id);
            e.channel = Some(channel.clone().unwrap_or_else(|| "stack".to_string()));
            e.depth = Some(*depth);
            e
        }
        ActivityEvent::ScreenClosed {
            kind,
            id,
            channel,
            depth,
            released_claims,
        } => {
            let mut e = LogEntry::new(EventType::ScreenClosed, Severity::Info);
            e.screen = Some(kind.clone());
            e.screen_id = Some(*id);
            e.channel = Some(channel.clone().unwrap_or_else(|| "stack".to_string()));
            e.depth = Some(*depth);
            if *released_claims > 0 {
                e.details = Some(format!("released_claims={released_claims}"));
            }
            e
        }
        ActivityEvent::OverlayReplaced {
            channel,
            previous,
            next,
        } => {
            let mut e = LogEntry::new(EventType::OverlayReplaced, Severity::Info);
            e.channel = Some(channel.clone());
            e.screen = Some(next.clone());
            e.details = Some(format!("replaced={previous}"));
            e
        }
        ActivityEvent::UnknownScreen { kind, context } => {
            let mut e = LogEntry::new(EventType::UnknownScreen, Severity::Warning);
            e.screen = Some(kind.clone());
            e.error_code = Some("UIA-2001".to_string());
            e.details = Some((*context).to_string());
            e
        }
        ActivityEvent::LoadingIndicatorHeld { context } => {
            let mut e = LogEntry::new(EventType::LoadingIndicatorHeld, Severity::Warning);
            e.channel = Some("Loading".to_string());
            e.details = Some((*context).to_string());
            e
        }
        ActivityEvent::ConfirmResolved {
            title,
            outcome,
            via,
        } => {
            let mut e = LogEntry::new(EventType::ConfirmResolved, Severity::Info);
            e.screen = Some("confirm_gate".to_string());
            e.outcome = Some((*outcome).to_string());
            e.details = Some(format!("title={title:?} via={via}"));
            e
        }
        ActivityEvent::StoreLoaded {
            store,
            key,
            outcome,
            details,
        } => {
            let severity = if *outcome == "loaded" || *outcome == "missing" {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut e = LogEntry::new(EventType::StoreLoaded, severity);
            e.reason = Some((*store).to_string());
            e.key = Some(key.clone());
            e.outcome = Some((*outcome).to_string());
            e.details.clone_from(details);
            e
        }
        ActivityEvent::SettingsApplied { key } => {
            let mut e = LogEntry::new(EventType::SettingsApplied, Severity::Info);
            e.key = Some(key.clone());
            e
        }
        ActivityEvent::SettingsCancelled => {
            LogEntry::new(EventType::SettingsCancelled, Severity::Info)
        }
        ActivityEvent::SettingsReset { key } => {
            let mut e = LogEntry::new(EventType::SettingsReset, Severity::Info);
            e.key = Some(key.clone());
            e
        }
        ActivityEvent::DisplayReverted {
            width,
            height,
            fullscreen,
        } => {
            let mut e = LogEntry::new(EventType::DisplayReverted, Severity::Info);
            e.details = Some(format!("{width}x{height} fullscreen={fullscreen}"));
            e
        }
        ActivityEvent::SaveCompleted { written, failed } => {
            let severity = if failed.is_empty() {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut e = LogEntry::new(EventType::SaveCompleted, severity);
            e.details = Some(format!(
                "written=[{}] failed=[{}]",
                written.join(","),
                failed.join(",")
            ));
            e
        }
        ActivityEvent::SceneLoadStarted { scene } => {
            let mut e = LogEntry::new(EventType::SceneLoadStarted, Severity::Info);
            e.scene = Some(scene.clone());
            e
        }
        ActivityEvent::SceneLoadSuperseded { cancelled, by } => {
            let mut e = LogEntry::new(EventType::SceneLoadSuperseded, Severity::Warning);
            e.scene = Some(by.clone());
            e.details = Some(format!("cancelled={cancelled}"));
            e
        }
        ActivityEvent::SceneLoadFinished { scene, polls } => {
            let mut e = LogEntry::new(EventType::SceneLoadFinished, Severity::Info);
            e.scene = Some(scene.clone());
            e.details = Some(format!("polls={polls}"));
            e
        }
        ActivityEvent::SceneLoadFailed { scene, details } => {
            let mut e = LogEntry::new(EventType::SceneLoadFailed, Severity::Error);
            e.scene = Some(scene.clone());
            e.error_code = Some("UIA-3101".to_string());
            e.error_message = Some(details.clone());
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Error);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => {
            let mut e = LogEntry::new(EventType::SessionStop, Severity::Info);
            e.reason = Some("shutdown".to_string());
            e
        }
    }
}

// ──────────────────── tests ────────────────────
