//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use ui_arbiter::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, UiError};

// Arbiters
pub use crate::arbiter::input_mode::{InputMode, InputModeArbiter, ModeBackend, OverrideArbiter};
pub use crate::arbiter::ledger::{Released, Token, TokenArbiter};
pub use crate::arbiter::pause::{PauseArbiter, PauseEffect};

// Screens
pub use crate::screen::catalog::ScreenCatalog;
pub use crate::screen::confirm::{ConfirmGate, GateOutcome};
pub use crate::screen::{Screen, ScreenAction, ScreenContext, ScreenEvent, ScreenId};

// Session
pub use crate::session::save::{SaveCoordinator, SaveParticipant, SaveReport};
pub use crate::session::scene::{LoadPoll, SceneLoad, SceneLoader};
pub use crate::session::services::UiRequest;
pub use crate::session::{FrameTimes, Session, SessionBuilder};

// Settings
pub use crate::settings::appliers::{Appliers, AudioApplier, ControlsApplier, VideoApplier};
pub use crate::settings::data::SettingsData;
pub use crate::settings::storage::{JsonFileStorage, MemoryStorage, Storage};
pub use crate::settings::transaction::SettingsTransaction;

// Progress
pub use crate::progress::data::ProgressData;
pub use crate::progress::store::{ProgressChange, ProgressStore};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
