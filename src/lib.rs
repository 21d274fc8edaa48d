#![forbid(unsafe_code)]

//! UI claim arbiter: ownership discipline for the overlapping client-side
//! resources that many independent panels want at once.
//!
//! - **Pause** is reference counted: paused while any claim is live.
//! - **Input mode** is last-claim-wins over a configurable base mode.
//! - **Screens** live on a LIFO modal stack or in named overlay channels, and
//!   every claim a screen takes is released when it unmounts.
//! - **Settings** go through a snapshot/preview/apply/cancel transaction with
//!   a separate keep-or-revert flow for display changes.
//! - **Saving** is coordinated: one `save_all` reaches settings, progress and
//!   any participant the host registers.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use ui_arbiter::prelude::*;
//!
//! let mut session = SessionBuilder::new(Config::with_default_scenes()).build();
//! session.load_scene("Game");
//! session.tick(std::time::Duration::from_millis(16));
//! session.toggle_pause_menu();
//! assert!(session.is_paused());
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use ui_arbiter::arbiter::pause::PauseArbiter;
//! use ui_arbiter::screen::confirm::ConfirmGate;
//! ```

pub mod prelude;

pub mod arbiter;
pub mod core;
pub mod logger;
pub mod progress;
pub mod screen;
pub mod screens;
pub mod session;
pub mod settings;
