//! Token arbiters: a generic claim ledger and its two instantiations.
//!
//! - [`pause::PauseArbiter`]: boolean, active while any claim is live.
//! - [`input_mode::OverrideArbiter`]: newest live claim decides, else a base value.

pub mod input_mode;
pub mod ledger;
pub mod pause;
