//! Last-claim-wins override arbiter, instantiated for the input mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::arbiter::ledger::{Released, Token, TokenArbiter};

/// Which action map the input backend has enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Player controls drive the game.
    #[default]
    Gameplay,
    /// Menus own the input.
    Ui,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gameplay => "gameplay",
            Self::Ui => "ui",
        })
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gameplay" | "game" => Ok(Self::Gameplay),
            "ui" => Ok(Self::Ui),
            other => Err(format!("expected 'gameplay' or 'ui', got '{other}'")),
        }
    }
}

/// Backend told which value is in effect. Called on transitions only.
pub trait ModeBackend<T> {
    /// Switch the enabled action map.
    fn enable_mode(&mut self, mode: T);
}

impl<T, F: FnMut(T)> ModeBackend<T> for F {
    fn enable_mode(&mut self, mode: T) {
        self(mode);
    }
}

/// Claim on an override arbiter.
pub type ModeToken<T = InputMode> = Token<T>;

/// Effective value is the newest live claim's value, else the base value.
pub struct OverrideArbiter<T> {
    ledger: TokenArbiter<T>,
    base: T,
    applied: T,
    backend: Box<dyn ModeBackend<T>>,
}

/// The arbiter the session uses.
pub type InputModeArbiter = OverrideArbiter<InputMode>;

impl<T: Copy + Eq> OverrideArbiter<T> {
    /// Applies `base` to the backend once so the backend starts in a known state.
    pub fn new(base: T, mut backend: Box<dyn ModeBackend<T>>) -> Self {
        backend.enable_mode(base);
        Self {
            ledger: TokenArbiter::new(),
            base,
            applied: base,
            backend,
        }
    }

    /// Change the fallback value. Takes effect immediately when no claim is live.
    pub fn set_base(&mut self, base: T) {
        self.base = base;
        self.sync();
    }

    /// Value in effect when nothing is claimed.
    #[must_use]
    pub fn base(&self) -> T {
        self.base
    }

    /// Claim `value` until the token is released.
    pub fn acquire(&mut self, value: T, reason: &str) -> ModeToken<T> {
        let token = self.ledger.acquire(value, reason);
        self.sync();
        token
    }

    /// Removes by identity; an out-of-order release reports [`Released::Buried`].
    pub fn release(&mut self, token: ModeToken<T>) -> Released {
        let released = self.ledger.release(token);
        self.sync();
        released
    }

    /// Newest live claim, or the base value.
    #[must_use]
    pub fn effective(&self) -> T {
        self.ledger.latest().map_or(self.base, |claim| claim.value)
    }

    /// Reason of the claim currently deciding the value, `None` when the base applies.
    #[must_use]
    pub fn deciding_reason(&self) -> Option<String> {
        self.ledger.latest().map(|claim| claim.reason.to_string())
    }

    /// Reasons of the live claims, oldest first.
    #[must_use]
    pub fn holders(&self) -> Vec<String> {
        self.ledger.reasons()
    }

    /// Number of live claims.
    #[must_use]
    pub fn claim_count(&self) -> usize {
        self.ledger.len()
    }

    fn sync(&mut self) {
        let effective = self.effective();
        if effective != self.applied {
            self.applied = effective;
            self.backend.enable_mode(effective);
        }
    }
}

impl<T: Copy + Eq + fmt::Debug> fmt::Debug for OverrideArbiter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideArbiter")
            .field("base", &self.base)
            .field("effective", &self.effective())
            .field("holders", &self.holders())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording(base: InputMode) -> (InputModeArbiter, Rc<RefCell<Vec<InputMode>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let arbiter = OverrideArbiter::new(base, Box::new(move |m| sink.borrow_mut().push(m)));
        (arbiter, calls)
    }

    #[test]
    fn last_claim_wins_then_falls_back_to_base() {
        let (mut input, _) = recording(InputMode::Gameplay);
        let a = input.acquire(InputMode::Ui, "a");
        assert_eq!(input.effective(), InputMode::Ui);
        let b = input.acquire(InputMode::Gameplay, "b");
        assert_eq!(input.effective(), InputMode::Gameplay);
        assert_eq!(input.release(b), Released::Latest);
        assert_eq!(input.effective(), InputMode::Ui);
        assert_eq!(input.release(a), Released::Latest);
        assert_eq!(input.effective(), input.base());
    }

    #[test]
    fn out_of_order_release_keeps_newest_claim() {
        let (mut input, _) = recording(InputMode::Gameplay);
        let first = input.acquire(InputMode::Ui, "first");
        let second = input.acquire(InputMode::Gameplay, "second");
        assert_eq!(input.release(first), Released::Buried);
        assert_eq!(input.effective(), InputMode::Gameplay);
        assert_eq!(input.deciding_reason().as_deref(), Some("second"));
        let _ = input.release(second);
        assert_eq!(input.deciding_reason(), None);
    }

    #[test]
    fn backend_sees_initial_base_and_transitions_only() {
        let (mut input, calls) = recording(InputMode::Gameplay);
        let a = input.acquire(InputMode::Ui, "a");
        let b = input.acquire(InputMode::Ui, "b");
        let _ = input.release(b);
        let _ = input.release(a);
        assert_eq!(
            *calls.borrow(),
            vec![InputMode::Gameplay, InputMode::Ui, InputMode::Gameplay]
        );
    }

    #[test]
    fn set_base_applies_only_without_claims() {
        let (mut input, calls) = recording(InputMode::Gameplay);
        let token = input.acquire(InputMode::Ui, "menu");
        input.set_base(InputMode::Ui);
        input.set_base(InputMode::Gameplay);
        assert_eq!(calls.borrow().len(), 2);
        let _ = input.release(token);
        assert_eq!(input.effective(), InputMode::Gameplay);
        input.set_base(InputMode::Ui);
        assert_eq!(calls.borrow().last(), Some(&InputMode::Ui));
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("UI".parse::<InputMode>(), Ok(InputMode::Ui));
        assert_eq!(" gameplay ".parse::<InputMode>(), Ok(InputMode::Gameplay));
        assert!("menu".parse::<InputMode>().is_err());
    }
}
