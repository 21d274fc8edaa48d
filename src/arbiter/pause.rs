//! Reference-counted pause: paused iff at least one pause claim is live.

use crate::arbiter::ledger::{Released, Token, TokenArbiter};

/// Claim on the pause arbiter.
pub type PauseToken = Token<()>;

/// Downstream effect run on every pause transition (e.g. freezing the simulation clock).
pub trait PauseEffect {
    /// Apply the paused state to the runtime.
    fn set_paused(&mut self, paused: bool);
}

impl<F: FnMut(bool)> PauseEffect for F {
    fn set_paused(&mut self, paused: bool) {
        self(paused);
    }
}

/// Boolean arbiter over pause claims.
pub struct PauseArbiter {
    ledger: TokenArbiter<()>,
    effect: Box<dyn PauseEffect>,
    applied: bool,
}

impl PauseArbiter {
    /// Starts unpaused. The effect is not called until the first transition.
    #[must_use]
    pub fn new(effect: Box<dyn PauseEffect>) -> Self {
        Self {
            ledger: TokenArbiter::new(),
            effect,
            applied: false,
        }
    }

    /// Claim a pause until the token is released.
    pub fn acquire(&mut self, reason: &str) -> PauseToken {
        let token = self.ledger.acquire((), reason);
        self.sync();
        token
    }

    /// Unknown, foreign or already-released tokens change nothing.
    pub fn release(&mut self, token: PauseToken) -> Released {
        let released = self.ledger.release(token);
        self.sync();
        released
    }

    /// Any pause claim is live.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        !self.ledger.is_empty()
    }

    /// 0.0 while paused, 1.0 otherwise.
    #[must_use]
    pub fn time_scale(&self) -> f64 {
        if self.is_paused() { 0.0 } else { 1.0 }
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
        let paused = self.is_paused();
        if paused != self.applied {
            self.applied = paused;
            self.effect.set_paused(paused);
        }
    }
}

impl std::fmt::Debug for PauseArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PauseArbiter")
            .field("paused", &self.is_paused())
            .field("holders", &self.holders())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording() -> (PauseArbiter, Rc<RefCell<Vec<bool>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        let arbiter = PauseArbiter::new(Box::new(move |paused| sink.borrow_mut().push(paused)));
        (arbiter, calls)
    }

    #[test]
    fn paused_while_any_claim_live() {
        let (mut pause, _) = recording();
        assert!(!pause.is_paused());
        let a = pause.acquire("PauseMenu");
        let b = pause.acquire("Cutscene");
        assert!(pause.is_paused());
        assert!(pause.release(a).removed());
        assert!(pause.is_paused());
        assert!(pause.release(b).removed());
        assert!(!pause.is_paused());
        assert_eq!(pause.time_scale(), 1.0);
    }

    #[test]
    fn effect_runs_only_on_transitions() {
        let (mut pause, calls) = recording();
        let a = pause.acquire("a");
        let b = pause.acquire("b");
        let _ = pause.release(b);
        let _ = pause.release(a);
        assert_eq!(*calls.borrow(), vec![true, false]);
    }

    #[test]
    fn foreign_release_is_noop() {
        let (mut pause, calls) = recording();
        let (mut other, _) = recording();
        let _mine = pause.acquire("mine");
        let theirs = other.acquire("theirs");
        assert_eq!(pause.release(theirs), Released::Unknown);
        assert!(pause.is_paused());
        assert_eq!(*calls.borrow(), vec![true]);
    }
}
