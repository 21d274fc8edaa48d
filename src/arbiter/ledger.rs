//! Generic claim ledger shared by the pause and input-mode arbiters.
//!
//! A [`TokenArbiter`] records live claims in acquisition order. Each claim is
//! represented to its owner by a move-only [`Token`]; handing the token back
//! through [`TokenArbiter::release`] consumes it, so a token can be released at
//! most once. Ids are never reused, and every ledger carries its own identity
//! so a token minted by one arbiter is inert against another.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LEDGER: AtomicU64 = AtomicU64::new(1);

/// Identity of one claim within its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

impl TokenId {
    /// Raw id, unique within its ledger.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Proof of a live claim. Not `Clone`: releasing it consumes it.
#[derive(Debug)]
#[must_use = "a dropped token can never be released and its claim stays live"]
pub struct Token<T> {
    ledger: u64,
    id: TokenId,
    reason: Arc<str>,
    value: T,
}

impl<T> Token<T> {
    /// Id of the claim this token holds.
    #[must_use]
    pub const fn id(&self) -> TokenId {
        self.id
    }

    /// Reason given when the claim was made.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The value this token claimed.
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }
}

/// A live claim as seen from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim<T> {
    /// Ledger-local id.
    pub id: TokenId,
    /// Why the claim was made.
    pub reason: Arc<str>,
    /// Claimed value.
    pub value: T,
}

/// Result of handing a token back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// The newest live claim was removed.
    Latest,
    /// A claim with newer claims above it was removed.
    Buried,
    /// Foreign or already released; nothing changed.
    Unknown,
}

impl Released {
    /// `true` unless the token was foreign or already released.
    #[must_use]
    pub const fn removed(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Ordered ledger of live claims, newest last.
#[derive(Debug)]
pub struct TokenArbiter<T> {
    ledger: u64,
    next_id: u64,
    claims: Vec<Claim<T>>,
}

impl<T: Clone> TokenArbiter<T> {
    /// Empty ledger with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ledger: NEXT_LEDGER.fetch_add(1, Ordering::Relaxed),
            next_id: 1,
            claims: Vec::new(),
        }
    }

    /// Record a new claim and return its token. Never fails.
    pub fn acquire(&mut self, value: T, reason: &str) -> Token<T> {
        let id = TokenId(self.next_id);
        self.next_id += 1;
        let reason: Arc<str> = Arc::from(reason);
        self.claims.push(Claim {
            id,
            reason: Arc::clone(&reason),
            value: value.clone(),
        });
        Token {
            ledger: self.ledger,
            id,
            reason,
            value,
        }
    }

    /// Remove the token's claim by identity, wherever it sits.
    pub fn release(&mut self, token: Token<T>) -> Released {
        if token.ledger != self.ledger {
            return Released::Unknown;
        }
        let Some(pos) = self.claims.iter().position(|claim| claim.id == token.id) else {
            return Released::Unknown;
        };
        let latest = pos + 1 == self.claims.len();
        self.claims.remove(pos);
        if latest {
            Released::Latest
        } else {
            Released::Buried
        }
    }

    /// Whether `token` was minted here and is still live.
    #[must_use]
    pub fn holds(&self, token: &Token<T>) -> bool {
        token.ledger == self.ledger && self.claims.iter().any(|c| c.id == token.id)
    }

    /// Number of live claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// No live claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Newest live claim.
    #[must_use]
    pub fn latest(&self) -> Option<&Claim<T>> {
        self.claims.last()
    }

    /// Live claims, oldest first.
    #[must_use]
    pub fn claims(&self) -> &[Claim<T>] {
        &self.claims
    }

    /// Reasons of the live claims, oldest first.
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.claims.iter().map(|c| c.reason.to_string()).collect()
    }
}

impl<T: Clone> Default for TokenArbiter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_by_identity() {
        let mut ledger = TokenArbiter::new();
        let a = ledger.acquire('a', "first");
        let b = ledger.acquire('b', "second");
        let c = ledger.acquire('c', "third");
        assert_eq!(ledger.release(b), Released::Buried);
        assert_eq!(ledger.latest().map(|c| c.value), Some('c'));
        assert_eq!(ledger.release(c), Released::Latest);
        assert_eq!(ledger.latest().map(|c| c.value), Some('a'));
        assert_eq!(ledger.release(a), Released::Latest);
        assert!(ledger.is_empty());
    }

    #[test]
    fn foreign_tokens_are_inert() {
        let mut mine = TokenArbiter::new();
        let mut theirs = TokenArbiter::new();
        let kept = mine.acquire((), "mine");
        let foreign = theirs.acquire((), "theirs");
        assert!(!mine.holds(&foreign));
        assert_eq!(mine.release(foreign), Released::Unknown);
        assert_eq!(mine.len(), 1);
        assert!(mine.holds(&kept));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut ledger = TokenArbiter::new();
        let first = ledger.acquire(1_u8, "x");
        let first_id = first.id();
        assert!(ledger.release(first).removed());
        let second = ledger.acquire(1_u8, "x");
        assert_ne!(second.id(), first_id);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn reasons_listed_oldest_first() {
        let mut ledger = TokenArbiter::new();
        let _a = ledger.acquire((), "PauseMenu");
        let _b = ledger.acquire((), "Settings");
        assert_eq!(ledger.reasons(), vec!["PauseMenu", "Settings"]);
    }
}
