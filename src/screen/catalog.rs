//! Screen kinds by name.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::config::Config;
use crate::core::errors::{Result, UiError};
use crate::screen::Screen;

/// Builds a fresh screen from the effective config.
pub type ScreenFactory = Box<dyn Fn(&Config) -> Box<dyn Screen>>;

/// Screen factories keyed by kind.
#[derive(Default)]
pub struct ScreenCatalog {
    factories: BTreeMap<String, ScreenFactory>,
}

impl ScreenCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `kind`. A second registration of the same kind is rejected;
    /// use [`register_or_replace`](Self::register_or_replace) to override on purpose.
    pub fn register(
        &mut self,
        kind: &str,
        factory: impl Fn(&Config) -> Box<dyn Screen> + 'static,
    ) -> Result<()> {
        if self.factories.contains_key(kind) {
            return Err(UiError::DuplicateRegistration {
                what: "screen",
                name: kind.to_string(),
            });
        }
        self.factories.insert(kind.to_string(), Box::new(factory));
        Ok(())
    }

    /// Returns `true` when an existing factory was replaced.
    pub fn register_or_replace(
        &mut self,
        kind: &str,
        factory: impl Fn(&Config) -> Box<dyn Screen> + 'static,
    ) -> bool {
        self.factories
            .insert(kind.to_string(), Box::new(factory))
            .is_some()
    }

    /// Build a screen of `kind` (`UIA-2001` when unknown).
    pub fn create(&self, kind: &str, config: &Config) -> Result<Box<dyn Screen>> {
        self.factories
            .get(kind)
            .map(|factory| factory(config))
            .ok_or_else(|| UiError::UnknownScreen {
                kind: kind.to_string(),
            })
    }

    /// `kind` has a factory.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ScreenCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}
