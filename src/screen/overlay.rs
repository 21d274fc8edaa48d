//! Named overlay channels, each holding at most one live screen.
//!
//! Channels are independent of each other and of the modal stack. Showing
//! on an occupied channel tears the occupant down before the new screen is
//! created, so a channel never has two live occupants.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::logger::activity::ActivityEvent;
use crate::screen::{Mounted, Screen, ScreenAction, ScreenId};
use crate::session::services::Services;

/// Channel used when none is named.
pub const DEFAULT_CHANNEL: &str = "Default";

/// Blank channel names map to [`DEFAULT_CHANNEL`].
#[must_use]
pub fn normalize_channel(channel: &str) -> &str {
    let trimmed = channel.trim();
    if trimmed.is_empty() {
        DEFAULT_CHANNEL
    } else {
        trimmed
    }
}

/// Named overlay channels, at most one screen each.
#[derive(Default)]
pub struct OverlayRegistry {
    channels: BTreeMap<String, Mounted>,
}

impl OverlayRegistry {
    /// No channels occupied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever `channel` holds with `screen`.
    pub fn show(&mut self, channel: &str, screen: Box<dyn Screen>, services: &mut Services) -> ScreenId {
        let channel = normalize_channel(channel).to_string();
        let next_kind = screen.kind();
        if let Some(previous) = self.close_channel(&channel, services) {
            services.log(ActivityEvent::OverlayReplaced {
                channel: channel.clone(),
                previous: previous.to_string(),
                next: next_kind.to_string(),
            });
        }
        let mounted = Mounted::open(screen, services);
        let id = mounted.id;
        services.log(ActivityEvent::ScreenOpened {
            kind: next_kind.to_string(),
            id: id.get(),
            channel: Some(channel.clone()),
            depth: 0,
        });
        self.channels.insert(channel, mounted);
        id
    }

    /// Close and remove the occupant of `channel`. No-op when empty.
    pub fn clear(&mut self, channel: &str, services: &mut Services) -> bool {
        self.close_channel(normalize_channel(channel), services)
            .is_some()
    }

    /// Clear every channel.
    pub fn clear_all(&mut self, services: &mut Services) -> usize {
        let names: Vec<String> = self.channels.keys().cloned().collect();
        names
            .iter()
            .filter(|name| self.close_channel(name, services).is_some())
            .count()
    }

    /// Clear every channel but `keep`.
    pub fn clear_all_except(&mut self, keep: &str, services: &mut Services) -> usize {
        let keep = normalize_channel(keep);
        let names: Vec<String> = self
            .channels
            .keys()
            .filter(|name| name.as_str() != keep)
            .cloned()
            .collect();
        names
            .iter()
            .filter(|name| self.close_channel(name, services).is_some())
            .count()
    }

    /// Tick every occupant; occupants asking to close are cleared.
    pub fn tick(&mut self, dt: Duration, services: &mut Services) {
        let closing: Vec<String> = self
            .channels
            .iter_mut()
            .filter_map(|(name, mounted)| {
                (mounted.tick(dt, services) == ScreenAction::Close).then(|| name.clone())
            })
            .collect();
        for name in closing {
            self.close_channel(&name, services);
        }
    }

    /// Screen on `channel`, if any.
    #[must_use]
    pub fn occupant(&self, channel: &str) -> Option<ScreenId> {
        self.channels.get(normalize_channel(channel)).map(|m| m.id)
    }

    /// Kind of the screen on `channel`.
    #[must_use]
    pub fn occupant_kind(&self, channel: &str) -> Option<&'static str> {
        self.channels.get(normalize_channel(channel)).map(Mounted::kind)
    }

    /// Typed view of the screen on `channel`.
    #[must_use]
    pub fn get<T: Screen>(&self, channel: &str) -> Option<&T> {
        self.channels
            .get(normalize_channel(channel))
            .and_then(Mounted::downcast::<T>)
    }

    /// Mutable typed view of the screen on `channel`.
    pub fn get_mut<T: Screen>(&mut self, channel: &str) -> Option<&mut T> {
        self.channels
            .get_mut(normalize_channel(channel))
            .and_then(Mounted::downcast_mut::<T>)
    }

    /// Occupied channel names, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    /// `(channel, kind, status)` for every occupant.
    #[must_use]
    pub fn describe(&self) -> Vec<(String, &'static str, String)> {
        self.channels
            .iter()
            .map(|(name, m)| (name.clone(), m.kind(), m.screen.status()))
            .collect()
    }

    /// Occupied channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// No channel is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn close_channel(&mut self, channel: &str, services: &mut Services) -> Option<&'static str> {
        let mounted = self.channels.remove(channel)?;
        let id = mounted.id;
        let kind = mounted.kind();
        let released_claims = mounted.close(services);
        services.log(ActivityEvent::ScreenClosed {
            kind: kind.to_string(),
            id: id.get(),
            channel: Some(channel.to_string()),
            depth: 0,
            released_claims,
        });
        Some(kind)
    }
}

impl std::fmt::Debug for OverlayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.channels.iter().map(|(k, m)| (k, m.kind())))
            .finish()
    }
}
