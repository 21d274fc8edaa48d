//! LIFO modal stack. Only the top entry is active; buried entries stay alive,
//! hidden and input-blocked, and get their state back untouched when revealed.

use std::time::Duration;

use crate::logger::activity::ActivityEvent;
use crate::screen::{Mounted, Screen, ScreenAction, ScreenEvent, ScreenId};
use crate::session::services::Services;

struct Entry {
    mounted: Mounted,
    active: bool,
}

/// LIFO stack of modal screens. Only the top one is active.
#[derive(Default)]
pub struct ModalStack {
    entries: Vec<Entry>,
}

impl ModalStack {
    /// Empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deactivate the current top, mount `screen` as the new top, run its open hook.
    pub fn push(&mut self, screen: Box<dyn Screen>, services: &mut Services) -> ScreenId {
        if let Some(top) = self.entries.last_mut() {
            top.active = false;
        }
        let mounted = Mounted::open(screen, services);
        let id = mounted.id;
        let kind = mounted.kind();
        self.entries.push(Entry {
            mounted,
            active: true,
        });
        services.log(ActivityEvent::ScreenOpened {
            kind: kind.to_string(),
            id: id.get(),
            channel: None,
            depth: self.entries.len(),
        });
        id
    }

    /// Close and destroy the top, then reactivate the one beneath without
    /// reopening it. No-op on an empty stack.
    pub fn pop(&mut self, services: &mut Services) -> Option<ScreenId> {
        let entry = self.entries.pop()?;
        let id = entry.mounted.id;
        let kind = entry.mounted.kind();
        let released_claims = entry.mounted.close(services);
        if let Some(top) = self.entries.last_mut() {
            top.active = true;
        }
        services.log(ActivityEvent::ScreenClosed {
            kind: kind.to_string(),
            id: id.get(),
            channel: None,
            depth: self.entries.len(),
            released_claims,
        });
        Some(id)
    }

    /// Pop only if `id` is still the top. Used when a screen asks to close itself.
    pub fn pop_if_top(&mut self, id: ScreenId, services: &mut Services) -> bool {
        if self.top_id() == Some(id) {
            self.pop(services);
            true
        } else {
            false
        }
    }

    /// Pop until empty, running the full teardown for each entry.
    pub fn clear(&mut self, services: &mut Services) -> usize {
        let mut closed = 0;
        while self.pop(services).is_some() {
            closed += 1;
        }
        closed
    }

    /// Deliver an event to the active entry only.
    pub fn dispatch(
        &mut self,
        event: &ScreenEvent,
        services: &mut Services,
    ) -> Option<(ScreenId, ScreenAction)> {
        let top = self.entries.last_mut()?;
        let action = top.mounted.handle(event, services);
        Some((top.mounted.id, action))
    }

    /// Tick the active entry. Buried entries are frozen.
    pub fn tick(&mut self, dt: Duration, services: &mut Services) -> Option<(ScreenId, ScreenAction)> {
        let top = self.entries.last_mut()?;
        let action = top.mounted.tick(dt, services);
        Some((top.mounted.id, action))
    }

    /// Mounted screens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the active screen.
    #[must_use]
    pub fn top_id(&self) -> Option<ScreenId> {
        self.entries.last().map(|e| e.mounted.id)
    }

    /// Kind of the active screen.
    #[must_use]
    pub fn top_kind(&self) -> Option<&'static str> {
        self.entries.last().map(|e| e.mounted.kind())
    }

    /// `id` is mounted anywhere in the stack.
    #[must_use]
    pub fn contains(&self, id: ScreenId) -> bool {
        self.entries.iter().any(|e| e.mounted.id == id)
    }

    /// A screen of `kind` is mounted.
    #[must_use]
    pub fn contains_kind(&self, kind: &str) -> bool {
        self.entries.iter().any(|e| e.mounted.kind() == kind)
    }

    /// Whether `id` is mounted and currently the interactive entry.
    #[must_use]
    pub fn is_active(&self, id: ScreenId) -> bool {
        self.entries
            .iter()
            .any(|e| e.mounted.id == id && e.active)
    }

    /// Kinds from bottom to top.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.mounted.kind()).collect()
    }

    /// Status lines from bottom to top.
    #[must_use]
    pub fn describe(&self) -> Vec<(ScreenId, &'static str, bool, String)> {
        self.entries
            .iter()
            .map(|e| {
                (
                    e.mounted.id,
                    e.mounted.kind(),
                    e.active,
                    e.mounted.screen.status(),
                )
            })
            .collect()
    }

    /// Claims held by the entry `id`, if mounted.
    #[must_use]
    pub fn claim_count(&self, id: ScreenId) -> Option<usize> {
        self.find(id).map(|e| e.mounted.claim_count())
    }

    /// Typed view of a mounted screen.
    #[must_use]
    pub fn get<T: Screen>(&self, id: ScreenId) -> Option<&T> {
        self.find(id).and_then(|e| e.mounted.downcast::<T>())
    }

    /// Mutable typed view of a mounted screen.
    pub fn get_mut<T: Screen>(&mut self, id: ScreenId) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|e| e.mounted.id == id)
            .and_then(|e| e.mounted.downcast_mut::<T>())
    }

    /// Topmost entry of type `T`.
    #[must_use]
    pub fn find_top<T: Screen>(&self) -> Option<(ScreenId, &T)> {
        self.entries
            .iter()
            .rev()
            .find_map(|e| e.mounted.downcast::<T>().map(|s| (e.mounted.id, s)))
    }

    fn find(&self, id: ScreenId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.mounted.id == id)
    }
}

impl std::fmt::Debug for ModalStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}
