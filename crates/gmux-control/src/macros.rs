//! Macro execution contexts.
//!
//! A macro owns a per-macro serialization gate: codes emitted from the
//! same macro serialize among themselves instead of through the channel's
//! global `Macro` class lock, so sibling macros can progress
//! independently.
//!
//! Macros reference codes and codes reference macros; the cycle is broken
//! by keeping the states in an arena and handing out index handles
//! ([`MacroId`]). Freed slots are reused.

use crate::sched::LockPair;
use gmux_code::MacroId;
use gmux_types::CodeChannel;
use parking_lot::Mutex;
use std::sync::Arc;

/// State of one executing macro file.
pub struct MacroState {
    /// Physical path of the macro file.
    pub file_name: String,
    /// Channel the macro inherits.
    pub channel: CodeChannel,
    /// Enclosing macro, for nested calls.
    pub parent: Option<MacroId>,
    /// Per-macro ordering gate used instead of the channel's Macro class
    /// lock.
    pub gate: LockPair,
}

/// Arena of executing macros.
#[derive(Default)]
pub struct MacroArena {
    slots: Mutex<Vec<Option<Arc<MacroState>>>>,
}

impl MacroArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new macro and returns its handle.
    pub fn create(
        &self,
        file_name: impl Into<String>,
        channel: CodeChannel,
        parent: Option<MacroId>,
    ) -> MacroId {
        let state = Arc::new(MacroState {
            file_name: file_name.into(),
            channel,
            parent,
            gate: LockPair::new(),
        });
        let mut slots = self.slots.lock();
        if let Some(index) = slots.iter().position(Option::is_none) {
            slots[index] = Some(state);
            MacroId(index)
        } else {
            slots.push(Some(state));
            MacroId(slots.len() - 1)
        }
    }

    /// Looks a macro up by handle.
    #[must_use]
    pub fn get(&self, id: MacroId) -> Option<Arc<MacroState>> {
        self.slots.lock().get(id.0).and_then(Clone::clone)
    }

    /// Frees a slot. Outstanding `Arc`s stay valid; the handle does not.
    pub fn remove(&self, id: MacroId) -> Option<Arc<MacroState>> {
        self.slots.lock().get_mut(id.0).and_then(Option::take)
    }

    /// Number of live macros.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    /// `true` if no macro is executing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_lookup() {
        let arena = MacroArena::new();
        let id = arena.create("/sd/macros/home.g", CodeChannel::Daemon, None);
        let state = arena.get(id).unwrap();
        assert_eq!(state.file_name, "/sd/macros/home.g");
        assert_eq!(state.channel, CodeChannel::Daemon);
        assert!(state.parent.is_none());
    }

    #[test]
    fn slots_are_reused() {
        let arena = MacroArena::new();
        let a = arena.create("a.g", CodeChannel::File, None);
        let b = arena.create("b.g", CodeChannel::File, Some(a));
        assert_eq!(arena.len(), 2);

        arena.remove(a);
        assert_eq!(arena.len(), 1);
        assert!(arena.get(a).is_none());

        let c = arena.create("c.g", CodeChannel::File, None);
        // The freed slot of `a` is taken over.
        assert_eq!(c, a);
        assert_eq!(arena.get(c).unwrap().file_name, "c.g");
        assert_eq!(arena.get(b).unwrap().parent, Some(a));
    }

    #[test]
    fn remove_keeps_outstanding_state_alive() {
        let arena = MacroArena::new();
        let id = arena.create("x.g", CodeChannel::Trigger, None);
        let state = arena.get(id).unwrap();
        arena.remove(id);
        assert_eq!(state.file_name, "x.g");
        assert!(arena.is_empty());
    }
}
