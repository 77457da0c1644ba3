//! The cache container and its entry states.

use crate::error::{CacheError, CacheResult};
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::debug;

/// An entity addressable by a server-issued key.
///
/// `key` is `None` for entities the server hasn't assigned an id to yet
/// (local drafts).
pub trait Keyed {
    type Key: Clone + Eq + Hash + Debug;

    fn key(&self) -> Option<Self::Key>;
}

/// Cache-local handle for an entry, stable for the entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(u64);

/// Synchronization state of one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Matches the last server read or write.
    Confirmed,
    /// Added locally, not yet acknowledged by the server.
    PendingInsert,
    /// Server-known entity with a write in flight.
    PendingWrite,
}

/// One element of the cached list.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    local_id: LocalId,
    value: T,
    state: EntryState,
}

impl<T> Entry<T> {
    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state != EntryState::Confirmed
    }
}

/// An entry taken out by [`ViewStateCache::remove_optimistic`], kept so the
/// removal can be undone at the same position.
#[derive(Debug, Clone)]
pub struct RemovedEntry<T> {
    index: usize,
    entry: Entry<T>,
}

impl<T> RemovedEntry<T> {
    pub fn value(&self) -> &T {
        &self.entry.value
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Ordered list of entities mirroring one server collection.
#[derive(Debug, Clone)]
pub struct ViewStateCache<T: Keyed> {
    entries: Vec<Entry<T>>,
    in_flight: HashSet<T::Key>,
    next_local_id: u64,
}

impl<T: Keyed> Default for ViewStateCache<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            in_flight: HashSet::new(),
            next_local_id: 0,
        }
    }
}

impl<T: Keyed> ViewStateCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in display order, including pending ones.
    pub fn entries(&self) -> &[Entry<T>] {
        &self.entries
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.position(key).map(|idx| &self.entries[idx].value)
    }

    pub fn state_of(&self, key: &T::Key) -> Option<EntryState> {
        self.position(key).map(|idx| self.entries[idx].state)
    }

    /// True if a write for `key` has begun and not yet completed.
    pub fn is_in_flight(&self, key: &T::Key) -> bool {
        self.in_flight.contains(key)
    }

    fn position(&self, key: &T::Key) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.value.key().as_ref() == Some(key))
    }

    fn position_of_local(&self, local_id: LocalId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.local_id == local_id)
    }

    fn alloc_local_id(&mut self) -> LocalId {
        let id = LocalId(self.next_local_id);
        self.next_local_id += 1;
        id
    }

    /// Server-side state for `value`: `PendingWrite` while a write for its key
    /// is still in flight.
    fn settled_state(&self, value: &T) -> EntryState {
        match value.key() {
            Some(key) if self.in_flight.contains(&key) => EntryState::PendingWrite,
            _ => EntryState::Confirmed,
        }
    }

    // =========================================================================
    // Server reads
    // =========================================================================

    /// Replace the whole list with a fresh server read.
    ///
    /// Pending inserts are dropped. Keys with a write still in flight stay
    /// marked `PendingWrite`.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = T>) {
        let mut entries = Vec::new();
        for value in items {
            let state = self.settled_state(&value);
            entries.push(Entry {
                local_id: self.alloc_local_id(),
                value,
                state,
            });
        }
        debug!(count = entries.len(), "Cache replaced from server");
        self.entries = entries;
    }

    /// Insert or replace one server-confirmed entity, keeping its position
    /// if it is already present.
    pub fn upsert_confirmed(&mut self, value: T) -> LocalId {
        let state = self.settled_state(&value);
        if let Some(idx) = value.key().and_then(|key| self.position(&key)) {
            let entry = &mut self.entries[idx];
            entry.value = value;
            entry.state = state;
            return entry.local_id;
        }
        let local_id = self.alloc_local_id();
        self.entries.push(Entry {
            local_id,
            value,
            state,
        });
        local_id
    }

    // =========================================================================
    // Optimistic insert
    // =========================================================================

    /// Append a locally created entity before the server confirms it.
    pub fn insert_pending(&mut self, value: T) -> LocalId {
        let local_id = self.alloc_local_id();
        self.entries.push(Entry {
            local_id,
            value,
            state: EntryState::PendingInsert,
        });
        local_id
    }

    /// Replace a pending insert with the confirmed entity.
    ///
    /// If the slot disappeared (a full refresh ran meanwhile) the entity is
    /// appended unless the refresh already brought it in. Returns whether the
    /// original slot was still present.
    pub fn confirm_insert(&mut self, local_id: LocalId, value: T) -> bool {
        if let Some(idx) = self.position_of_local(local_id) {
            let entry = &mut self.entries[idx];
            entry.value = value;
            entry.state = EntryState::Confirmed;
            return true;
        }

        let already_present = value
            .key()
            .map(|key| self.position(&key).is_some())
            .unwrap_or(false);
        if !already_present {
            self.entries.push(Entry {
                local_id,
                value,
                state: EntryState::Confirmed,
            });
        }
        false
    }

    /// Drop a pending insert after the server rejected it.
    pub fn rollback_insert(&mut self, local_id: LocalId) -> Option<T> {
        let idx = self.position_of_local(local_id)?;
        if self.entries[idx].state != EntryState::PendingInsert {
            return None;
        }
        Some(self.entries.remove(idx).value)
    }

    // =========================================================================
    // Confirm-then-apply writes
    // =========================================================================

    /// Mark a write for `key` as in flight.
    ///
    /// The entity itself is left untouched. Fails with `Conflict` if another
    /// write for the same key hasn't completed.
    pub fn begin_write(&mut self, key: &T::Key) -> CacheResult<()> {
        if !self.in_flight.insert(key.clone()) {
            debug!(key = ?key, "Rejected concurrent write");
            return Err(CacheError::Conflict(format!("{key:?}")));
        }
        if let Some(idx) = self.position(key) {
            self.entries[idx].state = EntryState::PendingWrite;
        }
        Ok(())
    }

    /// Apply a confirmed update in place. Returns whether the entity was
    /// present; an absent entity is not inserted.
    pub fn commit_replace(&mut self, key: &T::Key, value: T) -> bool {
        self.in_flight.remove(key);
        match self.position(key) {
            Some(idx) => {
                let entry = &mut self.entries[idx];
                entry.value = value;
                entry.state = EntryState::Confirmed;
                true
            }
            None => false,
        }
    }

    /// Apply a confirmed delete.
    pub fn commit_remove(&mut self, key: &T::Key) -> Option<T> {
        self.in_flight.remove(key);
        let idx = self.position(key)?;
        Some(self.entries.remove(idx).value)
    }

    /// Abandon a write: the entity keeps its pre-write value.
    pub fn revert_write(&mut self, key: &T::Key) {
        self.in_flight.remove(key);
        if let Some(idx) = self.position(key) {
            self.entries[idx].state = EntryState::Confirmed;
        }
    }

    // =========================================================================
    // Optimistic remove
    // =========================================================================

    /// Remove an entity before the server confirms the delete.
    ///
    /// The key stays in flight until [`finish_remove`](Self::finish_remove)
    /// or [`restore`](Self::restore).
    pub fn remove_optimistic(&mut self, key: &T::Key) -> CacheResult<RemovedEntry<T>> {
        if self.in_flight.contains(key) {
            return Err(CacheError::Conflict(format!("{key:?}")));
        }
        let index = self
            .position(key)
            .ok_or_else(|| CacheError::NotFound(format!("{key:?}")))?;
        self.in_flight.insert(key.clone());
        let mut entry = self.entries.remove(index);
        entry.state = EntryState::Confirmed;
        Ok(RemovedEntry { index, entry })
    }

    /// Server confirmed an optimistic remove.
    ///
    /// A refresh that completed while the delete was in flight may have
    /// brought the entity back; it is dropped again. Returns that entity.
    pub fn finish_remove(&mut self, key: &T::Key) -> Option<T> {
        self.in_flight.remove(key);
        let idx = self.position(key)?;
        Some(self.entries.remove(idx).value)
    }

    /// Put an optimistically removed entity back where it was.
    ///
    /// Returns false if the entity is already present again (a refresh
    /// brought it back), in which case nothing is inserted.
    pub fn restore(&mut self, removed: RemovedEntry<T>) -> bool {
        let key = removed.entry.value.key();
        if let Some(key) = &key {
            self.in_flight.remove(key);
            if self.position(key).is_some() {
                return false;
            }
        }
        let index = removed.index.min(self.entries.len());
        self.entries.insert(index, removed.entry);
        true
    }
}

impl<T: Keyed + Clone> ViewStateCache<T> {
    /// Current values in display order, pending entries included.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().map(|entry| entry.value.clone()).collect()
    }

    /// Values the server has acknowledged (pending inserts excluded).
    pub fn confirmed(&self) -> Vec<T> {
        self.entries
            .iter()
            .filter(|entry| entry.state != EntryState::PendingInsert)
            .map(|entry| entry.value.clone())
            .collect()
    }
}
