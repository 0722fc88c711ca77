//! Generation-tagged slot arena for units and buildings.
//!
//! Entities live in a dense slot vector. Removing an entity frees its slot
//! for reuse and bumps the slot generation, so an id held by a client or by
//! another unit's target stops resolving instead of aliasing the newcomer.
//! Iteration walks slots in index order, which keeps per-tick processing order
//! stable.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Raw slot key: index plus generation.
///
/// Travels over the wire as a single `u64` (generation in the high half).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub struct ArenaKey {
    index: u32,
    generation: u32,
}

impl ArenaKey {
    /// Slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl From<ArenaKey> for u64 {
    fn from(key: ArenaKey) -> Self {
        (u64::from(key.generation) << 32) | u64::from(key.index)
    }
}

impl From<u64> for ArenaKey {
    fn from(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl std::fmt::Display for ArenaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena keyed by a typed id `K`.
#[derive(Debug, Clone)]
pub struct Arena<K, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _key: PhantomData<fn() -> K>,
}

impl<K, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _key: PhantomData,
        }
    }
}

impl<K, T> Arena<K, T>
where
    K: Copy + From<ArenaKey> + Into<ArenaKey>,
{
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value and return its id.
    pub fn insert(&mut self, value: T) -> K {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return K::from(ArenaKey {
                index,
                generation: slot.generation,
            });
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        K::from(ArenaKey {
            index,
            generation: 0,
        })
    }

    /// Remove a value by id. Stale ids return `None`.
    pub fn remove(&mut self, id: K) -> Option<T> {
        let key: ArenaKey = id.into();
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        Some(value)
    }

    /// Get a value by id.
    #[must_use]
    pub fn get(&self, id: K) -> Option<&T> {
        let key: ArenaKey = id.into();
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Get a mutable reference to a value by id.
    pub fn get_mut(&mut self, id: K) -> Option<&mut T> {
        let key: ArenaKey = id.into();
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Check if an id resolves.
    #[must_use]
    pub fn contains(&self, id: K) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    K::from(ArenaKey {
                        index: index as u32,
                        generation: slot.generation,
                    }),
                    value,
                )
            })
        })
    }

    /// Iterate mutably over live values in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(|value| {
                (
                    K::from(ArenaKey {
                        index: index as u32,
                        generation,
                    }),
                    value,
                )
            })
        })
    }

    /// Iterate over live values without ids.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }

    /// Snapshot of live ids, for loops that mutate the arena while walking it.
    #[must_use]
    pub fn ids(&self) -> Vec<K> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Remove every value for which `keep` returns `false`, returning the
    /// removed entries in slot order.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<(K, T)>
    where
        F: FnMut(&T) -> bool,
    {
        let doomed: Vec<K> = self
            .iter()
            .filter(|(_, value)| !keep(*value))
            .map(|(id, _)| id)
            .collect();

        doomed
            .into_iter()
            .filter_map(|id| self.remove(id).map(|value| (id, value)))
            .collect()
    }
}
