// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Generational storage for scheduler-owned instances.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A generation-checked reference into an [`Arena`].
///
/// Handles are plain values: copying one never keeps its target alive, and a
/// handle whose slot has since been reused simply stops resolving.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation the slot had when the handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn from_raw(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

/// Dense storage with index reuse through a free list.
///
/// Freeing a slot bumps its generation, so every outstanding handle to it
/// becomes invalid at once.
pub struct Arena<T> {
    entries: Vec<(u32, Option<T>)>,
    freed: Vec<u32>,
    live: usize,
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("live", &self.live)
            .field("slots", &self.entries.len())
            .finish()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            freed: Vec::new(),
            live: 0,
        }
    }

    /// Stores `value`, reusing a freed slot when one exists.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.live += 1;
        if let Some(index) = self.freed.pop() {
            let (generation, slot) = &mut self.entries[index as usize];
            *slot = Some(value);
            Handle {
                index,
                generation: *generation,
                _marker: PhantomData,
            }
        } else {
            let index = self.entries.len() as u32;
            self.entries.push((0, Some(value)));
            Handle {
                index,
                generation: 0,
                _marker: PhantomData,
            }
        }
    }

    /// Removes and returns the value, or `None` for a stale handle.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let (generation, slot) = self.entries.get_mut(handle.index as usize)?;
        if *generation != handle.generation {
            return None;
        }
        let value = slot.take()?;
        *generation = generation.wrapping_add(1);
        self.freed.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    /// Returns `true` if the handle still resolves.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Resolves a handle.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        match self.entries.get(handle.index as usize) {
            Some((generation, Some(value))) if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Resolves a handle mutably.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        match self.entries.get_mut(handle.index as usize) {
            Some((generation, Some(value))) if *generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates live values with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, (generation, slot))| {
                slot.as_ref().map(|value| {
                    (
                        Handle {
                            index: index as u32,
                            generation: *generation,
                            _marker: PhantomData,
                        },
                        value,
                    )
                })
            })
    }

    /// Iterates live values mutably with their handles, in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> + '_ {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(index, (generation, slot))| {
                let generation = *generation;
                slot.as_mut().map(move |value| {
                    (
                        Handle {
                            index: index as u32,
                            generation,
                            _marker: PhantomData,
                        },
                        value,
                    )
                })
            })
    }

    /// Handles of every live value.
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}
