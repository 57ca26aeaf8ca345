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

//! Nearest-first ordering of cluster candidates.

use std::cmp::Ordering;

/// Sort key of one candidate: its view depth and its position in the
/// candidate list. Sorting moves keys, never the instances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceSort {
    /// Distance along the view axis.
    pub depth: f32,
    /// Index into the candidate list.
    pub index: u32,
}

impl InstanceSort {
    /// Creates a key.
    pub const fn new(depth: f32, index: u32) -> Self {
        Self { depth, index }
    }

    /// Ascending depth, ties broken by candidate index.
    #[inline]
    pub fn nearest_first(&self, other: &Self) -> Ordering {
        self.depth
            .total_cmp(&other.depth)
            .then(self.index.cmp(&other.index))
    }
}

/// Keeps the `capacity` nearest keys, sorted by ascending depth.
///
/// Returns how many keys were dropped.
pub fn keep_nearest(keys: &mut Vec<InstanceSort>, capacity: usize) -> usize {
    let dropped = keys.len().saturating_sub(capacity);
    if dropped > 0 {
        if capacity == 0 {
            keys.clear();
            return dropped;
        }
        keys.select_nth_unstable_by(capacity - 1, InstanceSort::nearest_first);
        keys.truncate(capacity);
    }
    keys.sort_unstable_by(InstanceSort::nearest_first);
    dropped
}
