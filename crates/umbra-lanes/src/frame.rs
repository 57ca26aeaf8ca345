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

//! The time base every lane schedules against.

/// Where a frame sits in time.
///
/// Ticks come from the caller, never from a wall clock read inside the lanes,
/// so scheduling decisions are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameClock {
    /// Milliseconds since an arbitrary epoch, monotonic.
    pub ticks_msec: u64,
    /// Counter incremented once per rendered scene pass.
    pub scene_pass: u64,
}

impl FrameClock {
    /// Creates a clock reading.
    pub const fn new(ticks_msec: u64, scene_pass: u64) -> Self {
        Self {
            ticks_msec,
            scene_pass,
        }
    }

    /// Milliseconds elapsed since `tick`, zero if `tick` lies in the future.
    #[inline]
    pub fn elapsed_since(&self, tick: u64) -> u64 {
        self.ticks_msec.saturating_sub(tick)
    }
}
