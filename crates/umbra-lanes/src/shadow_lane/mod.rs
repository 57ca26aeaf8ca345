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

//! Shadow map scheduling.
//!
//! Positional lights (omni, spot) compete for slots in a [`ShadowAtlas`];
//! directional lights get fixed regions of a [`DirectionalShadowAtlas`].

mod atlas;
mod directional;

pub use self::atlas::{ShadowAtlas, ShadowKey, ShadowSlot, QUADRANT_COUNT};
pub use self::directional::{directional_shadow_rect, DirectionalShadowAtlas};

/// Handle to a [`ShadowAtlas`].
pub type ShadowAtlasHandle = crate::arena::Handle<ShadowAtlas>;
