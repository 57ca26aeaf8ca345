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

//! # Umbra Lanes
//!
//! The per-frame scheduling lanes. Each lane owns one family of tables and
//! decides, every frame, which instances receive a slice of fixed-size GPU
//! memory:
//!
//! - [`shadow_lane`]: positional and directional shadow atlases.
//! - [`reflection_lane`]: reflection atlases and the incremental probe filter.
//! - [`cluster_lane`]: depth-sorted, capacity-bounded cluster buffers and
//!   per-cell index lists.
//! - [`fog_lane`]: the volumetric fog volume and its temporal history.
//!
//! Lanes never submit work themselves; they record into the encoder handed
//! to them by the frame orchestrator in `umbra-agents`.

#![warn(missing_docs)]

pub mod arena;
pub mod cluster_lane;
pub mod error;
pub mod fog_lane;
pub mod frame;
pub mod instances;
pub mod reflection_lane;
pub mod shadow_lane;

pub use arena::{Arena, Handle};
pub use error::SchedulerError;
pub use frame::FrameClock;
pub use instances::{DecalHandle, DecalInstance, LightHandle, LightInstance};
