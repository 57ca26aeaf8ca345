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

//! The cluster lane: per-frame packing of omni lights, spot lights, decals
//! and reflection probes into bounded GPU buffers, the fixed directional
//! light array, and the per-cell index lists.

mod cell_index;
mod fill;
mod sort;

pub use self::cell_index::{
    pack_cell_indices, pack_decal_cell, pack_light_cell, unpack_cell_indices, words_per_cell,
};
pub use self::fill::{ClusterFill, ClusterSources};
pub use self::sort::{keep_nearest, InstanceSort};
