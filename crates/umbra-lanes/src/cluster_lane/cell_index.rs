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

//! Per-cell index lists: up to `max_per_cell` render indices packed as
//! bytes, four per word.

use crate::arena::{Arena, Handle};
use crate::instances::{DecalInstance, LightInstance};
use umbra_core::renderer::cluster::CELL_INDEX_EMPTY;

/// Words needed for a list of `max_per_cell` entries.
#[inline]
pub fn words_per_cell(max_per_cell: u32) -> usize {
    (max_per_cell as usize).div_ceil(4)
}

/// Packs render indices into a byte list, skipping `None` entries.
///
/// Unused bytes hold [`CELL_INDEX_EMPTY`]. Indices that do not fit in a byte
/// other than the sentinel are skipped too.
pub fn pack_cell_indices<I>(render_indices: I, max_per_cell: u32) -> Vec<u32>
where
    I: IntoIterator<Item = Option<u32>>,
{
    let sentinel = u32::from(CELL_INDEX_EMPTY);
    let fill = u32::from_ne_bytes([CELL_INDEX_EMPTY; 4]);
    let mut words = vec![fill; words_per_cell(max_per_cell)];

    let mut written = 0usize;
    for index in render_indices.into_iter().flatten() {
        if written >= max_per_cell as usize {
            break;
        }
        if index >= sentinel {
            log::trace!("ClusterFill: render index {index} does not fit a cell list");
            continue;
        }
        let shift = (written % 4) * 8;
        let word = &mut words[written / 4];
        *word = (*word & !(0xFF << shift)) | (index << shift);
        written += 1;
    }
    words
}

/// Cell list of the lights touching a cell, in the cell's own order.
pub fn pack_light_cell(
    lights: &Arena<LightInstance>,
    cell: &[Handle<LightInstance>],
    max_per_cell: u32,
) -> Vec<u32> {
    pack_cell_indices(
        cell.iter()
            .map(|&h| lights.get(h).and_then(|l| l.render_index)),
        max_per_cell,
    )
}

/// Cell list of the decals touching a cell.
pub fn pack_decal_cell(
    decals: &Arena<DecalInstance>,
    cell: &[Handle<DecalInstance>],
    max_per_cell: u32,
) -> Vec<u32> {
    pack_cell_indices(
        cell.iter()
            .map(|&h| decals.get(h).and_then(|d| d.render_index)),
        max_per_cell,
    )
}

/// Unpacks a cell list, stopping at the first sentinel.
pub fn unpack_cell_indices(words: &[u32]) -> Vec<u8> {
    words
        .iter()
        .flat_map(|w| (0..4).map(move |i| ((w >> (i * 8)) & 0xFF) as u8))
        .take_while(|&b| b != CELL_INDEX_EMPTY)
        .collect()
}
