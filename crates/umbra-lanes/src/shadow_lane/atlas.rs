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

//! The positional shadow atlas and its slot allocator.

use crate::arena::Arena;
use crate::error::{SchedulerError, SchedulerResult};
use crate::frame::FrameClock;
use crate::instances::{LightHandle, LightInstance};
use ahash::AHashMap;
use std::borrow::Cow;
use umbra_core::math::{Extent3D, Rect2D};
use umbra_core::renderer::{
    GraphicsDevice, TextureDescriptor, TextureDimension, TextureFormat, TextureId, TextureUsage,
    TextureViewDimension,
};
use umbra_core::utils::next_power_of_two;

/// The atlas is always split in a 2x2 grid of quadrants.
pub const QUADRANT_COUNT: usize = 4;

const QUADRANT_SHIFT: u32 = 27;
const SHADOW_INDEX_MASK: u32 = (1 << QUADRANT_SHIFT) - 1;

/// A packed `(quadrant, slot)` address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowKey(u32);

impl ShadowKey {
    /// Packs a quadrant and a slot index.
    pub fn new(quadrant: usize, slot: usize) -> Self {
        Self(((quadrant as u32) << QUADRANT_SHIFT) | (slot as u32 & SHADOW_INDEX_MASK))
    }

    /// The quadrant, `0..4`.
    pub fn quadrant(self) -> usize {
        ((self.0 >> QUADRANT_SHIFT) & 0x3) as usize
    }

    /// The slot inside the quadrant.
    pub fn slot(self) -> usize {
        (self.0 & SHADOW_INDEX_MASK) as usize
    }

    /// The raw packed value.
    pub fn bits(self) -> u32 {
        self.0
    }
}

/// One shadow map slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadowSlot {
    /// Light rendering into this slot.
    pub owner: Option<LightHandle>,
    /// Light version the slot content was rendered for; 0 means stale.
    pub version: u64,
    /// When the current owner got the slot.
    pub alloc_tick: u64,
}

#[derive(Debug, Clone, Default)]
struct Quadrant {
    subdivision: u32,
    shadows: Vec<ShadowSlot>,
}

/// A depth texture split into four quadrants of equally sized slots.
///
/// Lights ask for a slot every frame through [`ShadowAtlas::update_light`];
/// the atlas picks the smallest slot size that still covers the light's
/// screen footprint and keeps each assignment for at least the realloc
/// tolerance before moving or stealing it.
#[derive(Debug)]
pub struct ShadowAtlas {
    size: u32,
    use_16_bits: bool,
    realloc_tolerance_msec: u64,
    smallest_subdiv: u32,
    quadrants: [Quadrant; QUADRANT_COUNT],
    size_order: [usize; QUADRANT_COUNT],
    shadow_owners: AHashMap<LightHandle, ShadowKey>,
    texture: Option<TextureId>,
    generation: u64,
}

impl ShadowAtlas {
    /// Creates an atlas of `size` pixels with every quadrant unused.
    ///
    /// No texture is allocated until the first shadow is rendered.
    pub fn new(size: u32, use_16_bits: bool, realloc_tolerance_msec: u64) -> Self {
        Self {
            size: next_power_of_two(size),
            use_16_bits,
            realloc_tolerance_msec,
            smallest_subdiv: 0,
            quadrants: Default::default(),
            size_order: [0, 1, 2, 3],
            shadow_owners: AHashMap::new(),
            texture: None,
            generation: 0,
        }
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether the depth format is 16-bit.
    pub fn uses_16_bits(&self) -> bool {
        self.use_16_bits
    }

    /// The depth texture, once allocated.
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Bumped every time the texture identity changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Slot grid side of `quadrant` (0 = unused).
    pub fn quadrant_subdivision(&self, quadrant: usize) -> u32 {
        self.quadrants.get(quadrant).map_or(0, |q| q.subdivision)
    }

    /// Finest subdivision in use, 0 if every quadrant is unused.
    pub fn smallest_subdivision(&self) -> u32 {
        self.smallest_subdiv
    }

    /// Quadrants ordered by descending subdivision.
    pub fn size_order(&self) -> [usize; QUADRANT_COUNT] {
        self.size_order
    }

    /// The slot a light currently owns.
    pub fn shadow_key(&self, light: LightHandle) -> Option<ShadowKey> {
        self.shadow_owners.get(&light).copied()
    }

    /// The slot at `key`.
    pub fn slot(&self, key: ShadowKey) -> Option<&ShadowSlot> {
        self.quadrants
            .get(key.quadrant())
            .and_then(|q| q.shadows.get(key.slot()))
    }

    /// Number of lights holding a slot.
    pub fn owner_count(&self) -> usize {
        self.shadow_owners.len()
    }

    /// Changes the minimum slot age before a move or steal.
    pub fn set_realloc_tolerance(&mut self, msec: u64) {
        self.realloc_tolerance_msec = msec;
    }

    /// Resizes the atlas.
    ///
    /// Identical parameters are a no-op that keeps every assignment. Anything
    /// else frees the texture and drops every assignment.
    pub fn set_size(&mut self, device: &dyn GraphicsDevice, size: u32, use_16_bits: bool) {
        let size = next_power_of_two(size);
        if size == self.size && use_16_bits == self.use_16_bits {
            return;
        }
        log::debug!(
            "ShadowAtlas: resizing {} -> {} ({} owners dropped)",
            self.size,
            size,
            self.shadow_owners.len()
        );
        self.free_texture(device);
        for quadrant in &mut self.quadrants {
            let count = quadrant.shadows.len();
            quadrant.shadows.clear();
            quadrant.shadows.resize(count, ShadowSlot::default());
        }
        self.shadow_owners.clear();
        self.size = size;
        self.use_16_bits = use_16_bits;
    }

    /// Splits `quadrant` so it can hold `count` shadows.
    ///
    /// The grid side is the square root of `count` rounded up to a power of
    /// four. Changing it evicts every light in that quadrant.
    pub fn set_quadrant_subdivision(&mut self, quadrant: usize, count: u32) {
        if quadrant >= QUADRANT_COUNT {
            log::warn!("ShadowAtlas: quadrant index {quadrant} out of range");
            return;
        }

        let mut subdiv = next_power_of_two(count);
        if subdiv & 0xaaaa_aaaa != 0 {
            // odd exponent, round up to the next even power
            subdiv <<= 1;
        }
        let subdiv = (subdiv as f64).sqrt() as u32;

        if self.quadrants[quadrant].subdivision == subdiv {
            return;
        }

        let evicted: Vec<LightHandle> = self.quadrants[quadrant]
            .shadows
            .iter()
            .filter_map(|slot| slot.owner)
            .collect();
        for owner in evicted {
            self.shadow_owners.remove(&owner);
        }

        let q = &mut self.quadrants[quadrant];
        q.shadows.clear();
        q.shadows
            .resize((subdiv * subdiv) as usize, ShadowSlot::default());
        q.subdivision = subdiv;

        self.smallest_subdiv = self
            .quadrants
            .iter()
            .map(|q| q.subdivision)
            .filter(|&s| s != 0)
            .min()
            .unwrap_or(0);

        // bubble sort, four entries
        let mut swapped = true;
        while swapped {
            swapped = false;
            for i in 0..QUADRANT_COUNT - 1 {
                let a = self.quadrants[self.size_order[i]].subdivision;
                let b = self.quadrants[self.size_order[i + 1]].subdivision;
                if a < b {
                    self.size_order.swap(i, i + 1);
                    swapped = true;
                }
            }
        }
    }

    /// Requests (or refreshes) a shadow slot for `light`.
    ///
    /// `coverage` is the fraction of the screen the light covers. Returns
    /// `true` when the slot content must be re-rendered: the light was just
    /// placed, moved to another slot, or its version changed. Returns `false`
    /// when the slot is still valid, and also when no slot could be found, in
    /// which case the light has no shadow this frame.
    pub fn update_light(
        &mut self,
        lights: &Arena<LightInstance>,
        light: LightHandle,
        coverage: f32,
        light_version: u64,
        clock: FrameClock,
    ) -> bool {
        match self.try_update_light(lights, light, coverage, light_version, clock) {
            Ok(redraw) => redraw,
            Err(SchedulerError::InvalidHandle(what)) => {
                log::warn!("ShadowAtlas: update_light on invalid {what}");
                false
            }
            Err(err) => {
                log::trace!("ShadowAtlas: {err}");
                false
            }
        }
    }

    fn try_update_light(
        &mut self,
        lights: &Arena<LightInstance>,
        light: LightHandle,
        coverage: f32,
        light_version: u64,
        clock: FrameClock,
    ) -> SchedulerResult<bool> {
        if !lights.contains(light) {
            return Err(SchedulerError::InvalidHandle("light instance"));
        }
        if self.size == 0 || self.smallest_subdiv == 0 {
            return Err(SchedulerError::AllocationFailure(
                "atlas has no usable quadrant".into(),
            ));
        }

        let quad_size = self.size >> 1;
        let coverage_px = (quad_size as f32 * coverage.clamp(0.0, 1.0)) as u32;
        let desired_fit = (quad_size / self.smallest_subdiv).min(next_power_of_two(coverage_px));

        let mut valid = [0usize; QUADRANT_COUNT];
        let mut valid_count = 0;
        let mut best_size: Option<u32> = None;
        let mut best_subdiv = 0;

        for &q in &self.size_order {
            let subdiv = self.quadrants[q].subdivision;
            if subdiv == 0 {
                continue;
            }
            let max_fit = quad_size / subdiv;
            if matches!(best_size, Some(best) if max_fit > best) {
                break;
            }
            valid[valid_count] = q;
            valid_count += 1;
            best_subdiv = subdiv;
            if max_fit >= desired_fit {
                best_size = Some(max_fit);
            }
        }
        let valid = &valid[..valid_count];

        if let Some(key) = self.shadow_owners.get(&light).copied() {
            let (q, s) = (key.quadrant(), key.slot());
            let subdiv = self.quadrants[q].subdivision;
            let current = self.quadrants[q].shadows[s];
            let should_realloc = subdiv != best_subdiv
                && clock.elapsed_since(current.alloc_tick) >= self.realloc_tolerance_msec;
            let should_redraw = current.version != light_version;

            if should_realloc {
                if let Some((nq, ns)) = self.find_shadow(lights, valid, Some(subdiv), clock) {
                    self.quadrants[q].shadows[s] = ShadowSlot::default();
                    self.assign(light, nq, ns, light_version, clock);
                    log::trace!(
                        "ShadowAtlas: moved {light:?} from quadrant {q} to quadrant {nq}"
                    );
                    return Ok(true);
                }
            }

            self.quadrants[q].shadows[s].version = light_version;
            return Ok(should_redraw);
        }

        match self.find_shadow(lights, valid, None, clock) {
            Some((nq, ns)) => {
                self.assign(light, nq, ns, light_version, clock);
                Ok(true)
            }
            None => Err(SchedulerError::AllocationFailure(format!(
                "no shadow slot for {light:?}"
            ))),
        }
    }

    /// Scans `quadrants` from the best fit toward the finest.
    ///
    /// Reaching a quadrant of `current_subdiv` stops the search: the light
    /// already holds a slot of that size and nothing further is better.
    fn find_shadow(
        &self,
        lights: &Arena<LightInstance>,
        quadrants: &[usize],
        current_subdiv: Option<u32>,
        clock: FrameClock,
    ) -> Option<(usize, usize)> {
        for &q in quadrants.iter().rev() {
            let quadrant = &self.quadrants[q];
            if Some(quadrant.subdivision) == current_subdiv {
                return None;
            }

            let mut free = None;
            let mut oldest: Option<(usize, u64)> = None;
            for (index, slot) in quadrant.shadows.iter().enumerate() {
                let Some(owner) = slot.owner else {
                    free = Some(index);
                    break;
                };
                let Some(instance) = lights.get(owner) else {
                    // owner freed without releasing, the slot is as good as free
                    free = Some(index);
                    break;
                };
                if instance.last_scene_pass == clock.scene_pass {
                    continue;
                }
                if clock.elapsed_since(slot.alloc_tick) < self.realloc_tolerance_msec {
                    continue;
                }
                if oldest.map_or(true, |(_, tick)| slot.alloc_tick < tick) {
                    oldest = Some((index, slot.alloc_tick));
                }
            }

            if let Some(index) = free.or(oldest.map(|(index, _)| index)) {
                return Some((q, index));
            }
        }
        None
    }

    fn assign(
        &mut self,
        light: LightHandle,
        quadrant: usize,
        slot: usize,
        light_version: u64,
        clock: FrameClock,
    ) {
        let target = &mut self.quadrants[quadrant].shadows[slot];
        if let Some(previous) = target.owner {
            log::debug!("ShadowAtlas: {light:?} steals slot from {previous:?}");
            self.shadow_owners.remove(&previous);
        }
        *target = ShadowSlot {
            owner: Some(light),
            version: light_version,
            alloc_tick: clock.ticks_msec,
        };
        self.shadow_owners
            .insert(light, ShadowKey::new(quadrant, slot));
    }

    /// Removes `light` from the atlas. Returns `true` if it held a slot.
    pub fn release_light(&mut self, light: LightHandle) -> bool {
        match self.shadow_owners.remove(&light) {
            Some(key) => {
                self.quadrants[key.quadrant()].shadows[key.slot()] = ShadowSlot::default();
                true
            }
            None => false,
        }
    }

    /// Pixel rectangle of the light's slot.
    ///
    /// Omni lights render two paraboloids: `pass` 0 gets the upper half of
    /// the slot and `pass` 1 the lower half.
    pub fn slot_rect(&self, light: LightHandle, omni: bool, pass: u32) -> Option<Rect2D> {
        let key = self.shadow_owners.get(&light)?;
        let (q, s) = (key.quadrant() as u32, key.slot() as u32);
        let subdiv = self.quadrants[q as usize].subdivision;
        if subdiv == 0 {
            return None;
        }

        let quad_size = self.size >> 1;
        let shadow_size = quad_size / subdiv;
        let mut rect = Rect2D::new(
            (q & 1) * quad_size + (s % subdiv) * shadow_size,
            (q >> 1) * quad_size + (s / subdiv) * shadow_size,
            shadow_size,
            shadow_size,
        );
        if omni {
            rect.height /= 2;
            if pass == 1 {
                rect.y += rect.height;
            }
        }
        Some(rect)
    }

    /// Allocates the depth texture if needed and returns it.
    pub fn ensure_texture(&mut self, device: &dyn GraphicsDevice) -> SchedulerResult<TextureId> {
        if let Some(texture) = self.texture {
            return Ok(texture);
        }
        if self.size == 0 {
            return Err(SchedulerError::AllocationFailure(
                "shadow atlas size is 0".into(),
            ));
        }
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("shadow_atlas")),
            size: Extent3D::new(self.size, self.size, 1),
            mip_level_count: 1,
            dimension: TextureDimension::D2,
            view_dimension: TextureViewDimension::D2,
            format: if self.use_16_bits {
                TextureFormat::Depth16Unorm
            } else {
                TextureFormat::Depth32Float
            },
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::DEPTH_STENCIL_ATTACHMENT,
        })?;
        self.texture = Some(texture);
        self.generation += 1;
        log::debug!("ShadowAtlas: allocated {0}x{0} depth texture", self.size);
        Ok(texture)
    }

    /// Destroys the texture; slots keep their owners but must be re-rendered.
    pub fn free_texture(&mut self, device: &dyn GraphicsDevice) {
        if let Some(texture) = self.texture.take() {
            if let Err(err) = device.destroy_texture(texture) {
                log::error!("ShadowAtlas: failed to destroy texture: {err}");
            }
            self.generation += 1;
        }
        for quadrant in &mut self.quadrants {
            for slot in &mut quadrant.shadows {
                slot.version = 0;
            }
        }
    }

    /// Checks that every slot owner points back to its slot and vice versa.
    pub fn owners_consistent(&self) -> bool {
        let mut owned = 0;
        for (qi, quadrant) in self.quadrants.iter().enumerate() {
            for (si, slot) in quadrant.shadows.iter().enumerate() {
                if let Some(owner) = slot.owner {
                    owned += 1;
                    if self.shadow_owners.get(&owner) != Some(&ShadowKey::new(qi, si)) {
                        return false;
                    }
                }
            }
        }
        owned == self.shadow_owners.len()
    }
}
