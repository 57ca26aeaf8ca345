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

//! Cubemap-array atlas holding prefiltered reflection probes.

use super::probe::{ProbeHandle, ReflectionProbeInstance, CUBE_FACES};
use crate::arena::Arena;
use crate::error::{SchedulerError, SchedulerResult};
use std::borrow::Cow;
use umbra_core::math::Extent3D;
use umbra_core::renderer::{
    ClusterBuilder, GraphicsDevice, TextureDescriptor, TextureDimension, TextureFormat, TextureId,
    TextureUsage, TextureViewDimension,
};

/// One cubemap of the atlas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionSlot {
    /// Probe the cubemap belongs to.
    pub owner: Option<ProbeHandle>,
    /// Edge length of every mip of the filtered chain.
    pub mip_sizes: Vec<u32>,
    /// Set once the whole chain has been filtered for the current owner.
    pub ready: bool,
}

/// `count` cubemaps of `size` pixels with a roughness mip chain.
#[derive(Debug)]
pub struct ReflectionAtlas {
    size: u32,
    count: u32,
    mip_count: u32,
    slots: Vec<ReflectionSlot>,
    texture: Option<TextureId>,
    generation: u64,
    cluster_builder: Box<dyn ClusterBuilder>,
}

impl ReflectionAtlas {
    /// Creates an atlas; the texture is allocated by the first capture.
    ///
    /// `cluster_builder` clusters the scene lights while faces are captured.
    pub fn new(size: u32, count: u32, cluster_builder: Box<dyn ClusterBuilder>) -> Self {
        Self {
            size,
            count,
            mip_count: 0,
            slots: vec![ReflectionSlot::default(); count as usize],
            texture: None,
            generation: 0,
            cluster_builder,
        }
    }

    /// Face size in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of cubemap slots.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mips of the current texture, 0 before allocation.
    pub fn mip_count(&self) -> u32 {
        self.mip_count
    }

    /// The cubemap array, once allocated.
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Bumped every time the texture is rebuilt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Slot `index`.
    pub fn slot(&self, index: usize) -> Option<&ReflectionSlot> {
        self.slots.get(index)
    }

    /// Every slot.
    pub fn slots(&self) -> &[ReflectionSlot] {
        &self.slots
    }

    /// The cluster builder used for face captures.
    pub fn cluster_builder_mut(&mut self) -> &mut dyn ClusterBuilder {
        self.cluster_builder.as_mut()
    }

    /// Mips a texture of `size` gets: one per roughness layer, capped by the
    /// full chain length.
    pub fn regular_mip_count(size: u32, roughness_layers: u32) -> u32 {
        let full_chain = 32 - size.leading_zeros();
        roughness_layers.min(full_chain)
    }

    /// Resizes the atlas. Identical parameters are a no-op; anything else
    /// invalidates every slot.
    pub fn set_size(
        &mut self,
        device: &dyn GraphicsDevice,
        probes: &mut Arena<ReflectionProbeInstance>,
        size: u32,
        count: u32,
    ) -> bool {
        if size == self.size && count == self.count {
            return false;
        }
        self.invalidate(device, probes);
        self.size = size;
        self.count = count;
        self.slots = vec![ReflectionSlot::default(); count as usize];
        true
    }

    /// Frees the texture; every owning probe loses its slot.
    pub fn invalidate(
        &mut self,
        device: &dyn GraphicsDevice,
        probes: &mut Arena<ReflectionProbeInstance>,
    ) {
        for slot in &mut self.slots {
            if let Some(owner) = slot.owner.take() {
                if let Some(probe) = probes.get_mut(owner) {
                    probe.lose_slot();
                }
            }
            slot.ready = false;
            slot.mip_sizes.clear();
        }
        if let Some(texture) = self.texture.take() {
            if let Err(err) = device.destroy_texture(texture) {
                log::error!("ReflectionAtlas: failed to destroy texture: {err}");
            }
            self.generation += 1;
        }
        self.mip_count = 0;
    }

    /// Allocates the cubemap array with `mip_count` mips if needed.
    pub fn ensure_texture(
        &mut self,
        device: &dyn GraphicsDevice,
        mip_count: u32,
    ) -> SchedulerResult<TextureId> {
        if let Some(texture) = self.texture {
            return Ok(texture);
        }
        if self.size == 0 || self.count == 0 {
            return Err(SchedulerError::AllocationFailure(
                "reflection atlas has no slots".into(),
            ));
        }
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("reflection_atlas")),
            size: Extent3D::new(self.size, self.size, self.count * CUBE_FACES),
            mip_level_count: mip_count,
            dimension: TextureDimension::D2,
            view_dimension: TextureViewDimension::CubeArray,
            format: TextureFormat::Rgba16Float,
            usage: TextureUsage::TEXTURE_BINDING
                | TextureUsage::STORAGE_BINDING
                | TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::COPY_DST,
        })?;
        self.texture = Some(texture);
        self.mip_count = mip_count;
        self.generation += 1;
        let mip_sizes: Vec<u32> = (0..mip_count).map(|i| (self.size >> i).max(1)).collect();
        for slot in &mut self.slots {
            slot.mip_sizes = mip_sizes.clone();
            slot.ready = false;
        }
        log::debug!(
            "ReflectionAtlas: allocated {} cubemaps of {}px, {} mips",
            self.count,
            self.size,
            mip_count
        );
        Ok(texture)
    }

    /// Picks a slot for a new capture: a free one, else the least recently
    /// packed owner.
    pub fn find_slot(&self, probes: &Arena<ReflectionProbeInstance>) -> Option<usize> {
        if let Some(free) = self.slots.iter().position(|s| {
            s.owner.map_or(true, |owner| !probes.contains(owner))
        }) {
            return Some(free);
        }
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let owner = slot.owner?;
                probes.get(owner).map(|probe| (index, probe.last_pass))
            })
            .min_by_key(|&(_, last_pass)| last_pass)
            .map(|(index, _)| index)
    }

    /// Gives slot `index` to `probe`, evicting the previous owner.
    pub(crate) fn claim(
        &mut self,
        probes: &mut Arena<ReflectionProbeInstance>,
        index: usize,
        probe: ProbeHandle,
    ) {
        let slot = &mut self.slots[index];
        if let Some(previous) = slot.owner.replace(probe) {
            if previous != probe {
                log::debug!("ReflectionAtlas: slot {index} evicted from {previous:?}");
                if let Some(evicted) = probes.get_mut(previous) {
                    evicted.lose_slot();
                }
            }
        }
        slot.ready = false;
    }

    /// Releases slot `index` if `probe` owns it.
    pub(crate) fn release(&mut self, index: usize, probe: ProbeHandle) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.owner == Some(probe) {
                slot.owner = None;
                slot.ready = false;
            }
        }
    }

    pub(crate) fn publish(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.ready = true;
        }
    }

    /// `true` when `probe` owns slot `index` and its chain is filtered.
    pub fn is_published(&self, index: usize, probe: ProbeHandle) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.owner == Some(probe) && slot.ready)
    }
}
