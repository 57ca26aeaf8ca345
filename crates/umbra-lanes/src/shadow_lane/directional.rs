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

//! The directional shadow atlas.

use crate::error::{SchedulerError, SchedulerResult};
use std::borrow::Cow;
use umbra_core::math::{Extent3D, Rect2D};
use umbra_core::renderer::cluster::MAX_DIRECTIONAL_SPLITS;
use umbra_core::renderer::{
    DirectionalShadowMode, GraphicsDevice, TextureDescriptor, TextureDimension, TextureFormat,
    TextureId, TextureUsage, TextureViewDimension,
};
use umbra_core::utils::next_power_of_two;

/// The region of light `index` when a square atlas of `size` is shared by
/// `count` lights.
///
/// The square is halved horizontally first, then vertically, alternating
/// until there are at least `count` regions.
pub fn directional_shadow_rect(size: u32, count: u32, index: u32) -> Rect2D {
    let mut split_h = 1u32;
    let mut split_v = 1u32;
    while split_h * split_v < count {
        if split_h == split_v {
            split_h <<= 1;
        } else {
            split_v <<= 1;
        }
    }
    let width = size / split_h;
    let height = size / split_v;
    Rect2D::new(
        (index % split_h) * width,
        (index / split_h) * height,
        width,
        height,
    )
}

/// A square depth atlas shared by every shadowed directional light.
///
/// Each frame starts a new epoch with [`set_light_count`]; lights then take
/// regions in the order they ask for them.
///
/// [`set_light_count`]: DirectionalShadowAtlas::set_light_count
#[derive(Debug)]
pub struct DirectionalShadowAtlas {
    size: u32,
    use_16_bits: bool,
    light_count: u32,
    current_light: u32,
    texture: Option<TextureId>,
    generation: u64,
}

impl DirectionalShadowAtlas {
    /// Creates the atlas; the texture is allocated on first use.
    pub fn new(size: u32, use_16_bits: bool) -> Self {
        Self {
            size: next_power_of_two(size),
            use_16_bits,
            light_count: 0,
            current_light: 0,
            texture: None,
            generation: 0,
        }
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Lights sharing the atlas this epoch.
    pub fn light_count(&self) -> u32 {
        self.light_count
    }

    /// The depth texture, once allocated.
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Bumped every time the texture identity changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resizes the atlas. Identical parameters are a no-op.
    pub fn set_size(&mut self, device: &dyn GraphicsDevice, size: u32, use_16_bits: bool) {
        let size = next_power_of_two(size);
        if size == self.size && use_16_bits == self.use_16_bits {
            return;
        }
        log::debug!("DirectionalShadowAtlas: resizing {} -> {}", self.size, size);
        self.free_texture(device);
        self.size = size;
        self.use_16_bits = use_16_bits;
    }

    /// Starts a new epoch shared by `count` lights.
    pub fn set_light_count(&mut self, count: u32) {
        self.light_count = count;
        self.current_light = 0;
    }

    /// Hands out the next region index of this epoch.
    pub fn next_light_index(&mut self) -> Option<u32> {
        if self.current_light >= self.light_count {
            return None;
        }
        let index = self.current_light;
        self.current_light += 1;
        Some(index)
    }

    fn region_rect(&self, index: u32) -> Rect2D {
        directional_shadow_rect(self.size, self.light_count, index)
    }

    /// The sub-rectangle cascade `pass` renders into.
    fn pass_rect(&self, index: u32, mode: DirectionalShadowMode, pass: u32) -> Rect2D {
        let mut rect = self.region_rect(index);
        match mode {
            DirectionalShadowMode::Orthogonal => {}
            DirectionalShadowMode::Parallel2Splits => {
                rect.height /= 2;
                if pass == 1 {
                    rect.y += rect.height;
                }
            }
            DirectionalShadowMode::Parallel4Splits => {
                rect.width /= 2;
                rect.height /= 2;
                if pass & 1 == 1 {
                    rect.x += rect.width;
                }
                if pass >= 2 {
                    rect.y += rect.height;
                }
            }
        }
        rect
    }

    /// Every cascade rect of light `index`, unused cascades zeroed.
    pub fn pass_rects(
        &self,
        index: u32,
        mode: DirectionalShadowMode,
    ) -> [Rect2D; MAX_DIRECTIONAL_SPLITS] {
        let mut rects = [Rect2D::default(); MAX_DIRECTIONAL_SPLITS];
        for pass in 0..mode.pass_count() {
            rects[pass as usize] = self.pass_rect(index, mode, pass);
        }
        rects
    }

    /// Allocates the depth texture if needed and returns it.
    pub fn ensure_texture(&mut self, device: &dyn GraphicsDevice) -> SchedulerResult<TextureId> {
        if let Some(texture) = self.texture {
            return Ok(texture);
        }
        if self.size == 0 {
            return Err(SchedulerError::AllocationFailure(
                "directional shadow size is 0".into(),
            ));
        }
        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("directional_shadow_atlas")),
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
        Ok(texture)
    }

    /// Destroys the texture.
    pub fn free_texture(&mut self, device: &dyn GraphicsDevice) {
        if let Some(texture) = self.texture.take() {
            if let Err(err) = device.destroy_texture(texture) {
                log::error!("DirectionalShadowAtlas: failed to destroy texture: {err}");
            }
            self.generation += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_horizontally_then_vertically() {
        assert_eq!(directional_shadow_rect(4096, 1, 0), Rect2D::new(0, 0, 4096, 4096));
        assert_eq!(directional_shadow_rect(4096, 2, 1), Rect2D::new(2048, 0, 2048, 4096));
        assert_eq!(directional_shadow_rect(4096, 3, 2), Rect2D::new(0, 2048, 2048, 2048));
        assert_eq!(directional_shadow_rect(4096, 4, 3), Rect2D::new(2048, 2048, 2048, 2048));
        // 5 lights: 4x2 grid
        assert_eq!(directional_shadow_rect(4096, 5, 4), Rect2D::new(0, 2048, 1024, 2048));
    }

    #[test]
    fn regions_never_overlap() {
        for count in 1..=8 {
            let rects: Vec<_> = (0..count)
                .map(|i| directional_shadow_rect(4096, count, i))
                .collect();
            for (i, a) in rects.iter().enumerate() {
                for b in &rects[i + 1..] {
                    assert!(!a.overlaps(b), "count {count}: {a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn round_robin_resets_each_epoch() {
        let mut atlas = DirectionalShadowAtlas::new(4096, true);
        atlas.set_light_count(2);
        assert_eq!(atlas.next_light_index(), Some(0));
        assert_eq!(atlas.next_light_index(), Some(1));
        assert_eq!(atlas.next_light_index(), None);
        atlas.set_light_count(2);
        assert_eq!(atlas.next_light_index(), Some(0));
    }

    #[test]
    fn cascade_rects_follow_the_split_mode() {
        let mut atlas = DirectionalShadowAtlas::new(4096, true);
        atlas.set_light_count(1);
        let p2 = atlas.pass_rects(0, DirectionalShadowMode::Parallel2Splits);
        assert_eq!(p2[0], Rect2D::new(0, 0, 4096, 2048));
        assert_eq!(p2[1], Rect2D::new(0, 2048, 4096, 2048));
        assert_eq!(p2[2], Rect2D::default());

        let p4 = atlas.pass_rects(0, DirectionalShadowMode::Parallel4Splits);
        assert_eq!(p4[1], Rect2D::new(2048, 0, 2048, 2048));
        assert_eq!(p4[2], Rect2D::new(0, 2048, 2048, 2048));
        assert_eq!(p4[3], Rect2D::new(2048, 2048, 2048, 2048));


        let ortho = atlas.pass_rects(0, DirectionalShadowMode::Orthogonal);
        assert_eq!(ortho[0], Rect2D::new(0, 0, 4096, 4096));
        assert_eq!(ortho[1], Rect2D::default());
    }
}
