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

//! Decal parameters.

use super::light::DistanceFade;
use crate::math::{LinearRgba, Vec3};

/// Normalized rectangles of the decal's textures inside the decal atlas,
/// each `[x, y, width, height]`. A zero rect means "no texture".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecalTextureRects {
    /// Albedo texture.
    pub albedo: [f32; 4],
    /// Normal map.
    pub normal: [f32; 4],
    /// Occlusion/roughness/metallic map.
    pub orm: [f32; 4],
    /// Emission texture.
    pub emission: [f32; 4],
}

/// Every parameter of a decal instance the scheduler reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecalParams {
    /// Half size of the projection box.
    pub extents: Vec3,
    /// Blend between the albedo texture and the surface.
    pub albedo_mix: f32,
    /// Atlas rectangles.
    pub textures: DecalTextureRects,
    /// Color multiplier; alpha is scaled by the distance fade.
    pub modulate: LinearRgba,
    /// Emission energy.
    pub emission_energy: f32,
    /// Fade exponent above the decal's center plane.
    pub upper_fade: f32,
    /// Fade exponent below the decal's center plane.
    pub lower_fade: f32,
    /// Fade by the angle between surface and projection direction (0 disables).
    pub normal_fade: f32,
    /// Optional distance fade.
    pub distance_fade: Option<DistanceFade>,
    /// Layers this decal projects on.
    pub cull_mask: u32,
}

impl Default for DecalParams {
    fn default() -> Self {
        Self {
            extents: Vec3::ONE,
            albedo_mix: 1.0,
            textures: DecalTextureRects::default(),
            modulate: LinearRgba::WHITE,
            emission_energy: 1.0,
            upper_fade: 0.3,
            lower_fade: 0.3,
            normal_fade: 0.0,
            distance_fade: None,
            cull_mask: u32::MAX,
        }
    }
}
