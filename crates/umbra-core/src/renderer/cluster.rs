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

//! Fixed-layout records uploaded to the cluster buffers.
//!
//! Every record is `Pod` and sized to a multiple of 16 bytes so arrays of
//! them can be bound as storage buffers without repacking.

/// Capacity of the directional light array.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 8;

/// Cascades a directional light may render.
pub const MAX_DIRECTIONAL_SPLITS: usize = 4;

/// Sentinel byte marking an unused entry of a cell index list.
pub const CELL_INDEX_EMPTY: u8 = 0xFF;

/// The element categories a cluster builder distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterElementKind {
    /// Omni light sphere.
    OmniLight,
    /// Spot light cone.
    SpotLight,
    /// Decal box.
    Decal,
    /// Reflection probe box.
    ReflectionProbe,
}

/// GPU record of an omni or spot light.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct LightData {
    /// View-space position.
    pub position: [f32; 3],
    /// `1 / range`.
    pub inv_radius: f32,
    /// View-space direction (spot lights).
    pub direction: [f32; 3],
    /// Emitter size.
    pub size: f32,
    /// Color premultiplied by energy.
    pub color: [f32; 3],
    /// Attenuation exponent.
    pub attenuation: f32,
    /// Cosine of the spot half-angle.
    pub cos_spot_angle: f32,
    /// `1 / spot_attenuation`.
    pub inv_spot_attenuation: f32,
    /// Specular multiplier.
    pub specular_amount: f32,
    /// Non-zero when `atlas_rect` holds a shadow slot.
    pub shadow_enabled: u32,
    /// Normalized shadow atlas rectangle.
    pub atlas_rect: [f32; 4],
    /// View-space to light-space matrix for shadow lookups.
    pub shadow_matrix: [f32; 16],
    /// Depth bias.
    pub shadow_bias: f32,
    /// Normal bias.
    pub shadow_normal_bias: f32,
    /// Distance fade factor in `[0, 1]`.
    pub fade: f32,
    /// Volumetric fog energy.
    pub volumetric_fog_energy: f32,
}

/// GPU record of a decal.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DecalData {
    /// View space to unit decal box.
    pub xform: [f32; 16],
    /// `1 / extents` for texture projection.
    pub inv_extents: [f32; 3],
    /// Albedo blend.
    pub albedo_mix: f32,
    /// Normalized albedo rect.
    pub albedo_rect: [f32; 4],
    /// Normalized normal-map rect.
    pub normal_rect: [f32; 4],
    /// Normalized ORM rect.
    pub orm_rect: [f32; 4],
    /// Normalized emission rect.
    pub emission_rect: [f32; 4],
    /// Color multiplier, alpha scaled by distance fade.
    pub modulate: [f32; 4],
    /// Emission energy.
    pub emission_energy: f32,
    /// Cull mask.
    pub mask: u32,
    /// Upper fade exponent.
    pub upper_fade: f32,
    /// Lower fade exponent.
    pub lower_fade: f32,
    /// View-space projection direction.
    pub normal: [f32; 3],
    /// Normal fade factor.
    pub normal_fade: f32,
}

/// GPU record of a reflection probe.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ReflectionData {
    /// Half size of the influence box.
    pub box_extents: [f32; 3],
    /// Cubemap slot in the reflection atlas.
    pub index: u32,
    /// Capture origin offset.
    pub box_offset: [f32; 3],
    /// Cull mask.
    pub mask: u32,
    /// Ambient color premultiplied by energy.
    pub ambient: [f32; 3],
    /// Intensity.
    pub intensity: f32,
    /// Non-zero for exterior probes.
    pub exterior: u32,
    /// Non-zero when box projection is on.
    pub box_project: u32,
    /// Ambient mode code.
    pub ambient_mode: u32,
    /// Edge blend distance.
    pub blend_distance: f32,
    /// View space to probe local space.
    pub local_matrix: [f32; 16],
}

/// GPU record of a directional light.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DirectionalLightData {
    /// View-space direction the light travels.
    pub direction: [f32; 3],
    /// Direct energy.
    pub energy: f32,
    /// Linear color.
    pub color: [f32; 3],
    /// Angular size.
    pub size: f32,
    /// Specular multiplier.
    pub specular: f32,
    /// Cull mask.
    pub mask: u32,
    /// Non-zero when the atlas rects are valid.
    pub shadow_enabled: u32,
    /// Non-zero to blend cascades.
    pub blend_splits: u32,
    /// Cascade far distances.
    pub shadow_split_offsets: [f32; 4],
    /// Normalized directional atlas rect per cascade.
    pub atlas_rect: [[f32; 4]; MAX_DIRECTIONAL_SPLITS],
    /// Depth bias.
    pub shadow_bias: f32,
    /// Normal bias.
    pub shadow_normal_bias: f32,
    /// Distance where the last cascade starts fading.
    pub fade_from: f32,
    /// Distance where the shadow is gone.
    pub fade_to: f32,
}
