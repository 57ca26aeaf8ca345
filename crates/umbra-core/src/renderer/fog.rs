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

//! Volumetric fog environment parameters and the per-dispatch GPU record.

use crate::math::{LinearRgba, Mat4};

/// Fog parameters of the active environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumetricFogEnvironment {
    /// Whether volumetric fog is rendered at all.
    pub enabled: bool,
    /// Base density.
    pub density: f32,
    /// Scattering color.
    pub albedo: LinearRgba,
    /// Emitted color.
    pub emission: LinearRgba,
    /// Emission energy.
    pub emission_energy: f32,
    /// Henyey-Greenstein anisotropy.
    pub anisotropy: f32,
    /// Distance covered by the froxel volume.
    pub length: f32,
    /// Exponent distributing depth slices.
    pub detail_spread: f32,
    /// Global illumination injection.
    pub gi_inject: f32,
    /// Ambient light injection.
    pub ambient_inject: f32,
    /// Blend with the previous frame's density.
    pub temporal_reprojection: bool,
    /// Weight of the previous frame when reprojecting.
    pub temporal_reprojection_amount: f32,
}

impl Default for VolumetricFogEnvironment {
    fn default() -> Self {
        Self {
            enabled: false,
            density: 0.01,
            albedo: LinearRgba::WHITE,
            emission: LinearRgba::BLACK,
            emission_energy: 1.0,
            anisotropy: 0.2,
            length: 64.0,
            detail_spread: 2.0,
            gi_inject: 0.0,
            ambient_inject: 0.0,
            temporal_reprojection: true,
            temporal_reprojection_amount: 0.9,
        }
    }
}

/// One compute stage of the fog frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FogStage {
    /// Inject density and lighting into the light-density volume.
    Density,
    /// One axis of the separable blur (0 = X, 1 = Y).
    Filter {
        /// Blur axis.
        axis: u32,
    },
    /// Integrate scattering along depth into the fog map.
    Integrate,
}

/// Parameters uploaded for every fog compute dispatch.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct FogParams {
    /// Froxel volume dimensions.
    pub fog_volume_size: [u32; 3],
    /// `frame % 16`, selects the jitter pattern.
    pub temporal_frame: u32,
    /// Current view to previous view, for reprojection.
    pub to_prev_view: [f32; 16],
    /// Camera near plane.
    pub z_near: f32,
    /// Fog volume far distance.
    pub z_far: f32,
    /// Depth slice distribution exponent.
    pub detail_spread: f32,
    /// Weight of the previous frame.
    pub temporal_blend: f32,
    /// Base density.
    pub base_density: f32,
    /// Scattering anisotropy.
    pub anisotropy: f32,
    /// GI injection.
    pub gi_inject: f32,
    /// Axis of a filter pass.
    pub filter_axis: u32,
    /// Emission premultiplied by energy.
    pub base_emission: [f32; 3],
    /// Number of packed directional lights.
    pub directional_light_count: u32,
    /// Scattering premultiplied by density.
    pub base_scattering: [f32; 3],
    /// Capacity of each cluster category.
    pub max_cluster_elements: u32,
}

impl FogParams {
    /// Builds the record shared by every stage of one frame.
    pub fn new(
        env: &VolumetricFogEnvironment,
        volume_size: [u32; 3],
        frame: u64,
        to_prev_view: &Mat4,
        z_near: f32,
    ) -> Self {
        let density = env.density;
        Self {
            fog_volume_size: volume_size,
            temporal_frame: (frame % 16) as u32,
            to_prev_view: to_prev_view.to_cols_array(),
            z_near,
            z_far: env.length,
            detail_spread: env.detail_spread,
            temporal_blend: if env.temporal_reprojection {
                env.temporal_reprojection_amount
            } else {
                0.0
            },
            base_density: density,
            anisotropy: env.anisotropy,
            gi_inject: env.gi_inject,
            filter_axis: 0,
            base_emission: env.emission.scaled_rgb(env.emission_energy),
            directional_light_count: 0,
            base_scattering: env.albedo.scaled_rgb(density),
            max_cluster_elements: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fog_params_layout() {
        assert_eq!(std::mem::size_of::<FogParams>(), 144);
    }

    #[test]
    fn temporal_frame_wraps_at_sixteen() {
        let env = VolumetricFogEnvironment::default();
        let p = FogParams::new(&env, [64, 36, 64], 33, &Mat4::IDENTITY, 0.05);
        assert_eq!(p.temporal_frame, 1);
        assert_eq!(p.temporal_blend, 0.9);
    }
}
