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

//! Parameters of the punctual and directional lights the scheduler packs.

use crate::math::LinearRgba;

/// The three light shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Infinitely distant light, packed into the fixed directional array.
    Directional,
    /// Point light radiating in all directions.
    Omni,
    /// Cone light.
    Spot,
}

/// How an omni light's shadow is laid out in its atlas slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OmniShadowMode {
    /// Two paraboloids, each taking half the slot height.
    #[default]
    DualParaboloid,
    /// A cube unfolded into the slot.
    Cube,
}

/// How a directional light splits its region of the directional atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionalShadowMode {
    /// One region.
    #[default]
    Orthogonal,
    /// Two cascades stacked vertically.
    Parallel2Splits,
    /// Four cascades in a 2x2 grid.
    Parallel4Splits,
}

impl DirectionalShadowMode {
    /// Number of shadow passes (cascades) the mode renders.
    pub fn pass_count(self) -> u32 {
        match self {
            DirectionalShadowMode::Orthogonal => 1,
            DirectionalShadowMode::Parallel2Splits => 2,
            DirectionalShadowMode::Parallel4Splits => 4,
        }
    }
}

/// Whether a directional light affects the scene, the sky, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionalSkyMode {
    /// Lights both.
    #[default]
    LightAndSky,
    /// Lights the scene only.
    LightOnly,
    /// Lights the sky only and is never packed for the scene.
    SkyOnly,
}

/// Distance fade-out of a light or decal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceFade {
    /// Depth at which fading starts.
    pub begin: f32,
    /// Depth range over which the element fades to nothing.
    pub length: f32,
}

impl DistanceFade {
    /// Fade factor at `depth`, or `None` once fully faded out.
    pub fn factor(&self, depth: f32) -> Option<f32> {
        let end = self.begin + self.length;
        if depth > end {
            return None;
        }
        if depth <= self.begin || self.length <= 0.0 {
            return Some(1.0);
        }
        Some(1.0 - (depth - self.begin) / self.length)
    }
}

/// Every parameter of a light instance the scheduler reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    /// Shape of the light.
    pub kind: LightKind,
    /// Linear color.
    pub color: LinearRgba,
    /// Direct energy multiplier.
    pub energy: f32,
    /// Indirect energy multiplier.
    pub indirect_energy: f32,
    /// Specular contribution.
    pub specular: f32,
    /// Range of omni and spot lights.
    pub range: f32,
    /// Distance attenuation exponent.
    pub attenuation: f32,
    /// Spot cone half-angle in degrees.
    pub spot_angle: f32,
    /// Spot cone edge attenuation.
    pub spot_attenuation: f32,
    /// Emitter size for soft shadows.
    pub size: f32,
    /// Whether the light casts shadows.
    pub shadow_enabled: bool,
    /// Depth bias.
    pub shadow_bias: f32,
    /// Normal bias.
    pub shadow_normal_bias: f32,
    /// Omni shadow layout.
    pub omni_shadow_mode: OmniShadowMode,
    /// Directional cascade layout.
    pub directional_shadow_mode: DirectionalShadowMode,
    /// Cascade split distances as a fraction of the max distance.
    pub directional_shadow_splits: [f32; 3],
    /// Blend between cascades.
    pub directional_blend_splits: bool,
    /// Maximum shadow distance of a directional light.
    pub directional_max_distance: f32,
    /// Scene/sky contribution of a directional light.
    pub directional_sky_mode: DirectionalSkyMode,
    /// Optional distance fade.
    pub distance_fade: Option<DistanceFade>,
    /// Multiplier applied when lighting volumetric fog.
    pub volumetric_fog_energy: f32,
    /// Layers this light affects.
    pub cull_mask: u32,
}

impl LightParams {
    fn base(kind: LightKind) -> Self {
        Self {
            kind,
            color: LinearRgba::WHITE,
            energy: 1.0,
            indirect_energy: 1.0,
            specular: 0.5,
            range: 5.0,
            attenuation: 1.0,
            spot_angle: 45.0,
            spot_attenuation: 1.0,
            size: 0.0,
            shadow_enabled: false,
            shadow_bias: 0.02,
            shadow_normal_bias: 1.0,
            omni_shadow_mode: OmniShadowMode::default(),
            directional_shadow_mode: DirectionalShadowMode::default(),
            directional_shadow_splits: [0.1, 0.2, 0.5],
            directional_blend_splits: false,
            directional_max_distance: 100.0,
            directional_sky_mode: DirectionalSkyMode::default(),
            distance_fade: None,
            volumetric_fog_energy: 1.0,
            cull_mask: u32::MAX,
        }
    }

    /// An omni light of the given range.
    pub fn omni(range: f32) -> Self {
        Self {
            range,
            ..Self::base(LightKind::Omni)
        }
    }

    /// A spot light of the given range and cone half-angle in degrees.
    pub fn spot(range: f32, spot_angle: f32) -> Self {
        Self {
            range,
            spot_angle,
            ..Self::base(LightKind::Spot)
        }
    }

    /// A directional light.
    pub fn directional() -> Self {
        Self::base(LightKind::Directional)
    }

    /// Returns a copy with shadows enabled.
    #[must_use]
    pub fn with_shadow(mut self) -> Self {
        self.shadow_enabled = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_factor_ramps_to_zero() {
        let fade = DistanceFade {
            begin: 10.0,
            length: 10.0,
        };
        assert_eq!(fade.factor(5.0), Some(1.0));
        assert_eq!(fade.factor(15.0), Some(0.5));
        assert_eq!(fade.factor(20.0), Some(0.0));
        assert_eq!(fade.factor(20.5), None);
    }

    #[test]
    fn directional_modes_pass_counts() {
        assert_eq!(DirectionalShadowMode::Orthogonal.pass_count(), 1);
        assert_eq!(DirectionalShadowMode::Parallel2Splits.pass_count(), 2);
        assert_eq!(DirectionalShadowMode::Parallel4Splits.pass_count(), 4);
    }
}
