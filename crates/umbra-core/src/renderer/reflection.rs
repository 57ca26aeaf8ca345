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

//! Reflection probe parameters.

use crate::math::{LinearRgba, Vec3};

/// How often a probe is re-rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReflectionUpdateMode {
    /// Rendered and prefiltered once, incrementally over many frames.
    #[default]
    Once,
    /// Re-rendered every frame with a fast filter (real-time probe).
    Always,
}

/// Ambient light contributed inside the probe's box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReflectionAmbientMode {
    /// No ambient contribution.
    Disabled,
    /// Ambient from the captured environment.
    #[default]
    Environment,
    /// A constant ambient color.
    Color,
}

impl ReflectionAmbientMode {
    /// Numeric code stored in GPU records.
    pub fn code(self) -> u32 {
        match self {
            ReflectionAmbientMode::Disabled => 0,
            ReflectionAmbientMode::Environment => 1,
            ReflectionAmbientMode::Color => 2,
        }
    }
}

/// Every parameter of a reflection probe instance the scheduler reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionProbeParams {
    /// Update cadence.
    pub update_mode: ReflectionUpdateMode,
    /// Reflection intensity.
    pub intensity: f32,
    /// Far distance used when capturing faces.
    pub max_distance: f32,
    /// Half size of the influence box.
    pub extents: Vec3,
    /// Capture origin relative to the box center.
    pub origin_offset: Vec3,
    /// Interior probes ignore the sky.
    pub interior: bool,
    /// Parallax-correct reflections against the box.
    pub box_projection: bool,
    /// Ambient contribution.
    pub ambient_mode: ReflectionAmbientMode,
    /// Ambient color for [`ReflectionAmbientMode::Color`].
    pub ambient_color: LinearRgba,
    /// Ambient energy.
    pub ambient_energy: f32,
    /// Blend distance at the box edges.
    pub blend_distance: f32,
    /// Layers this probe affects.
    pub cull_mask: u32,
}

impl ReflectionProbeParams {
    /// Returns `true` for probes re-rendered every frame.
    pub fn is_realtime(&self) -> bool {
        self.update_mode == ReflectionUpdateMode::Always
    }
}

impl Default for ReflectionProbeParams {
    fn default() -> Self {
        Self {
            update_mode: ReflectionUpdateMode::Once,
            intensity: 1.0,
            max_distance: 0.0,
            extents: Vec3::new(10.0, 10.0, 10.0),
            origin_offset: Vec3::ZERO,
            interior: false,
            box_projection: false,
            ambient_mode: ReflectionAmbientMode::Environment,
            ambient_color: LinearRgba::BLACK,
            ambient_energy: 1.0,
            blend_distance: 1.0,
            cull_mask: u32::MAX,
        }
    }
}
