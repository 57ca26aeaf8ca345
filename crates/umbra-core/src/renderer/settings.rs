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

//! Externally supplied sizes and limits for every scheduling table.

use super::cluster::CELL_INDEX_EMPTY;
use super::error::ConfigError;
use crate::utils::is_power_of_two_or_zero;
use serde::{Deserialize, Serialize};

/// Largest shadow count a single atlas quadrant may be configured for.
pub const MAX_QUADRANT_SHADOWS: u32 = 16384;

/// Sizes, limits and quality knobs for the resource scheduler.
///
/// Missing fields take their default when deserialized, so a settings file
/// only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Edge length in pixels of the positional shadow atlas (0 disables it).
    pub shadow_atlas_size: u32,
    /// Use a 16-bit depth format for the shadow atlas instead of 32-bit float.
    pub shadow_atlas_16_bits: bool,
    /// Number of shadows each of the four quadrants is split for.
    pub shadow_atlas_quadrant_subdivisions: [u32; 4],
    /// Minimum slot age before a shadow may be moved or stolen.
    pub shadow_atlas_realloc_tolerance_msec: u64,
    /// Capacity of each cluster category (omni, spot, decal, reflection).
    ///
    /// Cell lists store render indices as bytes, so only the first 255
    /// records of a category can be referenced by a cell. Records past that
    /// are still uploaded but never reached through the cluster grid.
    pub max_cluster_elements: u32,
    /// Entries written per cluster cell index list.
    pub max_lights_per_cell: u32,
    /// Edge length in pixels of the directional shadow atlas.
    pub directional_shadow_size: u32,
    /// Face size of regular reflection atlases.
    pub reflection_atlas_size: u32,
    /// Number of probe slots in regular reflection atlases.
    pub reflection_atlas_count: u32,
    /// Roughness mip levels prefiltered for regular probes.
    pub reflection_roughness_layers: u32,
    /// Importance samples per convolution step.
    pub reflection_ggx_samples: u32,
    /// Face size a real-time probe requires of its atlas.
    pub reflection_realtime_size: u32,
    /// Mip count a real-time probe requires of its atlas.
    pub reflection_realtime_mipmaps: u32,
    /// Base froxel resolution of the volumetric fog volume.
    pub volumetric_fog_size: u32,
    /// Depth slices of the volumetric fog volume.
    pub volumetric_fog_depth: u32,
    /// Run the separable blur between density and integration.
    pub volumetric_fog_filter_active: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            shadow_atlas_size: 4096,
            shadow_atlas_16_bits: true,
            shadow_atlas_quadrant_subdivisions: [1, 4, 16, 64],
            shadow_atlas_realloc_tolerance_msec: 500,
            max_cluster_elements: 512,
            max_lights_per_cell: 8,
            directional_shadow_size: 4096,
            reflection_atlas_size: 256,
            reflection_atlas_count: 64,
            reflection_roughness_layers: 8,
            reflection_ggx_samples: 1024,
            reflection_realtime_size: 256,
            reflection_realtime_mipmaps: 8,
            volumetric_fog_size: 64,
            volumetric_fog_depth: 64,
            volumetric_fog_filter_active: true,
        }
    }
}

impl SchedulerSettings {
    /// Parses settings from RON text and validates them.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            ron::de::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes the settings to pretty-printed RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Records per cluster category that cell lists can reference.
    pub fn cell_addressable_elements(&self) -> u32 {
        self.max_cluster_elements.min(u32::from(CELL_INDEX_EMPTY))
    }

    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_power_of_two_or_zero(self.shadow_atlas_size) {
            return Err(ConfigError::NotPowerOfTwo {
                field: "shadow_atlas_size",
                value: self.shadow_atlas_size,
            });
        }
        for &count in &self.shadow_atlas_quadrant_subdivisions {
            if count > MAX_QUADRANT_SHADOWS {
                return Err(ConfigError::OutOfRange {
                    field: "shadow_atlas_quadrant_subdivisions",
                    value: count,
                    expected: "<= 16384",
                });
            }
        }

        let powers = [
            ("directional_shadow_size", self.directional_shadow_size),
            ("reflection_atlas_size", self.reflection_atlas_size),
            ("reflection_realtime_size", self.reflection_realtime_size),
        ];
        for (field, value) in powers {
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { field, value });
            }
        }

        let positive = [
            ("max_cluster_elements", self.max_cluster_elements),
            ("reflection_atlas_count", self.reflection_atlas_count),
            ("reflection_ggx_samples", self.reflection_ggx_samples),
            ("volumetric_fog_size", self.volumetric_fog_size),
            ("volumetric_fog_depth", self.volumetric_fog_depth),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    expected: "> 0",
                });
            }
        }

        if self.max_cluster_elements > self.cell_addressable_elements() {
            log::warn!(
                "SchedulerSettings: max_cluster_elements is {}, cell lists only index the first {}",
                self.max_cluster_elements,
                self.cell_addressable_elements()
            );
        }

        if self.max_lights_per_cell == 0 || self.max_lights_per_cell > 255 {
            return Err(ConfigError::OutOfRange {
                field: "max_lights_per_cell",
                value: self.max_lights_per_cell,
                expected: "1..=255",
            });
        }
        for (field, value) in [
            ("reflection_roughness_layers", self.reflection_roughness_layers),
            ("reflection_realtime_mipmaps", self.reflection_realtime_mipmaps),
        ] {
            if value < 2 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    expected: ">= 2",
                });
            }
        }
        Ok(())
    }
}
