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

//! Work items handed to the [`RenderBackend`](super::traits::RenderBackend).
//!
//! The scheduler decides *where* and *when*; these structs carry that
//! decision to the backend, which owns the actual shaders and draws.

use super::api::{BindGroupId, BufferId, TextureId};
use super::fog::{FogParams, FogStage};
use super::light::LightKind;
use super::view::CameraView;
use crate::math::{Extent2D, Extent3D, Mat4, Rect2D};

/// Per-viewport render targets created by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderBufferData {
    /// Size the targets were created for.
    pub viewport: Extent2D,
    /// HDR color target.
    pub color: TextureId,
    /// Depth target.
    pub depth: TextureId,
}

/// One shadow map render into an atlas region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowPass {
    /// Shape of the light being rendered.
    pub light_kind: LightKind,
    /// Light-to-world transform.
    pub light_transform: Mat4,
    /// Range of positional lights, max distance of directional ones.
    pub range: f32,
    /// Atlas texture receiving the depth.
    pub atlas: TextureId,
    /// Pixel region to render into.
    pub rect: Rect2D,
    /// Paraboloid side or cascade index.
    pub pass: u32,
}

/// One cubemap face capture of a reflection probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeFacePass {
    /// Reflection atlas cubemap array.
    pub atlas: TextureId,
    /// Cubemap slot in the atlas.
    pub slot: u32,
    /// Face 0..6.
    pub face: u32,
    /// Capture position and orientation.
    pub transform: Mat4,
    /// Far distance of the capture.
    pub max_distance: f32,
}

/// What a reflection filter call computes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStep {
    /// One importance-sampled convolution of one face of one mip.
    Convolve {
        /// Destination mip, at least 1.
        layer: u32,
        /// Cubemap face.
        side: u32,
        /// GGX samples.
        sample_count: u32,
        /// Roughness the mip represents.
        roughness: f32,
        /// Edge length of the destination mip.
        mip_size: u32,
    },
    /// The whole mip chain at once with the cheap real-time filter.
    FastFullChain {
        /// Mips to produce.
        mip_count: u32,
    },
}

/// A reflection prefilter call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionFilterPass {
    /// Reflection atlas cubemap array.
    pub atlas: TextureId,
    /// Cubemap slot in the atlas.
    pub slot: u32,
    /// The filtering work.
    pub step: FilterStep,
}

/// The three textures of the fog volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FogTextures {
    /// Light density written this frame.
    pub light_density: TextureId,
    /// Copy of last frame's density, read for reprojection.
    pub prev_light_density: TextureId,
    /// Integrated scattering/transmittance.
    pub fog_map: TextureId,
}

/// One compute dispatch of the fog frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogDispatch {
    /// Which stage runs.
    pub stage: FogStage,
    /// Volume dimensions.
    pub size: Extent3D,
    /// Uploaded parameters.
    pub params: FogParams,
    /// Resources the shader reads.
    pub bind_group: BindGroupId,
    /// The volume textures.
    pub textures: FogTextures,
}

/// Number of records packed per category this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClusterCounts {
    /// Omni lights.
    pub omni_lights: u32,
    /// Spot lights.
    pub spot_lights: u32,
    /// Decals.
    pub decals: u32,
    /// Reflection probes.
    pub reflections: u32,
    /// Directional lights.
    pub directional_lights: u32,
}

/// GPU buffers holding the packed cluster records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterBuffers {
    /// Omni light records.
    pub omni_lights: BufferId,
    /// Spot light records.
    pub spot_lights: BufferId,
    /// Decal records.
    pub decals: BufferId,
    /// Reflection records.
    pub reflections: BufferId,
    /// Directional light records.
    pub directional_lights: BufferId,
}

/// The final scene submission of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenePass {
    /// Monotonic scene pass counter.
    pub scene_pass: u64,
    /// Camera of the frame.
    pub camera: CameraView,
    /// Targets to render into.
    pub render_buffers: RenderBufferData,
    /// Packed record counts.
    pub counts: ClusterCounts,
    /// Packed record buffers.
    pub cluster_buffers: Option<ClusterBuffers>,
    /// Positional shadow atlas, if allocated.
    pub shadow_atlas: Option<TextureId>,
    /// Directional shadow atlas, if allocated.
    pub directional_shadow_atlas: Option<TextureId>,
    /// Reflection atlas, if allocated.
    pub reflection_atlas: Option<TextureId>,
    /// Integrated fog, if enabled.
    pub fog_map: Option<TextureId>,
}
