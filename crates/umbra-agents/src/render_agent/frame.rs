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

//! Per-frame inputs and statistics of the scene scheduler.

use umbra_core::renderer::passes::ClusterCounts;
use umbra_core::renderer::{CameraView, VolumetricFogEnvironment};
use umbra_lanes::reflection_lane::ReflectionAtlasHandle;
use umbra_lanes::shadow_lane::ShadowAtlasHandle;

/// Everything a frame is scheduled for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// The viewing camera.
    pub camera: CameraView,
    /// Milliseconds since an arbitrary epoch, monotonic.
    pub ticks_msec: u64,
    /// Shadow atlas of the viewport, if positional shadows are rendered.
    pub shadow_atlas: Option<ShadowAtlasHandle>,
    /// Reflection atlas of the scene, if probes are rendered.
    pub reflection_atlas: Option<ReflectionAtlasHandle>,
    /// Fog parameters of the active environment.
    pub environment: VolumetricFogEnvironment,
}

impl FrameInput {
    /// A frame without atlases and with fog disabled.
    pub fn new(camera: CameraView, ticks_msec: u64) -> Self {
        Self {
            camera,
            ticks_msec,
            shadow_atlas: None,
            reflection_atlas: None,
            environment: VolumetricFogEnvironment::default(),
        }
    }
}

/// What the scheduler did during one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Scene pass counter of the frame.
    pub scene_pass: u64,
    /// Positional shadow maps re-rendered.
    pub shadows_redrawn: u32,
    /// Shadowed positional lights left without a slot.
    pub shadows_unassigned: u32,
    /// Directional cascade passes rendered.
    pub directional_passes: u32,
    /// Probe faces captured.
    pub probe_faces: u32,
    /// Probe filter calls issued.
    pub probe_filter_steps: u32,
    /// Probes that finished their update.
    pub probes_finished: u32,
    /// Records packed into the cluster buffers.
    pub cluster: ClusterCounts,
    /// The fog volume was (re)allocated.
    pub fog_reallocated: bool,
    /// Fog compute dispatches issued.
    pub fog_dispatches: u32,
    /// The render buffers were recreated for a new viewport.
    pub render_buffers_recreated: bool,
}
