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

use crate::math::Extent2D;
use crate::renderer::error::ResourceError;
use crate::renderer::passes::*;
use crate::renderer::traits::{ClusterBuilder, CommandEncoder, GraphicsDevice};
use std::fmt::Debug;

/// The renderer that consumes the scheduler's decisions.
///
/// One implementation per rendering path (forward, mobile, a headless null
/// backend). Every method records into the frame's encoder; none of them
/// submits.
pub trait RenderBackend: Debug {
    /// Short human readable name, used in logs.
    fn backend_name(&self) -> &str;

    /// Creates the targets for a viewport of the given size.
    fn create_render_buffer_data(
        &mut self,
        device: &dyn GraphicsDevice,
        viewport: Extent2D,
    ) -> Result<RenderBufferData, ResourceError>;

    /// Creates the cluster builder used for one atlas or the main view.
    fn create_cluster_builder(&mut self) -> Box<dyn ClusterBuilder>;

    /// Renders one shadow map into an atlas region.
    fn render_shadow_pass(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ShadowPass,
    ) -> Result<(), ResourceError>;

    /// Captures one cubemap face of a reflection probe into mip 0 of its slot.
    fn render_probe_face(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ProbeFacePass,
    ) -> Result<(), ResourceError>;

    /// Runs one reflection prefilter step.
    fn filter_reflection(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ReflectionFilterPass,
    ) -> Result<(), ResourceError>;

    /// Dispatches one volumetric fog compute stage.
    fn dispatch_volumetric_fog(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        dispatch: &FogDispatch,
    ) -> Result<(), ResourceError>;

    /// Submits the scene geometry using everything scheduled this frame.
    fn render_scene_pass(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ScenePass,
    ) -> Result<(), ResourceError>;
}
