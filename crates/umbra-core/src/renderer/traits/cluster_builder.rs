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

use crate::math::{Mat4, Vec3};
use crate::renderer::cluster::ClusterElementKind;
use crate::renderer::traits::CommandEncoder;
use crate::renderer::view::CameraView;
use std::fmt::Debug;

/// Assigns packed elements to screen-space clusters on the GPU.
///
/// Elements are added in render-index order, once per category, after
/// [`ClusterBuilder::begin`]. The builder never sees elements that were
/// culled or truncated.
pub trait ClusterBuilder: Debug {
    /// Starts a new frame for `camera`.
    fn begin(&mut self, camera: &CameraView);

    /// Adds a light volume. `spot_angle` is ignored for omni lights.
    fn add_light(&mut self, kind: ClusterElementKind, transform: &Mat4, radius: f32, spot_angle: f32);

    /// Adds an oriented box (decal or reflection probe).
    fn add_box(&mut self, kind: ClusterElementKind, transform: &Mat4, extents: Vec3);

    /// Records the cluster assignment work.
    fn bake(&mut self, encoder: &mut dyn CommandEncoder);
}
