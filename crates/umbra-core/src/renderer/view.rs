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

//! The camera a frame is scheduled for.

use crate::math::{Extent2D, Mat4, Vec3};

/// Camera placement and clip range for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// Camera-to-world transform.
    pub transform: Mat4,
    /// World-to-view transform, the affine inverse of `transform`.
    pub world_to_view: Mat4,
    /// Near clip distance.
    pub z_near: f32,
    /// Far clip distance.
    pub z_far: f32,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Size of the target viewport in pixels.
    pub viewport: Extent2D,
}

impl CameraView {
    /// Builds a camera from its world transform.
    ///
    /// A degenerate transform falls back to an identity view with a warning.
    pub fn new(
        transform: Mat4,
        z_near: f32,
        z_far: f32,
        fov_y_degrees: f32,
        viewport: Extent2D,
    ) -> Self {
        let world_to_view = transform.affine_inverse().unwrap_or_else(|| {
            log::warn!("CameraView: camera transform is not invertible, using identity view");
            Mat4::IDENTITY
        });
        Self {
            transform,
            world_to_view,
            z_near,
            z_far,
            fov_y_degrees,
            viewport,
        }
    }

    /// Distance in front of the camera along the view axis.
    ///
    /// The view looks down `-Z`, so points ahead have positive depth.
    #[inline]
    pub fn view_depth(&self, world_position: Vec3) -> f32 {
        -self.world_to_view.transform_point(world_position).z
    }
}
