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

//! Light and decal instances as the scheduler tracks them.
//!
//! Reflection probe instances carry a state machine and live in
//! [`crate::reflection_lane`].

use crate::arena::Handle;
use umbra_core::math::{Mat4, Rect2D, Vec3};
use umbra_core::renderer::cluster::MAX_DIRECTIONAL_SPLITS;
use umbra_core::renderer::{DecalParams, LightParams};

/// Handle to a [`LightInstance`].
pub type LightHandle = Handle<LightInstance>;
/// Handle to a [`DecalInstance`].
pub type DecalHandle = Handle<DecalInstance>;

/// A light placed in the scene.
#[derive(Debug, Clone)]
pub struct LightInstance {
    /// Light parameters.
    pub params: LightParams,
    /// Light-to-world transform.
    pub transform: Mat4,
    /// Bumped on every change that invalidates the rendered shadow.
    pub version: u64,
    /// Last scene pass this light was packed in.
    pub last_scene_pass: u64,
    /// Dense index in its cluster category this frame.
    pub render_index: Option<u32>,
    /// Distance fade factor computed while packing.
    pub fade: f32,
    /// Normalized atlas rect of the shadow slot assigned this frame.
    pub shadow_rect: Option<[f32; 4]>,
    /// Directional atlas regions assigned this epoch, one per cascade.
    pub directional_rects: Option<[Rect2D; MAX_DIRECTIONAL_SPLITS]>,
}

impl LightInstance {
    /// Creates an instance at `transform`.
    pub fn new(params: LightParams, transform: Mat4) -> Self {
        Self {
            params,
            transform,
            version: 1,
            last_scene_pass: 0,
            render_index: None,
            fade: 1.0,
            shadow_rect: None,
            directional_rects: None,
        }
    }

    /// World-space position.
    pub fn position(&self) -> Vec3 {
        self.transform.translation()
    }

    /// World-space direction the light points at (`-Z` of its transform).
    pub fn direction(&self) -> Vec3 {
        (-self.transform.axis(2)).normalize()
    }

    /// Moves the light, invalidating its shadow.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.version += 1;
    }

    /// Replaces the parameters, invalidating its shadow.
    pub fn set_params(&mut self, params: LightParams) {
        self.params = params;
        self.version += 1;
    }
}

/// A decal placed in the scene.
#[derive(Debug, Clone)]
pub struct DecalInstance {
    /// Decal parameters.
    pub params: DecalParams,
    /// Decal-to-world transform.
    pub transform: Mat4,
    /// Dense index among packed decals this frame.
    pub render_index: Option<u32>,
}

impl DecalInstance {
    /// Creates an instance at `transform`.
    pub fn new(params: DecalParams, transform: Mat4) -> Self {
        Self {
            params,
            transform,
            render_index: None,
        }
    }

    /// Bounding radius of the projection box.
    pub fn radius(&self) -> f32 {
        let e = self.params.extents;
        let scaled = Vec3::new(
            e.x * self.transform.axis(0).length(),
            e.y * self.transform.axis(1).length(),
            e.z * self.transform.axis(2).length(),
        );
        scaled.length()
    }
}
