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

//! Reflection probe instances and their capture/filter state machine.

use super::atlas::ReflectionAtlas;
use crate::arena::Handle;
use umbra_core::math::Mat4;
use umbra_core::renderer::ReflectionProbeParams;

/// Handle to a [`ReflectionProbeInstance`].
pub type ProbeHandle = Handle<ReflectionProbeInstance>;
/// Handle to a [`ReflectionAtlas`].
pub type ReflectionAtlasHandle = Handle<ReflectionAtlas>;

/// Cubemap faces per probe.
pub const CUBE_FACES: u32 = 6;

/// Where a probe is in its capture and prefilter cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeState {
    /// No capture in progress and no slot content.
    #[default]
    Unassigned,
    /// Capturing cubemap face `side` into mip 0.
    RenderingFaces {
        /// Next face to capture.
        side: u32,
    },
    /// Convolving mip `layer`, face `side`.
    Filtering {
        /// Destination mip, starting at 1.
        layer: u32,
        /// Face of that mip.
        side: u32,
    },
    /// Capture and filtering finished; the slot is published.
    Idle,
}

/// A reflection probe placed in the scene.
#[derive(Debug, Clone)]
pub struct ReflectionProbeInstance {
    /// Probe parameters.
    pub params: ReflectionProbeParams,
    /// Probe-to-world transform.
    pub transform: Mat4,
    /// Last scene pass the probe was packed in.
    pub last_pass: u64,
    /// Dense index among packed reflections this frame.
    pub render_index: Option<u32>,
    atlas: Option<ReflectionAtlasHandle>,
    atlas_index: i32,
    state: ProbeState,
    dirty: bool,
}

impl ReflectionProbeInstance {
    /// Creates an instance that still needs its first capture.
    pub fn new(params: ReflectionProbeParams, transform: Mat4) -> Self {
        Self {
            params,
            transform,
            last_pass: 0,
            render_index: None,
            atlas: None,
            atlas_index: -1,
            state: ProbeState::Unassigned,
            dirty: true,
        }
    }

    /// Current state.
    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// `true` while capturing faces or filtering.
    pub fn rendering(&self) -> bool {
        matches!(
            self.state,
            ProbeState::RenderingFaces { .. } | ProbeState::Filtering { .. }
        )
    }

    /// Mip being filtered, 1 outside of filtering.
    pub fn processing_layer(&self) -> u32 {
        match self.state {
            ProbeState::Filtering { layer, .. } => layer,
            _ => 1,
        }
    }

    /// Face being captured or filtered, 0 otherwise.
    pub fn processing_side(&self) -> u32 {
        match self.state {
            ProbeState::RenderingFaces { side } | ProbeState::Filtering { side, .. } => side,
            _ => 0,
        }
    }

    /// Atlas the probe was last assigned to.
    pub fn atlas(&self) -> Option<ReflectionAtlasHandle> {
        self.atlas
    }

    /// Slot in that atlas, -1 when unassigned.
    pub fn atlas_index(&self) -> i32 {
        self.atlas_index
    }

    /// `true` when a capture has been requested and not started yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// `true` for probes re-rendered every frame.
    pub fn is_realtime(&self) -> bool {
        self.params.is_realtime()
    }

    /// Moves the probe; its capture is now stale.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.dirty = true;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn start_rendering(&mut self, atlas: ReflectionAtlasHandle, index: usize) {
        self.atlas = Some(atlas);
        self.atlas_index = index as i32;
        self.state = ProbeState::RenderingFaces { side: 0 };
        self.dirty = false;
    }

    /// Drops the slot; a capture in flight is cancelled at its next step.
    pub(crate) fn lose_slot(&mut self) {
        self.atlas_index = -1;
        self.dirty = true;
    }

    pub(crate) fn cancel(&mut self) {
        self.state = ProbeState::Unassigned;
    }

    pub(crate) fn finish(&mut self) {
        self.state = ProbeState::Idle;
    }

    /// Records that the current face was captured.
    ///
    /// After the last face the probe moves on to filtering mip 1.
    pub fn face_rendered(&mut self) {
        if let ProbeState::RenderingFaces { side } = self.state {
            self.state = if side + 1 >= CUBE_FACES {
                ProbeState::Filtering { layer: 1, side: 0 }
            } else {
                ProbeState::RenderingFaces { side: side + 1 }
            };
        } else {
            log::warn!("ReflectionProbe: face_rendered outside of face capture ({:?})", self.state);
        }
    }

    /// Advances to the next (layer, side) pair of the filter.
    pub(crate) fn advance_filter(&mut self) {
        if let ProbeState::Filtering { layer, side } = self.state {
            self.state = if side + 1 >= CUBE_FACES {
                ProbeState::Filtering {
                    layer: layer + 1,
                    side: 0,
                }
            } else {
                ProbeState::Filtering {
                    layer,
                    side: side + 1,
                }
            };
        }
    }
}

/// Camera transform capturing cubemap `face` from `origin`.
///
/// Faces follow the +X, -X, +Y, -Y, +Z, -Z cubemap order; the camera looks
/// down its local `-Z`.
pub fn cube_face_transform(origin: &Mat4, face: u32) -> Mat4 {
    use umbra_core::math::{Vec3, Vec4};

    let (forward, up) = match face {
        0 => (Vec3::X, -Vec3::Y),
        1 => (-Vec3::X, -Vec3::Y),
        2 => (Vec3::Y, Vec3::Z),
        3 => (-Vec3::Y, -Vec3::Z),
        4 => (Vec3::Z, -Vec3::Y),
        _ => (-Vec3::Z, -Vec3::Y),
    };
    let z = -forward;
    let x = up.cross(z);
    let rotation = Mat4::from_cols(
        Vec4::from_vec3(x, 0.0),
        Vec4::from_vec3(up, 0.0),
        Vec4::from_vec3(z, 0.0),
        Vec4::W,
    );
    Mat4::from_translation(origin.translation()) * rotation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faces_then_filtering() {
        let mut probe = ReflectionProbeInstance::new(ReflectionProbeParams::default(), Mat4::IDENTITY);
        assert!(!probe.rendering());
        probe.start_rendering(Handle::from_raw(0, 0), 3);
        for side in 0..CUBE_FACES {
            assert_eq!(probe.state(), ProbeState::RenderingFaces { side });
            probe.face_rendered();
        }
        assert_eq!(probe.state(), ProbeState::Filtering { layer: 1, side: 0 });
        assert_eq!(probe.processing_layer(), 1);
        for _ in 0..CUBE_FACES {
            probe.advance_filter();
        }
        assert_eq!(probe.processing_layer(), 2);
        assert_eq!(probe.processing_side(), 0);
    }

    #[test]
    fn face_cameras_look_along_their_axis() {
        let origin = Mat4::from_translation(umbra_core::math::Vec3::new(1.0, 2.0, 3.0));
        for face in 0..CUBE_FACES {
            let t = cube_face_transform(&origin, face);
            assert_eq!(t.translation(), origin.translation());
            assert!(t.affine_inverse().is_some());
        }
        let px = cube_face_transform(&origin, 0);
        assert_eq!(-px.axis(2), umbra_core::math::Vec3::X);
    }
}
