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

//! A column-major 4x4 matrix for affine transforms.

use super::vector::{Vec3, Vec4};
use super::EPSILON;
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// Scene transforms (light, decal, probe placement) and the camera's
/// world-to-view transform are all affine, so only the affine inverse is
/// provided.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// Creates a matrix from four columns.
    #[inline]
    pub fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// A translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, Vec4::from_vec3(v, 1.0))
    }

    /// A non-uniform scale matrix.
    #[inline]
    pub fn from_scale(s: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(s.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, s.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, s.z, 0.0),
            Vec4::W,
        )
    }

    /// The translation part of the transform.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.cols[3].truncate()
    }

    /// The basis axis `index` (0 = X, 1 = Y, 2 = Z).
    #[inline]
    pub fn axis(&self, index: usize) -> Vec3 {
        self.cols[index].truncate()
    }

    /// Transforms a point (w = 1).
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        (*self * Vec4::from_vec3(p, 1.0)).truncate()
    }

    /// Transforms a direction (w = 0).
    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        (*self * Vec4::from_vec3(v, 0.0)).truncate()
    }

    /// Column-major float array, the layout the GPU records store.
    #[inline]
    pub fn to_cols_array(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        for (i, col) in self.cols.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&col.to_array());
        }
        out
    }

    /// Inverse of an affine matrix, `None` if the 3x3 part is singular.
    pub fn affine_inverse(&self) -> Option<Self> {
        let c0 = self.cols[0].truncate();
        let c1 = self.cols[1].truncate();
        let c2 = self.cols[2].truncate();
        let t = self.cols[3].truncate();

        let det = c0.x * (c1.y * c2.z - c2.y * c1.z) - c1.x * (c0.y * c2.z - c2.y * c0.z)
            + c2.x * (c0.y * c1.z - c1.y * c0.z);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let i00 = (c1.y * c2.z - c2.y * c1.z) * inv_det;
        let i10 = -(c0.y * c2.z - c2.y * c0.z) * inv_det;
        let i20 = (c0.y * c1.z - c1.y * c0.z) * inv_det;
        let i01 = -(c1.x * c2.z - c2.x * c1.z) * inv_det;
        let i11 = (c0.x * c2.z - c2.x * c0.z) * inv_det;
        let i21 = -(c0.x * c1.z - c1.x * c0.z) * inv_det;
        let i02 = (c1.x * c2.y - c2.x * c1.y) * inv_det;
        let i12 = -(c0.x * c2.y - c2.x * c0.y) * inv_det;
        let i22 = (c0.x * c1.y - c1.x * c0.y) * inv_det;

        Some(Self::from_cols(
            Vec4::new(i00, i10, i20, 0.0),
            Vec4::new(i01, i11, i21, 0.0),
            Vec4::new(i02, i12, i22, 0.0),
            Vec4::new(
                -(i00 * t.x + i01 * t.y + i02 * t.z),
                -(i10 * t.x + i11 * t.y + i12 * t.z),
                -(i20 * t.x + i21 * t.y + i22 * t.z),
                1.0,
            ),
        ))
    }
}

impl Default for Mat4 {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self {
            cols: [
                self * rhs.cols[0],
                self * rhs.cols[1],
                self * rhs.cols[2],
                self * rhs.cols[3],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn translation_moves_points_not_vectors() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.transform_point(Vec3::ZERO), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.transform_vector(Vec3::X), Vec3::X);
    }

    #[test]
    fn affine_inverse_round_trips() {
        let m = Mat4::from_translation(Vec3::new(4.0, -2.0, 7.0))
            * Mat4::from_scale(Vec3::new(2.0, 0.5, 3.0));
        let inv = m.affine_inverse().expect("invertible");
        let p = Vec3::new(1.5, -3.0, 0.25);
        let back = inv.transform_point(m.transform_point(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-5);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        assert!(Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0))
            .affine_inverse()
            .is_none());
    }
}
