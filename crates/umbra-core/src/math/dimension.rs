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

//! Integer extents, origins and rectangles for textures and atlas regions.

use serde::{Deserialize, Serialize};

/// A two-dimensional extent, typically a viewport or texture size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A three-dimensional extent: width, height, and depth or array layer count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
    /// The depth or number of array layers.
    pub depth_or_array_layers: u32,
}

impl Extent3D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32, depth_or_array_layers: u32) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers,
        }
    }
}

/// A three-dimensional origin, an (x, y, z) texel offset or array layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3D {
    /// The x-coordinate of the origin.
    pub x: u32,
    /// The y-coordinate of the origin.
    pub y: u32,
    /// The z-coordinate or array layer of the origin.
    pub z: u32,
}

/// An axis-aligned pixel rectangle inside an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2D {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect2D {
    /// Creates a new rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle in `[0, 1]` atlas UV space as `[x, y, width, height]`.
    ///
    /// Returns all zeroes for a zero-sized atlas.
    pub fn normalized(&self, atlas_size: u32) -> [f32; 4] {
        if atlas_size == 0 {
            return [0.0; 4];
        }
        let inv = 1.0 / atlas_size as f32;
        [
            self.x as f32 * inv,
            self.y as f32 * inv,
            self.width as f32 * inv,
            self.height as f32 * inv,
        ]
    }

    /// Returns `true` if the two rectangles share any pixel.
    pub fn overlaps(&self, other: &Rect2D) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_rect_is_in_uv_space() {
        let r = Rect2D::new(1024, 2048, 512, 512);
        assert_eq!(r.normalized(4096), [0.25, 0.5, 0.125, 0.125]);
        assert_eq!(r.normalized(0), [0.0; 4]);
    }

    #[test]
    fn touching_rects_do_not_overlap() {
        let a = Rect2D::new(0, 0, 10, 10);
        let b = Rect2D::new(10, 0, 10, 10);
        let c = Rect2D::new(5, 5, 10, 10);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }
}
