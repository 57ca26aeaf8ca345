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

//! Defines data structures related to GPU texture resources.

use crate::math::Extent3D;
use crate::umbra_bitflags;
use std::borrow::Cow;

/// An opaque handle to a GPU texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// A two-dimensional texture, optionally layered.
    D2,
    /// A three-dimensional (volumetric) texture.
    D3,
}

/// How shaders are expected to view the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    /// A single 2D image.
    D2,
    /// An array of 2D layers.
    D2Array,
    /// An array of cubemaps, six layers per cube.
    CubeArray,
    /// A 3D volume.
    D3,
}

/// The texel formats the scheduler allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 16-bit unsigned normalized depth.
    Depth16Unorm,
    /// 32-bit float depth.
    Depth32Float,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// Four 8-bit unsigned normalized channels.
    Rgba8Unorm,
    /// A single 32-bit unsigned integer channel.
    R32Uint,
}

umbra_bitflags! {
    /// A set of flags describing the allowed usages of a [`TextureId`].
    pub struct TextureUsage: u32 {
        /// The texture can be used as the source of a copy operation.
        const COPY_SRC = 1 << 0;
        /// The texture can be used as the destination of a copy operation.
        const COPY_DST = 1 << 1;
        /// The texture can be bound in a shader for sampling.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be used as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// The texture can be used as a color attachment.
        const RENDER_ATTACHMENT = 1 << 4;
        /// The texture can be used as a depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

/// A descriptor used to create a [`TextureId`].
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The dimensions (width, height, depth/layers) of the texture.
    pub size: Extent3D,
    /// The number of mipmap levels for the texture.
    pub mip_level_count: u32,
    /// The dimensionality of the texture.
    pub dimension: TextureDimension,
    /// How shaders view the texture.
    pub view_dimension: TextureViewDimension,
    /// The format of the texels in the texture.
    pub format: TextureFormat,
    /// A bitmask of [`TextureUsage`] flags describing how the texture will be used.
    pub usage: TextureUsage,
}

impl TextureDescriptor<'_> {
    /// Number of texels in mip level 0 across every layer or slice.
    pub fn texel_count(&self) -> u64 {
        self.size.width as u64 * self.size.height as u64 * self.size.depth_or_array_layers as u64
    }
}
