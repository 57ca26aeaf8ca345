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

use crate::math::Extent3D;
use crate::renderer::api::{CommandBufferId, TextureId};
use std::any::Any;

/// Records GPU commands that happen outside of any backend-owned pass.
///
/// Commands execute in recording order once the finished buffer is
/// submitted. The scheduler only needs copies, clears and barriers; draws and
/// dispatches are recorded by the [`RenderBackend`](super::RenderBackend)
/// into the same encoder.
pub trait CommandEncoder {
    /// Clears every texel of every mip and layer of `texture` to zero.
    fn clear_texture(&mut self, texture: TextureId);

    /// Copies `size` texels of mip 0 from `source` to `destination`.
    fn copy_texture_to_texture(
        &mut self,
        source: TextureId,
        destination: TextureId,
        size: Extent3D,
    );

    /// Makes every previous write visible to subsequent commands.
    fn barrier(&mut self);

    /// Finalizes the command recording and returns a handle to the resulting command buffer.
    ///
    /// This method consumes the encoder.
    fn finish(self: Box<Self>) -> CommandBufferId;

    /// Returns a mutable reference to the underlying trait object as `Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
