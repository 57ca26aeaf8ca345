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

//! Bind groups: the resource sets shaders read from.

use super::{BufferId, TextureId};
use std::borrow::Cow;

/// An opaque handle to a bind group resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupId(pub usize);

/// A resource bound at one binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// A whole buffer.
    Buffer(BufferId),
    /// A whole texture, all mips and layers.
    Texture(TextureId),
}

/// One entry of a bind group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    /// The binding index in the shader.
    pub binding: u32,
    /// The bound resource.
    pub resource: BindingResource,
}

/// A descriptor used to create a [`BindGroupId`].
#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The bound resources.
    pub entries: &'a [BindGroupEntry],
}
