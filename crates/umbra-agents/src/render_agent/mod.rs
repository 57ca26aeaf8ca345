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

//! Acts as the agent of the scene scheduler.
//!
//! The context decides, every frame, which lights get shadow slots, which
//! probe advances one step, and which elements make it into the cluster
//! buffers. The GPU work itself is recorded by the lanes and the backend.

mod context;
mod frame;

pub use self::context::SceneRenderContext;
pub use self::frame::{FrameInput, FrameStats};
