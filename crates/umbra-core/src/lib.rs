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

//! # Umbra Core
//!
//! Foundational crate containing the contracts shared by the scheduling lanes
//! and the frame orchestrator: a small math layer, opaque GPU resource handles
//! and descriptors, the external collaborator traits (`GraphicsDevice`,
//! `CommandEncoder`, `ClusterBuilder`, `RenderBackend`), scene parameter
//! types, fixed-layout GPU records and the scheduler settings.

#![warn(missing_docs)]

pub mod math;
pub mod renderer;
pub mod utils;
