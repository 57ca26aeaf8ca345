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

//! Backend-agnostic contracts for the scene resource scheduler.
//!
//! This module defines the resource handles and descriptors, the collaborator
//! traits (`GraphicsDevice`, `CommandEncoder`, `ClusterBuilder`,
//! `RenderBackend`), the parameters of lights, decals, probes and fog, and
//! the fixed GPU record layouts. `umbra-lanes` and `umbra-agents` only
//! talk to the GPU through these traits.

pub mod api;
pub mod cluster;
pub mod decal;
pub mod error;
pub mod fog;
pub mod light;
pub mod passes;
pub mod reflection;
pub mod settings;
pub mod traits;
pub mod view;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::cluster::{
    ClusterElementKind, DecalData, DirectionalLightData, LightData, ReflectionData,
    MAX_DIRECTIONAL_LIGHTS,
};
pub use self::decal::{DecalParams, DecalTextureRects};
pub use self::error::{ConfigError, ResourceError};
pub use self::fog::{FogParams, FogStage, VolumetricFogEnvironment};
pub use self::light::{
    DirectionalShadowMode, DirectionalSkyMode, DistanceFade, LightKind, LightParams,
    OmniShadowMode,
};
pub use self::reflection::{ReflectionAmbientMode, ReflectionProbeParams, ReflectionUpdateMode};
pub use self::settings::SchedulerSettings;
pub use self::traits::{ClusterBuilder, CommandEncoder, GraphicsDevice, RenderBackend};
pub use self::view::CameraView;
