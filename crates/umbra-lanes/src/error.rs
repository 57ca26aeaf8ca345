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

//! Errors raised inside the scheduling lanes.
//!
//! None of them escape a frame: the public entry points log them and fall
//! back to a degraded result (no shadow, no upload, an unassigned probe).

use thiserror::Error;
use umbra_core::renderer::ResourceError;

/// A failure inside one of the scheduling lanes.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A stale or foreign handle was passed in.
    #[error("Invalid handle: {0}")]
    InvalidHandle(&'static str),
    /// No slot could be found this frame.
    #[error("Allocation failed: {0}")]
    AllocationFailure(String),
    /// A resource does not match what its user requires.
    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),
    /// The graphics device rejected a request.
    #[error("Device resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// Result type alias for lane operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
