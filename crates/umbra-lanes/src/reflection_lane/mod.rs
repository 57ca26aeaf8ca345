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

//! Reflection probe scheduling.
//!
//! Probes are captured face by face and their roughness chain is filtered
//! one (mip, face) pair per frame, so a full update is spread across dozens
//! of frames. Real-time probes skip the amortization and use a fast filter.

mod atlas;
mod probe;

pub use self::atlas::{ReflectionAtlas, ReflectionSlot};
pub use self::probe::{
    cube_face_transform, ProbeHandle, ProbeState, ReflectionAtlasHandle, ReflectionProbeInstance,
    CUBE_FACES,
};

use crate::arena::Arena;
use crate::error::SchedulerError;
use std::collections::VecDeque;
use umbra_core::math::{Extent2D, Mat4};
use umbra_core::renderer::passes::{FilterStep, ProbeFacePass, ReflectionFilterPass};
use umbra_core::renderer::{
    CameraView, ClusterBuilder, CommandEncoder, GraphicsDevice, ReflectionProbeParams,
    RenderBackend, SchedulerSettings,
};

/// Filter quality and the constraints real-time probes put on their atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionFilterConfig {
    /// Roughness mips for regular probes.
    pub roughness_layers: u32,
    /// Importance samples per convolution.
    pub ggx_samples: u32,
    /// Atlas size real-time probes require.
    pub realtime_size: u32,
    /// Mip count real-time probes require.
    pub realtime_mipmaps: u32,
}

impl From<&SchedulerSettings> for ReflectionFilterConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            roughness_layers: settings.reflection_roughness_layers,
            ggx_samples: settings.reflection_ggx_samples,
            realtime_size: settings.reflection_realtime_size,
            realtime_mipmaps: settings.reflection_realtime_mipmaps,
        }
    }
}

impl Default for ReflectionFilterConfig {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

/// Work done by the reflection lane in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReflectionStats {
    /// Cubemap faces captured.
    pub faces_rendered: u32,
    /// Filter calls issued, including the publishing call.
    pub filter_steps: u32,
    /// Probes that reached `Idle`.
    pub probes_finished: u32,
}

/// Owns every reflection atlas and probe and drives their updates.
#[derive(Debug, Default)]
pub struct ReflectionLane {
    atlases: Arena<ReflectionAtlas>,
    probes: Arena<ReflectionProbeInstance>,
    config: ReflectionFilterConfig,
    queue: VecDeque<ProbeHandle>,
    busy: Option<ProbeHandle>,
}

impl ReflectionLane {
    /// Creates an empty lane.
    pub fn new(config: ReflectionFilterConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Current filter configuration.
    pub fn config(&self) -> ReflectionFilterConfig {
        self.config
    }

    /// Replaces the filter configuration; takes effect on the next capture.
    pub fn set_config(&mut self, config: ReflectionFilterConfig) {
        self.config = config;
    }

    // --- Atlases ---

    /// Creates an atlas of `count` cubemaps of `size` pixels.
    pub fn create_atlas(
        &mut self,
        size: u32,
        count: u32,
        cluster_builder: Box<dyn ClusterBuilder>,
    ) -> ReflectionAtlasHandle {
        self.atlases
            .insert(ReflectionAtlas::new(size, count, cluster_builder))
    }

    /// Resizes an atlas; identical parameters keep every slot.
    pub fn atlas_set_size(
        &mut self,
        device: &dyn GraphicsDevice,
        atlas: ReflectionAtlasHandle,
        size: u32,
        count: u32,
    ) {
        match self.atlases.get_mut(atlas) {
            Some(a) => {
                if a.set_size(device, &mut self.probes, size, count) {
                    log::debug!("ReflectionLane: atlas resized to {count} x {size}px");
                }
            }
            None => log::warn!("ReflectionLane: atlas_set_size on invalid atlas {atlas:?}"),
        }
    }

    /// Destroys an atlas; its probes lose their slots.
    pub fn free_atlas(&mut self, device: &dyn GraphicsDevice, atlas: ReflectionAtlasHandle) {
        match self.atlases.remove(atlas) {
            Some(mut a) => a.invalidate(device, &mut self.probes),
            None => log::warn!("ReflectionLane: free_atlas on invalid atlas {atlas:?}"),
        }
    }

    /// Resolves an atlas.
    pub fn atlas(&self, atlas: ReflectionAtlasHandle) -> Option<&ReflectionAtlas> {
        self.atlases.get(atlas)
    }

    /// Handles of every atlas.
    pub fn atlas_handles(&self) -> Vec<ReflectionAtlasHandle> {
        self.atlases.handles()
    }

    // --- Probes ---

    /// Creates a probe. Probes updated once are queued for capture.
    pub fn create_probe(&mut self, params: ReflectionProbeParams, transform: Mat4) -> ProbeHandle {
        let realtime = params.is_realtime();
        let handle = self
            .probes
            .insert(ReflectionProbeInstance::new(params, transform));
        if !realtime {
            self.queue.push_back(handle);
        }
        handle
    }

    /// Destroys a probe and releases its slot.
    pub fn free_probe(&mut self, probe: ProbeHandle) {
        self.release_atlas_index(probe);
        if self.probes.remove(probe).is_none() {
            log::warn!("ReflectionLane: free_probe on invalid probe {probe:?}");
        }
        self.queue.retain(|&h| h != probe);
        if self.busy == Some(probe) {
            self.busy = None;
        }
    }

    /// Moves a probe and queues a fresh capture.
    pub fn set_probe_transform(&mut self, probe: ProbeHandle, transform: Mat4) {
        match self.probes.get_mut(probe) {
            Some(p) => {
                p.set_transform(transform);
                self.enqueue(probe);
            }
            None => log::warn!("ReflectionLane: set_probe_transform on invalid probe {probe:?}"),
        }
    }

    /// Queues a probe for a fresh capture.
    pub fn request_update(&mut self, probe: ProbeHandle) {
        match self.probes.get_mut(probe) {
            Some(p) => {
                p.mark_dirty();
                self.enqueue(probe);
            }
            None => log::warn!("ReflectionLane: request_update on invalid probe {probe:?}"),
        }
    }

    fn enqueue(&mut self, probe: ProbeHandle) {
        let realtime = self.probes.get(probe).is_some_and(|p| p.is_realtime());
        if !realtime && self.busy != Some(probe) && !self.queue.contains(&probe) {
            self.queue.push_back(probe);
        }
    }

    /// Queues every regular probe that lost its slot to another capture.
    fn requeue_evicted(&mut self) {
        let evicted: Vec<ProbeHandle> = self
            .probes
            .iter()
            .filter(|(h, p)| {
                !p.is_realtime()
                    && p.is_dirty()
                    && p.atlas_index() < 0
                    && self.busy != Some(*h)
                    && !self.queue.contains(h)
            })
            .map(|(h, _)| h)
            .collect();
        for probe in evicted {
            log::trace!("ReflectionLane: requeueing evicted probe {probe:?}");
            self.queue.push_back(probe);
        }
    }

    /// Resolves a probe.
    pub fn probe(&self, probe: ProbeHandle) -> Option<&ReflectionProbeInstance> {
        self.probes.get(probe)
    }

    /// Every probe.
    pub fn probes(&self) -> &Arena<ReflectionProbeInstance> {
        &self.probes
    }

    /// Every probe, mutably (cluster packing stamps `last_pass`).
    pub fn probes_mut(&mut self) -> &mut Arena<ReflectionProbeInstance> {
        &mut self.probes
    }

    /// Probes waiting for a capture, excluding the one in progress.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Releases the probe's slot in its atlas.
    pub fn release_atlas_index(&mut self, probe: ProbeHandle) {
        let Some(p) = self.probes.get_mut(probe) else {
            return;
        };
        if let (Some(atlas), index) = (p.atlas(), p.atlas_index()) {
            if index >= 0 {
                if let Some(a) = self.atlases.get_mut(atlas) {
                    a.release(index as usize, probe);
                }
            }
        }
        p.lose_slot();
    }

    /// `true` when the probe's slot holds a complete, filtered capture.
    pub fn has_reflection(&self, probe: ProbeHandle) -> bool {
        let Some(p) = self.probes.get(probe) else {
            return false;
        };
        match (p.atlas(), p.atlas_index()) {
            (Some(atlas), index) if index >= 0 => self
                .atlases
                .get(atlas)
                .is_some_and(|a| a.is_published(index as usize, probe)),
            _ => false,
        }
    }

    // --- Capture state machine ---

    /// Starts a capture of `probe` into `atlas`.
    ///
    /// Validates the atlas against real-time requirements, allocates its
    /// texture, then assigns a free slot or evicts the least recently packed
    /// probe. Returns `false` when no slot could be assigned.
    pub fn begin_render(
        &mut self,
        device: &dyn GraphicsDevice,
        atlas: ReflectionAtlasHandle,
        probe: ProbeHandle,
    ) -> bool {
        match self.try_begin_render(device, atlas, probe) {
            Ok(()) => true,
            Err(SchedulerError::InvalidHandle(what)) => {
                log::warn!("ReflectionLane: begin_render on invalid {what}");
                false
            }
            Err(err) => {
                log::debug!("ReflectionLane: begin_render failed: {err}");
                false
            }
        }
    }

    fn try_begin_render(
        &mut self,
        device: &dyn GraphicsDevice,
        atlas_handle: ReflectionAtlasHandle,
        probe: ProbeHandle,
    ) -> Result<(), SchedulerError> {
        let cfg = self.config;
        let (realtime, previous_atlas, previous_index) = match self.probes.get(probe) {
            Some(p) => (p.is_realtime(), p.atlas(), p.atlas_index()),
            None => return Err(SchedulerError::InvalidHandle("reflection probe")),
        };
        let atlas = self
            .atlases
            .get_mut(atlas_handle)
            .ok_or(SchedulerError::InvalidHandle("reflection atlas"))?;

        if realtime {
            if atlas.size() != cfg.realtime_size {
                let mismatch = SchedulerError::ConfigurationMismatch(format!(
                    "real-time probes need an atlas size of {}, got {}",
                    cfg.realtime_size,
                    atlas.size()
                ));
                log::warn!("ReflectionLane: {mismatch}, resizing");
                let count = atlas.count();
                atlas.set_size(device, &mut self.probes, cfg.realtime_size, count);
            } else if atlas.texture().is_some() && atlas.mip_count() != cfg.realtime_mipmaps {
                let mismatch = SchedulerError::ConfigurationMismatch(format!(
                    "real-time probes need {} mipmaps, got {}",
                    cfg.realtime_mipmaps,
                    atlas.mip_count()
                ));
                log::warn!("ReflectionLane: {mismatch}, rebuilding atlas");
                atlas.invalidate(device, &mut self.probes);
            }
        }

        let mip_count = if realtime {
            cfg.realtime_mipmaps
        } else {
            ReflectionAtlas::regular_mip_count(atlas.size(), cfg.roughness_layers)
        };
        atlas.ensure_texture(device, mip_count)?;

        // probe moved to another atlas: give the old slot back first
        if previous_atlas.is_some() && previous_atlas != Some(atlas_handle) && previous_index >= 0
        {
            if let Some(old) = previous_atlas.and_then(|h| self.atlases.get_mut(h)) {
                old.release(previous_index as usize, probe);
            }
        }

        let atlas = self
            .atlases
            .get_mut(atlas_handle)
            .ok_or(SchedulerError::InvalidHandle("reflection atlas"))?;
        // the resize above may have reset the index
        let current_index = self
            .probes
            .get(probe)
            .map(|p| (p.atlas(), p.atlas_index()))
            .filter(|(a, i)| *a == Some(atlas_handle) && *i >= 0)
            .map(|(_, i)| i as usize)
            .filter(|&i| atlas.slot(i).is_some_and(|s| s.owner == Some(probe)));

        let index = match current_index {
            Some(index) => index,
            None => atlas.find_slot(&self.probes).ok_or_else(|| {
                SchedulerError::AllocationFailure("reflection atlas has no slot".into())
            })?,
        };
        atlas.claim(&mut self.probes, index, probe);

        if let Some(p) = self.probes.get_mut(probe) {
            p.start_rendering(atlas_handle, index);
        }
        Ok(())
    }

    /// Captures the probe's next face.
    pub fn render_face(
        &mut self,
        backend: &mut dyn RenderBackend,
        encoder: &mut dyn CommandEncoder,
        probe: ProbeHandle,
    ) -> bool {
        let Some(p) = self.probes.get_mut(probe) else {
            log::warn!("ReflectionLane: render_face on invalid probe {probe:?}");
            return false;
        };
        let ProbeState::RenderingFaces { side } = p.state() else {
            return false;
        };
        let atlas = p.atlas().and_then(|h| self.atlases.get_mut(h));
        let (Some(atlas), true) = (atlas, p.atlas_index() >= 0) else {
            p.cancel();
            return false;
        };
        let Some(texture) = atlas.texture() else {
            p.cancel();
            return false;
        };

        let transform = cube_face_transform(&p.transform, side);
        let camera = CameraView::new(
            transform,
            0.01,
            p.params.max_distance.max(p.params.extents.max_element() * 2.0),
            90.0,
            Extent2D::new(atlas.size(), atlas.size()),
        );
        let builder = atlas.cluster_builder_mut();
        builder.begin(&camera);
        builder.bake(encoder);

        let pass = ProbeFacePass {
            atlas: texture,
            slot: p.atlas_index() as u32,
            face: side,
            transform,
            max_distance: camera.z_far,
        };
        if let Err(err) = backend.render_probe_face(encoder, &pass) {
            log::error!("ReflectionLane: probe face capture failed: {err}");
            return false;
        }
        p.face_rendered();
        true
    }

    /// Runs one filtering step.
    ///
    /// Returns `true` once the probe's chain is complete and published; a
    /// regular probe gets there after `6 * (mip_count - 1) + 1` calls.
    pub fn postprocess_step(
        &mut self,
        backend: &mut dyn RenderBackend,
        encoder: &mut dyn CommandEncoder,
        probe: ProbeHandle,
    ) -> bool {
        let Some(p) = self.probes.get_mut(probe) else {
            log::warn!("ReflectionLane: postprocess_step on invalid probe {probe:?}");
            return false;
        };
        let ProbeState::Filtering { layer, side } = p.state() else {
            return false;
        };
        let atlas = p.atlas().and_then(|h| self.atlases.get_mut(h));
        let (Some(atlas), true) = (atlas, p.atlas_index() >= 0) else {
            // lost the slot mid-update
            p.cancel();
            return false;
        };
        let Some(texture) = atlas.texture() else {
            p.cancel();
            return false;
        };
        let slot = p.atlas_index() as u32;
        let mip_count = atlas.mip_count();

        if p.is_realtime() {
            let pass = ReflectionFilterPass {
                atlas: texture,
                slot,
                step: FilterStep::FastFullChain { mip_count },
            };
            if let Err(err) = backend.filter_reflection(encoder, &pass) {
                log::error!("ReflectionLane: fast filter failed: {err}");
                return false;
            }
            atlas.publish(slot as usize);
            p.finish();
            return true;
        }

        if layer >= mip_count {
            atlas.publish(slot as usize);
            p.finish();
            return true;
        }

        let mip_size = atlas
            .slot(slot as usize)
            .and_then(|s| s.mip_sizes.get(layer as usize).copied())
            .unwrap_or(1);
        let pass = ReflectionFilterPass {
            atlas: texture,
            slot,
            step: FilterStep::Convolve {
                layer,
                side,
                sample_count: self.config.ggx_samples,
                roughness: layer as f32 / (mip_count - 1).max(1) as f32,
                mip_size,
            },
        };
        if let Err(err) = backend.filter_reflection(encoder, &pass) {
            log::error!("ReflectionLane: convolution of mip {layer} face {side} failed: {err}");
            return false;
        }
        p.advance_filter();
        false
    }

    /// Runs this frame's reflection work against `atlas`.
    ///
    /// Real-time probes are captured and filtered completely. Of the queued
    /// probes, only one is in flight at a time and it advances by a single
    /// step: one face capture or one filter call.
    pub fn process_frame(
        &mut self,
        device: &dyn GraphicsDevice,
        backend: &mut dyn RenderBackend,
        encoder: &mut dyn CommandEncoder,
        atlas: ReflectionAtlasHandle,
    ) -> ReflectionStats {
        let mut stats = ReflectionStats::default();

        let realtime: Vec<ProbeHandle> = self
            .probes
            .iter()
            .filter(|(_, p)| p.is_realtime())
            .map(|(h, _)| h)
            .collect();
        for probe in realtime {
            if !self.begin_render(device, atlas, probe) {
                continue;
            }
            for _ in 0..CUBE_FACES {
                if self.render_face(backend, encoder, probe) {
                    stats.faces_rendered += 1;
                }
            }
            stats.filter_steps += 1;
            if self.postprocess_step(backend, encoder, probe) {
                stats.probes_finished += 1;
            }
        }

        self.requeue_evicted();

        if self.busy.is_none() {
            while let Some(next) = self.queue.pop_front() {
                if !self.probes.contains(next) {
                    continue;
                }
                if self.begin_render(device, atlas, next) {
                    self.busy = Some(next);
                } else {
                    // no slot this frame: keep its place and retry next frame
                    self.queue.push_front(next);
                }
                break;
            }
        }

        if let Some(probe) = self.busy {
            match self.probes.get(probe).map(|p| p.state()) {
                Some(ProbeState::RenderingFaces { .. }) => {
                    if self.render_face(backend, encoder, probe) {
                        stats.faces_rendered += 1;
                    }
                }
                Some(ProbeState::Filtering { .. }) => {
                    stats.filter_steps += 1;
                    if self.postprocess_step(backend, encoder, probe) {
                        stats.probes_finished += 1;
                        self.busy = None;
                        // moved or re-requested while in flight
                        if self.probes.get(probe).is_some_and(|p| p.is_dirty()) {
                            self.queue.push_back(probe);
                        }
                    }
                }
                _ => {
                    // cancelled (slot lost) or freed: requeue if still alive
                    self.busy = None;
                    if self.probes.contains(probe) {
                        self.queue.push_back(probe);
                    }
                }
            }
        }

        stats
    }
}
