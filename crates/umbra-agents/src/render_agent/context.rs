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

//! Defines the SceneRenderContext, the owner of every scheduling table.

use super::frame::{FrameInput, FrameStats};
use std::sync::Arc;
use umbra_core::math::{Mat4, EPSILON};
use umbra_core::renderer::passes::{RenderBufferData, ScenePass, ShadowPass};
use umbra_core::renderer::{
    CameraView, ClusterBuilder, CommandEncoder, ConfigError, DecalParams, DirectionalSkyMode,
    GraphicsDevice, LightKind, LightParams, OmniShadowMode, ReflectionProbeParams,
    RenderBackend, SchedulerSettings, MAX_DIRECTIONAL_LIGHTS,
};
use umbra_lanes::cluster_lane::{pack_decal_cell, pack_light_cell, ClusterFill, ClusterSources};
use umbra_lanes::fog_lane::{FogBindingSources, FogFrame, FogVolumeSettings, VolumetricFogResource};
use umbra_lanes::reflection_lane::{
    ProbeHandle, ReflectionAtlasHandle, ReflectionFilterConfig, ReflectionLane,
};
use umbra_lanes::shadow_lane::{
    DirectionalShadowAtlas, ShadowAtlas, ShadowAtlasHandle, QUADRANT_COUNT,
};
use umbra_lanes::{Arena, DecalHandle, DecalInstance, FrameClock, LightHandle, LightInstance};

/// The scene scheduler: owns every instance, atlas and buffer, and drives
/// the lanes once per frame.
///
/// Built once per renderer and passed explicitly; nothing in the lanes
/// reaches for global state.
#[derive(Debug)]
pub struct SceneRenderContext {
    // Device every table allocates from.
    device: Arc<dyn GraphicsDevice>,
    // Renderer consuming the schedule.
    backend: Box<dyn RenderBackend>,
    settings: SchedulerSettings,
    // --- Scene tables ---
    lights: Arena<LightInstance>,
    decals: Arena<DecalInstance>,
    // --- Lanes ---
    shadow_atlases: Arena<ShadowAtlas>,
    directional_atlas: DirectionalShadowAtlas,
    reflections: ReflectionLane,
    cluster: ClusterFill,
    // Cluster builder of the main view; reflection atlases own their own.
    cluster_builder: Box<dyn ClusterBuilder>,
    fog: VolumetricFogResource,
    render_buffers: Option<RenderBufferData>,
    // --- Frame counters ---
    scene_pass: u64,
    last_stats: FrameStats,
}

impl SceneRenderContext {
    /// Creates a context with validated `settings`.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        mut backend: Box<dyn RenderBackend>,
        settings: SchedulerSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        log::info!(
            "SceneRenderContext: created with backend '{}'",
            backend.backend_name()
        );
        let cluster_builder = backend.create_cluster_builder();
        Ok(Self {
            device,
            backend,
            directional_atlas: DirectionalShadowAtlas::new(
                settings.directional_shadow_size,
                settings.shadow_atlas_16_bits,
            ),
            reflections: ReflectionLane::new(ReflectionFilterConfig::from(&settings)),
            cluster: ClusterFill::new(settings.max_cluster_elements),
            cluster_builder,
            settings,
            lights: Arena::new(),
            decals: Arena::new(),
            shadow_atlases: Arena::new(),
            fog: VolumetricFogResource::new(),
            render_buffers: None,
            scene_pass: 0,
            last_stats: FrameStats::default(),
        })
    }

    /// The active settings.
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Applies new settings to every table.
    ///
    /// Unchanged sizes keep their allocations and assignments; changed ones
    /// are torn down and rebuilt on demand.
    pub fn set_settings(&mut self, settings: SchedulerSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let device = self.device.as_ref();
        for (_, atlas) in self.shadow_atlases.iter_mut() {
            apply_shadow_settings(device, atlas, &settings);
        }
        self.directional_atlas.set_size(
            device,
            settings.directional_shadow_size,
            settings.shadow_atlas_16_bits,
        );
        self.reflections
            .set_config(ReflectionFilterConfig::from(&settings));
        for atlas in self.reflections.atlas_handles() {
            self.reflections.atlas_set_size(
                device,
                atlas,
                settings.reflection_atlas_size,
                settings.reflection_atlas_count,
            );
        }
        self.cluster
            .set_capacity(device, settings.max_cluster_elements);
        self.settings = settings;
        log::debug!("SceneRenderContext: settings applied");
        Ok(())
    }

    // --- Lights ---

    /// Adds a light to the scene.
    pub fn create_light(&mut self, params: LightParams, transform: Mat4) -> LightHandle {
        self.lights.insert(LightInstance::new(params, transform))
    }

    /// Removes a light and releases its shadow slots.
    pub fn free_light(&mut self, light: LightHandle) {
        if self.lights.remove(light).is_none() {
            log::warn!("SceneRenderContext: free_light on invalid light {light:?}");
            return;
        }
        for (_, atlas) in self.shadow_atlases.iter_mut() {
            atlas.release_light(light);
        }
    }

    /// Resolves a light.
    pub fn light(&self, light: LightHandle) -> Option<&LightInstance> {
        self.lights.get(light)
    }

    /// Every light.
    pub fn lights(&self) -> &Arena<LightInstance> {
        &self.lights
    }

    /// Moves a light.
    pub fn set_light_transform(&mut self, light: LightHandle, transform: Mat4) {
        match self.lights.get_mut(light) {
            Some(l) => l.set_transform(transform),
            None => log::warn!("SceneRenderContext: set_light_transform on invalid light {light:?}"),
        }
    }

    /// Replaces a light's parameters.
    pub fn set_light_params(&mut self, light: LightHandle, params: LightParams) {
        match self.lights.get_mut(light) {
            Some(l) => l.set_params(params),
            None => log::warn!("SceneRenderContext: set_light_params on invalid light {light:?}"),
        }
    }

    // --- Decals ---

    /// Adds a decal to the scene.
    pub fn create_decal(&mut self, params: DecalParams, transform: Mat4) -> DecalHandle {
        self.decals.insert(DecalInstance::new(params, transform))
    }

    /// Removes a decal.
    pub fn free_decal(&mut self, decal: DecalHandle) {
        if self.decals.remove(decal).is_none() {
            log::warn!("SceneRenderContext: free_decal on invalid decal {decal:?}");
        }
    }

    /// Resolves a decal.
    pub fn decal(&self, decal: DecalHandle) -> Option<&DecalInstance> {
        self.decals.get(decal)
    }

    /// Moves a decal.
    pub fn set_decal_transform(&mut self, decal: DecalHandle, transform: Mat4) {
        match self.decals.get_mut(decal) {
            Some(d) => d.transform = transform,
            None => log::warn!("SceneRenderContext: set_decal_transform on invalid decal {decal:?}"),
        }
    }

    // --- Reflection probes ---

    /// Adds a reflection probe; probes updated once are queued for capture.
    pub fn create_reflection_probe(
        &mut self,
        params: ReflectionProbeParams,
        transform: Mat4,
    ) -> ProbeHandle {
        self.reflections.create_probe(params, transform)
    }

    /// Removes a probe and releases its atlas slot.
    pub fn free_reflection_probe(&mut self, probe: ProbeHandle) {
        self.reflections.free_probe(probe);
    }

    /// Moves a probe and queues a fresh capture.
    pub fn set_reflection_probe_transform(&mut self, probe: ProbeHandle, transform: Mat4) {
        self.reflections.set_probe_transform(probe, transform);
    }

    /// Queues a fresh capture of `probe`.
    pub fn request_reflection_probe_update(&mut self, probe: ProbeHandle) {
        self.reflections.request_update(probe);
    }

    /// The reflection lane.
    pub fn reflections(&self) -> &ReflectionLane {
        &self.reflections
    }

    // --- Atlases ---

    /// Creates a shadow atlas sized by the current settings.
    pub fn create_shadow_atlas(&mut self) -> ShadowAtlasHandle {
        let mut atlas = ShadowAtlas::new(
            self.settings.shadow_atlas_size,
            self.settings.shadow_atlas_16_bits,
            self.settings.shadow_atlas_realloc_tolerance_msec,
        );
        apply_shadow_settings(self.device.as_ref(), &mut atlas, &self.settings);
        self.shadow_atlases.insert(atlas)
    }

    /// Destroys a shadow atlas.
    pub fn free_shadow_atlas(&mut self, atlas: ShadowAtlasHandle) {
        match self.shadow_atlases.remove(atlas) {
            Some(mut a) => a.free_texture(self.device.as_ref()),
            None => log::warn!("SceneRenderContext: free_shadow_atlas on invalid atlas {atlas:?}"),
        }
    }

    /// Resolves a shadow atlas.
    pub fn shadow_atlas(&self, atlas: ShadowAtlasHandle) -> Option<&ShadowAtlas> {
        self.shadow_atlases.get(atlas)
    }

    /// The directional shadow atlas.
    pub fn directional_atlas(&self) -> &DirectionalShadowAtlas {
        &self.directional_atlas
    }

    /// Creates a reflection atlas sized by the current settings.
    pub fn create_reflection_atlas(&mut self) -> ReflectionAtlasHandle {
        let builder = self.backend.create_cluster_builder();
        self.reflections.create_atlas(
            self.settings.reflection_atlas_size,
            self.settings.reflection_atlas_count,
            builder,
        )
    }

    /// Destroys a reflection atlas; its probes lose their slots.
    pub fn free_reflection_atlas(&mut self, atlas: ReflectionAtlasHandle) {
        self.reflections.free_atlas(self.device.as_ref(), atlas);
    }

    // --- Frame state ---

    /// The cluster fill of the main view.
    pub fn cluster(&self) -> &ClusterFill {
        &self.cluster
    }

    /// The volumetric fog volume.
    pub fn fog(&self) -> &VolumetricFogResource {
        &self.fog
    }

    /// Render targets of the current viewport.
    pub fn render_buffers(&self) -> Option<RenderBufferData> {
        self.render_buffers
    }

    /// Scene passes rendered so far.
    pub fn scene_pass(&self) -> u64 {
        self.scene_pass
    }

    /// Statistics of the last frame.
    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Cell list of the lights touching a cell, by this frame's render
    /// indices.
    pub fn pack_light_cell(&self, cell: &[LightHandle]) -> Vec<u32> {
        pack_light_cell(&self.lights, cell, self.settings.max_lights_per_cell)
    }

    /// Cell list of the decals touching a cell.
    pub fn pack_decal_cell(&self, cell: &[DecalHandle]) -> Vec<u32> {
        pack_decal_cell(&self.decals, cell, self.settings.max_lights_per_cell)
    }

    /// Schedules and records one frame, then submits it.
    ///
    /// Order: render buffers, positional shadows, directional shadows,
    /// reflection probes, cluster fill, volumetric fog, scene pass. A failing
    /// step is logged and the frame continues degraded.
    pub fn render_frame(&mut self, input: &FrameInput) -> FrameStats {
        self.scene_pass += 1;
        let clock = FrameClock::new(input.ticks_msec, self.scene_pass);
        let mut stats = FrameStats {
            scene_pass: self.scene_pass,
            ..Default::default()
        };

        let device = Arc::clone(&self.device);
        let mut encoder = device.create_command_encoder(Some("scene_frame"));

        self.update_render_buffers(&input.camera, &mut stats);
        self.render_shadows(encoder.as_mut(), input, clock, &mut stats);
        self.render_directional_shadows(encoder.as_mut(), &mut stats);
        if let Some(atlas) = input.reflection_atlas {
            let probe_stats = self.reflections.process_frame(
                device.as_ref(),
                self.backend.as_mut(),
                encoder.as_mut(),
                atlas,
            );
            stats.probe_faces = probe_stats.faces_rendered;
            stats.probe_filter_steps = probe_stats.filter_steps;
            stats.probes_finished = probe_stats.probes_finished;
        }
        self.build_cluster(encoder.as_mut(), &input.camera, &mut stats);
        self.render_fog(encoder.as_mut(), input, &mut stats);
        self.render_scene(encoder.as_mut(), input, &stats);

        device.submit_command_buffer(encoder.finish());

        log::debug!(
            "SceneRenderContext: pass {} shadows={}/{} probes={}f/{}s cluster={}o/{}s/{}d/{}r fog={}",
            stats.scene_pass,
            stats.shadows_redrawn,
            stats.shadows_unassigned,
            stats.probe_faces,
            stats.probe_filter_steps,
            stats.cluster.omni_lights,
            stats.cluster.spot_lights,
            stats.cluster.decals,
            stats.cluster.reflections,
            stats.fog_dispatches,
        );
        self.last_stats = stats;
        stats
    }

    /// Frees every GPU resource the context allocated.
    pub fn shutdown(&mut self) {
        let device = Arc::clone(&self.device);
        let device = device.as_ref();
        for (_, atlas) in self.shadow_atlases.iter_mut() {
            atlas.free_texture(device);
        }
        self.directional_atlas.free_texture(device);
        for atlas in self.reflections.atlas_handles() {
            self.reflections.free_atlas(device, atlas);
        }
        self.cluster.free_buffers(device);
        self.fog.free(device);
        if let Some(buffers) = self.render_buffers.take() {
            destroy_render_buffers(device, &buffers);
        }
        log::info!("SceneRenderContext: shut down after {} passes", self.scene_pass);
    }

    fn update_render_buffers(&mut self, camera: &CameraView, stats: &mut FrameStats) {
        let viewport = camera.viewport;
        if self
            .render_buffers
            .is_some_and(|buffers| buffers.viewport == viewport)
        {
            return;
        }
        if let Some(old) = self.render_buffers.take() {
            destroy_render_buffers(self.device.as_ref(), &old);
        }
        match self
            .backend
            .create_render_buffer_data(self.device.as_ref(), viewport)
        {
            Ok(buffers) => {
                log::debug!(
                    "SceneRenderContext: render buffers created for {}x{}",
                    viewport.width,
                    viewport.height
                );
                self.render_buffers = Some(buffers);
                stats.render_buffers_recreated = true;
            }
            Err(err) => log::error!("SceneRenderContext: failed to create render buffers: {err}"),
        }
    }

    fn render_shadows(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        input: &FrameInput,
        clock: FrameClock,
        stats: &mut FrameStats,
    ) {
        for (_, light) in self.lights.iter_mut() {
            light.shadow_rect = None;
        }
        let Some(handle) = input.shadow_atlas else {
            return;
        };
        let Some(atlas) = self.shadow_atlases.get_mut(handle) else {
            log::warn!("SceneRenderContext: frame uses invalid shadow atlas {handle:?}");
            return;
        };
        let texture = match atlas.ensure_texture(self.device.as_ref()) {
            Ok(texture) => texture,
            Err(err) => {
                log::debug!("SceneRenderContext: no positional shadows this frame: {err}");
                return;
            }
        };

        let camera = &input.camera;
        let mut casters: Vec<(LightHandle, f32)> = self
            .lights
            .iter()
            .filter(|(_, l)| l.params.shadow_enabled && l.params.kind != LightKind::Directional)
            .filter_map(|(h, l)| shadow_coverage(camera, l).map(|c| (h, c)))
            .collect();
        // largest footprint asks first
        casters.sort_by(|a, b| b.1.total_cmp(&a.1));
        for &(h, _) in &casters {
            if let Some(light) = self.lights.get_mut(h) {
                light.last_scene_pass = clock.scene_pass;
            }
        }

        let atlas_size = atlas.size();
        for (h, coverage) in casters {
            let Some(light) = self.lights.get(h) else {
                continue;
            };
            let (kind, transform, range, omni_mode, version) = (
                light.params.kind,
                light.transform,
                light.params.range,
                light.params.omni_shadow_mode,
                light.version,
            );
            let redraw = atlas.update_light(&self.lights, h, coverage, version, clock);
            let Some(slot) = atlas.slot_rect(h, false, 0) else {
                stats.shadows_unassigned += 1;
                continue;
            };
            if let Some(light) = self.lights.get_mut(h) {
                light.shadow_rect = Some(slot.normalized(atlas_size));
            }
            if !redraw {
                continue;
            }

            let (pass_count, paraboloid) = match (kind, omni_mode) {
                (LightKind::Omni, OmniShadowMode::DualParaboloid) => (2, true),
                (LightKind::Omni, OmniShadowMode::Cube) => (6, false),
                _ => (1, false),
            };
            for pass in 0..pass_count {
                let rect = if paraboloid {
                    atlas.slot_rect(h, true, pass).unwrap_or(slot)
                } else {
                    slot
                };
                let shadow_pass = ShadowPass {
                    light_kind: kind,
                    light_transform: transform,
                    range,
                    atlas: texture,
                    rect,
                    pass,
                };
                if let Err(err) = self.backend.render_shadow_pass(encoder, &shadow_pass) {
                    log::error!("SceneRenderContext: shadow pass failed for {h:?}: {err}");
                }
            }
            stats.shadows_redrawn += 1;
        }
    }

    fn render_directional_shadows(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        stats: &mut FrameStats,
    ) {
        for (_, light) in self.lights.iter_mut() {
            light.directional_rects = None;
        }
        let casters: Vec<LightHandle> = self
            .lights
            .iter()
            .filter(|(_, l)| {
                l.params.kind == LightKind::Directional
                    && l.params.shadow_enabled
                    && l.params.directional_sky_mode != DirectionalSkyMode::SkyOnly
            })
            .map(|(h, _)| h)
            .take(MAX_DIRECTIONAL_LIGHTS)
            .collect();
        if casters.is_empty() {
            return;
        }

        self.directional_atlas.set_light_count(casters.len() as u32);
        let texture = match self.directional_atlas.ensure_texture(self.device.as_ref()) {
            Ok(texture) => texture,
            Err(err) => {
                log::debug!("SceneRenderContext: no directional shadows this frame: {err}");
                return;
            }
        };

        for h in casters {
            let Some(index) = self.directional_atlas.next_light_index() else {
                break;
            };
            let Some(light) = self.lights.get_mut(h) else {
                continue;
            };
            let mode = light.params.directional_shadow_mode;
            let rects = self.directional_atlas.pass_rects(index, mode);
            light.directional_rects = Some(rects);
            for pass in 0..mode.pass_count() {
                let shadow_pass = ShadowPass {
                    light_kind: LightKind::Directional,
                    light_transform: light.transform,
                    range: light.params.directional_max_distance,
                    atlas: texture,
                    rect: rects[pass as usize],
                    pass,
                };
                match self.backend.render_shadow_pass(encoder, &shadow_pass) {
                    Ok(()) => stats.directional_passes += 1,
                    Err(err) => {
                        log::error!("SceneRenderContext: directional pass failed for {h:?}: {err}")
                    }
                }
            }
        }
    }

    fn build_cluster(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        camera: &CameraView,
        stats: &mut FrameStats,
    ) {
        let sources = ClusterSources {
            lights: &mut self.lights,
            decals: &mut self.decals,
            reflections: &mut self.reflections,
            directional_atlas_size: self.directional_atlas.size(),
            scene_pass: self.scene_pass,
        };
        match self.cluster.build(
            self.device.as_ref(),
            encoder,
            self.cluster_builder.as_mut(),
            camera,
            sources,
        ) {
            Ok(counts) => stats.cluster = counts,
            Err(err) => log::error!("SceneRenderContext: cluster build failed: {err}"),
        }
    }

    fn render_fog(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        input: &FrameInput,
        stats: &mut FrameStats,
    ) {
        let settings = FogVolumeSettings {
            size: self.settings.volumetric_fog_size,
            depth: self.settings.volumetric_fog_depth,
        };
        match self.fog.update(
            self.device.as_ref(),
            encoder,
            &input.environment,
            input.camera.viewport,
            &settings,
        ) {
            Ok(reallocated) => stats.fog_reallocated = reallocated,
            Err(err) => {
                log::error!("SceneRenderContext: failed to allocate the fog volume: {err}");
                return;
            }
        }
        if !input.environment.enabled || self.fog.textures().is_none() {
            return;
        }

        let shadow = input
            .shadow_atlas
            .and_then(|h| self.shadow_atlases.get(h));
        let sources = FogBindingSources {
            shadow_atlas: shadow.and_then(|a| a.texture()),
            shadow_generation: shadow.map_or(0, |a| a.generation()),
            directional_atlas: self.directional_atlas.texture(),
            directional_generation: self.directional_atlas.generation(),
            cluster_buffers: self.cluster.buffers(),
            cluster_generation: self.cluster.generation(),
        };
        let frame = FogFrame {
            camera: &input.camera,
            frame: self.scene_pass,
            directional_light_count: stats.cluster.directional_lights,
            max_cluster_elements: self.settings.max_cluster_elements,
            filter_active: self.settings.volumetric_fog_filter_active,
        };
        match self.fog.dispatch_frame(
            self.device.as_ref(),
            self.backend.as_mut(),
            encoder,
            &input.environment,
            &frame,
            &sources,
        ) {
            Ok(dispatches) => stats.fog_dispatches = dispatches,
            Err(err) => log::error!("SceneRenderContext: fog dispatch failed: {err}"),
        }
    }

    fn render_scene(&mut self, encoder: &mut dyn CommandEncoder, input: &FrameInput, stats: &FrameStats) {
        let Some(render_buffers) = self.render_buffers else {
            log::warn!("SceneRenderContext: no render buffers, skipping scene pass");
            return;
        };
        let pass = ScenePass {
            scene_pass: self.scene_pass,
            camera: input.camera,
            render_buffers,
            counts: stats.cluster,
            cluster_buffers: self.cluster.buffers(),
            shadow_atlas: input
                .shadow_atlas
                .and_then(|h| self.shadow_atlases.get(h))
                .and_then(|a| a.texture()),
            directional_shadow_atlas: self.directional_atlas.texture(),
            reflection_atlas: input
                .reflection_atlas
                .and_then(|h| self.reflections.atlas(h))
                .and_then(|a| a.texture()),
            fog_map: if input.environment.enabled {
                self.fog.fog_map()
            } else {
                None
            },
        };
        if let Err(err) = self.backend.render_scene_pass(encoder, &pass) {
            log::error!("SceneRenderContext: scene pass failed: {err}");
        }
    }
}

/// Sizes, subdivisions and tolerance of a shadow atlas from `settings`.
fn apply_shadow_settings(
    device: &dyn GraphicsDevice,
    atlas: &mut ShadowAtlas,
    settings: &SchedulerSettings,
) {
    atlas.set_size(
        device,
        settings.shadow_atlas_size,
        settings.shadow_atlas_16_bits,
    );
    for quadrant in 0..QUADRANT_COUNT {
        atlas.set_quadrant_subdivision(
            quadrant,
            settings.shadow_atlas_quadrant_subdivisions[quadrant],
        );
    }
    atlas.set_realloc_tolerance(settings.shadow_atlas_realloc_tolerance_msec);
}

fn destroy_render_buffers(device: &dyn GraphicsDevice, buffers: &RenderBufferData) {
    for texture in [buffers.color, buffers.depth] {
        if let Err(err) = device.destroy_texture(texture) {
            log::error!("SceneRenderContext: failed to destroy render target: {err}");
        }
    }
}

/// Fraction of the screen height a positional light covers, `None` when it
/// is entirely outside the depth range.
fn shadow_coverage(camera: &CameraView, light: &LightInstance) -> Option<f32> {
    let depth = camera.view_depth(light.position());
    let radius = light.params.range;
    if depth + radius < 0.0 || depth - radius > camera.z_far {
        return None;
    }
    if depth <= radius {
        // camera inside the light volume
        return Some(1.0);
    }
    let half_height = depth * (camera.fov_y_degrees.to_radians() * 0.5).tan();
    Some((radius / half_height.max(EPSILON)).clamp(0.0, 1.0))
}
