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

//! Collection, truncation and upload of the cluster records.

use super::sort::{keep_nearest, InstanceSort};
use crate::arena::{Arena, Handle};
use crate::error::SchedulerResult;
use crate::instances::{DecalInstance, LightInstance};
use crate::reflection_lane::{ProbeHandle, ReflectionLane};
use std::borrow::Cow;
use std::mem::size_of;
use umbra_core::math::{Mat4, Vec3, EPSILON};
use umbra_core::renderer::cluster::MAX_DIRECTIONAL_SPLITS;
use umbra_core::renderer::passes::{ClusterBuffers, ClusterCounts};
use umbra_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, CameraView, ClusterBuilder, ClusterElementKind,
    CommandEncoder, DecalData, DirectionalLightData, DirectionalShadowMode, DirectionalSkyMode,
    DistanceFade, GraphicsDevice, LightData, LightKind, ReflectionData, MAX_DIRECTIONAL_LIGHTS,
};

/// Fraction of a directional light's max distance where its shadow starts
/// fading out.
const DIRECTIONAL_FADE_START: f32 = 0.8;

/// The scene tables a cluster build reads and stamps.
#[derive(Debug)]
pub struct ClusterSources<'a> {
    /// Every light; omni and spot lights are clustered, directional ones
    /// fill the fixed array.
    pub lights: &'a mut Arena<LightInstance>,
    /// Every decal.
    pub decals: &'a mut Arena<DecalInstance>,
    /// Reflection probes; only published ones are packed.
    pub reflections: &'a mut ReflectionLane,
    /// Edge length of the directional shadow atlas, for rect normalization.
    pub directional_atlas_size: u32,
    /// Counter of the scene pass being built.
    pub scene_pass: u64,
}

/// A clustered element before culling.
struct Candidate<H> {
    handle: H,
    transform: Mat4,
    radius: f32,
    distance_fade: Option<DistanceFade>,
    fade: f32,
}

/// Builds the bounded, depth-sorted record arrays every frame and owns the
/// buffers they are uploaded to.
#[derive(Debug)]
pub struct ClusterFill {
    capacity: u32,
    omni_lights: Vec<LightData>,
    spot_lights: Vec<LightData>,
    decals: Vec<DecalData>,
    reflections: Vec<ReflectionData>,
    directional_lights: Vec<DirectionalLightData>,
    keys: Vec<InstanceSort>,
    buffers: Option<ClusterBuffers>,
    generation: u64,
    counts: ClusterCounts,
    dropped: u32,
}

impl ClusterFill {
    /// Creates a fill with `capacity` records per clustered category.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            omni_lights: Vec::with_capacity(capacity as usize),
            spot_lights: Vec::with_capacity(capacity as usize),
            decals: Vec::with_capacity(capacity as usize),
            reflections: Vec::with_capacity(capacity as usize),
            directional_lights: Vec::with_capacity(MAX_DIRECTIONAL_LIGHTS),
            keys: Vec::new(),
            buffers: None,
            generation: 0,
            counts: ClusterCounts::default(),
            dropped: 0,
        }
    }

    /// Records per clustered category.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Changes the capacity; the buffers are recreated on the next build.
    pub fn set_capacity(&mut self, device: &dyn GraphicsDevice, capacity: u32) {
        if capacity == self.capacity {
            return;
        }
        self.free_buffers(device);
        self.capacity = capacity;
    }

    /// The uploaded buffers, once created.
    pub fn buffers(&self) -> Option<ClusterBuffers> {
        self.buffers
    }

    /// Bumped every time the buffers are recreated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Counts of the last build.
    pub fn counts(&self) -> ClusterCounts {
        self.counts
    }

    /// Candidates dropped by capacity truncation in the last build.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Packed omni light records of the last build.
    pub fn omni_lights(&self) -> &[LightData] {
        &self.omni_lights
    }

    /// Packed spot light records of the last build.
    pub fn spot_lights(&self) -> &[LightData] {
        &self.spot_lights
    }

    /// Packed decal records of the last build.
    pub fn decals(&self) -> &[DecalData] {
        &self.decals
    }

    /// Packed reflection records of the last build.
    pub fn reflections(&self) -> &[ReflectionData] {
        &self.reflections
    }

    /// Packed directional light records of the last build.
    pub fn directional_lights(&self) -> &[DirectionalLightData] {
        &self.directional_lights
    }

    fn ensure_buffers(&mut self, device: &dyn GraphicsDevice) -> SchedulerResult<ClusterBuffers> {
        if let Some(buffers) = self.buffers {
            return Ok(buffers);
        }
        let capacity = u64::from(self.capacity.max(1));
        let storage = BufferUsage::STORAGE | BufferUsage::COPY_DST;
        let create = |label: &'static str, size: u64, usage: BufferUsage| {
            device.create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed(label)),
                size,
                usage,
            })
        };
        let light_bytes = capacity * size_of::<LightData>() as u64;
        let requests = [
            ("cluster_omni_lights", light_bytes, storage),
            ("cluster_spot_lights", light_bytes, storage),
            (
                "cluster_decals",
                capacity * size_of::<DecalData>() as u64,
                storage,
            ),
            (
                "cluster_reflections",
                capacity * size_of::<ReflectionData>() as u64,
                storage,
            ),
            (
                "directional_lights",
                (MAX_DIRECTIONAL_LIGHTS * size_of::<DirectionalLightData>()) as u64,
                BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            ),
        ];
        let mut created = Vec::with_capacity(requests.len());
        for (label, size, usage) in requests {
            match create(label, size, usage) {
                Ok(id) => created.push(id),
                Err(err) => {
                    destroy_buffers(device, &created);
                    return Err(err.into());
                }
            }
        }
        let buffers = ClusterBuffers {
            omni_lights: created[0],
            spot_lights: created[1],
            decals: created[2],
            reflections: created[3],
            directional_lights: created[4],
        };
        self.buffers = Some(buffers);
        self.generation += 1;
        log::debug!(
            "ClusterFill: created cluster buffers for {} elements",
            self.capacity
        );
        Ok(buffers)
    }

    /// Destroys the buffers.
    pub fn free_buffers(&mut self, device: &dyn GraphicsDevice) {
        let Some(buffers) = self.buffers.take() else {
            return;
        };
        destroy_buffers(
            device,
            &[
                buffers.omni_lights,
                buffers.spot_lights,
                buffers.decals,
                buffers.reflections,
                buffers.directional_lights,
            ],
        );
        self.generation += 1;
    }

    /// Packs and uploads every category for `camera`.
    ///
    /// Elements behind the camera, past the far plane or faded out are
    /// culled. Each clustered category keeps its `capacity` nearest
    /// survivors; their dense render indices are written back on the
    /// instances, every other instance gets `None`. Survivors are registered
    /// with `builder`, which is baked into `encoder` at the end.
    pub fn build(
        &mut self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        builder: &mut dyn ClusterBuilder,
        camera: &CameraView,
        sources: ClusterSources<'_>,
    ) -> SchedulerResult<ClusterCounts> {
        let buffers = self.ensure_buffers(device)?;
        builder.begin(camera);
        self.dropped = 0;

        let ClusterSources {
            lights,
            decals,
            reflections,
            directional_atlas_size,
            scene_pass,
        } = sources;

        for (_, light) in lights.iter_mut() {
            light.render_index = None;
        }
        for kind in [LightKind::Omni, LightKind::Spot] {
            self.pack_lights(lights, kind, camera, builder, scene_pass);
        }
        self.pack_directional(lights, camera, directional_atlas_size, scene_pass);
        self.pack_decals(decals, camera, builder);
        self.pack_reflections(reflections, camera, builder, scene_pass);

        self.counts = ClusterCounts {
            omni_lights: self.omni_lights.len() as u32,
            spot_lights: self.spot_lights.len() as u32,
            decals: self.decals.len() as u32,
            reflections: self.reflections.len() as u32,
            directional_lights: self.directional_lights.len() as u32,
        };

        upload(device, buffers.omni_lights, &self.omni_lights)?;
        upload(device, buffers.spot_lights, &self.spot_lights)?;
        upload(device, buffers.decals, &self.decals)?;
        upload(device, buffers.reflections, &self.reflections)?;
        upload(device, buffers.directional_lights, &self.directional_lights)?;

        builder.bake(encoder);
        if self.dropped > 0 {
            log::trace!("ClusterFill: {} elements over capacity", self.dropped);
        }
        Ok(self.counts)
    }

    /// Culls and truncates `candidates`, returning them nearest first.
    fn select<H>(&mut self, candidates: Vec<Candidate<H>>, camera: &CameraView) -> Vec<Candidate<H>> {
        self.keys.clear();
        let mut kept = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            let depth = camera.view_depth(candidate.transform.translation());
            if depth + candidate.radius < 0.0 || depth - candidate.radius > camera.z_far {
                continue;
            }
            if let Some(fade) = candidate.distance_fade {
                match fade.factor(depth) {
                    Some(factor) => candidate.fade = factor,
                    None => continue,
                }
            }
            self.keys.push(InstanceSort::new(depth, kept.len() as u32));
            kept.push(Some(candidate));
        }
        self.dropped += keep_nearest(&mut self.keys, self.capacity as usize) as u32;
        self.keys
            .iter()
            .filter_map(|key| kept[key.index as usize].take())
            .collect()
    }

    fn pack_lights(
        &mut self,
        lights: &mut Arena<LightInstance>,
        kind: LightKind,
        camera: &CameraView,
        builder: &mut dyn ClusterBuilder,
        scene_pass: u64,
    ) {
        let candidates: Vec<Candidate<Handle<LightInstance>>> = lights
            .iter()
            .filter(|(_, l)| l.params.kind == kind)
            .map(|(handle, l)| Candidate {
                handle,
                transform: l.transform,
                radius: l.params.range,
                distance_fade: l.params.distance_fade,
                fade: 1.0,
            })
            .collect();
        let selected = self.select(candidates, camera);

        let (records, element) = match kind {
            LightKind::Spot => (&mut self.spot_lights, ClusterElementKind::SpotLight),
            _ => (&mut self.omni_lights, ClusterElementKind::OmniLight),
        };
        records.clear();
        for candidate in selected {
            let Some(light) = lights.get_mut(candidate.handle) else {
                continue;
            };
            light.render_index = Some(records.len() as u32);
            light.last_scene_pass = scene_pass;
            light.fade = candidate.fade;
            records.push(light_record(light, camera));
            builder.add_light(
                element,
                &light.transform,
                light.params.range,
                light.params.spot_angle,
            );
        }
    }

    fn pack_directional(
        &mut self,
        lights: &mut Arena<LightInstance>,
        camera: &CameraView,
        atlas_size: u32,
        scene_pass: u64,
    ) {
        self.directional_lights.clear();
        for (_, light) in lights.iter_mut() {
            if light.params.kind != LightKind::Directional
                || light.params.directional_sky_mode == DirectionalSkyMode::SkyOnly
            {
                continue;
            }
            if self.directional_lights.len() >= MAX_DIRECTIONAL_LIGHTS {
                break;
            }
            light.render_index = Some(self.directional_lights.len() as u32);
            light.last_scene_pass = scene_pass;
            light.fade = 1.0;
            self.directional_lights
                .push(directional_record(light, camera, atlas_size));
        }
    }

    fn pack_decals(
        &mut self,
        decals: &mut Arena<DecalInstance>,
        camera: &CameraView,
        builder: &mut dyn ClusterBuilder,
    ) {
        let candidates: Vec<Candidate<Handle<DecalInstance>>> = decals
            .iter_mut()
            .map(|(handle, d)| {
                d.render_index = None;
                Candidate {
                    handle,
                    transform: d.transform,
                    radius: d.radius(),
                    distance_fade: d.params.distance_fade,
                    fade: 1.0,
                }
            })
            .collect();
        let selected = self.select(candidates, camera);

        self.decals.clear();
        for candidate in selected {
            let Some(decal) = decals.get_mut(candidate.handle) else {
                continue;
            };
            decal.render_index = Some(self.decals.len() as u32);
            self.decals.push(decal_record(decal, camera, candidate.fade));
            builder.add_box(
                ClusterElementKind::Decal,
                &decal.transform,
                decal.params.extents,
            );
        }
    }

    fn pack_reflections(
        &mut self,
        reflections: &mut ReflectionLane,
        camera: &CameraView,
        builder: &mut dyn ClusterBuilder,
        scene_pass: u64,
    ) {
        let candidates: Vec<Candidate<ProbeHandle>> = reflections
            .probes()
            .iter()
            .filter(|(handle, _)| reflections.has_reflection(*handle))
            .map(|(handle, p)| Candidate {
                handle,
                transform: p.transform,
                radius: p.params.extents.length(),
                distance_fade: None,
                fade: 1.0,
            })
            .collect();
        for (_, probe) in reflections.probes_mut().iter_mut() {
            probe.render_index = None;
        }
        let selected = self.select(candidates, camera);

        self.reflections.clear();
        let probes = reflections.probes_mut();
        for candidate in selected {
            let Some(probe) = probes.get_mut(candidate.handle) else {
                continue;
            };
            probe.render_index = Some(self.reflections.len() as u32);
            probe.last_pass = scene_pass;
            let p = &probe.params;
            self.reflections.push(ReflectionData {
                box_extents: p.extents.to_array(),
                index: probe.atlas_index().max(0) as u32,
                box_offset: p.origin_offset.to_array(),
                mask: p.cull_mask,
                ambient: p.ambient_color.scaled_rgb(p.ambient_energy),
                intensity: p.intensity,
                exterior: u32::from(!p.interior),
                box_project: u32::from(p.box_projection),
                ambient_mode: p.ambient_mode.code(),
                blend_distance: p.blend_distance,
                local_matrix: view_to_local(&probe.transform, camera).to_cols_array(),
            });
            builder.add_box(
                ClusterElementKind::ReflectionProbe,
                &probe.transform,
                probe.params.extents,
            );
        }
    }
}

fn upload<T: bytemuck::Pod>(
    device: &dyn GraphicsDevice,
    buffer: BufferId,
    records: &[T],
) -> SchedulerResult<()> {
    if records.is_empty() {
        return Ok(());
    }
    device.write_buffer(buffer, 0, bytemuck::cast_slice(records))?;
    Ok(())
}

/// Camera view space to the local space of `transform`.
fn view_to_local(transform: &Mat4, camera: &CameraView) -> Mat4 {
    transform
        .affine_inverse()
        .map(|inv| inv * camera.transform)
        .unwrap_or(Mat4::IDENTITY)
}

fn light_record(light: &LightInstance, camera: &CameraView) -> LightData {
    let p = &light.params;
    let view = &camera.world_to_view;
    let shadowed = p.shadow_enabled && light.shadow_rect.is_some();
    LightData {
        position: view.transform_point(light.position()).to_array(),
        inv_radius: 1.0 / p.range.max(EPSILON),
        direction: view.transform_vector(light.direction()).normalize().to_array(),
        size: p.size,
        color: p.color.scaled_rgb(p.energy),
        attenuation: p.attenuation,
        cos_spot_angle: p.spot_angle.to_radians().cos(),
        inv_spot_attenuation: 1.0 / p.spot_attenuation.max(EPSILON),
        specular_amount: p.specular,
        shadow_enabled: u32::from(shadowed),
        atlas_rect: light.shadow_rect.unwrap_or([0.0; 4]),
        shadow_matrix: view_to_local(&light.transform, camera).to_cols_array(),
        shadow_bias: p.shadow_bias,
        shadow_normal_bias: p.shadow_normal_bias,
        fade: light.fade,
        volumetric_fog_energy: p.volumetric_fog_energy,
    }
}

fn directional_record(
    light: &LightInstance,
    camera: &CameraView,
    atlas_size: u32,
) -> DirectionalLightData {
    let p = &light.params;
    let max = p.directional_max_distance;
    let [s0, s1, s2] = p.directional_shadow_splits;
    let shadow_split_offsets = match p.directional_shadow_mode {
        DirectionalShadowMode::Orthogonal => [max; 4],
        DirectionalShadowMode::Parallel2Splits => [s0 * max, max, max, max],
        DirectionalShadowMode::Parallel4Splits => [s0 * max, s1 * max, s2 * max, max],
    };
    let mut atlas_rect = [[0.0; 4]; MAX_DIRECTIONAL_SPLITS];
    if let Some(rects) = light.directional_rects {
        let passes = p.directional_shadow_mode.pass_count() as usize;
        for (out, rect) in atlas_rect.iter_mut().zip(rects.iter()).take(passes) {
            *out = rect.normalized(atlas_size);
        }
    }
    let shadowed = p.shadow_enabled && light.directional_rects.is_some();
    DirectionalLightData {
        direction: camera
            .world_to_view
            .transform_vector(light.direction())
            .normalize()
            .to_array(),
        energy: p.energy,
        color: p.color.scaled_rgb(1.0),
        size: p.size,
        specular: p.specular,
        mask: p.cull_mask,
        shadow_enabled: u32::from(shadowed),
        blend_splits: u32::from(p.directional_blend_splits),
        shadow_split_offsets,
        atlas_rect,
        shadow_bias: p.shadow_bias,
        shadow_normal_bias: p.shadow_normal_bias,
        fade_from: max * DIRECTIONAL_FADE_START,
        fade_to: max,
    }
}

fn decal_record(decal: &DecalInstance, camera: &CameraView, fade: f32) -> DecalData {
    let p = &decal.params;
    let to_view = camera.world_to_view * decal.transform;
    let xform = (to_view * Mat4::from_scale(p.extents))
        .affine_inverse()
        .unwrap_or(Mat4::IDENTITY);
    let inv = |v: f32| if v.abs() > EPSILON { 1.0 / v } else { 0.0 };
    let mut modulate = p.modulate.to_array();
    modulate[3] *= fade;
    DecalData {
        xform: xform.to_cols_array(),
        inv_extents: [inv(p.extents.x), inv(p.extents.y), inv(p.extents.z)],
        albedo_mix: p.albedo_mix,
        albedo_rect: p.textures.albedo,
        normal_rect: p.textures.normal,
        orm_rect: p.textures.orm,
        emission_rect: p.textures.emission,
        modulate,
        emission_energy: p.emission_energy,
        mask: p.cull_mask,
        upper_fade: p.upper_fade,
        lower_fade: p.lower_fade,
        normal: to_view.transform_vector(Vec3::Y).normalize().to_array(),
        normal_fade: p.normal_fade,
    }
}

fn destroy_buffers(device: &dyn GraphicsDevice, buffers: &[BufferId]) {
    for &id in buffers {
        if let Err(err) = device.destroy_buffer(id) {
            log::error!("ClusterFill: failed to destroy buffer {id:?}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::LinearRgba;
    use umbra_core::renderer::LightParams;

    fn camera() -> CameraView {
        CameraView::new(
            Mat4::IDENTITY,
            0.05,
            100.0,
            70.0,
            umbra_core::math::Extent2D::new(64, 64),
        )
    }

    #[test]
    fn light_record_is_in_view_space() {
        let cam = CameraView::new(
            Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            0.05,
            100.0,
            70.0,
            umbra_core::math::Extent2D::new(64, 64),
        );
        let mut params = LightParams::omni(4.0);
        params.color = LinearRgba::rgb(1.0, 0.5, 0.25);
        params.energy = 2.0;
        let light = LightInstance::new(params, Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        let record = light_record(&light, &cam);
        assert_eq!(record.position, [1.0, 0.0, -5.0]);
        assert_eq!(record.inv_radius, 0.25);
        assert_eq!(record.color, [2.0, 1.0, 0.5]);
        assert_eq!(record.shadow_enabled, 0);
    }

    #[test]
    fn directional_offsets_follow_mode() {
        let mut params = LightParams::directional();
        params.directional_max_distance = 100.0;
        params.directional_shadow_mode = DirectionalShadowMode::Parallel2Splits;
        let light = LightInstance::new(params, Mat4::IDENTITY);
        let record = directional_record(&light, &camera(), 4096);
        assert_eq!(record.shadow_split_offsets, [10.0, 100.0, 100.0, 100.0]);
        assert_eq!(record.shadow_enabled, 0);
        assert_eq!(record.fade_to, 100.0);
    }

    #[test]
    fn faded_decal_scales_alpha() {
        let decal = DecalInstance::new(Default::default(), Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)));
        let record = decal_record(&decal, &camera(), 0.5);
        assert_eq!(record.modulate[3], 0.5);
        assert_eq!(record.inv_extents, [1.0, 1.0, 1.0]);
    }
}
