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

//! The volumetric fog lane.
//!
//! Owns the froxel volume: the light density written every frame, the copy
//! of it kept for temporal reprojection, and the integrated fog map. The
//! volume follows the viewport aspect ratio and is rebuilt only when its
//! dimensions change.

use crate::error::{SchedulerError, SchedulerResult};
use std::borrow::Cow;
use std::mem::size_of;
use umbra_core::math::{Extent2D, Extent3D, Mat4};
use umbra_core::renderer::passes::{ClusterBuffers, FogDispatch, FogTextures};
use umbra_core::renderer::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindingResource, BufferDescriptor,
    BufferId, BufferUsage, CameraView, CommandEncoder, FogParams, FogStage, GraphicsDevice,
    RenderBackend, TextureDescriptor, TextureDimension, TextureFormat, TextureId, TextureUsage,
    TextureViewDimension, VolumetricFogEnvironment,
};

/// Resolution settings of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FogVolumeSettings {
    /// Base froxel resolution, stretched by the viewport aspect ratio.
    pub size: u32,
    /// Depth slices.
    pub depth: u32,
}

/// Resources the fog shaders read besides the volume itself.
///
/// Each resource comes with the generation of its owner so the binding set
/// can tell when it went stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FogBindingSources {
    /// Positional shadow atlas.
    pub shadow_atlas: Option<TextureId>,
    /// Generation of the positional shadow atlas.
    pub shadow_generation: u64,
    /// Directional shadow atlas.
    pub directional_atlas: Option<TextureId>,
    /// Generation of the directional shadow atlas.
    pub directional_generation: u64,
    /// Cluster record buffers.
    pub cluster_buffers: Option<ClusterBuffers>,
    /// Generation of the cluster buffers.
    pub cluster_generation: u64,
}

/// Generations a binding set was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BindingKey {
    fog: u64,
    shadow: u64,
    directional: u64,
    cluster: u64,
}

impl BindingKey {
    fn new(fog: u64, sources: &FogBindingSources) -> Self {
        Self {
            fog,
            shadow: sources.shadow_generation,
            directional: sources.directional_generation,
            cluster: sources.cluster_generation,
        }
    }
}

/// Per-frame inputs of the fog dispatch besides the environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogFrame<'a> {
    /// Camera of the frame.
    pub camera: &'a CameraView,
    /// Monotonic frame counter.
    pub frame: u64,
    /// Packed directional lights.
    pub directional_light_count: u32,
    /// Capacity of each cluster category.
    pub max_cluster_elements: u32,
    /// Run the separable filter between density and integration.
    pub filter_active: bool,
}

/// The froxel volume and its temporal history.
#[derive(Debug, Default)]
pub struct VolumetricFogResource {
    width: u32,
    height: u32,
    depth: u32,
    textures: Option<FogTextures>,
    params_buffer: Option<BufferId>,
    generation: u64,
    prev_camera: Option<Mat4>,
    binding: Option<(BindGroupId, BindingKey)>,
}

impl VolumetricFogResource {
    /// Creates an empty resource; nothing is allocated until fog is enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Volume dimensions, zero while unallocated.
    pub fn size(&self) -> Extent3D {
        Extent3D::new(self.width, self.height, self.depth)
    }

    /// The volume textures, if allocated.
    pub fn textures(&self) -> Option<FogTextures> {
        self.textures
    }

    /// The integrated fog map, if allocated.
    pub fn fog_map(&self) -> Option<TextureId> {
        self.textures.map(|t| t.fog_map)
    }

    /// Bumped whenever the volume is reallocated or freed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Camera transform of the last dispatched frame.
    pub fn prev_camera(&self) -> Option<Mat4> {
        self.prev_camera
    }

    /// The current binding set, if built.
    pub fn binding(&self) -> Option<BindGroupId> {
        self.binding.map(|(id, _)| id)
    }

    /// Volume dimensions for a viewport.
    ///
    /// The base size is stretched horizontally and squeezed vertically by
    /// `width / ((width + height) / 2)`.
    pub fn target_size(viewport: Extent2D, settings: &FogVolumeSettings) -> Extent3D {
        let (w, h) = (viewport.width.max(1) as f32, viewport.height.max(1) as f32);
        let ratio = w / ((w + h) / 2.0);
        let base = settings.size as f32;
        Extent3D::new(
            ((base * ratio) as u32).max(1),
            ((base / ratio) as u32).max(1),
            settings.depth.max(1),
        )
    }

    /// Brings the volume in line with the environment and viewport.
    ///
    /// Disabled fog frees everything. Otherwise the volume is reallocated
    /// when its dimensions change; the history texture starts cleared.
    /// Returns `true` when the volume was (re)allocated.
    pub fn update(
        &mut self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        env: &VolumetricFogEnvironment,
        viewport: Extent2D,
        settings: &FogVolumeSettings,
    ) -> SchedulerResult<bool> {
        if !env.enabled {
            self.free(device);
            return Ok(false);
        }
        let target = Self::target_size(viewport, settings);
        if self.textures.is_some() && target == self.size() {
            return Ok(false);
        }
        self.free(device);

        let create = |label: &'static str| {
            device.create_texture(&TextureDescriptor {
                label: Some(Cow::Borrowed(label)),
                size: target,
                mip_level_count: 1,
                dimension: TextureDimension::D3,
                view_dimension: TextureViewDimension::D3,
                format: TextureFormat::Rgba16Float,
                usage: TextureUsage::STORAGE_BINDING
                    | TextureUsage::TEXTURE_BINDING
                    | TextureUsage::COPY_SRC
                    | TextureUsage::COPY_DST,
            })
        };
        let mut created = Vec::with_capacity(3);
        for label in ["fog_light_density", "fog_prev_light_density", "fog_map"] {
            match create(label) {
                Ok(id) => created.push(id),
                Err(err) => {
                    destroy_textures(device, &created);
                    return Err(err.into());
                }
            }
        }
        let textures = FogTextures {
            light_density: created[0],
            prev_light_density: created[1],
            fog_map: created[2],
        };
        let params_buffer = match device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("fog_params")),
            size: size_of::<FogParams>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        }) {
            Ok(buffer) => buffer,
            Err(err) => {
                destroy_textures(device, &created);
                return Err(err.into());
            }
        };
        encoder.clear_texture(textures.prev_light_density);

        self.width = target.width;
        self.height = target.height;
        self.depth = target.depth_or_array_layers;
        self.textures = Some(textures);
        self.params_buffer = Some(params_buffer);
        self.generation += 1;
        log::debug!(
            "VolumetricFog: allocated {}x{}x{} volume",
            self.width,
            self.height,
            self.depth
        );
        Ok(true)
    }

    /// Frees every texture and the binding set.
    pub fn free(&mut self, device: &dyn GraphicsDevice) {
        self.free_binding(device);
        if let Some(textures) = self.textures.take() {
            destroy_textures(
                device,
                &[
                    textures.light_density,
                    textures.prev_light_density,
                    textures.fog_map,
                ],
            );
            self.generation += 1;
        }
        if let Some(buffer) = self.params_buffer.take() {
            if let Err(err) = device.destroy_buffer(buffer) {
                log::error!("VolumetricFog: failed to destroy params buffer: {err}");
            }
        }
        self.width = 0;
        self.height = 0;
        self.depth = 0;
        self.prev_camera = None;
    }

    fn free_binding(&mut self, device: &dyn GraphicsDevice) {
        if let Some((id, _)) = self.binding.take() {
            if let Err(err) = device.destroy_bind_group(id) {
                log::error!("VolumetricFog: failed to destroy bind group: {err}");
            }
        }
    }

    /// Returns a binding set over the volume and `sources`, rebuilding it
    /// when any of their generations changed.
    pub fn ensure_binding(
        &mut self,
        device: &dyn GraphicsDevice,
        sources: &FogBindingSources,
    ) -> SchedulerResult<BindGroupId> {
        let (Some(textures), Some(params)) = (self.textures, self.params_buffer) else {
            return Err(SchedulerError::AllocationFailure(
                "volumetric fog is not allocated".into(),
            ));
        };
        let key = BindingKey::new(self.generation, sources);
        if let Some((id, cached)) = self.binding {
            if cached == key {
                return Ok(id);
            }
        }
        self.free_binding(device);

        let mut entries = vec![
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(params),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Texture(textures.light_density),
            },
            BindGroupEntry {
                binding: 2,
                resource: BindingResource::Texture(textures.prev_light_density),
            },
            BindGroupEntry {
                binding: 3,
                resource: BindingResource::Texture(textures.fog_map),
            },
        ];
        if let Some(atlas) = sources.shadow_atlas {
            entries.push(BindGroupEntry {
                binding: 4,
                resource: BindingResource::Texture(atlas),
            });
        }
        if let Some(atlas) = sources.directional_atlas {
            entries.push(BindGroupEntry {
                binding: 5,
                resource: BindingResource::Texture(atlas),
            });
        }
        if let Some(buffers) = sources.cluster_buffers {
            for (binding, buffer) in (6..).zip([
                buffers.omni_lights,
                buffers.spot_lights,
                buffers.decals,
                buffers.reflections,
                buffers.directional_lights,
            ]) {
                entries.push(BindGroupEntry {
                    binding,
                    resource: BindingResource::Buffer(buffer),
                });
            }
        }
        let id = device.create_bind_group(&BindGroupDescriptor {
            label: Some(Cow::Borrowed("volumetric_fog")),
            entries: &entries,
        })?;
        log::trace!("VolumetricFog: rebuilt binding set");
        self.binding = Some((id, key));
        Ok(id)
    }

    /// Records one fog frame: density, history copy, optional filter, then
    /// integration.
    ///
    /// The density pass reads the history written by the previous frame;
    /// the history is refreshed right after it, before the filter touches the
    /// density. Returns the number of compute dispatches issued.
    pub fn dispatch_frame(
        &mut self,
        device: &dyn GraphicsDevice,
        backend: &mut dyn RenderBackend,
        encoder: &mut dyn CommandEncoder,
        env: &VolumetricFogEnvironment,
        frame: &FogFrame<'_>,
        sources: &FogBindingSources,
    ) -> SchedulerResult<u32> {
        let bind_group = self.ensure_binding(device, sources)?;
        let (Some(textures), Some(params_buffer)) = (self.textures, self.params_buffer) else {
            return Err(SchedulerError::AllocationFailure(
                "volumetric fog is not allocated".into(),
            ));
        };

        let camera = frame.camera;
        let to_prev_view = self
            .prev_camera
            .and_then(|prev| prev.affine_inverse())
            .map(|prev_view| prev_view * camera.transform)
            .unwrap_or(Mat4::IDENTITY);
        let mut params = FogParams::new(
            env,
            [self.width, self.height, self.depth],
            frame.frame,
            &to_prev_view,
            camera.z_near,
        );
        params.directional_light_count = frame.directional_light_count;
        params.max_cluster_elements = frame.max_cluster_elements;
        device.write_buffer(params_buffer, 0, bytemuck::bytes_of(&params))?;

        let size = self.size();
        let base = FogDispatch {
            stage: FogStage::Density,
            size,
            params,
            bind_group,
            textures,
        };

        let mut dispatches = 0;
        run_stage(backend, encoder, &base, FogStage::Density)?;
        dispatches += 1;

        encoder.copy_texture_to_texture(textures.light_density, textures.prev_light_density, size);
        encoder.barrier();

        if frame.filter_active {
            for axis in 0..2 {
                run_stage(backend, encoder, &base, FogStage::Filter { axis })?;
                dispatches += 1;
            }
        }
        run_stage(backend, encoder, &base, FogStage::Integrate)?;
        dispatches += 1;

        self.prev_camera = Some(camera.transform);
        Ok(dispatches)
    }
}

fn run_stage(
    backend: &mut dyn RenderBackend,
    encoder: &mut dyn CommandEncoder,
    base: &FogDispatch,
    stage: FogStage,
) -> SchedulerResult<()> {
    let mut dispatch = *base;
    dispatch.stage = stage;
    if let FogStage::Filter { axis } = stage {
        dispatch.params.filter_axis = axis;
    }
    backend.dispatch_volumetric_fog(encoder, &dispatch)?;
    encoder.barrier();
    Ok(())
}

fn destroy_textures(device: &dyn GraphicsDevice, textures: &[TextureId]) {
    for &id in textures {
        if let Err(err) = device.destroy_texture(id) {
            log::error!("VolumetricFog: failed to destroy texture {id:?}: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> FogVolumeSettings {
        FogVolumeSettings {
            size: 64,
            depth: 32,
        }
    }

    #[test]
    fn square_viewport_keeps_base_size() {
        let size = VolumetricFogResource::target_size(Extent2D::new(720, 720), &settings());
        assert_eq!(size, Extent3D::new(64, 64, 32));
    }

    #[test]
    fn wide_viewport_stretches_width() {
        // 1920x1080: ratio = 1920 / 1500 = 1.28
        let size = VolumetricFogResource::target_size(Extent2D::new(1920, 1080), &settings());
        assert_eq!(size.width, 81);
        assert_eq!(size.height, 50);
        assert_eq!(size.depth_or_array_layers, 32);
    }

    #[test]
    fn degenerate_viewport_still_has_a_volume() {
        let size = VolumetricFogResource::target_size(Extent2D::new(0, 0), &settings());
        assert!(size.width >= 1 && size.height >= 1);
    }
}
