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
// limitations under the License.//! A device and backend that allocate ids and log what they are asked to do.

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use umbra_core::math::{Extent2D, Extent3D, Mat4, Vec3};
use umbra_core::renderer::passes::{
    FogDispatch, ProbeFacePass, ReflectionFilterPass, RenderBufferData, ScenePass, ShadowPass,
};
use umbra_core::renderer::*;

/// Hands out ids and counts live textures; nothing touches a GPU.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_id: AtomicUsize,
    live_textures: AtomicUsize,
    submitted: AtomicU64,
}

impl HeadlessDevice {
    pub fn live_textures(&self) -> usize {
        self.live_textures.load(Ordering::Relaxed)
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        log::trace!(
            "HeadlessDevice: texture {:?} ({} texels)",
            descriptor.label,
            descriptor.texel_count()
        );
        self.live_textures.fetch_add(1, Ordering::Relaxed);
        Ok(TextureId(self.next()))
    }

    fn destroy_texture(&self, _id: TextureId) -> Result<(), ResourceError> {
        self.live_textures.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_buffer(&self, _descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        Ok(BufferId(self.next()))
    }

    fn destroy_buffer(&self, _id: BufferId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn write_buffer(&self, _id: BufferId, _offset: u64, _data: &[u8]) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_bind_group(
        &self,
        _descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        Ok(BindGroupId(self.next()))
    }

    fn destroy_bind_group(&self, _id: BindGroupId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(HeadlessEncoder::default())
    }

    fn submit_command_buffer(&self, _command_buffer: CommandBufferId) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counts recorded commands.
#[derive(Debug, Default)]
pub struct HeadlessEncoder {
    commands: u64,
}

impl CommandEncoder for HeadlessEncoder {
    fn clear_texture(&mut self, _texture: TextureId) {
        self.commands += 1;
    }

    fn copy_texture_to_texture(&mut self, _source: TextureId, _destination: TextureId, _size: Extent3D) {
        self.commands += 1;
    }

    fn barrier(&mut self) {
        self.commands += 1;
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        CommandBufferId(self.commands)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn count_command(encoder: &mut dyn CommandEncoder) {
    if let Some(headless) = encoder.as_any_mut().downcast_mut::<HeadlessEncoder>() {
        headless.commands += 1;
    }
}

#[derive(Debug, Default)]
struct HeadlessClusterBuilder {
    elements: usize,
}

impl ClusterBuilder for HeadlessClusterBuilder {
    fn begin(&mut self, _camera: &CameraView) {
        self.elements = 0;
    }

    fn add_light(&mut self, _kind: ClusterElementKind, _transform: &Mat4, _radius: f32, _spot_angle: f32) {
        self.elements += 1;
    }

    fn add_box(&mut self, _kind: ClusterElementKind, _transform: &Mat4, _extents: Vec3) {
        self.elements += 1;
    }

    fn bake(&mut self, encoder: &mut dyn CommandEncoder) {
        log::trace!("HeadlessClusterBuilder: baking {} elements", self.elements);
        count_command(encoder);
    }
}

/// Backend that accepts every pass.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    shadow_passes: u64,
    probe_faces: u64,
    filter_calls: u64,
    fog_dispatches: u64,
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        log::info!(
            "HeadlessBackend: {} shadow passes, {} probe faces, {} filter calls, {} fog dispatches",
            self.shadow_passes,
            self.probe_faces,
            self.filter_calls,
            self.fog_dispatches
        );
    }
}

impl RenderBackend for HeadlessBackend {
    fn backend_name(&self) -> &str {
        "headless"
    }

    fn create_render_buffer_data(
        &mut self,
        device: &dyn GraphicsDevice,
        viewport: Extent2D,
    ) -> Result<RenderBufferData, ResourceError> {
        let target = |format| TextureDescriptor {
            label: None,
            size: Extent3D::new(viewport.width, viewport.height, 1),
            mip_level_count: 1,
            dimension: TextureDimension::D2,
            view_dimension: TextureViewDimension::D2,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        };
        Ok(RenderBufferData {
            viewport,
            color: device.create_texture(&target(TextureFormat::Rgba16Float))?,
            depth: device.create_texture(&target(TextureFormat::Depth32Float))?,
        })
    }

    fn create_cluster_builder(&mut self) -> Box<dyn ClusterBuilder> {
        Box::new(HeadlessClusterBuilder::default())
    }

    fn render_shadow_pass(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ShadowPass,
    ) -> Result<(), ResourceError> {
        log::trace!("HeadlessBackend: {:?} shadow into {:?}", pass.light_kind, pass.rect);
        self.shadow_passes += 1;
        count_command(encoder);
        Ok(())
    }

    fn render_probe_face(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        _pass: &ProbeFacePass,
    ) -> Result<(), ResourceError> {
        self.probe_faces += 1;
        count_command(encoder);
        Ok(())
    }

    fn filter_reflection(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        _pass: &ReflectionFilterPass,
    ) -> Result<(), ResourceError> {
        self.filter_calls += 1;
        count_command(encoder);
        Ok(())
    }

    fn dispatch_volumetric_fog(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        _dispatch: &FogDispatch,
    ) -> Result<(), ResourceError> {
        self.fog_dispatches += 1;
        count_command(encoder);
        Ok(())
    }

    fn render_scene_pass(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ScenePass,
    ) -> Result<(), ResourceError> {
        log::trace!(
            "HeadlessBackend: scene pass {} with {:?}",
            pass.scene_pass,
            pass.counts
        );
        count_command(encoder);
        Ok(())
    }
}
