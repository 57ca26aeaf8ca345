//! Recording mocks for the scene context tests.
#![allow(dead_code)]

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use umbra_core::math::{Extent2D, Extent3D, Mat4, Rect2D, Vec3};
use umbra_core::renderer::passes::{
    FilterStep, FogDispatch, ProbeFacePass, ReflectionFilterPass, RenderBufferData, ScenePass,
    ShadowPass,
};
use umbra_core::renderer::*;

/// Everything the mocks record, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Clear(TextureId),
    Copy {
        source: TextureId,
        destination: TextureId,
    },
    Barrier,
    Shadow {
        kind: LightKind,
        rect: Rect2D,
        pass: u32,
    },
    ProbeFace {
        slot: u32,
        face: u32,
    },
    Filter {
        slot: u32,
        step: FilterStep,
    },
    Fog(FogStage),
    ClusterBake,
    Scene,
}

#[derive(Debug, Default)]
pub struct MockGraphicsDevice {
    next_id: AtomicUsize,
    live_textures: Mutex<HashSet<usize>>,
    pub textures_created: AtomicUsize,
    pub buffers_created: AtomicUsize,
    pub bind_groups_created: AtomicUsize,
    pub buffer_writes: AtomicUsize,
    submitted: Arc<Mutex<Vec<Vec<Command>>>>,
}

impl MockGraphicsDevice {
    pub fn live_textures(&self) -> usize {
        self.live_textures.lock().unwrap().len()
    }

    /// Command buffers submitted so far, oldest first.
    pub fn submitted(&self) -> Vec<Vec<Command>> {
        self.submitted.lock().unwrap().clone()
    }

    /// Commands of the last submitted buffer.
    pub fn last_submission(&self) -> Vec<Command> {
        self.submitted.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_texture(&self, _descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = self.next();
        self.live_textures.lock().unwrap().insert(id);
        self.textures_created.fetch_add(1, Ordering::SeqCst);
        Ok(TextureId(id))
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        if self.live_textures.lock().unwrap().remove(&id.0) {
            Ok(())
        } else {
            Err(ResourceError::InvalidHandle)
        }
    }

    fn create_buffer(&self, _descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.buffers_created.fetch_add(1, Ordering::SeqCst);
        Ok(BufferId(self.next()))
    }

    fn destroy_buffer(&self, _id: BufferId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn write_buffer(&self, _id: BufferId, _offset: u64, _data: &[u8]) -> Result<(), ResourceError> {
        self.buffer_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_bind_group(
        &self,
        _descriptor: &BindGroupDescriptor,
    ) -> Result<BindGroupId, ResourceError> {
        self.bind_groups_created.fetch_add(1, Ordering::SeqCst);
        Ok(BindGroupId(self.next()))
    }

    fn destroy_bind_group(&self, _id: BindGroupId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(MockCommandEncoder {
            commands: Vec::new(),
            sink: Some(Arc::clone(&self.submitted)),
        })
    }

    fn submit_command_buffer(&self, _command_buffer: CommandBufferId) {}
}

#[derive(Debug, Default)]
pub struct MockCommandEncoder {
    pub commands: Vec<Command>,
    sink: Option<Arc<Mutex<Vec<Vec<Command>>>>>,
}

impl MockCommandEncoder {
    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl CommandEncoder for MockCommandEncoder {
    fn clear_texture(&mut self, texture: TextureId) {
        self.commands.push(Command::Clear(texture));
    }

    fn copy_texture_to_texture(
        &mut self,
        source: TextureId,
        destination: TextureId,
        _size: Extent3D,
    ) {
        self.commands.push(Command::Copy {
            source,
            destination,
        });
    }

    fn barrier(&mut self) {
        self.commands.push(Command::Barrier);
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        // the mock submits on finish; ordering is all the tests look at
        let MockCommandEncoder { commands, sink } = *self;
        match sink {
            Some(sink) => {
                let mut buffers = sink.lock().unwrap();
                buffers.push(commands);
                CommandBufferId(buffers.len() as u64)
            }
            None => CommandBufferId(0),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn record(encoder: &mut dyn CommandEncoder, command: Command) {
    if let Some(mock) = encoder.as_any_mut().downcast_mut::<MockCommandEncoder>() {
        mock.commands.push(command);
    }
}

#[derive(Debug, Default)]
pub struct MockClusterBuilder {
    pub begun: usize,
    pub lights: Vec<(ClusterElementKind, f32)>,
    pub boxes: Vec<(ClusterElementKind, Vec3)>,
}

impl ClusterBuilder for MockClusterBuilder {
    fn begin(&mut self, _camera: &CameraView) {
        self.begun += 1;
        self.lights.clear();
        self.boxes.clear();
    }

    fn add_light(&mut self, kind: ClusterElementKind, _transform: &Mat4, radius: f32, _spot_angle: f32) {
        self.lights.push((kind, radius));
    }

    fn add_box(&mut self, kind: ClusterElementKind, _transform: &Mat4, extents: Vec3) {
        self.boxes.push((kind, extents));
    }

    fn bake(&mut self, encoder: &mut dyn CommandEncoder) {
        record(encoder, Command::ClusterBake);
    }
}

#[derive(Debug, Default)]
pub struct MockRenderBackend {
    pub fail_filters: bool,
}

impl RenderBackend for MockRenderBackend {
    fn backend_name(&self) -> &str {
        "mock"
    }

    fn create_render_buffer_data(
        &mut self,
        device: &dyn GraphicsDevice,
        viewport: Extent2D,
    ) -> Result<RenderBufferData, ResourceError> {
        let descriptor = TextureDescriptor {
            label: None,
            size: Extent3D::new(viewport.width, viewport.height, 1),
            mip_level_count: 1,
            dimension: TextureDimension::D2,
            view_dimension: TextureViewDimension::D2,
            format: TextureFormat::Rgba16Float,
            usage: TextureUsage::RENDER_ATTACHMENT,
        };
        Ok(RenderBufferData {
            viewport,
            color: device.create_texture(&descriptor)?,
            depth: device.create_texture(&descriptor)?,
        })
    }

    fn create_cluster_builder(&mut self) -> Box<dyn ClusterBuilder> {
        Box::new(MockClusterBuilder::default())
    }

    fn render_shadow_pass(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ShadowPass,
    ) -> Result<(), ResourceError> {
        record(
            encoder,
            Command::Shadow {
                kind: pass.light_kind,
                rect: pass.rect,
                pass: pass.pass,
            },
        );
        Ok(())
    }

    fn render_probe_face(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ProbeFacePass,
    ) -> Result<(), ResourceError> {
        record(
            encoder,
            Command::ProbeFace {
                slot: pass.slot,
                face: pass.face,
            },
        );
        Ok(())
    }

    fn filter_reflection(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        pass: &ReflectionFilterPass,
    ) -> Result<(), ResourceError> {
        if self.fail_filters {
            return Err(ResourceError::BackendError("filter unavailable".into()));
        }
        record(
            encoder,
            Command::Filter {
                slot: pass.slot,
                step: pass.step,
            },
        );
        Ok(())
    }

    fn dispatch_volumetric_fog(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        dispatch: &FogDispatch,
    ) -> Result<(), ResourceError> {
        record(encoder, Command::Fog(dispatch.stage));
        Ok(())
    }

    fn render_scene_pass(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        _pass: &ScenePass,
    ) -> Result<(), ResourceError> {
        record(encoder, Command::Scene);
        Ok(())
    }
}
