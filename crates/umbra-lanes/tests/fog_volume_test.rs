mod common;

use common::{Command, MockCommandEncoder, MockGraphicsDevice, MockRenderBackend};
use std::sync::atomic::Ordering;
use umbra_core::math::{Extent2D, Mat4, Vec3};
use umbra_core::renderer::{CameraView, FogStage, VolumetricFogEnvironment};
use umbra_lanes::fog_lane::{FogBindingSources, FogFrame, FogVolumeSettings, VolumetricFogResource};

const SETTINGS: FogVolumeSettings = FogVolumeSettings { size: 32, depth: 16 };

fn env() -> VolumetricFogEnvironment {
    VolumetricFogEnvironment {
        enabled: true,
        ..Default::default()
    }
}

fn camera(x: f32, viewport: Extent2D) -> CameraView {
    CameraView::new(
        Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
        0.05,
        100.0,
        70.0,
        viewport,
    )
}

struct Fog {
    device: MockGraphicsDevice,
    backend: MockRenderBackend,
    fog: VolumetricFogResource,
}

impl Fog {
    fn new() -> Self {
        Self {
            device: MockGraphicsDevice::default(),
            backend: MockRenderBackend::default(),
            fog: VolumetricFogResource::new(),
        }
    }

    fn update(&mut self, viewport: Extent2D) -> (bool, MockCommandEncoder) {
        let mut encoder = MockCommandEncoder::default();
        let reallocated = self
            .fog
            .update(&self.device, &mut encoder, &env(), viewport, &SETTINGS)
            .expect("fog allocation");
        (reallocated, encoder)
    }

    fn dispatch(
        &mut self,
        camera: &CameraView,
        frame: u64,
        filter_active: bool,
        sources: &FogBindingSources,
    ) -> (u32, MockCommandEncoder) {
        let mut encoder = MockCommandEncoder::default();
        let fog_frame = FogFrame {
            camera,
            frame,
            directional_light_count: 0,
            max_cluster_elements: 512,
            filter_active,
        };
        let dispatches = self
            .fog
            .dispatch_frame(
                &self.device,
                &mut self.backend,
                &mut encoder,
                &env(),
                &fog_frame,
                sources,
            )
            .expect("fog dispatch");
        (dispatches, encoder)
    }
}

#[test]
fn history_is_refreshed_after_density_and_before_filtering() {
    let viewport = Extent2D::new(800, 800);
    let mut fog = Fog::new();
    let (reallocated, setup) = fog.update(viewport);
    assert!(reallocated);
    let textures = fog.fog.textures().expect("allocated");
    assert_eq!(setup.commands, vec![Command::Clear(textures.prev_light_density)]);

    let (dispatches, encoder) = fog.dispatch(&camera(0.0, viewport), 1, true, &FogBindingSources::default());
    assert_eq!(dispatches, 4);
    assert_eq!(
        encoder.commands,
        vec![
            Command::Fog(FogStage::Density),
            Command::Barrier,
            Command::Copy {
                source: textures.light_density,
                destination: textures.prev_light_density,
            },
            Command::Barrier,
            Command::Fog(FogStage::Filter { axis: 0 }),
            Command::Barrier,
            Command::Fog(FogStage::Filter { axis: 1 }),
            Command::Barrier,
            Command::Fog(FogStage::Integrate),
            Command::Barrier,
        ]
    );
}

#[test]
fn inactive_filter_skips_the_blur() {
    let viewport = Extent2D::new(640, 480);
    let mut fog = Fog::new();
    fog.update(viewport);
    let (dispatches, encoder) = fog.dispatch(&camera(0.0, viewport), 1, false, &FogBindingSources::default());
    assert_eq!(dispatches, 2);
    assert_eq!(
        encoder.count(|c| matches!(c, Command::Fog(FogStage::Filter { .. }))),
        0
    );
}

#[test]
fn previous_camera_follows_the_frames() {
    let viewport = Extent2D::new(640, 480);
    let mut fog = Fog::new();
    fog.update(viewport);
    assert_eq!(fog.fog.prev_camera(), None);

    let first = camera(1.0, viewport);
    fog.dispatch(&first, 1, true, &FogBindingSources::default());
    assert_eq!(fog.fog.prev_camera(), Some(first.transform));

    let second = camera(2.0, viewport);
    fog.dispatch(&second, 2, true, &FogBindingSources::default());
    assert_eq!(fog.fog.prev_camera(), Some(second.transform));

    // a new volume starts without history
    let (reallocated, encoder) = fog.update(Extent2D::new(1920, 1080));
    assert!(reallocated);
    assert_eq!(fog.fog.prev_camera(), None);
    assert_eq!(encoder.count(|c| matches!(c, Command::Clear(_))), 1);
}

#[test]
fn same_viewport_keeps_the_volume() {
    let viewport = Extent2D::new(1280, 720);
    let mut fog = Fog::new();
    fog.update(viewport);
    let generation = fog.fog.generation();
    let (reallocated, encoder) = fog.update(viewport);
    assert!(!reallocated);
    assert!(encoder.commands.is_empty());
    assert_eq!(fog.fog.generation(), generation);
    assert_eq!(fog.device.live_textures(), 3);
}

#[test]
fn binding_is_rebuilt_only_when_a_source_changes() {
    let viewport = Extent2D::new(640, 480);
    let mut fog = Fog::new();
    fog.update(viewport);
    let cam = camera(0.0, viewport);

    let mut sources = FogBindingSources::default();
    fog.dispatch(&cam, 1, true, &sources);
    fog.dispatch(&cam, 2, true, &sources);
    assert_eq!(fog.device.bind_groups_created.load(Ordering::SeqCst), 1);

    sources.shadow_generation += 1;
    fog.dispatch(&cam, 3, true, &sources);
    assert_eq!(fog.device.bind_groups_created.load(Ordering::SeqCst), 2);

    // reallocation invalidates it too
    fog.update(Extent2D::new(240, 640));
    fog.dispatch(&cam, 4, true, &sources);
    assert_eq!(fog.device.bind_groups_created.load(Ordering::SeqCst), 3);
}

#[test]
fn disabling_fog_frees_the_volume() {
    let viewport = Extent2D::new(640, 480);
    let mut fog = Fog::new();
    fog.update(viewport);
    assert_eq!(fog.device.live_textures(), 3);

    let mut encoder = MockCommandEncoder::default();
    let disabled = VolumetricFogEnvironment::default();
    let reallocated = fog
        .fog
        .update(&fog.device, &mut encoder, &disabled, viewport, &SETTINGS)
        .expect("disable");
    assert!(!reallocated);
    assert!(fog.fog.textures().is_none());
    assert_eq!(fog.device.live_textures(), 0);
}

#[test]
fn failed_allocation_leaves_nothing_behind() {
    let device = MockGraphicsDevice {
        fail_texture_at: Some(2),
        ..Default::default()
    };
    let mut fog = VolumetricFogResource::new();
    let mut encoder = MockCommandEncoder::default();

    let result = fog.update(&device, &mut encoder, &env(), Extent2D::new(640, 480), &SETTINGS);
    assert!(result.is_err());
    assert_eq!(device.live_textures(), 0);
    assert!(fog.textures().is_none());

    let retried = fog
        .update(&device, &mut encoder, &env(), Extent2D::new(640, 480), &SETTINGS)
        .expect("second attempt succeeds");
    assert!(retried);
    assert_eq!(device.live_textures(), 3);

    fog.free(&device);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn failed_params_buffer_releases_the_textures() {
    let device = MockGraphicsDevice {
        fail_buffer_at: Some(1),
        ..Default::default()
    };
    let mut fog = VolumetricFogResource::new();
    let mut encoder = MockCommandEncoder::default();

    let result = fog.update(&device, &mut encoder, &env(), Extent2D::new(640, 480), &SETTINGS);
    assert!(result.is_err());
    assert_eq!(device.live_textures(), 0);
    assert!(encoder.commands.is_empty());
}
