mod common;

use common::{Command, MockGraphicsDevice, MockRenderBackend};
use std::sync::Arc;
use umbra_agents::render_agent::{FrameInput, SceneRenderContext};
use umbra_core::math::{Extent2D, Mat4, Vec3};
use umbra_core::renderer::{
    CameraView, ConfigError, DirectionalShadowMode, GraphicsDevice, LightKind, LightParams,
    ReflectionProbeParams, SchedulerSettings, VolumetricFogEnvironment,
};
use umbra_lanes::reflection_lane::ReflectionAtlasHandle;
use umbra_lanes::shadow_lane::ShadowAtlasHandle;
use umbra_lanes::LightHandle;

fn settings() -> SchedulerSettings {
    SchedulerSettings {
        shadow_atlas_size: 1024,
        directional_shadow_size: 1024,
        reflection_atlas_size: 64,
        reflection_atlas_count: 4,
        reflection_roughness_layers: 2,
        reflection_realtime_size: 64,
        reflection_realtime_mipmaps: 2,
        volumetric_fog_size: 16,
        volumetric_fog_depth: 8,
        ..Default::default()
    }
}

struct Harness {
    device: Arc<MockGraphicsDevice>,
    ctx: SceneRenderContext,
    shadow_atlas: ShadowAtlasHandle,
    reflection_atlas: ReflectionAtlasHandle,
}

impl Harness {
    fn new() -> Self {
        let device = Arc::new(MockGraphicsDevice::default());
        let shared: Arc<dyn GraphicsDevice> = device.clone();
        let mut ctx =
            SceneRenderContext::new(shared, Box::new(MockRenderBackend::default()), settings())
                .expect("valid settings");
        let shadow_atlas = ctx.create_shadow_atlas();
        let reflection_atlas = ctx.create_reflection_atlas();
        Self {
            device,
            ctx,
            shadow_atlas,
            reflection_atlas,
        }
    }

    fn input(&self, ticks_msec: u64, camera: CameraView) -> FrameInput {
        FrameInput {
            shadow_atlas: Some(self.shadow_atlas),
            reflection_atlas: Some(self.reflection_atlas),
            environment: VolumetricFogEnvironment {
                enabled: true,
                ..Default::default()
            },
            ..FrameInput::new(camera, ticks_msec)
        }
    }

    fn omni(&mut self, depth: f32) -> LightHandle {
        self.ctx.create_light(
            LightParams::omni(5.0).with_shadow(),
            Mat4::from_translation(Vec3::new(0.0, 0.0, -depth)),
        )
    }

    fn sun(&mut self) -> LightHandle {
        let mut params = LightParams::directional().with_shadow();
        params.directional_shadow_mode = DirectionalShadowMode::Parallel4Splits;
        self.ctx.create_light(params, Mat4::IDENTITY)
    }
}

fn camera(viewport: Extent2D) -> CameraView {
    CameraView::new(Mat4::IDENTITY, 0.05, 100.0, 70.0, viewport)
}

fn first(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
    commands.iter().position(pred).expect("command recorded")
}

fn last(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
    commands.iter().rposition(pred).expect("command recorded")
}

#[test]
fn frame_runs_every_lane_in_order() {
    let mut h = Harness::new();
    let light = h.omni(10.0);
    h.sun();
    h.ctx.create_reflection_probe(
        ReflectionProbeParams::default(),
        Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0)),
    );

    let input = h.input(0, camera(Extent2D::new(640, 480)));
    let stats = h.ctx.render_frame(&input);
    assert_eq!(stats.scene_pass, 1);
    assert_eq!(stats.shadows_redrawn, 1);
    assert_eq!(stats.shadows_unassigned, 0);
    assert_eq!(stats.directional_passes, 4);
    assert_eq!(stats.probe_faces, 1);
    assert_eq!(stats.cluster.omni_lights, 1);
    assert_eq!(stats.cluster.directional_lights, 1);
    assert_eq!(stats.fog_dispatches, 4);
    assert!(stats.fog_reallocated);
    assert!(stats.render_buffers_recreated);
    assert_eq!(h.ctx.last_stats(), stats);

    assert_eq!(h.device.submitted().len(), 1);
    let commands = h.device.last_submission();
    let is_shadow = |c: &Command| matches!(c, Command::Shadow { .. });
    let is_face = |c: &Command| matches!(c, Command::ProbeFace { .. });
    let is_bake = |c: &Command| matches!(c, Command::ClusterBake);
    let is_fog = |c: &Command| matches!(c, Command::Fog(_));

    assert!(last(&commands, is_shadow) < first(&commands, is_face));
    assert!(first(&commands, is_face) < last(&commands, is_bake));
    assert!(last(&commands, is_bake) < first(&commands, is_fog));
    assert_eq!(commands.last(), Some(&Command::Scene));

    // dual paraboloid: two half-height passes in the light's slot
    let omni_rects: Vec<_> = commands
        .iter()
        .filter_map(|c| match c {
            Command::Shadow {
                kind: LightKind::Omni,
                rect,
                pass,
            } => Some((*pass, *rect)),
            _ => None,
        })
        .collect();
    assert_eq!(omni_rects.len(), 2);
    assert_eq!(omni_rects[0].0, 0);
    assert_eq!(omni_rects[1].0, 1);
    assert_eq!(omni_rects[0].1.height * 2, omni_rects[0].1.width);
    assert_eq!(omni_rects[1].1.y, omni_rects[0].1.y + omni_rects[0].1.height);

    let instance = h.ctx.light(light).expect("light");
    assert!(instance.shadow_rect.is_some());
    assert_eq!(instance.render_index, Some(0));
}

#[test]
fn steady_scene_reuses_shadows_and_buffers() {
    let mut h = Harness::new();
    let light = h.omni(10.0);
    h.sun();
    let viewport = Extent2D::new(640, 480);

    h.ctx.render_frame(&h.input(0, camera(viewport)));
    let stats = h.ctx.render_frame(&h.input(16, camera(viewport)));
    assert_eq!(stats.shadows_redrawn, 0);
    // directional cascades follow the camera and render every frame
    assert_eq!(stats.directional_passes, 4);
    assert!(!stats.render_buffers_recreated);
    assert!(!stats.fog_reallocated);

    h.ctx
        .set_light_transform(light, Mat4::from_translation(Vec3::new(1.0, 0.0, -10.0)));
    let stats = h.ctx.render_frame(&h.input(33, camera(viewport)));
    assert_eq!(stats.shadows_redrawn, 1);
}

#[test]
fn viewport_change_recreates_the_render_targets() {
    let mut h = Harness::new();
    h.ctx.render_frame(&h.input(0, camera(Extent2D::new(640, 480))));
    h.ctx.render_frame(&h.input(16, camera(Extent2D::new(640, 480))));
    let live = h.device.live_textures();

    let stats = h.ctx.render_frame(&h.input(33, camera(Extent2D::new(1920, 1080))));
    assert!(stats.render_buffers_recreated);
    assert!(stats.fog_reallocated);
    assert_eq!(
        h.ctx.render_buffers().map(|b| b.viewport),
        Some(Extent2D::new(1920, 1080))
    );
    // old targets and volume were destroyed, not leaked
    assert_eq!(h.device.live_textures(), live);
}

#[test]
fn reapplying_settings_keeps_assignments() {
    let mut h = Harness::new();
    h.omni(10.0);
    let viewport = Extent2D::new(640, 480);
    h.ctx.render_frame(&h.input(0, camera(viewport)));

    h.ctx.set_settings(settings()).expect("valid settings");
    let stats = h.ctx.render_frame(&h.input(16, camera(viewport)));
    assert_eq!(stats.shadows_redrawn, 0);

    let resized = SchedulerSettings {
        shadow_atlas_size: 2048,
        ..settings()
    };
    h.ctx.set_settings(resized).expect("valid settings");
    let stats = h.ctx.render_frame(&h.input(33, camera(viewport)));
    assert_eq!(stats.shadows_redrawn, 1);
    assert_eq!(
        h.ctx.shadow_atlas(h.shadow_atlas).map(|a| a.size()),
        Some(2048)
    );
}

#[test]
fn invalid_settings_are_rejected() {
    let mut h = Harness::new();
    let bad = SchedulerSettings {
        shadow_atlas_size: 1000,
        ..settings()
    };
    assert!(matches!(
        h.ctx.set_settings(bad.clone()),
        Err(ConfigError::NotPowerOfTwo { .. })
    ));
    assert_eq!(h.ctx.settings().shadow_atlas_size, 1024);

    let device: Arc<dyn GraphicsDevice> = Arc::new(MockGraphicsDevice::default());
    assert!(SceneRenderContext::new(device, Box::new(MockRenderBackend::default()), bad).is_err());
}

#[test]
fn probe_is_packed_once_published() {
    let mut h = Harness::new();
    let probe = h.ctx.create_reflection_probe(
        ReflectionProbeParams::default(),
        Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0)),
    );
    let viewport = Extent2D::new(640, 480);

    // 6 faces, 6 convolutions of mip 1, then the publishing call
    for frame in 0..12 {
        let stats = h.ctx.render_frame(&h.input(frame * 16, camera(viewport)));
        assert_eq!(stats.cluster.reflections, 0);
    }
    let stats = h.ctx.render_frame(&h.input(12 * 16, camera(viewport)));
    assert_eq!(stats.probes_finished, 1);
    assert_eq!(stats.cluster.reflections, 1);
    assert!(h.ctx.reflections().has_reflection(probe));
    assert_eq!(
        h.ctx.reflections().probe(probe).map(|p| p.last_pass),
        Some(stats.scene_pass)
    );
}

#[test]
fn fog_keeps_the_previous_camera_for_reprojection() {
    let mut h = Harness::new();
    let viewport = Extent2D::new(640, 480);
    h.ctx.render_frame(&h.input(0, camera(viewport)));

    let moved = CameraView::new(
        Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
        0.05,
        100.0,
        70.0,
        viewport,
    );
    let stats = h.ctx.render_frame(&h.input(16, moved));
    assert_eq!(stats.fog_dispatches, 4);
    assert_eq!(h.ctx.fog().prev_camera(), Some(moved.transform));

    let mut input = h.input(33, moved);
    input.environment.enabled = false;
    let stats = h.ctx.render_frame(&input);
    assert_eq!(stats.fog_dispatches, 0);
    assert!(h.ctx.fog().textures().is_none());
}

#[test]
fn frame_without_atlases_skips_positional_shadows() {
    let mut h = Harness::new();
    let light = h.omni(10.0);
    h.sun();

    let stats = h
        .ctx
        .render_frame(&FrameInput::new(camera(Extent2D::new(320, 240)), 0));
    assert_eq!(stats.shadows_redrawn, 0);
    assert_eq!(stats.directional_passes, 4);
    assert_eq!(stats.probe_faces, 0);
    assert_eq!(stats.fog_dispatches, 0);
    assert!(h.ctx.light(light).is_some_and(|l| l.shadow_rect.is_none()));
    assert_eq!(stats.cluster.omni_lights, 1);
}

#[test]
fn freeing_a_light_releases_its_shadow() {
    let mut h = Harness::new();
    let light = h.omni(10.0);
    h.ctx.render_frame(&h.input(0, camera(Extent2D::new(640, 480))));
    assert_eq!(h.ctx.shadow_atlas(h.shadow_atlas).map(|a| a.owner_count()), Some(1));

    h.ctx.free_light(light);
    assert!(h.ctx.light(light).is_none());
    assert_eq!(h.ctx.shadow_atlas(h.shadow_atlas).map(|a| a.owner_count()), Some(0));
}

#[test]
fn cell_lists_use_the_last_frames_indices() {
    let mut h = Harness::new();
    let far = h.omni(30.0);
    let near = h.omni(5.0);
    h.ctx.render_frame(&h.input(0, camera(Extent2D::new(640, 480))));

    let words = h.ctx.pack_light_cell(&[far, near]);
    assert_eq!(words.len(), 2);
    assert_eq!(words[0] & 0xFFFF, 0x0001);
}

#[test]
fn shutdown_releases_every_texture() {
    let mut h = Harness::new();
    h.omni(10.0);
    h.sun();
    h.ctx.create_reflection_probe(ReflectionProbeParams::default(), Mat4::IDENTITY);
    for frame in 0..3 {
        h.ctx
            .render_frame(&h.input(frame * 16, camera(Extent2D::new(640, 480))));
    }
    assert!(h.device.live_textures() > 0);

    h.ctx.shutdown();
    assert_eq!(h.device.live_textures(), 0);
}
