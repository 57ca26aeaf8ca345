mod common;

use approx::assert_relative_eq;
use common::{Command, MockClusterBuilder, MockCommandEncoder, MockGraphicsDevice, MockRenderBackend};
use std::sync::atomic::Ordering;
use umbra_core::math::{Extent2D, Mat4, Vec3};
use umbra_core::renderer::passes::ClusterCounts;
use umbra_core::renderer::{
    CameraView, ClusterElementKind, DecalParams, DirectionalSkyMode, DistanceFade, LightParams,
    ReflectionProbeParams, MAX_DIRECTIONAL_LIGHTS,
};
use umbra_lanes::cluster_lane::{pack_light_cell, unpack_cell_indices, ClusterFill, ClusterSources};
use umbra_lanes::reflection_lane::{ReflectionFilterConfig, ReflectionLane};
use umbra_lanes::{Arena, DecalInstance, LightHandle, LightInstance};

fn camera(z_far: f32) -> CameraView {
    CameraView::new(Mat4::IDENTITY, 0.05, z_far, 70.0, Extent2D::new(64, 64))
}

fn at_depth(params: LightParams, depth: f32) -> LightInstance {
    LightInstance::new(params, Mat4::from_translation(Vec3::new(0.0, 0.0, -depth)))
}

struct Scene {
    device: MockGraphicsDevice,
    builder: MockClusterBuilder,
    lights: Arena<LightInstance>,
    decals: Arena<DecalInstance>,
    reflections: ReflectionLane,
    fill: ClusterFill,
}

impl Scene {
    fn new(capacity: u32) -> Self {
        Self {
            device: MockGraphicsDevice::default(),
            builder: MockClusterBuilder::default(),
            lights: Arena::new(),
            decals: Arena::new(),
            reflections: ReflectionLane::default(),
            fill: ClusterFill::new(capacity),
        }
    }

    fn build(&mut self, camera: &CameraView, scene_pass: u64) -> (ClusterCounts, MockCommandEncoder) {
        let mut encoder = MockCommandEncoder::default();
        let sources = ClusterSources {
            lights: &mut self.lights,
            decals: &mut self.decals,
            reflections: &mut self.reflections,
            directional_atlas_size: 4096,
            scene_pass,
        };
        let counts = self
            .fill
            .build(&self.device, &mut encoder, &mut self.builder, camera, sources)
            .expect("cluster build");
        (counts, encoder)
    }
}

#[test]
fn keeps_exactly_the_nearest_lights_in_depth_order() {
    let mut scene = Scene::new(512);
    // 7919 is coprime with 10000: every rank appears once, in scrambled order
    let handles: Vec<(LightHandle, u32)> = (0..10_000u32)
        .map(|i| {
            let rank = (i * 7919) % 10_000;
            let depth = 1.0 + rank as f32 * 0.5;
            (scene.lights.insert(at_depth(LightParams::omni(0.25), depth)), rank)
        })
        .collect();

    let (counts, encoder) = scene.build(&camera(10_000.0), 7);
    assert_eq!(counts.omni_lights, 512);
    assert_eq!(scene.fill.dropped(), 10_000 - 512);

    for &(handle, rank) in &handles {
        let light = scene.lights.get(handle).expect("live light");
        if rank < 512 {
            assert_eq!(light.render_index, Some(rank));
            assert_eq!(light.last_scene_pass, 7);
        } else {
            assert_eq!(light.render_index, None);
        }
    }

    let records = scene.fill.omni_lights();
    for (k, record) in records.iter().enumerate() {
        assert_relative_eq!(record.position[2], -(1.0 + k as f32 * 0.5));
    }
    assert_eq!(scene.builder.lights.len(), 512);
    assert!(scene
        .builder
        .lights
        .iter()
        .all(|(kind, _)| *kind == ClusterElementKind::OmniLight));
    assert_eq!(encoder.commands, vec![Command::ClusterBake]);
}

#[test]
fn culls_behind_beyond_and_faded_out() {
    let mut scene = Scene::new(64);
    let behind = scene.lights.insert(at_depth(LightParams::omni(1.0), -10.0));
    let straddling = scene.lights.insert(at_depth(LightParams::omni(1.0), -0.5));
    let too_far = scene.lights.insert(at_depth(LightParams::omni(10.0), 150.0));
    let reaching_in = scene.lights.insert(at_depth(LightParams::omni(10.0), 105.0));

    let fade = Some(DistanceFade {
        begin: 10.0,
        length: 10.0,
    });
    let fading = scene.lights.insert(at_depth(
        LightParams {
            distance_fade: fade,
            ..LightParams::omni(1.0)
        },
        15.0,
    ));
    let faded = scene.lights.insert(at_depth(
        LightParams {
            distance_fade: fade,
            ..LightParams::omni(1.0)
        },
        25.0,
    ));

    let (counts, _) = scene.build(&camera(100.0), 1);
    assert_eq!(counts.omni_lights, 3);

    let index = |h| scene.lights.get(h).and_then(|l| l.render_index);
    assert_eq!(index(behind), None);
    assert_eq!(index(too_far), None);
    assert_eq!(index(faded), None);
    assert_eq!(index(straddling), Some(0));
    assert_eq!(index(fading), Some(1));
    assert_eq!(index(reaching_in), Some(2));

    assert_relative_eq!(scene.fill.omni_lights()[1].fade, 0.5);
    assert_relative_eq!(scene.fill.omni_lights()[0].fade, 1.0);
}

#[test]
fn categories_are_packed_independently() {
    let mut scene = Scene::new(2);
    for depth in [5.0, 6.0, 7.0] {
        scene.lights.insert(at_depth(LightParams::omni(1.0), depth));
        scene.lights.insert(at_depth(LightParams::spot(1.0, 30.0), depth));
    }
    let mut sky_only = LightParams::directional();
    sky_only.directional_sky_mode = DirectionalSkyMode::SkyOnly;
    let sky = scene.lights.insert(LightInstance::new(sky_only, Mat4::IDENTITY));
    for _ in 0..MAX_DIRECTIONAL_LIGHTS + 2 {
        scene
            .lights
            .insert(LightInstance::new(LightParams::directional(), Mat4::IDENTITY));
    }
    scene.decals.insert(DecalInstance::new(
        DecalParams::default(),
        Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)),
    ));

    let (counts, _) = scene.build(&camera(100.0), 1);
    assert_eq!(
        counts,
        ClusterCounts {
            omni_lights: 2,
            spot_lights: 2,
            decals: 1,
            reflections: 0,
            directional_lights: MAX_DIRECTIONAL_LIGHTS as u32,
        }
    );
    assert_eq!(scene.lights.get(sky).and_then(|l| l.render_index), None);
    assert_eq!(scene.builder.boxes.len(), 1);
    assert_eq!(scene.fill.dropped(), 2);
}

#[test]
fn empty_categories_are_not_uploaded() {
    let mut scene = Scene::new(16);
    scene.lights.insert(at_depth(LightParams::omni(1.0), 5.0));

    scene.build(&camera(100.0), 1);
    assert_eq!(scene.device.buffers_created.load(Ordering::SeqCst), 5);
    assert_eq!(scene.device.buffer_writes.load(Ordering::SeqCst), 1);
    let generation = scene.fill.generation();

    scene.build(&camera(100.0), 2);
    assert_eq!(scene.device.buffers_created.load(Ordering::SeqCst), 5);
    assert_eq!(scene.fill.generation(), generation);

    scene.fill.set_capacity(&scene.device, 32);
    assert!(scene.fill.buffers().is_none());
    scene.build(&camera(100.0), 3);
    assert_eq!(scene.device.buffers_created.load(Ordering::SeqCst), 10);
    assert!(scene.fill.generation() > generation);
}

#[test]
fn only_published_probes_are_packed() {
    let mut scene = Scene::new(16);
    scene.reflections = ReflectionLane::new(ReflectionFilterConfig {
        roughness_layers: 2,
        ggx_samples: 16,
        realtime_size: 64,
        realtime_mipmaps: 2,
    });
    let atlas = scene
        .reflections
        .create_atlas(64, 4, Box::new(MockClusterBuilder::default()));
    let placed = Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0));
    let ready = scene
        .reflections
        .create_probe(ReflectionProbeParams::default(), placed);
    let pending = scene
        .reflections
        .create_probe(ReflectionProbeParams::default(), placed);

    // 6 faces, 6 convolutions, 1 publish
    let mut backend = MockRenderBackend::default();
    let mut encoder = MockCommandEncoder::default();
    for _ in 0..13 {
        scene
            .reflections
            .process_frame(&scene.device, &mut backend, &mut encoder, atlas);
    }
    assert!(scene.reflections.has_reflection(ready));
    assert!(!scene.reflections.has_reflection(pending));

    let (counts, _) = scene.build(&camera(100.0), 42);
    assert_eq!(counts.reflections, 1);
    let probe = scene.reflections.probe(ready).expect("probe");
    assert_eq!(probe.render_index, Some(0));
    assert_eq!(probe.last_pass, 42);
    assert_eq!(
        scene.reflections.probe(pending).and_then(|p| p.render_index),
        None
    );
    assert_eq!(
        scene.fill.reflections()[0].index,
        probe.atlas_index() as u32
    );
}

#[test]
fn cell_lists_follow_this_frames_render_indices() {
    let mut scene = Scene::new(2);
    let near = scene.lights.insert(at_depth(LightParams::omni(1.0), 2.0));
    let far = scene.lights.insert(at_depth(LightParams::omni(1.0), 50.0));
    let mid = scene.lights.insert(at_depth(LightParams::omni(1.0), 10.0));
    scene.build(&camera(100.0), 1);

    let words = pack_light_cell(&scene.lights, &[far, mid, near], 8);
    assert_eq!(words.len(), 2);
    // `far` was truncated away and leaves no entry
    assert_eq!(unpack_cell_indices(&words), vec![1, 0]);
}

#[test]
fn failed_buffer_creation_releases_the_partial_set() {
    let mut scene = Scene::new(16);
    scene.device = MockGraphicsDevice {
        fail_buffer_at: Some(3),
        ..Default::default()
    };
    scene.lights.insert(at_depth(LightParams::omni(1.0), 5.0));

    let mut encoder = MockCommandEncoder::default();
    let sources = ClusterSources {
        lights: &mut scene.lights,
        decals: &mut scene.decals,
        reflections: &mut scene.reflections,
        directional_atlas_size: 4096,
        scene_pass: 1,
    };
    let result = scene.fill.build(
        &scene.device,
        &mut encoder,
        &mut scene.builder,
        &camera(100.0),
        sources,
    );
    assert!(result.is_err());
    assert_eq!(scene.device.live_buffers(), 0);
    assert!(scene.fill.buffers().is_none());

    // the device recovered: the next frame allocates the full set
    let (counts, _) = scene.build(&camera(100.0), 2);
    assert_eq!(counts.omni_lights, 1);
    assert_eq!(scene.device.live_buffers(), 5);
}
