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
// limitations under the License.//! Drives the scene scheduler over a synthetic scene on a headless backend.
//!
//! Usage: `sandbox [settings.ron] [frames]`

mod headless;

use anyhow::{Context, Result};
use headless::{HeadlessBackend, HeadlessDevice};
use std::sync::Arc;
use umbra_agents::render_agent::{FrameInput, FrameStats, SceneRenderContext};
use umbra_core::math::{Extent2D, LinearRgba, Mat4, Vec3};
use umbra_core::renderer::{
    CameraView, DecalParams, DirectionalShadowMode, DistanceFade, LightParams, OmniShadowMode,
    ReflectionProbeParams, ReflectionUpdateMode, SchedulerSettings, VolumetricFogEnvironment,
};
use umbra_lanes::LightHandle;

const DEFAULT_FRAME_COUNT: u64 = 240;
const FRAME_MSEC: u64 = 16;
const GRID: i32 = 24;

fn load_settings(path: Option<String>) -> Result<SchedulerSettings> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings from '{path}'"))?;
            let settings = SchedulerSettings::from_ron_str(&text)
                .with_context(|| format!("parsing settings from '{path}'"))?;
            log::info!("Loaded scheduler settings from '{path}'");
            Ok(settings)
        }
        None => Ok(SchedulerSettings::default()),
    }
}

/// Populates the context with a grid of lights, some decals and probes.
fn build_scene(ctx: &mut SceneRenderContext) -> Vec<(LightHandle, Vec3)> {
    let mut movers = Vec::new();
    for x in 0..GRID {
        for z in 0..GRID {
            let position = Vec3::new(x as f32 * 4.0 - 48.0, 2.0, -(z as f32) * 4.0);
            let mut params = if (x + z) % 3 == 0 {
                LightParams::spot(8.0, 35.0)
            } else {
                LightParams::omni(6.0)
            };
            params.color = LinearRgba::rgb(1.0, 0.8 - z as f32 * 0.02, 0.6);
            if (x * GRID + z) % 7 == 0 {
                params = params.with_shadow();
                params.omni_shadow_mode = if x % 2 == 0 {
                    OmniShadowMode::DualParaboloid
                } else {
                    OmniShadowMode::Cube
                };
            }
            if z > GRID / 2 {
                params.distance_fade = Some(DistanceFade {
                    begin: 40.0,
                    length: 10.0,
                });
            }
            let light = ctx.create_light(params, Mat4::from_translation(position));
            if x % 4 == 0 {
                movers.push((light, position));
            }
        }
    }

    let mut sun = LightParams::directional().with_shadow();
    sun.directional_shadow_mode = DirectionalShadowMode::Parallel4Splits;
    ctx.create_light(sun, Mat4::IDENTITY);

    for i in 0..32 {
        let params = DecalParams {
            extents: Vec3::new(1.0, 0.5, 1.0),
            ..Default::default()
        };
        ctx.create_decal(
            params,
            Mat4::from_translation(Vec3::new(i as f32 * 3.0 - 48.0, 0.0, -(i as f32) * 2.0)),
        );
    }

    for i in 0..6 {
        let params = ReflectionProbeParams {
            update_mode: if i == 0 {
                ReflectionUpdateMode::Always
            } else {
                ReflectionUpdateMode::Once
            },
            ..Default::default()
        };
        let probe = ctx.create_reflection_probe(
            params,
            Mat4::from_translation(Vec3::new(i as f32 * 16.0 - 40.0, 3.0, -30.0)),
        );
        ctx.request_reflection_probe_update(probe);
    }
    movers
}

fn orbit_camera(frame: u64) -> CameraView {
    let angle = frame as f32 * 0.01;
    let eye = Vec3::new(angle.sin() * 10.0, 4.0, 10.0 + angle.cos() * 10.0);
    CameraView::new(
        Mat4::from_translation(eye),
        0.05,
        120.0,
        70.0,
        Extent2D::new(1920, 1080),
    )
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let settings = load_settings(args.next())?;
    let frame_count = match args.next() {
        Some(count) => count
            .parse::<u64>()
            .with_context(|| format!("invalid frame count '{count}'"))?,
        None => DEFAULT_FRAME_COUNT,
    };
    let device = Arc::new(HeadlessDevice::default());
    let mut ctx = SceneRenderContext::new(
        device.clone(),
        Box::new(HeadlessBackend::default()),
        settings,
    )?;

    let shadow_atlas = ctx.create_shadow_atlas();
    let reflection_atlas = ctx.create_reflection_atlas();
    let movers = build_scene(&mut ctx);
    log::info!(
        "Sandbox: scene with {} lights, {} movers",
        ctx.lights().len(),
        movers.len()
    );

    let mut totals = FrameStats::default();
    for frame in 0..frame_count {
        if frame % 30 == 29 {
            let lift = ((frame / 30) % 4) as f32;
            for &(light, base) in &movers {
                let position = Vec3::new(base.x, base.y + lift, base.z);
                ctx.set_light_transform(light, Mat4::from_translation(position));
            }
        }

        // fog off for every third block of 80 frames
        let environment = VolumetricFogEnvironment {
            enabled: (frame / 80) % 3 != 2,
            ..Default::default()
        };
        let input = FrameInput {
            shadow_atlas: Some(shadow_atlas),
            reflection_atlas: Some(reflection_atlas),
            environment,
            ..FrameInput::new(orbit_camera(frame), frame * FRAME_MSEC)
        };
        let stats = ctx.render_frame(&input);
        totals.shadows_redrawn += stats.shadows_redrawn;
        totals.probe_faces += stats.probe_faces;
        totals.probe_filter_steps += stats.probe_filter_steps;
        totals.probes_finished += stats.probes_finished;
        totals.fog_dispatches += stats.fog_dispatches;

        if frame % 60 == 0 {
            log::info!(
                "Frame {}: {:?}, {} shadows redrawn, {} unassigned",
                stats.scene_pass,
                stats.cluster,
                stats.shadows_redrawn,
                stats.shadows_unassigned
            );
        }
    }

    log::info!(
        "Sandbox: {} frames submitted, {} shadow redraws, {} probe faces, {} filter steps, {} probes finished, {} fog dispatches",
        device.submitted(),
        totals.shadows_redrawn,
        totals.probe_faces,
        totals.probe_filter_steps,
        totals.probes_finished,
        totals.fog_dispatches
    );

    ctx.shutdown();
    log::info!(
        "Sandbox: shutdown left {} live textures",
        device.live_textures()
    );
    Ok(())
}
