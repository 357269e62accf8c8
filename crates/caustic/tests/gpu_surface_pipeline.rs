//! Headless GPU tests for the surface passes.
//!
//! Each test needs an adapter; without one it prints and returns.

use std::sync::Arc;

use caustic::gpu::surface::{
    create_capture_texture, write_capture, DepthPassConfig, HeightPassConfig, SurfaceDepthPass,
    SurfaceHeightPass, SurfacePipeline, SurfacePipelineConfig,
};
use caustic::{GpuError, SimulationContext};
use liquid::{normalize_depth, BodyConfig, LiquidParams, SurfaceSimulation};

const SIZE: u32 = 32;
const BODY_DEPTH: f32 = 512.0;

fn context() -> Option<SimulationContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    match SimulationContext::new_blocking() {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            println!("Skipped: No GPU ({e})");
            None
        }
    }
}

fn test_body() -> BodyConfig {
    BodyConfig {
        body_width: 128.0,
        body_height: 128.0,
        body_depth: BODY_DEPTH,
        cell_size: 16.0,
        liquid: LiquidParams {
            velocity: 0.5,
            viscosity: 0.15,
            depth_texture_width: SIZE,
            depth_texture_height: SIZE,
            ..LiquidParams::default()
        },
        ..BodyConfig::default()
    }
}

fn texels() -> usize {
    (SIZE * SIZE) as usize
}

/// Capture with nothing submerged.
fn empty_capture() -> Vec<f32> {
    vec![BODY_DEPTH; texels()]
}

/// Capture whose normalized penetration is `amount` at the centre only.
fn impulse_capture(params: &LiquidParams, amount: f32) -> Vec<f32> {
    let mut depth = empty_capture();
    let centre = (SIZE / 2 * SIZE + SIZE / 2) as usize;
    depth[centre] = BODY_DEPTH - amount / params.force_factor;
    depth
}

fn zero_texture(ctx: &SimulationContext) -> wgpu::Texture {
    let texture = create_capture_texture(&ctx.device, SIZE, SIZE);
    write_capture(&ctx.queue, &texture, &vec![0.0; texels()]).unwrap();
    texture
}

fn max_abs(values: &[f32]) -> f32 {
    values.iter().fold(0.0f32, |m, v| m.max(v.abs()))
}

#[test]
fn test_init_pass_twice_equals_once() {
    let Some(ctx) = context() else { return };
    let config = HeightPassConfig::from_body(&test_body());

    let mut pass = SurfaceHeightPass::new(&ctx.device);
    pass.init_pass(&ctx.device, config.clone());
    let marker: Vec<f32> = (0..texels()).map(|i| i as f32 * 0.5).collect();
    pass.seed(&ctx.queue, &marker, &marker).unwrap();

    pass.init_pass(&ctx.device, config);
    assert!(pass.is_valid_pass());
    assert_eq!(pass.allocation_count(), 1);

    let current = ctx.read_texture(pass.current_texture().unwrap()).unwrap();
    assert_eq!(current, marker, "re-init must keep texture contents");
}

#[test]
fn test_render_before_init_is_noop() {
    let Some(ctx) = context() else { return };
    let params = test_body().liquid;

    let depth = SurfaceDepthPass::new(&ctx.device);
    let mut height = SurfaceHeightPass::new(&ctx.device);
    let capture = create_capture_texture(&ctx.device, SIZE, SIZE);
    let forcing = zero_texture(&ctx);
    let forcing_view = forcing.create_view(&Default::default());

    ctx.submit_tick("Uninitialized Tick", |encoder| {
        depth.render(&ctx.queue, encoder, &params, &capture);
        height.render(&ctx.device, &ctx.queue, encoder, &params, &forcing_view);
    });
    ctx.wait_idle();

    assert!(!depth.is_valid_pass());
    assert!(!height.is_valid_pass());
    assert!(depth.output_view().is_none());
    assert_eq!(height.allocation_count(), 0);
}

#[test]
fn test_oversized_resolution_fails_permanently() {
    let Some(ctx) = context() else { return };
    let too_big = ctx.max_texture_dimension() + 1;

    let mut pass = SurfaceDepthPass::new(&ctx.device);
    let config = DepthPassConfig {
        width: too_big,
        height: 4,
        min_depth: 0.0,
        max_depth: BODY_DEPTH,
        debug_target: None,
    };
    pass.init_pass(&ctx.device, config.clone());
    assert!(!pass.is_valid_pass());
    assert!(pass.slot_failure().is_some());

    pass.init_pass(&ctx.device, DepthPassConfig { width: 4, ..config });
    assert!(!pass.is_valid_pass(), "failed pass must stay failed");
    assert_eq!(pass.allocation_count(), 1);
}

#[test]
fn test_depth_normalization_matches_cpu() {
    let Some(ctx) = context() else { return };
    let body = test_body();
    let params = body.liquid;

    let mut pass = SurfaceDepthPass::new(&ctx.device);
    pass.init_pass(&ctx.device, DepthPassConfig::from_body(&body));
    assert!(pass.is_valid_pass());

    // Ramp from above the surface to below the body floor
    let raw: Vec<f32> = (0..texels())
        .map(|i| -50.0 + (i as f32 / texels() as f32) * (BODY_DEPTH + 100.0))
        .collect();
    let capture = create_capture_texture(&ctx.device, SIZE, SIZE);
    write_capture(&ctx.queue, &capture, &raw).unwrap();

    ctx.submit_tick("Depth Tick", |encoder| {
        pass.render(&ctx.queue, encoder, &params, &capture);
    });
    let gpu = ctx.read_texture(pass.output_texture().unwrap()).unwrap();

    for (i, (&g, &r)) in gpu.iter().zip(&raw).enumerate() {
        let expected = normalize_depth(r, 0.0, BODY_DEPTH, params.force_factor);
        assert!(
            (g - expected).abs() <= 1e-3 * expected.abs().max(1.0),
            "texel {i}: gpu {g} vs cpu {expected}"
        );
    }
}

#[test]
fn test_mismatched_capture_is_skipped() {
    let Some(ctx) = context() else { return };
    let body = test_body();

    let mut pass = SurfaceDepthPass::new(&ctx.device);
    pass.init_pass(&ctx.device, DepthPassConfig::from_body(&body));

    let wrong = create_capture_texture(&ctx.device, SIZE / 2, SIZE / 2);
    write_capture(&ctx.queue, &wrong, &vec![0.0; texels() / 4]).unwrap();
    ctx.submit_tick("Mismatched Depth Tick", |encoder| {
        pass.render(&ctx.queue, encoder, &body.liquid, &wrong);
    });

    let output = ctx.read_texture(pass.output_texture().unwrap()).unwrap();
    assert!(output.iter().all(|&v| v == 0.0));
}

#[test]
fn test_previous_holds_last_current() {
    let Some(ctx) = context() else { return };
    let body = test_body();

    let mut pass = SurfaceHeightPass::new(&ctx.device);
    pass.init_pass(&ctx.device, HeightPassConfig::from_body(&body));
    let marker: Vec<f32> = (0..texels()).map(|i| (i % 7) as f32 - 3.0).collect();
    pass.seed(&ctx.queue, &marker, &vec![0.0; texels()]).unwrap();

    let forcing = zero_texture(&ctx);
    let forcing_view = forcing.create_view(&Default::default());
    ctx.submit_tick("Height Tick", |encoder| {
        pass.render(&ctx.device, &ctx.queue, encoder, &body.liquid, &forcing_view);
    });

    let previous = ctx.read_texture(pass.previous_texture().unwrap()).unwrap();
    assert_eq!(previous, marker);

    let current = ctx.read_texture(pass.current_texture().unwrap()).unwrap();
    assert_ne!(current, marker, "current should hold the integrated step");
}

#[test]
fn test_impulse_matches_cpu_reference() {
    let Some(ctx) = context() else { return };
    let body = test_body();
    let params = body.liquid;

    let mut pipeline = SurfacePipeline::new(&ctx, &body).unwrap();
    assert!(pipeline.is_ready());
    let mut cpu = SurfaceSimulation::new(params);

    let capture = create_capture_texture(&ctx.device, SIZE, SIZE);
    let impulse = impulse_capture(&params, 50.0);
    let empty = empty_capture();

    for tick in 0..12 {
        let raw = if tick == 0 { &impulse } else { &empty };
        write_capture(&ctx.queue, &capture, raw).unwrap();
        pipeline.tick(&ctx, &capture).unwrap();
        cpu.step(&cpu.forcing_from_capture(raw, 0.0, BODY_DEPTH));
    }

    let gpu = ctx.read_texture(pipeline.height_texture().unwrap()).unwrap();
    let scale = max_abs(cpu.current()).max(1e-6);
    assert!(scale > 0.0);
    for (i, (&g, &c)) in gpu.iter().zip(cpu.current()).enumerate() {
        assert!((g - c).abs() <= 1e-3 * scale, "texel {i}: gpu {g} vs cpu {c}");
    }
    assert_eq!(pipeline.ticks(), 12);
}

#[test]
fn test_constant_depth_gives_flat_normals() {
    let Some(ctx) = context() else { return };
    let body = test_body();

    let mut pipeline = SurfacePipeline::new(&ctx, &body).unwrap();
    let capture = create_capture_texture(&ctx.device, SIZE, SIZE);
    write_capture(&ctx.queue, &capture, &vec![200.0; texels()]).unwrap();

    for _ in 0..5 {
        pipeline.tick(&ctx, &capture);
    }

    let normals = ctx.read_texture(pipeline.normal_texture().unwrap()).unwrap();
    for texel in normals.chunks_exact(4) {
        assert!(texel[0].abs() < 1e-3 && texel[1].abs() < 1e-3, "normal {texel:?}");
        assert!((texel[2] - 1.0).abs() < 1e-3);
        assert_eq!(texel[3], 1.0);
    }
}

#[test]
fn test_ripple_normals_are_unit_length() {
    let Some(ctx) = context() else { return };
    let body = test_body();
    let params = body.liquid;

    let mut pipeline = SurfacePipeline::new(&ctx, &body).unwrap();
    let capture = create_capture_texture(&ctx.device, SIZE, SIZE);
    write_capture(&ctx.queue, &capture, &impulse_capture(&params, 50.0)).unwrap();
    pipeline.tick(&ctx, &capture);
    write_capture(&ctx.queue, &capture, &empty_capture()).unwrap();
    for _ in 0..6 {
        pipeline.tick(&ctx, &capture);
    }

    let normals = ctx.read_texture(pipeline.normal_texture().unwrap()).unwrap();
    for texel in normals.chunks_exact(4) {
        let len = (texel[0] * texel[0] + texel[1] * texel[1] + texel[2] * texel[2]).sqrt();
        // half precision storage
        assert!((len - 1.0).abs() < 2e-3, "normal {texel:?} has length {len}");
    }
}

#[test]
fn test_caustic_uniform_without_refraction() {
    let Some(ctx) = context() else { return };
    let mut body = test_body();
    body.liquid.refraction = 0.0;
    let params = body.liquid;

    let mut pipeline = SurfacePipeline::new(&ctx, &body).unwrap();
    assert_eq!(pipeline.caustic.output_size(), Some((SIZE * 4, SIZE * 4)));

    let capture = create_capture_texture(&ctx.device, SIZE, SIZE);
    write_capture(&ctx.queue, &capture, &impulse_capture(&params, 50.0)).unwrap();
    for _ in 0..4 {
        pipeline.tick(&ctx, &capture);
    }

    let caustic = ctx.read_texture(pipeline.caustic_texture().unwrap()).unwrap();
    assert_eq!(caustic.len(), (SIZE * 4 * SIZE * 4 * 4) as usize);
    for texel in caustic.chunks_exact(4) {
        assert!((texel[0] - 1.0).abs() < 1e-3, "intensity {}", texel[0]);
    }
}

/// Smooth dome centred between the two middle texels on both axes.
fn dome(amplitude: f32, sigma: f32) -> Vec<f32> {
    let c = (SIZE as f32 - 1.0) / 2.0;
    (0..SIZE)
        .flat_map(|y| {
            (0..SIZE).map(move |x| {
                let r2 = (x as f32 - c).powi(2) + (y as f32 - c).powi(2);
                amplitude * (-r2 / (sigma * sigma)).exp()
            })
        })
        .collect()
}

#[test]
fn test_caustic_dome_focuses_evenly() {
    let Some(ctx) = context() else { return };
    let mut body = test_body();
    // One grid cell per texel
    body.cell_size = 4.0;
    body.liquid.refraction = 0.5;
    let params = body.liquid;

    let pipeline = SurfacePipeline::new(&ctx, &body).unwrap();
    assert!(pipeline.is_ready());
    let surface = dome(6.0, 5.0);
    pipeline.height.seed(&ctx.queue, &surface, &surface).unwrap();

    ctx.submit_tick("Dome Caustic", |encoder| {
        let height = pipeline.height.output_view().unwrap();
        pipeline.normal.render(&ctx.device, encoder, height);
        let normals = pipeline.normal.output_view().unwrap();
        pipeline.caustic.render(&ctx.device, &ctx.queue, encoder, &params, normals);
    });

    let (w, h) = pipeline.caustic.output_size().unwrap();
    assert_eq!((w, h), (SIZE * 4, SIZE * 4));
    let caustic = ctx.read_texture(pipeline.caustic_texture().unwrap()).unwrap();
    let at = |x: u32, y: u32| caustic[((y * w + x) * 4) as usize];
    assert!(caustic.chunks_exact(4).all(|t| t[0].is_finite() && t[0] >= 0.0));

    let (lo, hi) = (w / 2 - 1, w / 2);
    let centre = (at(lo, lo) + at(hi, lo) + at(lo, hi) + at(hi, hi)) / 4.0;
    assert!(centre > 1.3, "dome should focus light at the centre, got {centre}");

    // Profiles through the centre along X and along Y
    let mut profile_diff = 0.0;
    for i in 0..w {
        let along_x = (at(i, lo) + at(i, hi)) / 2.0;
        let along_y = (at(lo, i) + at(hi, i)) / 2.0;
        profile_diff += (along_x - along_y).abs();
    }
    profile_diff /= w as f32;
    assert!(profile_diff < 0.02, "X and Y profiles differ by {profile_diff} on average");

    let mut transpose_diff = 0.0;
    for y in 0..h {
        for x in 0..w {
            transpose_diff += (at(x, y) - at(y, x)).abs();
        }
    }
    transpose_diff /= (w * h) as f32;
    assert!(transpose_diff < 0.01, "caustic is not symmetric under transpose: {transpose_diff}");
}

#[test]
fn test_debug_tap_mirrors_normals() {
    let Some(ctx) = context() else { return };
    let body = test_body();
    let params = body.liquid;

    let tap = Arc::new(ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Normal Debug Tap"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    }));
    // Wrong size: ignored with a warning, pass stays usable
    let bad_tap = Arc::new(create_capture_texture(&ctx.device, SIZE / 2, SIZE / 2));

    let mut config = SurfacePipelineConfig::from_body(&body);
    config.normal.debug_target = Some(tap.clone());
    config.height.debug_target = Some(bad_tap);
    let mut pipeline = SurfacePipeline::with_config(&ctx, params, config).unwrap();
    assert!(pipeline.is_ready());

    let capture = create_capture_texture(&ctx.device, SIZE, SIZE);
    write_capture(&ctx.queue, &capture, &impulse_capture(&params, 50.0)).unwrap();
    for _ in 0..3 {
        pipeline.tick(&ctx, &capture);
    }

    let mirrored = ctx.read_texture(&tap).unwrap();
    let normals = ctx.read_texture(pipeline.normal_texture().unwrap()).unwrap();
    assert_eq!(mirrored, normals);
}

#[test]
fn test_mismatched_pass_resolution_rejected() {
    let Some(ctx) = context() else { return };
    let body = test_body();

    let mut config = SurfacePipelineConfig::from_body(&body);
    config.normal.width = SIZE * 2;
    let result = SurfacePipeline::with_config(&ctx, body.liquid, config);
    assert!(matches!(result, Err(GpuError::InvalidConfig(_))));

    let mut config = SurfacePipelineConfig::from_body(&body);
    config.caustic.height = SIZE / 2;
    assert!(SurfacePipeline::with_config(&ctx, body.liquid, config).is_err());
}

#[test]
fn test_resolution_change_rejected() {
    let Some(ctx) = context() else { return };
    let body = test_body();
    let mut pipeline = SurfacePipeline::new(&ctx, &body).unwrap();

    let resized = LiquidParams {
        depth_texture_width: SIZE * 2,
        ..body.liquid
    };
    assert!(pipeline.set_params(resized).is_err());

    let calmer = LiquidParams {
        viscosity: 0.5,
        ..body.liquid
    };
    assert!(pipeline.set_params(calmer).is_ok());
    assert_eq!(pipeline.params().viscosity, 0.5);
}
