//! Impulse ripple, headless
//!
//! Drops a single impulse into the centre of a resting surface and logs how the
//! ripple spreads and decays, alongside the CPU reference.
//!
//! Run with: cargo run --release --example impulse_ripple [body.json]

use std::path::Path;
use std::time::Instant;

use caustic::gpu::surface::{create_capture_texture, write_capture, SurfacePipeline};
use caustic::SimulationContext;
use liquid::{BodyConfig, LiquidParams, SurfaceSimulation};

const IMPULSE: f32 = 50.0;
const TICKS: u32 = 240;
const REPORT_EVERY: u32 = 30;
const SETTLED: f32 = 1e-3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let body = match std::env::args().nth(1) {
        Some(path) => BodyConfig::load_json(Path::new(&path))?,
        None => BodyConfig {
            liquid: LiquidParams {
                velocity: 0.5,
                viscosity: 0.15,
                ..LiquidParams::default()
            },
            ..BodyConfig::default()
        },
    };
    let params = body.liquid;
    let (width, height) = (params.depth_texture_width, params.depth_texture_height);

    println!("=== Impulse Ripple ===");
    println!(
        "Grid: {}x{}, velocity {}, viscosity {}, attenuation {}",
        width, height, params.velocity, params.viscosity, params.attenuation_coefficient
    );

    let ctx = SimulationContext::new_blocking()?;
    let mut pipeline = SurfacePipeline::new(&ctx, &body)?;
    if !pipeline.is_ready() {
        return Err("surface pipeline failed to initialize".into());
    }
    let mut reference = SurfaceSimulation::new(params);

    let texels = (width * height) as usize;
    let empty = vec![body.body_depth; texels];
    let mut impulse = empty.clone();
    impulse[(height / 2 * width + width / 2) as usize] = body.body_depth - IMPULSE / params.force_factor;

    let c = *reference.coefficients();
    println!(
        "k1 {:.6}  k2 {:.6}  k3 {:.6}  maxT {:.6}  decay/tick {:.4}",
        c.k1,
        c.k2,
        c.k3,
        c.stability_bound(),
        c.decay_per_tick()
    );

    let capture = create_capture_texture(&ctx.device, width, height);
    let start = Instant::now();

    for tick in 0..TICKS {
        let raw = if tick == 0 { &impulse } else { &empty };
        write_capture(&ctx.queue, &capture, raw)?;
        pipeline.tick(&ctx, &capture);
        reference.step(&reference.forcing_from_capture(raw, 0.0, body.body_depth));

        if (tick + 1) % REPORT_EVERY == 0 {
            let gpu = ctx.read_texture(pipeline.height_texture().ok_or("height pass not ready")?)?;
            let gpu_peak = gpu.iter().fold(0.0f32, |m, h| m.max(h.abs()));
            let cpu_peak = reference.max_abs_height();
            let drift = gpu
                .iter()
                .zip(reference.current())
                .fold(0.0f32, |m, (g, c)| m.max((g - c).abs()));

            log::info!("tick {}: gpu peak {:.5}, cpu peak {:.5}, max drift {:.2e}", tick + 1, gpu_peak, cpu_peak, drift);
            println!(
                "tick {:4}  peak {:9.5}  cpu {:9.5}  drift {:.2e}{}",
                tick + 1,
                gpu_peak,
                cpu_peak,
                drift,
                if gpu_peak < SETTLED { "  (settled)" } else { "" }
            );
        }
    }

    ctx.wait_idle();
    let elapsed = start.elapsed();
    println!(
        "{} ticks in {:.2?} ({:.3} ms/tick)",
        TICKS,
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / TICKS as f64
    );

    let caustic = ctx.read_texture(pipeline.caustic_texture().ok_or("caustic pass not ready")?)?;
    let (min, max) = caustic
        .chunks_exact(4)
        .fold((f32::MAX, f32::MIN), |(lo, hi), t| (lo.min(t[0]), hi.max(t[0])));
    println!("caustic intensity range: {:.4} .. {:.4}", min, max);

    if let Some(settle) = c.ticks_to_settle(IMPULSE, SETTLED) {
        println!("estimated settle time: {} ticks", settle);
    }
    Ok(())
}
