use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pointswarm::driver::{LoopLimits, orbit_pointer, run_display_loop};
use pointswarm::{
    AttractorCell, CpuPipeline, DeviceClass, FrameScheduler, FrameStats, ParticlePipeline,
    RawConfig, RenderSettings, SimConfig, SimulationParameters, Viewport,
};

mod cli;

use cli::{Args, Backend};

/// Time for the synthetic pointer to circle the viewport once
const ORBIT_PERIOD: Duration = Duration::from_secs(4);

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pointswarm=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<SimConfig> {
    let file = match &args.config {
        Some(path) => RawConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RawConfig::default(),
    };
    let device = if args.mobile {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    };
    Ok(file.merge(args.raw_config()).resolve(device))
}

async fn run<P: ParticlePipeline>(
    pipeline: P,
    config: &SimConfig,
    viewport: Viewport,
    args: &Args,
) -> anyhow::Result<FrameStats> {
    let params = SimulationParameters::new(config.g, config.resistance, viewport);
    let attractor = Arc::new(AttractorCell::new(params.attractor));
    let pointer = tokio::spawn(orbit_pointer(
        Arc::clone(&attractor),
        viewport,
        ORBIT_PERIOD,
    ));

    let mut scheduler = FrameScheduler::new(pipeline, params, attractor, config.frame_rate());
    let limits = LoopLimits {
        frames: args.frames,
        duration: args.seconds.map(Duration::from_secs_f64),
    };
    let finished = tokio::select! {
        result = run_display_loop(&mut scheduler, args.refresh_hz, limits) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    pointer.abort();

    match finished {
        Some(result) => result.context("frame loop stopped"),
        None => {
            info!("interrupted, stopping frame loop");
            Ok(scheduler.stats())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let config = load_config(&args)?;
    let viewport = Viewport::new(args.width, args.height);
    let settings = RenderSettings {
        point_size: args.point_size,
        ..RenderSettings::default()
    };

    info!(
        backend = ?args.backend,
        particles = config.particle_count,
        fps = config.fps,
        width = viewport.width,
        height = viewport.height,
        "starting pointswarm"
    );
    println!(
        "pointswarm: {} particles at {} fps (g={}, resistance={})",
        config.particle_count, config.fps, config.g, config.resistance
    );

    let mut rng = rand::thread_rng();
    let stats = match args.backend {
        Backend::Cpu => {
            let pipeline = CpuPipeline::new(config.particle_count, viewport, settings, &mut rng)
                .context("failed to initialize CPU pipeline")?;
            run(pipeline, &config, viewport, &args).await?
        }
        #[cfg(feature = "gpu")]
        Backend::Gpu => {
            use pointswarm::gpu::{GpuPipeline, KernelSources};

            let kernels = KernelSources::from_files(
                args.physics_kernel.as_deref(),
                args.render_kernel.as_deref(),
            )
            .context("failed to load kernel sources")?;
            let pipeline =
                GpuPipeline::new(config.particle_count, viewport, settings, &kernels, &mut rng)
                    .context("failed to initialize GPU pipeline")?;
            run(pipeline, &config, viewport, &args).await?
        }
        #[cfg(not(feature = "gpu"))]
        Backend::Gpu => {
            anyhow::bail!("built without the `gpu` feature; use --backend cpu")
        }
    };

    println!(
        "Rendered {} frames ({} dropped)",
        stats.accepted, stats.dropped
    );
    Ok(())
}
