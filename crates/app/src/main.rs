//! Headless demo: a simulation thread submits frames, the main thread renders them.
//!
//! Flags: `--frames=N`, `--mesh=<binary mesh file>`, `--data-root=<dir>`,
//! `--timeout-ms=N` (producer stall warning threshold).

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use asset::{IndexData, MeshData, MeshVertex};
use corelib::{Camera, SyncError, Transform, Vec3};
use renderer::{
    AssetHandle, AssetPaths, FrameOutcome, FrameSubmissionPipeline, FrameSubmitter,
    GraphicsDevice, HeadlessDevice, MeshAsset, PipelineConfig, RenderCommand,
};

struct Options {
    frames: u32,
    mesh: Option<PathBuf>,
    data_root: Option<PathBuf>,
    timeout: Duration,
}

fn parse_args() -> Options {
    let mut options = Options {
        frames: 120,
        mesh: None,
        data_root: None,
        timeout: Duration::from_millis(1000),
    };
    for arg in std::env::args().skip(1) {
        if let Some(v) = arg.strip_prefix("--frames=") {
            match v.parse::<u32>() {
                Ok(n) => options.frames = n,
                Err(_) => log::warn!("Invalid --frames value '{}', keeping {}", v, options.frames),
            }
        } else if let Some(v) = arg.strip_prefix("--mesh=") {
            options.mesh = Some(PathBuf::from(v));
        } else if let Some(v) = arg.strip_prefix("--data-root=") {
            options.data_root = Some(PathBuf::from(v));
        } else if let Some(v) = arg.strip_prefix("--timeout-ms=") {
            match v.parse::<u64>() {
                Ok(ms) => options.timeout = Duration::from_millis(ms),
                Err(_) => log::warn!("Invalid --timeout-ms value '{}'", v),
            }
        } else {
            log::warn!("Ignoring unknown argument '{}'", arg);
        }
    }
    options
}

fn cube() -> MeshData {
    let corners: [([f32; 3], [u8; 4]); 8] = [
        // back z=-1
        ([-1.0, -1.0, -1.0], [255, 0, 0, 255]),
        ([1.0, -1.0, -1.0], [0, 255, 0, 255]),
        ([1.0, 1.0, -1.0], [0, 0, 255, 255]),
        ([-1.0, 1.0, -1.0], [255, 255, 0, 255]),
        // front z=+1
        ([-1.0, -1.0, 1.0], [255, 0, 255, 255]),
        ([1.0, -1.0, 1.0], [0, 255, 255, 255]),
        ([1.0, 1.0, 1.0], [255, 255, 255, 255]),
        ([-1.0, 1.0, 1.0], [255, 128, 0, 255]),
    ];
    let vertices = corners
        .iter()
        .map(|&(position, color)| {
            let normal = Vec3::from(position).normalize().to_array();
            MeshVertex::new(position, normal, [0.0, 0.0]).with_color(color)
        })
        .collect();
    #[rustfmt::skip]
    let indices = vec![
        4, 5, 6, 4, 6, 7, // front
        0, 2, 1, 0, 3, 2, // back
        3, 2, 6, 3, 6, 7, // top
        0, 5, 1, 0, 4, 5, // bottom
        0, 3, 7, 0, 7, 4, // left
        1, 2, 6, 1, 6, 5, // right
    ];
    MeshData::new(vertices, IndexData::U16(indices))
}

/// Simulation loop run on its own thread.
fn simulate(submitter: FrameSubmitter, mesh: AssetHandle<MeshAsset>, frames: u32, timeout: Duration) -> Result<()> {
    let camera = Camera::default();
    let mut objects = [
        Transform::from_translation(Vec3::new(-3.0, 0.0, 0.0)),
        Transform::identity(),
        Transform::from_translation(Vec3::new(3.0, 0.0, 0.0)),
    ];
    let start = Instant::now();
    let dt = 1.0 / 60.0;

    for frame in 0..frames {
        loop {
            match submitter.wait_until_can_submit_next(Some(timeout)) {
                Ok(()) => break,
                Err(SyncError::TimedOut) => {
                    log::warn!("Renderer stalled for {:?} before frame {}", timeout, frame);
                }
                Err(SyncError::Closed) => {
                    log::info!("Renderer is gone; stopping simulation at frame {}", frame);
                    return Ok(());
                }
            }
        }

        let simulated = frame as f32 * dt;
        submitter.submit_clear_color([0.1, 0.1, 0.12, 1.0]);
        submitter.submit_elapsed_time(start.elapsed().as_secs_f32(), simulated);
        submitter.submit_camera(
            camera.world_to_camera(),
            camera.camera_to_projected(),
            camera.position_world(),
        );

        let mut commands = Vec::with_capacity(objects.len());
        for (i, object) in objects.iter_mut().enumerate() {
            object.rotate_by(dt, Vec3::new(0.5, 1.0 + i as f32 * 0.25, 0.0));
            commands.push(RenderCommand::new(Some(&mesh), None, object.local_to_world())?);
        }
        submitter.submit_render_commands(commands);
        submitter.signal_all_data_submitted()?;
    }
    log::info!("Simulation submitted {} frames", frames);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args();
    let paths = options
        .data_root
        .as_ref()
        .map(AssetPaths::rooted_at)
        .unwrap_or_default();

    // Nothing inspects the command stream here; recording would grow every frame.
    let headless = Arc::new(HeadlessDevice::with_recording(false));
    let device: Arc<dyn GraphicsDevice> = headless.clone();

    let mesh = match &options.mesh {
        Some(path) => MeshAsset::load(path, &device, &paths)
            .with_context(|| format!("Failed to load mesh {}", path.display()))?,
        None => MeshAsset::from_data(&cube(), &device, &paths)?,
    };
    log::info!(
        "Starting headless renderer: {} frames, {} triangles per draw",
        options.frames,
        mesh.triangle_count()
    );

    let (submitter, mut renderer) = FrameSubmissionPipeline::create(&PipelineConfig::default(), device);
    let producer_mesh = mesh.clone();
    let (frames, timeout) = (options.frames, options.timeout);
    let producer = thread::Builder::new()
        .name("simulation".into())
        .spawn(move || simulate(submitter, producer_mesh, frames, timeout))
        .context("Failed to spawn the simulation thread")?;

    let mut skipped = 0;
    let render_result = loop {
        match renderer.render_frame() {
            Ok(FrameOutcome::Rendered { .. }) => {}
            Ok(FrameOutcome::Skipped) => skipped += 1,
            Ok(FrameOutcome::Disconnected) => break Ok(()),
            Err(err) => {
                log::error!("Render loop aborted: {}", err);
                eprintln!(
                    "The renderer lost synchronization with the simulation and has to exit: {err}"
                );
                break Err(err);
            }
        }
    };

    renderer.shut_down();
    let rendered = renderer.frames_rendered();
    drop(renderer);

    let simulation = producer
        .join()
        .map_err(|_| anyhow!("Simulation thread panicked"))?;
    render_result?;
    simulation?;

    drop(mesh);
    log::info!(
        "Rendered {} frames ({} skipped, {} draw calls); {} resources created, {} still live",
        rendered,
        skipped,
        headless.draw_calls(),
        headless.created_resources(),
        headless.live_resources()
    );
    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
