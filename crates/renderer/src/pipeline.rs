//! Double-buffered frame submission between the simulation and render threads.
//!
//! Two frame records exist. The producer ([`FrameSubmitter`]) writes into the
//! record at `submitting`; the consumer ([`FrameRenderer`]) reads the other
//! one. Two auto-reset events hand the records over:
//!
//! * `data_submitted` starts unsignaled. The producer signals it when the
//!   frame is complete.
//! * `ready_for_next` starts signaled. The renderer signals it right after
//!   swapping roles, which lets the producer start on the next frame while
//!   this one renders.
//!
//! The role swap is a single atomic flip, done only by the renderer between
//! the two events, so the two records never change hands mid-frame. Each
//! record sits behind a mutex that is never contended when both sides follow
//! the handshake; a contended lock is counted and logged as a protocol
//! violation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use corelib::{EngineError, EngineResult, Event, EventState, Mat4, SyncError, Vec3};
use parking_lot::{Mutex, MutexGuard};

use crate::backend::GraphicsDevice;
use crate::command::RenderCommand;
use crate::config::PipelineConfig;
use crate::constants::{DrawCallConstants, FrameConstants};

/// Everything needed to render one frame.
#[derive(Debug)]
pub struct FrameData {
    pub clear_color: [f32; 4],
    pub constants: FrameConstants,
    commands: Vec<RenderCommand>,
}

impl FrameData {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            constants: FrameConstants::default(),
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Release every held command. Returns how many there were.
    fn release_commands(&mut self) -> usize {
        let count = self.commands.len();
        for mut command in self.commands.drain(..) {
            command.clean_up();
        }
        count
    }
}

struct Shared {
    records: [Mutex<FrameData>; 2],
    submitting: AtomicUsize,
    data_submitted: Event,
    ready_for_next: Event,
    max_render_commands: usize,
    conflicts: AtomicUsize,
}

impl Shared {
    fn lock_record(&self, index: usize, role: &str) -> MutexGuard<'_, FrameData> {
        if let Some(guard) = self.records[index].try_lock() {
            return guard;
        }
        self.conflicts.fetch_add(1, Ordering::Relaxed);
        log::error!(
            "Frame record {} is in use by the other thread while {}",
            index,
            role
        );
        self.records[index].lock()
    }
}

/// Outcome of one [`FrameRenderer::render_frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame had no commands: nothing was cleared or presented.
    Skipped,
    Rendered { draws: usize },
    /// The submitter is gone and every frame it signaled has been rendered.
    Disconnected,
}

pub struct FrameSubmissionPipeline;

impl FrameSubmissionPipeline {
    /// Allocate both frame records and split the pipeline into its two ends.
    pub fn create(
        config: &PipelineConfig,
        device: Arc<dyn GraphicsDevice>,
    ) -> (FrameSubmitter, FrameRenderer) {
        let capacity = config.max_render_commands;
        let shared = Arc::new(Shared {
            records: [
                Mutex::new(FrameData::with_capacity(capacity)),
                Mutex::new(FrameData::with_capacity(capacity)),
            ],
            submitting: AtomicUsize::new(0),
            data_submitted: Event::new(EventState::Unsignaled),
            ready_for_next: Event::new(EventState::Signaled),
            max_render_commands: capacity,
            conflicts: AtomicUsize::new(0),
        });
        log::debug!("Frame pipeline created ({} commands per frame)", capacity);
        (
            FrameSubmitter {
                shared: Arc::clone(&shared),
            },
            FrameRenderer {
                shared,
                device,
                frames_rendered: 0,
            },
        )
    }
}

/// Producer end. Only the simulation thread uses it.
pub struct FrameSubmitter {
    shared: Arc<Shared>,
}

impl FrameSubmitter {
    fn with_record<R>(&self, f: impl FnOnce(&mut FrameData) -> R) -> R {
        let index = self.shared.submitting.load(Ordering::Acquire);
        let mut record = self.shared.lock_record(index, "submitting");
        f(&mut record)
    }

    pub fn submit_clear_color(&self, rgba: [f32; 4]) {
        self.with_record(|frame| frame.clear_color = rgba);
    }

    pub fn submit_elapsed_time(&self, system_seconds: f32, simulation_seconds: f32) {
        self.with_record(|frame| {
            frame.constants.elapsed_seconds_system = system_seconds;
            frame.constants.elapsed_seconds_simulation = simulation_seconds;
        });
    }

    pub fn submit_camera(&self, world_to_camera: Mat4, camera_to_projected: Mat4, position: Vec3) {
        self.with_record(|frame| {
            frame.constants.world_to_camera = world_to_camera.to_cols_array_2d();
            frame.constants.camera_to_projected = camera_to_projected.to_cols_array_2d();
            frame.constants.camera_position = position.to_array();
        });
    }

    /// Append commands to this frame. Commands past the per-frame capacity
    /// are dropped, releasing their references. Returns how many were kept.
    pub fn submit_render_commands(&self, commands: impl IntoIterator<Item = RenderCommand>) -> usize {
        let limit = self.shared.max_render_commands;
        self.with_record(|frame| {
            let mut accepted = 0;
            let mut dropped = 0;
            for command in commands {
                if frame.commands.len() < limit {
                    frame.commands.push(command);
                    accepted += 1;
                } else {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                log::warn!(
                    "Frame is full ({} commands); dropped {} submissions",
                    limit,
                    dropped
                );
            }
            accepted
        })
    }

    /// Hand the current record to the renderer. The producer must not write
    /// again until [`wait_until_can_submit_next`](Self::wait_until_can_submit_next)
    /// returns.
    pub fn signal_all_data_submitted(&self) -> EngineResult<()> {
        self.shared.data_submitted.signal().map_err(|source| {
            log::error!("Failed to signal that frame data was submitted: {}", source);
            EngineError::Sync {
                during: "signaling that frame data was submitted",
                source,
            }
        })
    }

    /// Block until the renderer has taken the last frame. `None` waits forever.
    ///
    /// `TimedOut` means the renderer is stalled; `Closed` means it is gone.
    pub fn wait_until_can_submit_next(&self, timeout: Option<Duration>) -> Result<(), SyncError> {
        self.shared.ready_for_next.wait(timeout)
    }

    pub fn max_render_commands(&self) -> usize {
        self.shared.max_render_commands
    }
}

impl Drop for FrameSubmitter {
    fn drop(&mut self) {
        self.shared.data_submitted.close();
    }
}

/// Consumer end. Only the render thread uses it.
pub struct FrameRenderer {
    shared: Arc<Shared>,
    device: Arc<dyn GraphicsDevice>,
    frames_rendered: u64,
}

impl FrameRenderer {
    /// Wait for a submitted frame, take it over and draw it.
    ///
    /// Any error is a synchronization failure that must end the render loop.
    pub fn render_frame(&mut self) -> EngineResult<FrameOutcome> {
        match self.shared.data_submitted.wait(None) {
            Ok(()) => {}
            Err(SyncError::Closed) => {
                log::info!("Frame submitter disconnected");
                return Ok(FrameOutcome::Disconnected);
            }
            Err(source) => {
                log::error!("Waiting for submitted frame data failed: {}", source);
                return Err(EngineError::Sync {
                    during: "waiting for submitted frame data",
                    source,
                });
            }
        }

        let rendering = self.shared.submitting.fetch_xor(1, Ordering::AcqRel);
        if let Err(source) = self.shared.ready_for_next.signal() {
            log::error!("Failed to signal that a new frame can be submitted: {}", source);
            return Err(EngineError::Sync {
                during: "signaling that a new frame can be submitted",
                source,
            });
        }

        let mut frame = self.shared.lock_record(rendering, "rendering");
        if frame.commands.is_empty() {
            return Ok(FrameOutcome::Skipped);
        }

        self.device.update_frame_constants(&frame.constants);
        self.device.clear(frame.clear_color);

        let mut draws = 0;
        for mut command in frame.commands.drain(..) {
            self.device
                .update_draw_constants(&DrawCallConstants::new(command.transform));
            command.draw();
            command.clean_up();
            draws += 1;
        }

        self.device.present();
        self.frames_rendered += 1;
        log::trace!("Rendered frame {} ({} draws)", self.frames_rendered, draws);
        Ok(FrameOutcome::Rendered { draws })
    }

    /// Release every command still held by either record.
    pub fn shut_down(&mut self) {
        let mut released = 0;
        for index in 0..2 {
            released += self.shared.lock_record(index, "shutting down").release_commands();
        }
        if released > 0 {
            log::info!("Released {} unrendered render commands at shutdown", released);
        }
    }

    /// Frames actually drawn, not counting skipped ones.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Times either thread found a record it should own in use by the other.
    pub fn conflicts(&self) -> usize {
        self.shared.conflicts.load(Ordering::Relaxed)
    }
}

impl Drop for FrameRenderer {
    fn drop(&mut self) {
        self.shut_down();
        self.shared.ready_for_next.close();
        self.shared.data_submitted.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceCommand, HeadlessDevice};
    use crate::config::AssetPaths;
    use crate::handle::AssetHandle;
    use crate::mesh::MeshAsset;
    use asset::{IndexData, MeshData, MeshVertex};

    fn setup(capacity: usize) -> (Arc<HeadlessDevice>, FrameSubmitter, FrameRenderer, AssetHandle<MeshAsset>) {
        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn GraphicsDevice> = headless.clone();
        let data = MeshData::new(vec![MeshVertex::default(); 3], IndexData::U16(vec![0, 1, 2]));
        let mesh = MeshAsset::from_data(&data, &device, &AssetPaths::default()).expect("mesh");
        let config = PipelineConfig {
            max_render_commands: capacity,
        };
        let (submitter, renderer) = FrameSubmissionPipeline::create(&config, device);
        (headless, submitter, renderer, mesh)
    }

    fn commands(mesh: &AssetHandle<MeshAsset>, n: usize) -> Vec<RenderCommand> {
        (0..n)
            .map(|_| RenderCommand::new(Some(mesh), None, Mat4::IDENTITY).expect("command"))
            .collect()
    }

    #[test]
    fn rendered_commands_release_their_references() {
        let (headless, submitter, mut renderer, mesh) = setup(16);
        assert_eq!(mesh.reference_count(), 1);

        assert_eq!(submitter.submit_render_commands(commands(&mesh, 3)), 3);
        assert_eq!(mesh.reference_count(), 4);
        submitter.signal_all_data_submitted().expect("signal");

        assert_eq!(
            renderer.render_frame().expect("render"),
            FrameOutcome::Rendered { draws: 3 }
        );
        assert_eq!(mesh.reference_count(), 1);
        assert!(renderer.shared.records.iter().all(|r| r.lock().commands().is_empty()));

        let stream = headless.drain_commands();
        assert!(matches!(stream.first(), Some(DeviceCommand::FrameConstants(_))));
        assert!(matches!(stream.get(1), Some(DeviceCommand::Clear(_))));
        assert_eq!(stream.last(), Some(&DeviceCommand::Present));
        assert_eq!(
            stream.iter().filter(|c| matches!(c, DeviceCommand::Draw { .. })).count(),
            3
        );
    }

    #[test]
    fn empty_frame_is_skipped_without_clear_or_present() {
        let (headless, submitter, mut renderer, _mesh) = setup(4);
        submitter.submit_clear_color([1.0, 0.0, 0.0, 1.0]);
        submitter.signal_all_data_submitted().expect("signal");
        assert_eq!(renderer.render_frame().expect("render"), FrameOutcome::Skipped);
        assert!(headless.drain_commands().is_empty());
        assert_eq!(renderer.frames_rendered(), 0);
    }

    #[test]
    fn zero_timeout_wait_before_render_times_out() {
        let (_headless, submitter, mut renderer, _mesh) = setup(4);
        // Initially signaled: the first frame may start right away.
        submitter
            .wait_until_can_submit_next(Some(Duration::ZERO))
            .expect("initial permit");
        submitter.signal_all_data_submitted().expect("signal");
        assert_eq!(
            submitter.wait_until_can_submit_next(Some(Duration::ZERO)),
            Err(SyncError::TimedOut)
        );

        renderer.render_frame().expect("render");
        submitter
            .wait_until_can_submit_next(Some(Duration::ZERO))
            .expect("permit after render");
    }

    #[test]
    fn submissions_past_capacity_are_dropped() {
        let (_headless, submitter, mut renderer, mesh) = setup(2);
        assert_eq!(submitter.submit_render_commands(commands(&mesh, 5)), 2);
        assert_eq!(mesh.reference_count(), 3);
        submitter.signal_all_data_submitted().expect("signal");
        assert_eq!(
            renderer.render_frame().expect("render"),
            FrameOutcome::Rendered { draws: 2 }
        );
        assert_eq!(mesh.reference_count(), 1);
    }

    #[test]
    fn shut_down_releases_unrendered_commands() {
        let (_headless, submitter, mut renderer, mesh) = setup(8);
        submitter.submit_render_commands(commands(&mesh, 4));
        assert_eq!(mesh.reference_count(), 5);
        renderer.shut_down();
        assert_eq!(mesh.reference_count(), 1);
    }

    #[test]
    fn dropped_submitter_disconnects_after_pending_frame() {
        let (_headless, submitter, mut renderer, mesh) = setup(8);
        submitter.submit_render_commands(commands(&mesh, 1));
        submitter.signal_all_data_submitted().expect("signal");
        drop(submitter);

        assert_eq!(
            renderer.render_frame().expect("render"),
            FrameOutcome::Rendered { draws: 1 }
        );
        assert_eq!(
            renderer.render_frame().expect("render"),
            FrameOutcome::Disconnected
        );
    }

    #[test]
    fn signal_after_renderer_is_gone_is_a_sync_error() {
        let (_headless, submitter, renderer, _mesh) = setup(8);
        drop(renderer);
        let err = submitter.signal_all_data_submitted().unwrap_err();
        assert!(matches!(
            err,
            EngineError::Sync {
                source: SyncError::Closed,
                ..
            }
        ));
        assert!(err.is_fatal());
        // The initial permit is still pending; after it the event reports closed.
        submitter
            .wait_until_can_submit_next(Some(Duration::ZERO))
            .expect("pending permit");
        assert_eq!(
            submitter.wait_until_can_submit_next(Some(Duration::ZERO)),
            Err(SyncError::Closed)
        );
    }

    #[test]
    fn long_session_on_a_quiet_device_keeps_no_command_log() {
        let headless = Arc::new(HeadlessDevice::with_recording(false));
        let device: Arc<dyn GraphicsDevice> = headless.clone();
        let data = MeshData::new(vec![MeshVertex::default(); 3], IndexData::U16(vec![0, 1, 2]));
        let mesh = MeshAsset::from_data(&data, &device, &AssetPaths::default()).expect("mesh");
        let (submitter, mut renderer) = FrameSubmissionPipeline::create(&PipelineConfig::default(), device);

        for _ in 0..1_000 {
            submitter
                .wait_until_can_submit_next(Some(Duration::from_secs(1)))
                .expect("ready");
            submitter.submit_render_commands(commands(&mesh, 3));
            submitter.signal_all_data_submitted().expect("signal");
            assert_eq!(
                renderer.render_frame().expect("render"),
                FrameOutcome::Rendered { draws: 3 }
            );
        }
        assert_eq!(renderer.frames_rendered(), 1_000);
        assert_eq!(headless.draw_calls(), 3_000);
        assert!(headless.drain_commands().is_empty());
        assert_eq!(mesh.reference_count(), 1);
    }
}
