//! Frame scheduler
//!
//! Turns display-refresh callbacks into accepted frames. A callback is
//! accepted when at least `1000 / fps` milliseconds have passed since the
//! last accepted one; otherwise it is dropped. Dropped frames are never
//! made up later.
//!
//! An accepted frame runs physics, swaps bank roles, then renders the bank
//! physics just wrote.

use std::num::NonZeroU32;
use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{PipelineError, PipelineResult};
use crate::params::{AttractorCell, SimulationParameters};
use crate::pipeline::ParticlePipeline;

/// Scheduler state between callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next refresh callback
    Idle,
    /// Running one physics + render cycle
    Stepping,
}

/// What a refresh callback did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The throttle passed and a frame was executed
    Stepped,
    /// Too soon since the last accepted frame
    Dropped,
}

/// Counters over the lifetime of a scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub accepted: u64,
    pub dropped: u64,
}

impl FrameStats {
    pub fn callbacks(&self) -> u64 {
        self.accepted + self.dropped
    }
}

/// Drives a [`ParticlePipeline`] from display-refresh callbacks
pub struct FrameScheduler<P> {
    pipeline: P,
    params: SimulationParameters,
    attractor: Arc<AttractorCell>,
    interval_ms: f64,
    last_step_ms: f64,
    state: SchedulerState,
    stats: FrameStats,
    halted: bool,
}

impl<P: ParticlePipeline> FrameScheduler<P> {
    /// Create a scheduler capped at `fps` accepted frames per second.
    ///
    /// `attractor` is the cell an input source writes; it is sampled at
    /// the start of each accepted frame.
    pub fn new(
        pipeline: P,
        params: SimulationParameters,
        attractor: Arc<AttractorCell>,
        fps: NonZeroU32,
    ) -> Self {
        Self {
            pipeline,
            params,
            attractor,
            interval_ms: 1000.0 / fps.get() as f64,
            last_step_ms: 0.0,
            state: SchedulerState::Idle,
            stats: FrameStats::default(),
            halted: false,
        }
    }

    /// Handle one display-refresh callback at `timestamp_ms`.
    ///
    /// After a device error the scheduler is halted and every later call
    /// returns [`PipelineError::Halted`].
    pub fn on_refresh(&mut self, timestamp_ms: f64) -> PipelineResult<FrameOutcome> {
        if self.halted {
            return Err(PipelineError::Halted);
        }

        if timestamp_ms < self.last_step_ms + self.interval_ms {
            self.stats.dropped += 1;
            return Ok(FrameOutcome::Dropped);
        }

        self.state = SchedulerState::Stepping;
        let result = self.step();
        self.state = SchedulerState::Idle;

        match result {
            Ok(()) => {
                self.last_step_ms = timestamp_ms;
                self.stats.accepted += 1;
                Ok(FrameOutcome::Stepped)
            }
            Err(err) => {
                error!(error = %err, "frame failed, halting scheduler");
                self.halted = true;
                Err(err)
            }
        }
    }

    fn step(&mut self) -> PipelineResult<()> {
        self.params.attractor = self.attractor.load();
        self.pipeline.physics(&self.params)?;
        self.pipeline.swap();
        self.pipeline.render(&self.params)?;
        debug!(
            frame = self.stats.accepted + 1,
            attractor = ?self.params.attractor,
            "frame stepped"
        );
        Ok(())
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Parameters used by the most recent frame
    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.pipeline
    }

    /// Stop issuing frames and hand back the pipeline
    pub fn into_pipeline(self) -> P {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Viewport;
    use crate::pipeline::Stage;

    /// Records every stage call in order
    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
        attractors: Vec<[f32; 2]>,
        fail_render_on: Option<usize>,
    }

    impl ParticlePipeline for Recorder {
        fn physics(&mut self, params: &SimulationParameters) -> PipelineResult<()> {
            self.calls.push("physics");
            self.attractors.push(params.attractor);
            Ok(())
        }

        fn swap(&mut self) {
            self.calls.push("swap");
        }

        fn render(&mut self, _params: &SimulationParameters) -> PipelineResult<()> {
            self.calls.push("render");
            let renders = self.calls.iter().filter(|c| **c == "render").count();
            if self.fail_render_on == Some(renders) {
                return Err(PipelineError::DeviceExecution {
                    stage: Stage::Render,
                    message: "lost".into(),
                });
            }
            Ok(())
        }

        fn particle_count(&self) -> u32 {
            0
        }
    }

    fn scheduler(fps: u32) -> (FrameScheduler<Recorder>, Arc<AttractorCell>) {
        let viewport = Viewport::new(800.0, 600.0);
        let cell = Arc::new(AttractorCell::new(viewport.center()));
        let params = SimulationParameters::new(9.0, 0.99, viewport);
        (
            FrameScheduler::new(
                Recorder::default(),
                params,
                Arc::clone(&cell),
                NonZeroU32::new(fps).unwrap(),
            ),
            cell,
        )
    }

    #[test]
    fn accepted_frame_runs_physics_swap_render() {
        let (mut scheduler, _) = scheduler(60);
        assert_eq!(scheduler.on_refresh(100.0).unwrap(), FrameOutcome::Stepped);
        assert_eq!(scheduler.pipeline().calls, ["physics", "swap", "render"]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn callbacks_inside_interval_are_dropped() {
        let (mut scheduler, _) = scheduler(50); // 20ms
        assert_eq!(scheduler.on_refresh(20.0).unwrap(), FrameOutcome::Stepped);
        assert_eq!(scheduler.on_refresh(30.0).unwrap(), FrameOutcome::Dropped);
        assert_eq!(scheduler.on_refresh(39.9).unwrap(), FrameOutcome::Dropped);
        assert_eq!(scheduler.on_refresh(40.0).unwrap(), FrameOutcome::Stepped);
        assert_eq!(
            scheduler.stats(),
            FrameStats {
                accepted: 2,
                dropped: 2
            }
        );
    }

    #[test]
    fn first_callback_is_throttled_from_time_zero() {
        let (mut scheduler, _) = scheduler(60);
        assert_eq!(scheduler.on_refresh(0.0).unwrap(), FrameOutcome::Dropped);
        assert_eq!(scheduler.on_refresh(16.0).unwrap(), FrameOutcome::Dropped);
        assert_eq!(scheduler.on_refresh(17.0).unwrap(), FrameOutcome::Stepped);
    }

    #[test]
    fn lowest_frame_rate_still_steps() {
        let (mut scheduler, _) = scheduler(1);
        assert_eq!(scheduler.on_refresh(999.0).unwrap(), FrameOutcome::Dropped);
        assert_eq!(scheduler.on_refresh(1000.0).unwrap(), FrameOutcome::Stepped);
        assert_eq!(scheduler.on_refresh(1999.0).unwrap(), FrameOutcome::Dropped);
        assert_eq!(scheduler.on_refresh(2000.0).unwrap(), FrameOutcome::Stepped);
    }

    #[test]
    fn missed_frames_are_not_made_up() {
        let (mut scheduler, _) = scheduler(60);
        assert_eq!(scheduler.on_refresh(1000.0).unwrap(), FrameOutcome::Stepped);
        // A long stall is followed by exactly one frame, not a burst
        assert_eq!(scheduler.on_refresh(5000.0).unwrap(), FrameOutcome::Stepped);
        assert_eq!(scheduler.on_refresh(5001.0).unwrap(), FrameOutcome::Dropped);
        assert_eq!(scheduler.stats().accepted, 2);
    }

    #[test]
    fn step_count_is_bounded_by_frame_rate() {
        for fps in [24u32, 30, 60, 144] {
            let interval = 1000.0 / fps as f64;
            for callback_ms in [1.0, 4.0, 6.94, 8.33, interval * 0.99] {
                let (mut scheduler, _) = scheduler(fps);
                let window_ms = 2000.0;
                let mut t = 0.0;
                while t <= window_ms {
                    scheduler.on_refresh(t).unwrap();
                    t += callback_ms;
                }
                let bound = (window_ms / interval).ceil() as u64 + 1;
                assert!(
                    scheduler.stats().accepted <= bound,
                    "fps {} callback {}ms: {} steps > {}",
                    fps,
                    callback_ms,
                    scheduler.stats().accepted,
                    bound
                );
            }
        }
    }

    #[test]
    fn samples_latest_attractor_each_frame() {
        let (mut scheduler, cell) = scheduler(60);
        scheduler.on_refresh(100.0).unwrap();
        cell.store(10.0, 20.0);
        scheduler.on_refresh(110.0).unwrap(); // dropped, not sampled
        cell.store(30.0, 40.0);
        scheduler.on_refresh(200.0).unwrap();

        assert_eq!(
            scheduler.pipeline().attractors,
            [[400.0, 300.0], [30.0, 40.0]]
        );
        assert_eq!(scheduler.params().attractor, [30.0, 40.0]);
    }

    #[test]
    fn device_error_halts_scheduler() {
        let (mut scheduler, _) = scheduler(60);
        scheduler.pipeline_mut().fail_render_on = Some(2);

        assert!(scheduler.on_refresh(100.0).is_ok());
        let err = scheduler.on_refresh(200.0).unwrap_err();
        assert!(matches!(err, PipelineError::DeviceExecution { .. }));
        assert!(scheduler.is_halted());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        assert!(matches!(
            scheduler.on_refresh(300.0),
            Err(PipelineError::Halted)
        ));
        assert_eq!(scheduler.stats().accepted, 1);
        // Nothing runs after the halt
        assert_eq!(scheduler.pipeline().calls.len(), 6);
    }
}
