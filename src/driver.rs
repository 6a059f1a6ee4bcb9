//! Headless display loop and synthetic pointer input
//!
//! Stands in for the host's refresh callback and pointer events: a tokio
//! interval ticks at the display refresh rate and feeds timestamps to a
//! [`FrameScheduler`], while a separate task moves the attractor.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::PipelineResult;
use crate::params::{AttractorCell, Viewport};
use crate::pipeline::ParticlePipeline;
use crate::scheduler::{FrameScheduler, FrameStats};

/// When the display loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopLimits {
    /// Stop after this many accepted frames
    pub frames: Option<u64>,
    /// Stop after this much wall-clock time
    pub duration: Option<Duration>,
}

impl LoopLimits {
    fn reached(&self, stats: &FrameStats, elapsed: Duration) -> bool {
        self.frames.is_some_and(|n| stats.accepted >= n)
            || self.duration.is_some_and(|d| elapsed >= d)
    }
}

/// Deliver refresh callbacks at `refresh_hz` until `limits` is reached.
///
/// Missed ticks are skipped rather than delivered in a burst. With no
/// limit the loop runs until the scheduler fails.
pub async fn run_display_loop<P: ParticlePipeline>(
    scheduler: &mut FrameScheduler<P>,
    refresh_hz: u32,
    limits: LoopLimits,
) -> PipelineResult<FrameStats> {
    let period = Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let start = Instant::now();
    let mut window_start = start;
    let mut window_stats = scheduler.stats();

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let timestamp_ms = now.duration_since(start).as_secs_f64() * 1000.0;
        scheduler.on_refresh(timestamp_ms)?;

        let stats = scheduler.stats();
        if now.duration_since(window_start) >= Duration::from_secs(1) {
            debug!(
                accepted = stats.accepted - window_stats.accepted,
                dropped = stats.dropped - window_stats.dropped,
                "frames in the last second"
            );
            window_start = now;
            window_stats = stats;
        }

        if limits.reached(&stats, now.duration_since(start)) {
            return Ok(stats);
        }
    }
}

/// Point on a circle around the viewport centre after `elapsed`
pub fn orbit_position(viewport: Viewport, elapsed: Duration, period: Duration) -> [f32; 2] {
    let [cx, cy] = viewport.center();
    let radius = 0.35 * viewport.width.min(viewport.height);
    let turns = elapsed.as_secs_f64() / period.as_secs_f64().max(f64::EPSILON);
    let angle = (turns * std::f64::consts::TAU) as f32;
    [cx + radius * angle.cos(), cy + radius * angle.sin()]
}

/// Move the attractor around the viewport centre, one orbit per `period`.
///
/// Runs until the task is aborted. Writes go straight into `cell` without
/// coordinating with the frame loop.
pub async fn orbit_pointer(cell: Arc<AttractorCell>, viewport: Viewport, period: Duration) {
    let mut ticker = tokio::time::interval(Duration::from_millis(4));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let start = Instant::now();

    loop {
        ticker.tick().await;
        let [x, y] = orbit_position(viewport, start.elapsed(), period);
        cell.store(x, y);
    }
}
