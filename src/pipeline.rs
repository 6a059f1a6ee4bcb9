//! The stage contract every backend implements

use std::fmt;

use crate::error::PipelineResult;
use crate::params::SimulationParameters;

/// Pipeline stage, used to attribute errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Physics,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Physics => write!(f, "physics"),
            Stage::Render => write!(f, "render"),
        }
    }
}

/// Default clear color (transparent black)
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Default particle color (opaque white)
pub const DEFAULT_PARTICLE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// How the render stage draws particles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Edge length of each particle's square footprint, in pixels
    pub point_size: f32,
    pub clear_color: [f32; 4],
    pub particle_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            point_size: 1.0,
            clear_color: DEFAULT_CLEAR_COLOR,
            particle_color: DEFAULT_PARTICLE_COLOR,
        }
    }
}

/// A double-buffered physics + render pipeline.
///
/// The scheduler calls `physics`, `swap`, `render` in that order once per
/// accepted frame. Implementations must ensure `render` never observes the
/// bank `physics` is writing, and that `physics` output is complete before
/// `render` reads it.
pub trait ParticlePipeline {
    /// Integrate every particle from the current bank into the alternate bank
    fn physics(&mut self, params: &SimulationParameters) -> PipelineResult<()>;

    /// Exchange bank roles so the bank just written becomes current
    fn swap(&mut self);

    /// Draw every particle of the current bank
    fn render(&mut self, params: &SimulationParameters) -> PipelineResult<()>;

    /// Number of particle slots per bank
    fn particle_count(&self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_names() {
        assert_eq!(Stage::Physics.to_string(), "physics");
        assert_eq!(Stage::Render.to_string(), "render");
    }

    #[test]
    fn render_settings_default() {
        let settings = RenderSettings::default();
        assert_eq!(settings.point_size, 1.0);
        assert_eq!(settings.clear_color, [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(settings.particle_color, [1.0, 1.0, 1.0, 1.0]);
    }
}
