//! Per-lane physics shared by every backend
//!
//! [`advance`] is the reference semantics of the physics stage: the CPU
//! backend runs it directly on each lane, and the WGSL kernel in
//! `gpu::shaders` is a line-for-line port of it.

use crate::params::SimulationParameters;

/// One particle slot: position and velocity in viewport units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Particle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
}

impl Particle {
    /// A particle at rest at the given position
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: [x, y],
            velocity: [0.0, 0.0],
        }
    }

    pub fn with_velocity(mut self, vx: f32, vy: f32) -> Self {
        self.velocity = [vx, vy];
        self
    }
}

/// Integrate one particle by one step.
///
/// Damping is applied before the attractor force is accumulated, then the
/// new velocity moves the particle, then the position wraps toroidally.
pub fn advance(particle: Particle, params: &SimulationParameters) -> Particle {
    let dx = particle.position[0] - params.attractor[0];
    let dy = particle.position[1] - params.attractor[1];
    let dist_sq = dx * dx + dy * dy;

    let force = if dist_sq >= params.min_distance_sq {
        -params.g / dist_sq
    } else {
        0.0
    };

    let vx = particle.velocity[0] * params.resistance + dx * force;
    let vy = particle.velocity[1] * params.resistance + dy * force;

    Particle {
        position: [
            wrap(particle.position[0] + vx, params.viewport.width),
            wrap(particle.position[1] + vy, params.viewport.height),
        ],
        velocity: [vx, vy],
    }
}

/// Single-step toroidal wrap into `[0, extent)`.
///
/// Only one extent is added or subtracted, so a coordinate that moved more
/// than a full extent in one step stays out of range.
pub fn wrap(coord: f32, extent: f32) -> f32 {
    if coord >= extent {
        coord - extent
    } else if coord < 0.0 {
        let wrapped = coord + extent;
        // Tiny negatives round up to exactly `extent`
        if wrapped >= extent { 0.0 } else { wrapped }
    } else {
        coord
    }
}
