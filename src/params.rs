//! Simulation parameters shared between the host and both stages

use std::sync::atomic::{AtomicU32, Ordering};

/// Squared distance below which the attractor exerts no force.
///
/// Keeps the `-g / dist²` term finite when a particle sits on the attractor.
pub const MIN_DISTANCE_SQ: f32 = 400.0;

/// Viewport extent in canvas units. Fixed after startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Centre of the viewport, where the attractor starts
    pub fn center(&self) -> [f32; 2] {
        [self.width / 2.0, self.height / 2.0]
    }
}

/// Everything a physics step reads besides the particle bank.
///
/// The scheduler refreshes `attractor` from the [`AttractorCell`] at the
/// start of every accepted frame; the rest is fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    /// Attractor (pointer) position in viewport coordinates
    pub attractor: [f32; 2],
    /// Gravitational strength
    pub g: f32,
    /// Per-step velocity damping factor
    pub resistance: f32,
    pub viewport: Viewport,
    /// Dead-zone guard, see [`MIN_DISTANCE_SQ`]
    pub min_distance_sq: f32,
}

impl SimulationParameters {
    pub fn new(g: f32, resistance: f32, viewport: Viewport) -> Self {
        Self {
            attractor: viewport.center(),
            g,
            resistance,
            viewport,
            min_distance_sq: MIN_DISTANCE_SQ,
        }
    }

    pub fn with_attractor(mut self, x: f32, y: f32) -> Self {
        self.attractor = [x, y];
        self
    }
}

/// Latest pointer sample, written by an input source and read by the
/// frame loop.
///
/// One writer, one reader, no lock. Each coordinate is a relaxed atomic,
/// so a reader may observe `x` from one sample and `y` from the next.
/// That race is accepted: the pair is only used as a force target and a
/// one-frame-stale or torn read is visually indistinguishable.
#[derive(Debug)]
pub struct AttractorCell {
    x: AtomicU32,
    y: AtomicU32,
}

impl AttractorCell {
    pub fn new(position: [f32; 2]) -> Self {
        Self {
            x: AtomicU32::new(position[0].to_bits()),
            y: AtomicU32::new(position[1].to_bits()),
        }
    }

    /// Overwrite the attractor position
    pub fn store(&self, x: f32, y: f32) {
        self.x.store(x.to_bits(), Ordering::Relaxed);
        self.y.store(y.to_bits(), Ordering::Relaxed);
    }

    /// Read the most recent attractor position
    pub fn load(&self) -> [f32; 2] {
        [
            f32::from_bits(self.x.load(Ordering::Relaxed)),
            f32::from_bits(self.y.load(Ordering::Relaxed)),
        ]
    }
}
