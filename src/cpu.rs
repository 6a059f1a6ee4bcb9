//! Host-side backend
//!
//! Runs the physics stage as a rayon parallel map over particle index and
//! rasterizes the render stage into an RGBA8 framebuffer. Lanes never
//! share mutable state: each one reads its slot of the source bank and
//! writes its slot of the destination bank. The rayon join at the end of
//! the map is the barrier between the write phase and the render read.

use rand::Rng;
use rayon::prelude::*;

use crate::error::PipelineResult;
use crate::params::{SimulationParameters, Viewport};
use crate::particle::{Particle, advance};
use crate::pipeline::{ParticlePipeline, RenderSettings};
use crate::store::{BankSet, ParticleBank};

/// RGBA8 image the CPU render stage draws into
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA value at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Number of pixels that differ from `background`
    pub fn count_not(&self, background: [u8; 4]) -> usize {
        self.pixels
            .chunks_exact(4)
            .filter(|px| *px != background)
            .count()
    }

    fn clear(&mut self, color: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }

    fn set(&mut self, index: usize, color: [u8; 4]) {
        self.pixels[index * 4..index * 4 + 4].copy_from_slice(&color);
    }
}

/// Double-buffered pipeline running entirely in host memory
pub struct CpuPipeline {
    banks: BankSet<ParticleBank>,
    settings: RenderSettings,
    framebuffer: Framebuffer,
}

impl CpuPipeline {
    /// Seed `count` particles over the viewport and allocate the framebuffer
    pub fn new<R: Rng>(
        count: u32,
        viewport: Viewport,
        settings: RenderSettings,
        rng: &mut R,
    ) -> PipelineResult<Self> {
        let banks = BankSet::initialize(count, viewport, rng)?;
        Ok(Self::from_banks(banks, viewport, settings))
    }

    /// Build a pipeline over existing banks
    pub fn from_banks(
        banks: BankSet<ParticleBank>,
        viewport: Viewport,
        settings: RenderSettings,
    ) -> Self {
        let framebuffer = Framebuffer::new(
            viewport.width.ceil().max(0.0) as u32,
            viewport.height.ceil().max(0.0) as u32,
        );
        Self {
            banks,
            settings,
            framebuffer,
        }
    }

    pub fn banks(&self) -> &BankSet<ParticleBank> {
        &self.banks
    }

    /// Image produced by the last render
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }
}

impl ParticlePipeline for CpuPipeline {
    fn physics(&mut self, params: &SimulationParameters) -> PipelineResult<()> {
        let (source, destination) = self.banks.roles_mut();
        destination
            .positions
            .par_iter_mut()
            .zip(destination.velocities.par_iter_mut())
            .zip(source.positions.par_iter().zip(source.velocities.par_iter()))
            .for_each(|((position, velocity), (p, v))| {
                let next = advance(
                    Particle {
                        position: *p,
                        velocity: *v,
                    },
                    params,
                );
                *position = next.position;
                *velocity = next.velocity;
            });
        Ok(())
    }

    fn swap(&mut self) {
        self.banks.swap();
    }

    fn render(&mut self, _params: &SimulationParameters) -> PipelineResult<()> {
        let width = self.framebuffer.width as i64;
        let height = self.framebuffer.height as i64;
        let size = self.settings.point_size.max(1.0);
        let half = size / 2.0;

        // Collect covered pixel indices in parallel, then write them in one pass
        let covered: Vec<usize> = self
            .banks
            .current()
            .positions
            .par_iter()
            .flat_map_iter(|[x, y]| {
                let x0 = (x - half).round() as i64;
                let y0 = (y - half).round() as i64;
                let side = size.round() as i64;
                // Clip the footprint before iterating it
                let columns = x0.max(0)..x0.saturating_add(side).min(width);
                let rows = y0.max(0)..y0.saturating_add(side).min(height);
                rows.flat_map(move |py| {
                    columns.clone().map(move |px| (py * width + px) as usize)
                })
            })
            .collect();

        self.framebuffer.clear(to_rgba8(self.settings.clear_color));
        let color = to_rgba8(self.settings.particle_color);
        for index in covered {
            self.framebuffer.set(index, color);
        }
        Ok(())
    }

    fn particle_count(&self) -> u32 {
        self.banks.current().len() as u32
    }
}

fn to_rgba8(color: [f32; 4]) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}
