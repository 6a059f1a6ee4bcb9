//! Ping-pong particle pipeline on the graphics device
//!
//! Both banks live in device memory and never come back to the host. Each
//! frame the physics kernel reads bank `k` and writes bank `1 - k` through
//! a prebuilt bind group; the render pass then reads the freshly written
//! bank as a per-instance vertex buffer. Queue submission order is the
//! barrier between the two: the render submission starts only after the
//! compute writes it depends on are visible.

use std::sync::Arc;

use rand::Rng;
use tracing::info;
use wgpu::util::DeviceExt;

use crate::error::{PipelineError, PipelineResult};
use crate::gpu::binder::{
    GpuBank, PipelineBinder, StageBindings, group_for, vertex_attributes, vertex_buffer_layouts,
};
use crate::gpu::device::{capture, create_device};
use crate::gpu::shaders::{
    FRAGMENT_ENTRY, KernelSources, PHYSICS_ENTRY, VERTEX_ENTRY, VERTICES_PER_PARTICLE,
};
use crate::gpu::types::{BANK_ELEMENT_SIZE, FrameUniforms, WORKGROUP_SIZE};
use crate::params::{SimulationParameters, Viewport};
use crate::pipeline::{ParticlePipeline, RenderSettings, Stage};
use crate::store::{BankSet, seed_positions};

/// Color format of the offscreen target and of any host surface
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Particle pipeline running on a wgpu device
pub struct GpuPipeline {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    // Particle state
    banks: BankSet<GpuBank>,
    uniform_buffer: wgpu::Buffer,

    // Physics stage
    physics_pipeline: wgpu::ComputePipeline,
    physics_groups: Vec<wgpu::BindGroup>,

    // Render stage
    render_pipeline: wgpu::RenderPipeline,
    render_groups: Vec<wgpu::BindGroup>,
    render_bindings: StageBindings,

    // Offscreen target
    target: wgpu::Texture,
    target_size: (u32, u32),
    staging_buffer: wgpu::Buffer,

    settings: RenderSettings,
    particle_count: u32,
}

impl GpuPipeline {
    /// Acquire a device and seed `count` random particles over the viewport
    pub fn new<R: Rng>(
        count: u32,
        viewport: Viewport,
        settings: RenderSettings,
        kernels: &KernelSources,
        rng: &mut R,
    ) -> PipelineResult<Self> {
        let (device, queue) = create_device()?;
        Self::with_device(device, queue, count, viewport, settings, kernels, rng)
    }

    /// Seed `count` random particles on an existing device
    pub fn with_device<R: Rng>(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        count: u32,
        viewport: Viewport,
        settings: RenderSettings,
        kernels: &KernelSources,
        rng: &mut R,
    ) -> PipelineResult<Self> {
        check_capacity(&device, count)?;
        let positions = seed_positions(count, viewport, rng)?;
        Self::with_positions(device, queue, &positions, viewport, settings, kernels)
    }

    /// Build a pipeline whose banks both start at `positions` with zero velocity
    pub fn with_positions(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        positions: &[[f32; 2]],
        viewport: Viewport,
        settings: RenderSettings,
        kernels: &KernelSources,
    ) -> PipelineResult<Self> {
        let particle_count = u32::try_from(positions.len()).map_err(|_| {
            PipelineError::Allocation {
                count: u32::MAX,
                reason: "particle count exceeds u32".to_string(),
            }
        })?;
        check_capacity(&device, particle_count)?;

        let (banks, err) = capture(&device, || {
            BankSet::new(
                create_bank(&device, positions, 0),
                create_bank(&device, positions, 1),
            )
        });
        if let Some(err) = err {
            return Err(PipelineError::Allocation {
                count: particle_count,
                reason: err.to_string(),
            });
        }

        let params = SimulationParameters::new(0.0, 1.0, viewport);
        let uniforms = FrameUniforms::new(&params, &settings, particle_count);
        let (uniform_buffer, err) = capture(&device, || {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Frame Uniform Buffer"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        });
        if let Some(err) = err {
            return Err(PipelineError::Allocation {
                count: particle_count,
                reason: format!("uniform buffer: {}", err),
            });
        }

        let physics_module = compile(&device, Stage::Physics, "Physics Kernel", &kernels.physics)?;
        let render_module = compile(&device, Stage::Render, "Render Kernel", &kernels.render)?;

        let physics_bindings = StageBindings::physics();
        let render_bindings = StageBindings::render();
        let binder = PipelineBinder::new(&device, &banks, &uniform_buffer);

        let physics_layout = binder.layout(&physics_bindings)?;
        let render_layout = binder.layout(&render_bindings)?;
        let physics_groups = binder.bind_groups(&physics_bindings, &physics_layout);
        let render_groups = binder.bind_groups(&render_bindings, &render_layout);

        let (physics_pipeline, err) = capture(&device, || {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Physics Pipeline Layout"),
                bind_group_layouts: &[&physics_layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Physics Pipeline"),
                layout: Some(&layout),
                module: &physics_module,
                entry_point: Some(PHYSICS_ENTRY),
                compilation_options: Default::default(),
                cache: None,
            })
        });
        if let Some(err) = err {
            return Err(PipelineError::KernelCompile {
                stage: Stage::Physics,
                message: err.to_string(),
            });
        }

        let attributes = vertex_attributes(&render_bindings);
        let vertex_layouts = vertex_buffer_layouts(&attributes);
        let (render_pipeline, err) = capture(&device, || {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&render_layout],
                push_constant_ranges: &[],
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Render Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &render_module,
                    entry_point: Some(VERTEX_ENTRY),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &vertex_layouts,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &render_module,
                    entry_point: Some(FRAGMENT_ENTRY),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            })
        });
        if let Some(err) = err {
            return Err(PipelineError::KernelCompile {
                stage: Stage::Render,
                message: err.to_string(),
            });
        }

        let target_size = (
            (viewport.width.ceil() as u32).max(1),
            (viewport.height.ceil() as u32).max(1),
        );
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = (target_size.0 * 4).div_ceil(align) * align;
        let ((target, staging_buffer), err) = capture(&device, || {
            let target = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Particle Target"),
                size: wgpu::Extent3d {
                    width: target_size.0,
                    height: target_size.1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Pixel Staging Buffer"),
                size: padded_bytes_per_row as u64 * target_size.1 as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            (target, staging_buffer)
        });
        if let Some(err) = err {
            return Err(PipelineError::Allocation {
                count: particle_count,
                reason: format!("render target: {}", err),
            });
        }

        info!(
            particles = particle_count,
            width = viewport.width,
            height = viewport.height,
            "GPU pipeline ready"
        );

        Ok(Self {
            device,
            queue,
            banks,
            uniform_buffer,
            physics_pipeline,
            physics_groups,
            render_pipeline,
            render_groups,
            render_bindings,
            target,
            target_size,
            staging_buffer,
            settings,
            particle_count,
        })
    }

    /// Render the current bank into a host-owned view (e.g. a surface texture).
    ///
    /// The view must use [`TARGET_FORMAT`].
    pub fn render_to(
        &mut self,
        view: &wgpu::TextureView,
        params: &SimulationParameters,
    ) -> PipelineResult<()> {
        self.write_uniforms(params);
        let parity = self.banks.current_index();
        let binder = PipelineBinder::new(&self.device, &self.banks, &self.uniform_buffer);
        let vertex_buffers = binder.vertex_buffers(&self.render_bindings, parity);
        let clear = self.settings.clear_color;

        let ((), err) = capture(&self.device, || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Particle Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: clear[0] as f64,
                                g: clear[1] as f64,
                                b: clear[2] as f64,
                                a: clear[3] as f64,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                if self.particle_count > 0 {
                    pass.set_pipeline(&self.render_pipeline);
                    pass.set_bind_group(0, group_for(&self.render_groups, parity), &[]);
                    for (slot, buffer) in vertex_buffers.iter().enumerate() {
                        pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                    }
                    pass.draw(0..VERTICES_PER_PARTICLE, 0..self.particle_count);
                }
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        });

        device_result(Stage::Render, err)
    }

    /// Read back the offscreen image as tightly packed RGBA bytes.
    ///
    /// Blocks until the device has finished every submitted frame.
    pub fn read_pixels(&self) -> PipelineResult<Vec<u8>> {
        let (width, height) = self.target_size;
        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| readback_error(e.to_string()))?
            .map_err(|e| readback_error(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let start = (y * padded_bytes_per_row) as usize;
            let end = start + unpadded_bytes_per_row as usize;
            pixels.extend_from_slice(&data[start..end]);
        }
        drop(data);
        self.staging_buffer.unmap();

        Ok(pixels)
    }

    /// Size of the offscreen target in pixels
    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    fn write_uniforms(&self, params: &SimulationParameters) {
        let uniforms = FrameUniforms::new(params, &self.settings, self.particle_count);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }
}

impl ParticlePipeline for GpuPipeline {
    fn physics(&mut self, params: &SimulationParameters) -> PipelineResult<()> {
        if self.particle_count == 0 {
            return Ok(());
        }
        self.write_uniforms(params);
        let bind_group = group_for(&self.physics_groups, self.banks.current_index());

        let ((), err) = capture(&self.device, || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Physics Encoder"),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Physics Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.physics_pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.dispatch_workgroups(self.particle_count.div_ceil(WORKGROUP_SIZE), 1, 1);
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        });

        device_result(Stage::Physics, err)
    }

    fn swap(&mut self) {
        self.banks.swap();
    }

    fn render(&mut self, params: &SimulationParameters) -> PipelineResult<()> {
        let view = self
            .target
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render_to(&view, params)
    }

    fn particle_count(&self) -> u32 {
        self.particle_count
    }
}

fn create_bank(device: &wgpu::Device, positions: &[[f32; 2]], index: usize) -> GpuBank {
    let (positions_label, velocities_label) = match index {
        0 => ("Bank 0 Positions", "Bank 0 Velocities"),
        _ => ("Bank 1 Positions", "Bank 1 Velocities"),
    };

    if positions.is_empty() {
        let empty = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: 16,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        return GpuBank {
            positions: empty(positions_label),
            velocities: empty(velocities_label),
        };
    }

    let velocities = vec![[0.0f32; 2]; positions.len()];
    GpuBank {
        positions: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(positions_label),
            contents: bytemuck::cast_slice(positions),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST,
        }),
        velocities: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(velocities_label),
            contents: bytemuck::cast_slice(&velocities),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        }),
    }
}

fn check_capacity(device: &wgpu::Device, count: u32) -> PipelineResult<()> {
    let limits = device.limits();
    let bytes = count as u64 * BANK_ELEMENT_SIZE;

    if bytes > limits.max_storage_buffer_binding_size as u64 || bytes > limits.max_buffer_size {
        return Err(PipelineError::Allocation {
            count,
            reason: format!("{} bytes per bank array exceeds device limits", bytes),
        });
    }
    if count.div_ceil(WORKGROUP_SIZE) > limits.max_compute_workgroups_per_dimension {
        return Err(PipelineError::Allocation {
            count,
            reason: "too many workgroups for one dispatch".to_string(),
        });
    }
    Ok(())
}

fn compile(
    device: &wgpu::Device,
    stage: Stage,
    label: &str,
    source: &str,
) -> PipelineResult<wgpu::ShaderModule> {
    let (module, err) = capture(device, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    });
    match err {
        Some(err) => Err(PipelineError::KernelCompile {
            stage,
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}

fn device_result(stage: Stage, err: Option<wgpu::Error>) -> PipelineResult<()> {
    match err {
        Some(err) => Err(PipelineError::DeviceExecution {
            stage,
            message: err.to_string(),
        }),
        None => Ok(()),
    }
}

fn readback_error(message: String) -> PipelineError {
    PipelineError::DeviceExecution {
        stage: Stage::Render,
        message: format!("pixel readback failed: {}", message),
    }
}
