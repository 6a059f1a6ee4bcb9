//! WGSL kernels for the physics and render stages
//!
//! The built-in kernels are assembled from a shared uniform block and one
//! body per stage. A host can replace either kernel with its own text
//! (see [`KernelSources::from_files`]); a replacement must keep the entry
//! point names and the binding layout declared in `gpu::binder`.

use std::path::Path;

use crate::error::PipelineResult;

/// Compute entry point of the physics kernel
pub const PHYSICS_ENTRY: &str = "advance";

/// Vertex entry point of the render kernel
pub const VERTEX_ENTRY: &str = "vs_point";

/// Fragment entry point of the render kernel
pub const FRAGMENT_ENTRY: &str = "fs_point";

/// Uniform block shared by both kernels
pub const FRAME_UNIFORMS: &str = r#"
struct FrameUniforms {
    attractor: vec2<f32>,
    viewport: vec2<f32>,
    g: f32,
    resistance: f32,
    min_distance_sq: f32,
    particle_count: u32,
    point_size: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
    particle_color: vec4<f32>,
}
"#;

/// Physics kernel: reads the source bank, writes the destination bank.
///
/// One invocation per particle; each lane touches only its own slot.
pub const PHYSICS_KERNEL: &str = r#"
@group(0) @binding(0) var<storage, read> src_positions: array<vec2<f32>>;
@group(0) @binding(1) var<storage, read> src_velocities: array<vec2<f32>>;
@group(0) @binding(2) var<storage, read_write> dst_positions: array<vec2<f32>>;
@group(0) @binding(3) var<storage, read_write> dst_velocities: array<vec2<f32>>;
@group(0) @binding(4) var<uniform> uniforms: FrameUniforms;

fn wrap(coord: f32, extent: f32) -> f32 {
    if (coord >= extent) {
        return coord - extent;
    }
    if (coord < 0.0) {
        let wrapped = coord + extent;
        // Tiny negatives round up to exactly `extent`
        if (wrapped >= extent) {
            return 0.0;
        }
        return wrapped;
    }
    return coord;
}

@compute @workgroup_size(256)
fn advance(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let i = global_id.x;
    if (i >= uniforms.particle_count) {
        return;
    }

    let position = src_positions[i];
    let delta = position - uniforms.attractor;
    let dist_sq = delta.x * delta.x + delta.y * delta.y;

    // No force inside the dead zone around the attractor
    var force = 0.0;
    if (dist_sq >= uniforms.min_distance_sq) {
        force = -uniforms.g / dist_sq;
    }

    let velocity = src_velocities[i] * uniforms.resistance + delta * force;
    let moved = position + velocity;

    dst_positions[i] = vec2<f32>(
        wrap(moved.x, uniforms.viewport.x),
        wrap(moved.y, uniforms.viewport.y),
    );
    dst_velocities[i] = velocity;
}
"#;

/// Render kernel: one instanced square per particle, read-only over the bank
pub const RENDER_KERNEL: &str = r#"
@group(0) @binding(0) var<uniform> uniforms: FrameUniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
}

@vertex
fn vs_point(
    @builtin(vertex_index) corner: u32,
    @location(0) position: vec2<f32>,
) -> VertexOutput {
    var offsets = array<vec2<f32>, 6>(
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, -0.5),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, 0.5),
    );

    let pixel = position + offsets[corner] * uniforms.point_size;

    // Viewport pixels (y down) to clip space (y up)
    let ndc = vec2<f32>(
        pixel.x / uniforms.viewport.x * 2.0 - 1.0,
        1.0 - pixel.y / uniforms.viewport.y * 2.0,
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(ndc, 0.0, 1.0);
    return out;
}

@fragment
fn fs_point() -> @location(0) vec4<f32> {
    return uniforms.particle_color;
}
"#;

/// Vertices per particle quad (two triangles)
pub const VERTICES_PER_PARTICLE: u32 = 6;

/// Complete kernel sources for both stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSources {
    pub physics: String,
    pub render: String,
}

impl KernelSources {
    /// The built-in kernels
    pub fn builtin() -> Self {
        Self {
            physics: format!("{}{}", FRAME_UNIFORMS, PHYSICS_KERNEL),
            render: format!("{}{}", FRAME_UNIFORMS, RENDER_KERNEL),
        }
    }

    /// Built-in kernels with either stage replaced by a file's contents
    pub fn from_files(physics: Option<&Path>, render: Option<&Path>) -> PipelineResult<Self> {
        let mut sources = Self::builtin();
        if let Some(path) = physics {
            sources.physics = std::fs::read_to_string(path)?;
        }
        if let Some(path) = render {
            sources.render = std::fs::read_to_string(path)?;
        }
        Ok(sources)
    }
}

impl Default for KernelSources {
    fn default() -> Self {
        Self::builtin()
    }
}
