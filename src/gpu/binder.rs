//! Declarative binding of kernel inputs to particle banks
//!
//! A [`StageBindings`] lists what a kernel reads and writes by role
//! (source bank, destination bank, shared parameters) instead of by
//! buffer. [`PipelineBinder`] resolves those roles against a concrete
//! [`BankSet`] once per parity, so the frame loop only picks a prebuilt
//! bind group by the current bank index.

use std::collections::HashSet;

use crate::error::{PipelineError, PipelineResult};
use crate::gpu::types::BANK_ELEMENT_SIZE;
use crate::pipeline::Stage;
use crate::store::BankSet;

/// One attribute array of a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BankField {
    Positions,
    Velocities,
}

impl BankField {
    pub const ALL: [BankField; 2] = [BankField::Positions, BankField::Velocities];
}

/// What a binding slot is connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Read-only view of the bank the stage reads
    Source(BankField),
    /// Writable view of the bank the physics stage fills
    Destination(BankField),
    /// The shared per-frame uniform block
    Parameters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingDecl {
    pub binding: u32,
    pub resource: Resource,
}

/// Per-instance vertex input fed from the source bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexDecl {
    pub location: u32,
    pub field: BankField,
}

/// Everything one stage's kernel is connected to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageBindings {
    pub stage: Stage,
    pub bindings: Vec<BindingDecl>,
    pub vertex_inputs: Vec<VertexDecl>,
}

impl StageBindings {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            bindings: Vec::new(),
            vertex_inputs: Vec::new(),
        }
    }

    /// Connect binding slot `binding` to `resource`
    pub fn bind(mut self, binding: u32, resource: Resource) -> Self {
        self.bindings.push(BindingDecl { binding, resource });
        self
    }

    /// Feed shader location `location` from a source bank field
    pub fn vertex_input(mut self, location: u32, field: BankField) -> Self {
        self.vertex_inputs.push(VertexDecl { location, field });
        self
    }

    /// Bindings of the built-in physics kernel
    pub fn physics() -> Self {
        Self::new(Stage::Physics)
            .bind(0, Resource::Source(BankField::Positions))
            .bind(1, Resource::Source(BankField::Velocities))
            .bind(2, Resource::Destination(BankField::Positions))
            .bind(3, Resource::Destination(BankField::Velocities))
            .bind(4, Resource::Parameters)
    }

    /// Bindings of the built-in render kernel
    pub fn render() -> Self {
        Self::new(Stage::Render)
            .bind(0, Resource::Parameters)
            .vertex_input(0, BankField::Positions)
    }

    /// Check the description is consistent with the double-buffer rules
    pub fn validate(&self) -> PipelineResult<()> {
        let mut slots = HashSet::new();
        for decl in &self.bindings {
            if !slots.insert(decl.binding) {
                return Err(self.invalid(format!("binding {} declared twice", decl.binding)));
            }
        }

        let mut locations = HashSet::new();
        for input in &self.vertex_inputs {
            if !locations.insert(input.location) {
                return Err(self.invalid(format!(
                    "vertex location {} declared twice",
                    input.location
                )));
            }
        }

        let written: HashSet<BankField> = self
            .bindings
            .iter()
            .filter_map(|decl| match decl.resource {
                Resource::Destination(field) => Some(field),
                _ => None,
            })
            .collect();

        match self.stage {
            Stage::Render => {
                if !written.is_empty() {
                    return Err(self.invalid("render stage cannot write a bank".to_string()));
                }
            }
            Stage::Physics => {
                if !self.vertex_inputs.is_empty() {
                    return Err(self.invalid("physics stage has no vertex inputs".to_string()));
                }
                // A field left unwritten would go stale once the banks swap
                if let Some(missing) = BankField::ALL.iter().find(|f| !written.contains(*f)) {
                    return Err(self.invalid(format!(
                        "destination {:?} is never written",
                        missing
                    )));
                }
            }
        }

        Ok(())
    }

    /// True when any binding refers to a bank, so the bound buffers
    /// change with parity
    pub fn binds_bank_storage(&self) -> bool {
        self.bindings
            .iter()
            .any(|decl| !matches!(decl.resource, Resource::Parameters))
    }

    fn invalid(&self, message: String) -> PipelineError {
        PipelineError::Binding {
            stage: self.stage,
            message,
        }
    }

    fn visibility(&self) -> wgpu::ShaderStages {
        match self.stage {
            Stage::Physics => wgpu::ShaderStages::COMPUTE,
            Stage::Render => wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        }
    }
}

/// Device storage of one bank
pub struct GpuBank {
    pub positions: wgpu::Buffer,
    pub velocities: wgpu::Buffer,
}

impl GpuBank {
    pub fn field(&self, field: BankField) -> &wgpu::Buffer {
        match field {
            BankField::Positions => &self.positions,
            BankField::Velocities => &self.velocities,
        }
    }
}

/// Resolves [`StageBindings`] into wgpu layouts and bind groups
pub struct PipelineBinder<'a> {
    device: &'a wgpu::Device,
    banks: &'a BankSet<GpuBank>,
    parameters: &'a wgpu::Buffer,
}

impl<'a> PipelineBinder<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        banks: &'a BankSet<GpuBank>,
        parameters: &'a wgpu::Buffer,
    ) -> Self {
        Self {
            device,
            banks,
            parameters,
        }
    }

    /// Validate `decl` and build its bind group layout
    pub fn layout(&self, decl: &StageBindings) -> PipelineResult<wgpu::BindGroupLayout> {
        decl.validate()?;

        let entries: Vec<wgpu::BindGroupLayoutEntry> = decl
            .bindings
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.binding,
                visibility: decl.visibility(),
                ty: wgpu::BindingType::Buffer {
                    ty: match b.resource {
                        Resource::Source(_) => wgpu::BufferBindingType::Storage { read_only: true },
                        Resource::Destination(_) => {
                            wgpu::BufferBindingType::Storage { read_only: false }
                        }
                        Resource::Parameters => wgpu::BufferBindingType::Uniform,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        Ok(self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(match decl.stage {
                    Stage::Physics => "Physics Bind Group Layout",
                    Stage::Render => "Render Bind Group Layout",
                }),
                entries: &entries,
            }))
    }

    /// Bind groups indexed by parity: group `k` reads bank `k` and writes
    /// bank `1 - k`. A stage that binds no bank storage gets a single group
    /// shared by both parities; look groups up with [`group_for`].
    pub fn bind_groups(
        &self,
        decl: &StageBindings,
        layout: &wgpu::BindGroupLayout,
    ) -> Vec<wgpu::BindGroup> {
        let parities: &[usize] = if decl.binds_bank_storage() {
            &[0, 1]
        } else {
            &[0]
        };
        parities
            .iter()
            .map(|&parity| {
                let source = self.banks.bank(parity);
                let destination = self.banks.bank(1 - parity);

                let entries: Vec<wgpu::BindGroupEntry> = decl
                    .bindings
                    .iter()
                    .map(|b| wgpu::BindGroupEntry {
                        binding: b.binding,
                        resource: match b.resource {
                            Resource::Source(field) => source.field(field).as_entire_binding(),
                            Resource::Destination(field) => {
                                destination.field(field).as_entire_binding()
                            }
                            Resource::Parameters => self.parameters.as_entire_binding(),
                        },
                    })
                    .collect();

                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(match (decl.stage, parity) {
                        (Stage::Physics, 0) => "Physics Bind Group (bank 0 -> 1)",
                        (Stage::Physics, _) => "Physics Bind Group (bank 1 -> 0)",
                        (Stage::Render, _) => "Render Bind Group",
                    }),
                    layout,
                    entries: &entries,
                })
            })
            .collect()
    }

    /// Vertex buffers to set for `parity`, in slot order
    pub fn vertex_buffers(&self, decl: &StageBindings, parity: usize) -> Vec<&'a wgpu::Buffer> {
        let source = self.banks.bank(parity);
        decl.vertex_inputs
            .iter()
            .map(|input| source.field(input.field))
            .collect()
    }
}

/// Bind group to use at `parity` from the output of
/// [`PipelineBinder::bind_groups`]
pub fn group_for(groups: &[wgpu::BindGroup], parity: usize) -> &wgpu::BindGroup {
    &groups[parity.min(groups.len() - 1)]
}

/// One `Float32x2` attribute per vertex input, in slot order
pub fn vertex_attributes(decl: &StageBindings) -> Vec<wgpu::VertexAttribute> {
    decl.vertex_inputs
        .iter()
        .map(|input| wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: input.location,
        })
        .collect()
}

/// Per-instance buffer layouts for attributes from [`vertex_attributes`]
pub fn vertex_buffer_layouts(
    attributes: &[wgpu::VertexAttribute],
) -> Vec<wgpu::VertexBufferLayout<'_>> {
    attributes
        .iter()
        .map(|attribute| wgpu::VertexBufferLayout {
            array_stride: BANK_ELEMENT_SIZE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: std::slice::from_ref(attribute),
        })
        .collect()
}
