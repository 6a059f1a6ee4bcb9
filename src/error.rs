//! Error taxonomy for the particle pipeline
//!
//! Initialization errors abort startup before the frame loop begins.
//! Device execution errors are fatal to the frame loop: the scheduler
//! surfaces them once and refuses every later frame. Configuration
//! problems are never errors; they fall back to defaults in
//! [`crate::config`].

use thiserror::Error;

use crate::pipeline::Stage;

/// Errors raised while building or driving the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No graphics adapter could be found
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    /// The adapter refused to create a device
    #[error("failed to create GPU device: {0}")]
    Device(String),

    /// Particle banks could not be allocated
    #[error("cannot allocate {count} particles: {reason}")]
    Allocation { count: u32, reason: String },

    /// A stage kernel failed to compile or link
    #[error("{stage} kernel failed to compile: {message}")]
    KernelCompile { stage: Stage, message: String },

    /// A stage binding description is inconsistent
    #[error("invalid {stage} bindings: {message}")]
    Binding { stage: Stage, message: String },

    /// A stage invocation failed on the device
    #[error("{stage} stage failed on the device: {message}")]
    DeviceExecution { stage: Stage, message: String },

    /// The frame loop was stopped by an earlier device error
    #[error("frame loop halted after a device error")]
    Halted,

    /// A configuration or kernel file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid YAML
    #[error("invalid configuration file: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl PipelineError {
    /// True for errors that abort startup before any frame is issued
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            Self::NoAdapter
                | Self::Device(_)
                | Self::Allocation { .. }
                | Self::KernelCompile { .. }
                | Self::Binding { .. }
                | Self::Io(_)
                | Self::Config(_)
        )
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_compile_message_names_stage() {
        let err = PipelineError::KernelCompile {
            stage: Stage::Physics,
            message: "unknown identifier `velocty`".to_string(),
        };
        insta::assert_snapshot!(err.to_string(), @"physics kernel failed to compile: unknown identifier `velocty`");
    }

    #[test]
    fn device_execution_message_names_stage() {
        let err = PipelineError::DeviceExecution {
            stage: Stage::Render,
            message: "device lost".to_string(),
        };
        insta::assert_snapshot!(err.to_string(), @"render stage failed on the device: device lost");
    }

    #[test]
    fn classifies_initialization_errors() {
        assert!(PipelineError::NoAdapter.is_initialization());
        assert!(
            PipelineError::Allocation {
                count: 10,
                reason: "too large".into()
            }
            .is_initialization()
        );
        assert!(!PipelineError::Halted.is_initialization());
        assert!(
            !PipelineError::DeviceExecution {
                stage: Stage::Physics,
                message: String::new()
            }
            .is_initialization()
        );
    }
}
