use thiserror::Error;

use crate::binding_model::{PipelineKind, ResourceCategory, ShaderStage};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("{stage} stage declares no {category} parameter named `{name}`")]
    ParameterNotFound {
        stage: ShaderStage,
        category: ResourceCategory,
        name: String,
    },
    #[error("`{name}` expects {expected} bytes but got {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("write to `{name}` out of bounds (size {size}, write end {write_end})")]
    WriteOutOfBounds {
        name: String,
        size: usize,
        write_end: usize,
    },
    #[error(
        "{stage} {category} `{name}` is bound at register {}{slot} but only {max} slots exist",
        .category.register_prefix()
    )]
    SlotOutOfRange {
        stage: ShaderStage,
        category: ResourceCategory,
        name: String,
        slot: u32,
        max: u32,
    },
    #[error("`{name}` has unsupported shader input type {input_type}")]
    UnsupportedInputType { name: String, input_type: u32 },
    #[error("{stage} stage declares {category} `{name}` more than once")]
    DuplicateParameter {
        stage: ShaderStage,
        category: ResourceCategory,
        name: String,
    },
    #[error("`{name}` is a {actual}, expected a {expected}")]
    CategoryMismatch {
        name: String,
        expected: ResourceCategory,
        actual: ResourceCategory,
    },
    #[error("{kind} pipelines have no {stage} stage")]
    StageNotInPipeline {
        kind: PipelineKind,
        stage: ShaderStage,
    },
}
