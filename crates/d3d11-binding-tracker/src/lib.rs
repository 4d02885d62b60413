//! Shader resource binding tracker for D3D11 pipelines.
//!
//! A compiled pipeline's reflected parameters are turned into per-(stage, category) parameter
//! tables. Callers set resources by name; the tracker keeps a slot array per table plus the
//! maximal runs of occupied slots, so committing a draw costs one native range call per run:
//!
//! - [`ParameterTable`]: fixed-capacity name to slot lookup
//! - [`SlotRanges`]: incrementally coalesced occupied runs
//! - [`DescriptorRange`]: slot array, UAV initial counts and ranges for one table
//! - [`ResourceBindingList`]: every stage and category of one pipeline
//! - [`GlobalResourceRegistry`]: process-wide named resources pushed into every attached list
//!
//! The native device context is abstracted by [`BindingContext`]; [`CallRecorder`] captures the
//! calls instead of issuing them.

#![forbid(unsafe_code)]

mod binder;
mod binding_list;
mod binding_model;
mod config;
mod descriptor_range;
mod error;
mod handle;
mod parameter;
mod ranges;
pub mod recording;
pub mod reflection;
mod registry;
mod staging;

pub use binder::{bind_ranges, unbind_ranges, BindingContext, KEEP_UAV_COUNTER};
pub use binding_list::ResourceBindingList;
pub use binding_model::{
    PipelineKind, ResourceCategory, ShaderStage, StageMask, D3D11_1_MAX_UAV_SLOTS,
    D3D11_MAX_CONSTANT_BUFFER_SLOTS, D3D11_MAX_SAMPLER_SLOTS, D3D11_MAX_SHADER_RESOURCE_SLOTS,
    D3D11_MAX_UAV_SLOTS, MAX_SLOTS_PER_CATEGORY,
};
pub use config::{TrackerConfig, UAV_SLOTS_11_1_ENV, VALIDATE_RANGES_ENV};
pub use descriptor_range::{BindingValue, DescriptorRange};
pub use error::BindingError;
pub use handle::ResourceHandle;
pub use parameter::{name_hash, Parameter, ParameterDesc, ParameterTable};
pub use ranges::{SlotRange, SlotRanges};
pub use recording::{BindCall, CallRecorder};
pub use reflection::{PipelineReflection, ReflectedBinding, ShaderReflection};
pub use registry::{
    GlobalResourceChange, GlobalResourceEntry, GlobalResourceListener, GlobalResourceRegistry,
};
pub use staging::ConstantStaging;
