//! Classification of RDEF-style bound-resource records into tracker parameters.

use crate::binding_model::{PipelineKind, ResourceCategory, ShaderStage};
use crate::error::BindingError;
use crate::parameter::ParameterDesc;

// `D3D_SHADER_INPUT_TYPE` values.
pub const D3D_SIT_CBUFFER: u32 = 0;
pub const D3D_SIT_TBUFFER: u32 = 1;
pub const D3D_SIT_TEXTURE: u32 = 2;
pub const D3D_SIT_SAMPLER: u32 = 3;
pub const D3D_SIT_UAV_RWTYPED: u32 = 4;
pub const D3D_SIT_STRUCTURED: u32 = 5;
pub const D3D_SIT_UAV_RWSTRUCTURED: u32 = 6;
pub const D3D_SIT_BYTEADDRESS: u32 = 7;
pub const D3D_SIT_UAV_RWBYTEADDRESS: u32 = 8;
pub const D3D_SIT_UAV_APPEND_STRUCTURED: u32 = 9;
pub const D3D_SIT_UAV_CONSUME_STRUCTURED: u32 = 10;
pub const D3D_SIT_UAV_RWSTRUCTURED_WITH_COUNTER: u32 = 11;
pub const D3D_SIT_RTACCELERATIONSTRUCTURE: u32 = 12;
pub const D3D_SIT_UAV_FEEDBACKTEXTURE: u32 = 13;

/// Register space for a `D3D_SHADER_INPUT_TYPE`, or `None` for types the tracker cannot bind
/// through the D3D11 range setters.
pub fn category_for_input_type(input_type: u32) -> Option<ResourceCategory> {
    match input_type {
        D3D_SIT_CBUFFER => Some(ResourceCategory::ConstantBuffer),
        D3D_SIT_TBUFFER | D3D_SIT_TEXTURE | D3D_SIT_STRUCTURED | D3D_SIT_BYTEADDRESS => {
            Some(ResourceCategory::ShaderResource)
        }
        D3D_SIT_SAMPLER => Some(ResourceCategory::Sampler),
        D3D_SIT_UAV_RWTYPED
        | D3D_SIT_UAV_RWSTRUCTURED
        | D3D_SIT_UAV_RWBYTEADDRESS
        | D3D_SIT_UAV_APPEND_STRUCTURED
        | D3D_SIT_UAV_CONSUME_STRUCTURED
        | D3D_SIT_UAV_RWSTRUCTURED_WITH_COUNTER
        | D3D_SIT_UAV_FEEDBACKTEXTURE => Some(ResourceCategory::UnorderedAccess),
        _ => None,
    }
}

/// One bound resource as reported by shader reflection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub name: String,
    pub input_type: u32,
    pub bind_point: u32,
    pub bind_count: u32,
    /// Constant buffer byte size; ignored for other input types.
    pub size: u32,
}

impl ReflectedBinding {
    pub fn constant_buffer(name: impl Into<String>, bind_point: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            input_type: D3D_SIT_CBUFFER,
            bind_point,
            bind_count: 1,
            size,
        }
    }

    pub fn resource(name: impl Into<String>, input_type: u32, bind_point: u32) -> Self {
        Self {
            name: name.into(),
            input_type,
            bind_point,
            bind_count: 1,
            size: 0,
        }
    }

    pub fn category(&self) -> Result<ResourceCategory, BindingError> {
        category_for_input_type(self.input_type).ok_or_else(|| BindingError::UnsupportedInputType {
            name: self.name.clone(),
            input_type: self.input_type,
        })
    }

    pub fn to_parameter(&self) -> Result<(ResourceCategory, ParameterDesc), BindingError> {
        let category = self.category()?;
        let declared_size = match category {
            ResourceCategory::ConstantBuffer => self.size,
            _ => self.bind_count,
        };
        Ok((
            category,
            ParameterDesc::new(self.name.clone(), self.bind_point, declared_size),
        ))
    }
}

/// Bound resources of one compiled shader stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    pub bindings: Vec<ReflectedBinding>,
}

impl ShaderReflection {
    pub fn new(bindings: Vec<ReflectedBinding>) -> Self {
        Self { bindings }
    }

    pub fn with_binding(mut self, binding: ReflectedBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Split the bindings into per-category parameter lists, indexed by
    /// [`ResourceCategory::index`]. Reflection order is preserved within each list.
    pub fn parameters(&self) -> Result<[Vec<ParameterDesc>; ResourceCategory::COUNT], BindingError> {
        let mut out: [Vec<ParameterDesc>; ResourceCategory::COUNT] = Default::default();
        for binding in &self.bindings {
            let (category, desc) = binding.to_parameter()?;
            out[category.index()].push(desc);
        }
        Ok(out)
    }
}

/// Reflection for every stage of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReflection {
    kind: PipelineKind,
    stages: [Option<ShaderReflection>; ShaderStage::COUNT],
}

impl PipelineReflection {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            stages: Default::default(),
        }
    }

    pub fn graphics() -> Self {
        Self::new(PipelineKind::Graphics)
    }

    pub fn compute(shader: ShaderReflection) -> Self {
        let mut reflection = Self::new(PipelineKind::Compute);
        reflection.stages[ShaderStage::Compute.index()] = Some(shader);
        reflection
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn set_stage(
        &mut self,
        stage: ShaderStage,
        shader: ShaderReflection,
    ) -> Result<&mut Self, BindingError> {
        if !self.kind.contains(stage) {
            return Err(BindingError::StageNotInPipeline {
                kind: self.kind,
                stage,
            });
        }
        self.stages[stage.index()] = Some(shader);
        Ok(self)
    }

    pub fn with_stage(
        mut self,
        stage: ShaderStage,
        shader: ShaderReflection,
    ) -> Result<Self, BindingError> {
        self.set_stage(stage, shader)?;
        Ok(self)
    }

    pub fn stage(&self, stage: ShaderStage) -> Option<&ShaderReflection> {
        self.stages[stage.index()].as_ref()
    }

    /// Stages with reflection data, in native declaration order.
    pub fn stages(&self) -> impl Iterator<Item = (ShaderStage, &ShaderReflection)> {
        ShaderStage::ALL
            .into_iter()
            .filter_map(move |stage| Some((stage, self.stages[stage.index()].as_ref()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_types_map_to_register_spaces() {
        assert_eq!(
            category_for_input_type(D3D_SIT_CBUFFER),
            Some(ResourceCategory::ConstantBuffer)
        );
        for ty in [D3D_SIT_TBUFFER, D3D_SIT_TEXTURE, D3D_SIT_STRUCTURED, D3D_SIT_BYTEADDRESS] {
            assert_eq!(
                category_for_input_type(ty),
                Some(ResourceCategory::ShaderResource)
            );
        }
        assert_eq!(
            category_for_input_type(D3D_SIT_SAMPLER),
            Some(ResourceCategory::Sampler)
        );
        for ty in [4, 6, 8, 9, 10, 11, D3D_SIT_UAV_FEEDBACKTEXTURE] {
            assert_eq!(
                category_for_input_type(ty),
                Some(ResourceCategory::UnorderedAccess)
            );
        }
        assert_eq!(category_for_input_type(D3D_SIT_RTACCELERATIONSTRUCTURE), None);
        assert_eq!(category_for_input_type(99), None);
    }

    #[test]
    fn declared_size_is_bytes_for_cbuffers_and_count_otherwise() {
        let shader = ShaderReflection::default()
            .with_binding(ReflectedBinding::constant_buffer("CameraCB", 0, 256))
            .with_binding(ReflectedBinding {
                name: "Cascades".into(),
                input_type: D3D_SIT_TEXTURE,
                bind_point: 4,
                bind_count: 4,
                size: 0,
            })
            .with_binding(ReflectedBinding::resource("LinearWrap", D3D_SIT_SAMPLER, 1));

        let params = shader.parameters().unwrap();
        assert_eq!(
            params[ResourceCategory::ConstantBuffer.index()],
            vec![ParameterDesc::new("CameraCB", 0, 256)]
        );
        assert_eq!(
            params[ResourceCategory::ShaderResource.index()],
            vec![ParameterDesc::new("Cascades", 4, 4)]
        );
        assert_eq!(
            params[ResourceCategory::Sampler.index()],
            vec![ParameterDesc::new("LinearWrap", 1, 1)]
        );
        assert!(params[ResourceCategory::UnorderedAccess.index()].is_empty());
    }

    #[test]
    fn acceleration_structures_are_rejected() {
        let shader = ShaderReflection::default().with_binding(ReflectedBinding::resource(
            "Scene",
            D3D_SIT_RTACCELERATIONSTRUCTURE,
            0,
        ));
        assert_eq!(
            shader.parameters().unwrap_err(),
            BindingError::UnsupportedInputType {
                name: "Scene".into(),
                input_type: D3D_SIT_RTACCELERATIONSTRUCTURE,
            }
        );
    }

    #[test]
    fn stages_must_belong_to_the_pipeline_kind() {
        let mut graphics = PipelineReflection::graphics();
        graphics
            .set_stage(ShaderStage::Pixel, ShaderReflection::default())
            .unwrap()
            .set_stage(ShaderStage::Vertex, ShaderReflection::default())
            .unwrap();
        let stages: Vec<_> = graphics.stages().map(|(stage, _)| stage).collect();
        assert_eq!(stages, [ShaderStage::Vertex, ShaderStage::Pixel]);

        let err = graphics
            .set_stage(ShaderStage::Compute, ShaderReflection::default())
            .unwrap_err();
        assert_eq!(
            err,
            BindingError::StageNotInPipeline {
                kind: PipelineKind::Graphics,
                stage: ShaderStage::Compute,
            }
        );

        let compute = PipelineReflection::compute(ShaderReflection::default());
        assert!(compute.stage(ShaderStage::Compute).is_some());
        assert!(compute
            .with_stage(ShaderStage::Pixel, ShaderReflection::default())
            .is_err());
    }
}
