//! Shader stages, resource categories, and the D3D11 register-space limits that reflected
//! bindings are validated against.
//!
//! D3D11 exposes four independent register spaces per shader stage:
//! - `b#` = constant buffers
//! - `t#` = shader resource views (textures and buffers)
//! - `u#` = unordered access views
//! - `s#` = sampler states
//!
//! Each (stage, space) pair is tracked on its own; a slot index is only meaningful together with
//! the stage and category it was reflected for.

use std::fmt;

use bitflags::bitflags;

/// D3D10/11 exposes 14 constant buffer slots per shader stage (`b0..b13`).
pub const D3D11_MAX_CONSTANT_BUFFER_SLOTS: u32 = 14;

/// D3D11 exposes 128 shader resource view slots per shader stage (`t0..t127`).
///
/// This matches `D3D11_COMMONSHADER_INPUT_RESOURCE_SLOT_COUNT`.
pub const D3D11_MAX_SHADER_RESOURCE_SLOTS: u32 = 128;

/// D3D11 exposes 16 sampler slots per shader stage (`s0..s15`).
pub const D3D11_MAX_SAMPLER_SLOTS: u32 = 16;

/// D3D11.0 exposes 8 UAV slots (`u0..u7`), matching `D3D11_PS_CS_UAV_REGISTER_COUNT`.
pub const D3D11_MAX_UAV_SLOTS: u32 = 8;

/// D3D11.1 raises the UAV register count to 64 (`D3D11_1_UAV_SLOT_COUNT`).
pub const D3D11_1_MAX_UAV_SLOTS: u32 = 64;

/// Largest slot count of any register space. Null scratch buffers used for unbinding are sized to
/// this.
pub const MAX_SLOTS_PER_CATEGORY: usize = D3D11_MAX_SHADER_RESOURCE_SLOTS as usize;

/// Shader stages of the D3D11 pipeline, in native declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderStage {
    pub const COUNT: usize = 6;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Vertex,
        Self::Hull,
        Self::Domain,
        Self::Geometry,
        Self::Pixel,
        Self::Compute,
    ];

    /// Stages participating in a graphics pipeline.
    pub const GRAPHICS: [Self; 5] = [
        Self::Vertex,
        Self::Hull,
        Self::Domain,
        Self::Geometry,
        Self::Pixel,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn mask(self) -> StageMask {
        match self {
            Self::Vertex => StageMask::VERTEX,
            Self::Hull => StageMask::HULL,
            Self::Domain => StageMask::DOMAIN,
            Self::Geometry => StageMask::GEOMETRY,
            Self::Pixel => StageMask::PIXEL,
            Self::Compute => StageMask::COMPUTE,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Hull => write!(f, "hull"),
            ShaderStage::Domain => write!(f, "domain"),
            ShaderStage::Geometry => write!(f, "geometry"),
            ShaderStage::Pixel => write!(f, "pixel"),
            ShaderStage::Compute => write!(f, "compute"),
        }
    }
}

bitflags! {
    /// Set of shader stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageMask: u8 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const COMPUTE = 1 << 5;

        const GRAPHICS = Self::VERTEX.bits()
            | Self::HULL.bits()
            | Self::DOMAIN.bits()
            | Self::GEOMETRY.bits()
            | Self::PIXEL.bits();
    }
}

impl StageMask {
    /// Stages in the mask, in native declaration order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL
            .into_iter()
            .filter(move |stage| self.contains(stage.mask()))
    }
}

/// Register space a shader parameter is bound through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceCategory {
    ConstantBuffer,
    ShaderResource,
    UnorderedAccess,
    Sampler,
}

impl ResourceCategory {
    pub const COUNT: usize = 4;

    pub const ALL: [Self; Self::COUNT] = [
        Self::ConstantBuffer,
        Self::ShaderResource,
        Self::UnorderedAccess,
        Self::Sampler,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// HLSL register prefix (`b`, `t`, `u`, `s`).
    pub const fn register_prefix(self) -> char {
        match self {
            Self::ConstantBuffer => 'b',
            Self::ShaderResource => 't',
            Self::UnorderedAccess => 'u',
            Self::Sampler => 's',
        }
    }

    /// Number of hardware slots in this register space.
    ///
    /// `d3d11_1_uavs` selects the D3D11.1 UAV register count.
    pub const fn slot_limit(self, d3d11_1_uavs: bool) -> u32 {
        match self {
            Self::ConstantBuffer => D3D11_MAX_CONSTANT_BUFFER_SLOTS,
            Self::ShaderResource => D3D11_MAX_SHADER_RESOURCE_SLOTS,
            Self::UnorderedAccess if d3d11_1_uavs => D3D11_1_MAX_UAV_SLOTS,
            Self::UnorderedAccess => D3D11_MAX_UAV_SLOTS,
            Self::Sampler => D3D11_MAX_SAMPLER_SLOTS,
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceCategory::ConstantBuffer => write!(f, "constant buffer"),
            ResourceCategory::ShaderResource => write!(f, "shader resource view"),
            ResourceCategory::UnorderedAccess => write!(f, "unordered access view"),
            ResourceCategory::Sampler => write!(f, "sampler"),
        }
    }
}

/// Which stages a compiled pipeline carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Vertex, hull, domain, geometry and pixel stages.
    Graphics,
    /// Compute stage only.
    Compute,
}

impl PipelineKind {
    pub const fn stages(self) -> StageMask {
        match self {
            Self::Graphics => StageMask::GRAPHICS,
            Self::Compute => StageMask::COMPUTE,
        }
    }

    pub const fn contains(self, stage: ShaderStage) -> bool {
        self.stages().contains(stage.mask())
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Graphics => write!(f, "graphics"),
            PipelineKind::Compute => write!(f, "compute"),
        }
    }
}
