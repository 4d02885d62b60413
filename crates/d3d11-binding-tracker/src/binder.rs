//! Range walks that turn tracked slot state into native range-bind calls.

use crate::binding_model::{ResourceCategory, ShaderStage, MAX_SLOTS_PER_CATEGORY};
use crate::handle::ResourceHandle;
use crate::ranges::SlotRanges;

/// Initial count meaning "keep the UAV's current hidden counter".
pub const KEEP_UAV_COUNTER: u32 = u32::MAX;

static NULL_HANDLES: [ResourceHandle; MAX_SLOTS_PER_CATEGORY] =
    [ResourceHandle::NULL; MAX_SLOTS_PER_CATEGORY];

/// The native "bind N resources starting at slot S" entry points of a device context.
///
/// Slices are contiguous and never empty. Constant buffers, views and samplers go to the
/// matching `XXSetConstantBuffers` / `XXSetShaderResources` / `XXSetSamplers` call for `stage`.
///
/// Unordered access views are bound per pipeline rather than per stage. Compute ranges go to
/// `CSSetUnorderedAccessViews`. Graphics ranges (in practice [`ShaderStage::Pixel`]) go to
/// `OMSetRenderTargetsAndUnorderedAccessViews` with `D3D11_KEEP_RENDER_TARGETS_AND_DEPTH_STENCIL`
/// so the bound render targets survive.
pub trait BindingContext {
    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[ResourceHandle],
    );

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[ResourceHandle]);

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[ResourceHandle]);

    /// `initial_counts` has the same length as `views`. `stage` is either
    /// [`ShaderStage::Compute`] or a graphics stage, which share one output-merger UAV table.
    fn set_unordered_access_views(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        views: &[ResourceHandle],
        initial_counts: &[u32],
    );
}

impl<T: BindingContext + ?Sized> BindingContext for &mut T {
    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[ResourceHandle],
    ) {
        (**self).set_constant_buffers(stage, start_slot, buffers);
    }

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[ResourceHandle]) {
        (**self).set_shader_resources(stage, start_slot, views);
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[ResourceHandle]) {
        (**self).set_samplers(stage, start_slot, samplers);
    }

    fn set_unordered_access_views(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        views: &[ResourceHandle],
        initial_counts: &[u32],
    ) {
        (**self).set_unordered_access_views(stage, start_slot, views, initial_counts);
    }
}

/// Call `set_range(first_slot, handles)` once per range, with `handles` borrowed straight out of
/// `slots`.
pub fn bind_ranges(
    start_slot: u32,
    ranges: &SlotRanges,
    slots: &[ResourceHandle],
    mut set_range: impl FnMut(u32, &[ResourceHandle]),
) {
    for range in ranges.iter() {
        set_range(start_slot + range.start as u32, &slots[range.start..range.end()]);
    }
}

/// Same walk as [`bind_ranges`], passing null handles so the native context drops its
/// references. Ranges longer than the scratch buffer are issued in chunks.
pub fn unbind_ranges(
    start_slot: u32,
    ranges: &SlotRanges,
    mut set_range: impl FnMut(u32, &[ResourceHandle]),
) {
    for range in ranges.iter() {
        let mut offset = range.start;
        while offset < range.end() {
            let len = (range.end() - offset).min(NULL_HANDLES.len());
            set_range(start_slot + offset as u32, &NULL_HANDLES[..len]);
            offset += len;
        }
    }
}

/// Dispatch one range of `category` to the matching context entry point.
pub(crate) fn set_category_range(
    ctx: &mut impl BindingContext,
    stage: ShaderStage,
    category: ResourceCategory,
    start_slot: u32,
    handles: &[ResourceHandle],
    initial_counts: &[u32],
) {
    match category {
        ResourceCategory::ConstantBuffer => ctx.set_constant_buffers(stage, start_slot, handles),
        ResourceCategory::ShaderResource => ctx.set_shader_resources(stage, start_slot, handles),
        ResourceCategory::Sampler => ctx.set_samplers(stage, start_slot, handles),
        ResourceCategory::UnorderedAccess => {
            ctx.set_unordered_access_views(stage, start_slot, handles, initial_counts)
        }
    }
}
