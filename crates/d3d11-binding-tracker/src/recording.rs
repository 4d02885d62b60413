//! A [`BindingContext`] that records calls instead of issuing them.

use crate::binder::BindingContext;
use crate::binding_model::{ResourceCategory, ShaderStage};
use crate::handle::ResourceHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindCall {
    pub stage: ShaderStage,
    pub category: ResourceCategory,
    pub start_slot: u32,
    pub handles: Vec<ResourceHandle>,
    /// Only populated for [`ResourceCategory::UnorderedAccess`].
    pub initial_counts: Vec<u32>,
}

impl BindCall {
    pub fn new(
        stage: ShaderStage,
        category: ResourceCategory,
        start_slot: u32,
        handles: impl Into<Vec<ResourceHandle>>,
    ) -> Self {
        Self {
            stage,
            category,
            start_slot,
            handles: handles.into(),
            initial_counts: Vec::new(),
        }
    }

    pub fn with_initial_counts(mut self, initial_counts: impl Into<Vec<u32>>) -> Self {
        self.initial_counts = initial_counts.into();
        self
    }

    pub fn is_unbind(&self) -> bool {
        self.handles.iter().all(|handle| handle.is_null())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CallRecorder {
    calls: Vec<BindCall>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[BindCall] {
        &self.calls
    }

    pub fn take(&mut self) -> Vec<BindCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn record(
        &mut self,
        stage: ShaderStage,
        category: ResourceCategory,
        start_slot: u32,
        handles: &[ResourceHandle],
    ) {
        self.calls
            .push(BindCall::new(stage, category, start_slot, handles));
    }
}

impl BindingContext for CallRecorder {
    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[ResourceHandle],
    ) {
        self.record(stage, ResourceCategory::ConstantBuffer, start_slot, buffers);
    }

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[ResourceHandle]) {
        self.record(stage, ResourceCategory::ShaderResource, start_slot, views);
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[ResourceHandle]) {
        self.record(stage, ResourceCategory::Sampler, start_slot, samplers);
    }

    fn set_unordered_access_views(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        views: &[ResourceHandle],
        initial_counts: &[u32],
    ) {
        self.calls.push(
            BindCall::new(stage, ResourceCategory::UnorderedAccess, start_slot, views)
                .with_initial_counts(initial_counts),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mut recorder = CallRecorder::new();
        let views = [ResourceHandle::from_raw(1), ResourceHandle::from_raw(2)];
        recorder.set_shader_resources(ShaderStage::Pixel, 3, &views);
        recorder.set_unordered_access_views(ShaderStage::Compute, 0, &[ResourceHandle::NULL], &[0]);

        let calls = recorder.take();
        assert_eq!(
            calls,
            vec![
                BindCall::new(ShaderStage::Pixel, ResourceCategory::ShaderResource, 3, views),
                BindCall::new(
                    ShaderStage::Compute,
                    ResourceCategory::UnorderedAccess,
                    0,
                    [ResourceHandle::NULL]
                )
                .with_initial_counts([0u32]),
            ]
        );
        assert!(!calls[0].is_unbind());
        assert!(calls[1].is_unbind());
        assert!(recorder.is_empty());
    }
}
