use std::sync::Arc;

use tracing::trace;

use crate::binder::{self, BindingContext, KEEP_UAV_COUNTER};
use crate::binding_model::{ResourceCategory, ShaderStage};
use crate::config::TrackerConfig;
use crate::error::BindingError;
use crate::handle::ResourceHandle;
use crate::parameter::{Parameter, ParameterTable};
use crate::ranges::SlotRanges;

/// A named parameter together with the handle currently stored in its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingValue {
    pub name: Arc<str>,
    pub stage: ShaderStage,
    pub category: ResourceCategory,
    pub slot: u32,
    pub handle: ResourceHandle,
}

/// Live binding state for one (stage, category): the parameter table, the slot array it indexes
/// into, and the coalesced runs of occupied slots.
#[derive(Debug, Clone)]
pub struct DescriptorRange {
    table: ParameterTable,
    slots: Box<[ResourceHandle]>,
    /// Parallel to `slots`; only present for UAVs.
    initial_counts: Option<Box<[u32]>>,
    ranges: SlotRanges,
    validate_ranges: bool,
}

impl DescriptorRange {
    pub fn new(table: ParameterTable, config: &TrackerConfig) -> Self {
        let slot_count = table.slot_count() as usize;
        let initial_counts = (table.category() == ResourceCategory::UnorderedAccess)
            .then(|| vec![KEEP_UAV_COUNTER; slot_count].into_boxed_slice());

        Self {
            slots: vec![ResourceHandle::NULL; slot_count].into_boxed_slice(),
            initial_counts,
            ranges: SlotRanges::new(),
            validate_ranges: config.validate_ranges,
            table,
        }
    }

    pub fn empty(stage: ShaderStage, category: ResourceCategory) -> Self {
        Self::new(
            ParameterTable::empty(stage, category),
            &TrackerConfig::default(),
        )
    }

    pub fn stage(&self) -> ShaderStage {
        self.table.stage()
    }

    pub fn category(&self) -> ResourceCategory {
        self.table.category()
    }

    pub fn table(&self) -> &ParameterTable {
        &self.table
    }

    pub fn start_slot(&self) -> u32 {
        self.table.start_slot()
    }

    pub fn slots(&self) -> &[ResourceHandle] {
        &self.slots
    }

    pub fn initial_counts(&self) -> Option<&[u32]> {
        self.initial_counts.as_deref()
    }

    pub fn ranges(&self) -> &SlotRanges {
        &self.ranges
    }

    pub fn find(&self, name: &str) -> Option<&Parameter> {
        self.table.find(name)
    }

    /// Handle currently bound to `name`, or `None` if no such parameter is declared.
    pub fn get(&self, name: &str) -> Option<ResourceHandle> {
        let parameter = self.table.find(name)?;
        Some(self.slots[self.table.offset_of(parameter)])
    }

    /// Bind `handle` to the parameter `name`, failing if the shader does not declare it.
    pub fn set_by_name(&mut self, name: &str, handle: ResourceHandle) -> Result<(), BindingError> {
        let offset = self.offset_for(name).ok_or_else(|| BindingError::ParameterNotFound {
            stage: self.stage(),
            category: self.category(),
            name: name.to_owned(),
        })?;
        self.store(offset, handle);
        Ok(())
    }

    /// Bind `handle` to `name` if declared. Returns whether the value was applied.
    pub fn try_set_by_name(&mut self, name: &str, handle: ResourceHandle) -> bool {
        self.try_set_with_initial_count(name, handle, KEEP_UAV_COUNTER)
    }

    /// [`DescriptorRange::try_set_by_name`] that also records a UAV initial count. The count is
    /// ignored for other categories.
    pub fn try_set_with_initial_count(
        &mut self,
        name: &str,
        handle: ResourceHandle,
        initial_count: u32,
    ) -> bool {
        let Some(offset) = self.offset_for(name) else {
            return false;
        };
        self.store_initial_count(offset, initial_count);
        self.store(offset, handle);
        true
    }

    /// Replace the value of `name` only while it still holds `expected`.
    ///
    /// Used for registry broadcasts: a slot that was overridden locally no longer matches the
    /// previously broadcast value and is left alone. Returns whether the slot was written.
    pub fn update_by_name(
        &mut self,
        name: &str,
        expected: ResourceHandle,
        handle: ResourceHandle,
        initial_count: u32,
    ) -> bool {
        let Some(offset) = self.offset_for(name) else {
            return false;
        };
        if self.slots[offset] != expected {
            trace!(
                stage = %self.stage(),
                category = %self.category(),
                name,
                "keeping locally overridden binding"
            );
            return false;
        }
        self.store_initial_count(offset, initial_count);
        self.store(offset, handle);
        true
    }

    /// Clear every slot.
    pub fn reset(&mut self) {
        self.slots.fill(ResourceHandle::NULL);
        if let Some(counts) = self.initial_counts.as_mut() {
            counts.fill(KEEP_UAV_COUNTER);
        }
        self.ranges.clear_all();
    }

    pub fn bindings(&self) -> impl Iterator<Item = BindingValue> + '_ {
        self.table.iter().map(|parameter| BindingValue {
            name: parameter.name.clone(),
            stage: parameter.stage,
            category: parameter.category,
            slot: parameter.slot,
            handle: self.slots[self.table.offset_of(parameter)],
        })
    }

    /// Issue one native call per occupied range.
    pub fn bind(&self, ctx: &mut impl BindingContext) {
        let (stage, category) = (self.stage(), self.category());
        let start_slot = self.start_slot();
        let counts = self.initial_counts.as_deref().unwrap_or_default();
        binder::bind_ranges(start_slot, &self.ranges, &self.slots, |slot, handles| {
            let offset = (slot - start_slot) as usize;
            let counts = counts.get(offset..offset + handles.len()).unwrap_or_default();
            binder::set_category_range(&mut *ctx, stage, category, slot, handles, counts);
        });
    }

    /// Issue the same calls as [`DescriptorRange::bind`] with null handles. The tracked state is
    /// left untouched.
    pub fn unbind(&self, ctx: &mut impl BindingContext) {
        let (stage, category) = (self.stage(), self.category());
        let start_slot = self.start_slot();
        let counts = self.initial_counts.as_deref().unwrap_or_default();
        binder::unbind_ranges(start_slot, &self.ranges, |slot, handles| {
            let offset = (slot - start_slot) as usize;
            let counts = counts.get(offset..offset + handles.len()).unwrap_or_default();
            binder::set_category_range(&mut *ctx, stage, category, slot, handles, counts);
        });
    }

    fn offset_for(&self, name: &str) -> Option<usize> {
        self.table.find(name).map(|p| self.table.offset_of(p))
    }

    fn store_initial_count(&mut self, offset: usize, initial_count: u32) {
        if let Some(counts) = self.initial_counts.as_mut() {
            counts[offset] = initial_count;
        }
    }

    fn store(&mut self, offset: usize, handle: ResourceHandle) {
        let was_occupied = !self.slots[offset].is_null();
        self.slots[offset] = handle;
        if was_occupied != handle.is_null() {
            return;
        }

        if handle.is_null() {
            self.ranges.clear(offset);
        } else {
            self.ranges.fill(offset);
        }

        if self.validate_ranges {
            self.ranges
                .assert_matches(self.slots.iter().map(|h| !h.is_null()));
        }
    }
}
