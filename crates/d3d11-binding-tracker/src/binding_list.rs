//! Per-pipeline binding state across every stage and register space.
//!
//! A [`ResourceBindingList`] owns one [`DescriptorRange`] per (stage, category) of its pipeline
//! and stays subscribed to a [`GlobalResourceRegistry`] for its whole life. Registry broadcasts
//! arrive with the registry lock held and take the list lock second; the list never calls into
//! the registry while holding its own lock.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::binder::{BindingContext, KEEP_UAV_COUNTER};
use crate::binding_model::{PipelineKind, ResourceCategory, ShaderStage};
use crate::config::TrackerConfig;
use crate::descriptor_range::{BindingValue, DescriptorRange};
use crate::error::BindingError;
use crate::handle::ResourceHandle;
use crate::parameter::{ParameterDesc, ParameterTable};
use crate::reflection::PipelineReflection;
use crate::registry::{GlobalResourceChange, GlobalResourceListener, GlobalResourceRegistry};
use crate::staging::ConstantStaging;

type StageRanges = [DescriptorRange; ResourceCategory::COUNT];

struct BindingTables {
    kind: PipelineKind,
    stages: [StageRanges; ShaderStage::COUNT],
}

impl BindingTables {
    fn empty(kind: PipelineKind) -> Self {
        Self {
            kind,
            stages: std::array::from_fn(|stage| {
                std::array::from_fn(|category| {
                    DescriptorRange::empty(
                        ShaderStage::ALL[stage],
                        ResourceCategory::ALL[category],
                    )
                })
            }),
        }
    }

    fn build(reflection: &PipelineReflection, config: &TrackerConfig) -> Result<Self, BindingError> {
        let mut tables = Self::empty(reflection.kind());
        for (stage, shader) in reflection.stages() {
            let parameters = shader.parameters()?;
            for (category, params) in ResourceCategory::ALL.into_iter().zip(parameters) {
                if let Some(max) = config.slot_limit(category) {
                    check_slot_limit(stage, category, &params, max)?;
                }
                let table = ParameterTable::new(stage, category, params)?;
                tables.stages[stage.index()][category.index()] = DescriptorRange::new(table, config);
            }
        }
        Ok(tables)
    }

    fn range(&self, stage: ShaderStage, category: ResourceCategory) -> &DescriptorRange {
        &self.stages[stage.index()][category.index()]
    }

    fn range_mut(
        &mut self,
        stage: ShaderStage,
        category: ResourceCategory,
    ) -> Result<&mut DescriptorRange, BindingError> {
        if !self.kind.contains(stage) {
            return Err(BindingError::StageNotInPipeline {
                kind: self.kind,
                stage,
            });
        }
        Ok(&mut self.stages[stage.index()][category.index()])
    }

    fn active(&self) -> impl Iterator<Item = &DescriptorRange> {
        self.kind
            .stages()
            .stages()
            .flat_map(move |stage| self.stages[stage.index()].iter())
    }

    fn active_mut(&mut self) -> impl Iterator<Item = &mut DescriptorRange> {
        let kind = self.kind;
        self.stages
            .iter_mut()
            .zip(ShaderStage::ALL)
            .filter(move |(_, stage)| kind.contains(*stage))
            .flat_map(|(ranges, _)| ranges.iter_mut())
    }

    fn parameter_count(&self) -> usize {
        self.active().map(|range| range.table().len()).sum()
    }

    /// Apply `handle` to `name` in `category` of every stage declaring it.
    fn broadcast(
        &mut self,
        category: ResourceCategory,
        name: &str,
        handle: ResourceHandle,
        initial_count: u32,
    ) -> usize {
        self.active_mut()
            .filter(|range| range.category() == category)
            .map(|range| range.try_set_with_initial_count(name, handle, initial_count))
            .filter(|&applied| applied)
            .count()
    }

    /// Compare-and-swap update from a registry change. Slots whose value no longer matches what
    /// the registry previously reported were overridden locally and keep their value.
    fn apply_global_change(&mut self, change: &GlobalResourceChange<'_>) -> usize {
        let name = change.name;
        let mut updated = 0;

        if let Some(old) = change.old {
            if change.new.map(|new| new.category) != Some(old.category) {
                updated += self
                    .active_mut()
                    .filter(|range| range.category() == old.category)
                    .map(|range| {
                        range.update_by_name(name, old.handle, ResourceHandle::NULL, KEEP_UAV_COUNTER)
                    })
                    .filter(|&applied| applied)
                    .count();
            }
        }

        if let Some(new) = change.new {
            let expected = change
                .old
                .filter(|old| old.category == new.category)
                .map_or(ResourceHandle::NULL, |old| old.handle);
            updated += self
                .active_mut()
                .filter(|range| range.category() == new.category)
                .map(|range| range.update_by_name(name, expected, new.handle, new.initial_count))
                .filter(|&applied| applied)
                .count();
        }

        updated
    }
}

fn check_slot_limit(
    stage: ShaderStage,
    category: ResourceCategory,
    params: &[ParameterDesc],
    max: u32,
) -> Result<(), BindingError> {
    for desc in params {
        // Arrays occupy `bind_count` consecutive registers.
        let extent = match category {
            ResourceCategory::ConstantBuffer => 1,
            _ => desc.declared_size.max(1),
        };
        if desc.slot.saturating_add(extent) > max {
            return Err(BindingError::SlotOutOfRange {
                stage,
                category,
                name: desc.name.clone(),
                slot: desc.slot.saturating_add(extent - 1),
                max,
            });
        }
    }
    Ok(())
}

/// Binding state of one compiled pipeline.
pub struct ResourceBindingList {
    registry: Arc<GlobalResourceRegistry>,
    config: TrackerConfig,
    tables: Mutex<BindingTables>,
}

impl fmt::Debug for ResourceBindingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.lock();
        f.debug_struct("ResourceBindingList")
            .field("kind", &tables.kind)
            .field("parameters", &tables.parameter_count())
            .field("config", &self.config)
            .finish()
    }
}

impl ResourceBindingList {
    /// Build the list from `reflection` with [`TrackerConfig::from_env`] and attach it to
    /// `registry`, which replays every current global resource into it.
    pub fn new(
        reflection: &PipelineReflection,
        registry: &Arc<GlobalResourceRegistry>,
    ) -> Result<Arc<Self>, BindingError> {
        Self::with_config(reflection, registry, TrackerConfig::from_env())
    }

    pub fn with_config(
        reflection: &PipelineReflection,
        registry: &Arc<GlobalResourceRegistry>,
        config: TrackerConfig,
    ) -> Result<Arc<Self>, BindingError> {
        let tables = BindingTables::build(reflection, &config)?;
        debug!(
            kind = %tables.kind,
            parameters = tables.parameter_count(),
            "binding list built"
        );

        let list = Arc::new(Self {
            registry: Arc::clone(registry),
            config,
            tables: Mutex::new(tables),
        });
        registry.attach(&list);
        Ok(list)
    }

    fn lock(&self) -> MutexGuard<'_, BindingTables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn kind(&self) -> PipelineKind {
        self.lock().kind
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<GlobalResourceRegistry> {
        &self.registry
    }

    /// Discard all state, rebuild from `reflection` and re-synchronize with the registry.
    ///
    /// On error the previous state is kept.
    pub fn rebuild(self: &Arc<Self>, reflection: &PipelineReflection) -> Result<(), BindingError> {
        let tables = BindingTables::build(reflection, &self.config)?;
        let (kind, parameters) = (tables.kind, tables.parameter_count());
        *self.lock() = tables;

        // The list lock is released before the registry lock is taken.
        self.registry.attach(self);
        debug!(%kind, parameters, "binding list rebuilt");
        Ok(())
    }

    /// Detach from the registry and clear every slot. The parameter tables stay in place so
    /// the list can be re-synchronized with [`ResourceBindingList::rebuild`].
    pub fn dispose(self: &Arc<Self>) {
        let was_attached = self.registry.detach(self);
        let mut tables = self.lock();
        for stage in tables.stages.iter_mut() {
            for range in stage.iter_mut() {
                range.reset();
            }
        }
        debug!(kind = %tables.kind, was_attached, "binding list disposed");
    }

    pub fn set_by_name(
        &self,
        stage: ShaderStage,
        category: ResourceCategory,
        name: &str,
        handle: ResourceHandle,
    ) -> Result<(), BindingError> {
        self.lock().range_mut(stage, category)?.set_by_name(name, handle)
    }

    /// Returns whether `stage` declares `name` in `category` and the value was applied.
    pub fn try_set_by_name(
        &self,
        stage: ShaderStage,
        category: ResourceCategory,
        name: &str,
        handle: ResourceHandle,
    ) -> bool {
        self.lock()
            .range_mut(stage, category)
            .is_ok_and(|range| range.try_set_by_name(name, handle))
    }

    pub fn try_set_uav_by_name(
        &self,
        stage: ShaderStage,
        name: &str,
        view: ResourceHandle,
        initial_count: u32,
    ) -> bool {
        self.lock()
            .range_mut(stage, ResourceCategory::UnorderedAccess)
            .is_ok_and(|range| range.try_set_with_initial_count(name, view, initial_count))
    }

    /// Bind `buffer` in every stage declaring `name`. Returns the number of stages updated.
    pub fn set_constant_buffer(&self, name: &str, buffer: ResourceHandle) -> usize {
        self.lock()
            .broadcast(ResourceCategory::ConstantBuffer, name, buffer, KEEP_UAV_COUNTER)
    }

    pub fn set_shader_resource(&self, name: &str, view: ResourceHandle) -> usize {
        self.lock()
            .broadcast(ResourceCategory::ShaderResource, name, view, KEEP_UAV_COUNTER)
    }

    pub fn set_unordered_access_view(
        &self,
        name: &str,
        view: ResourceHandle,
        initial_count: u32,
    ) -> usize {
        self.lock()
            .broadcast(ResourceCategory::UnorderedAccess, name, view, initial_count)
    }

    pub fn set_sampler(&self, name: &str, sampler: ResourceHandle) -> usize {
        self.lock()
            .broadcast(ResourceCategory::Sampler, name, sampler, KEEP_UAV_COUNTER)
    }

    pub fn get(
        &self,
        stage: ShaderStage,
        category: ResourceCategory,
        name: &str,
    ) -> Option<ResourceHandle> {
        self.lock().range(stage, category).get(name)
    }

    /// Staging buffer sized to the constant buffer `name` declared by `stage`.
    pub fn constant_staging(
        &self,
        stage: ShaderStage,
        name: &str,
    ) -> Result<ConstantStaging, BindingError> {
        let tables = self.lock();
        let range = tables.range(stage, ResourceCategory::ConstantBuffer);
        let parameter = range.find(name).ok_or_else(|| BindingError::ParameterNotFound {
            stage,
            category: ResourceCategory::ConstantBuffer,
            name: name.to_owned(),
        })?;
        ConstantStaging::from_parameter(parameter)
    }

    /// Issue one native call per occupied range of every stage of the pipeline.
    pub fn bind(&self, ctx: &mut impl BindingContext) {
        let tables = self.lock();
        for range in tables.active() {
            range.bind(&mut *ctx);
        }
    }

    /// Null out every range [`ResourceBindingList::bind`] would set.
    pub fn unbind(&self, ctx: &mut impl BindingContext) {
        let tables = self.lock();
        for range in tables.active() {
            range.unbind(&mut *ctx);
        }
    }

    /// Every declared parameter with its current value, in stage then category order.
    pub fn bindings(&self) -> Vec<BindingValue> {
        self.lock()
            .active()
            .flat_map(DescriptorRange::bindings)
            .collect()
    }

    /// Run `f` against the range for (`stage`, `category`) under the list lock.
    pub fn with_range<R>(
        &self,
        stage: ShaderStage,
        category: ResourceCategory,
        f: impl FnOnce(&DescriptorRange) -> R,
    ) -> R {
        f(self.lock().range(stage, category))
    }
}

impl GlobalResourceListener for ResourceBindingList {
    fn on_global_resource_changed(&self, change: &GlobalResourceChange<'_>) {
        let updated = self.lock().apply_global_change(change);
        trace!(name = change.name, updated, "global resource applied");
    }
}
