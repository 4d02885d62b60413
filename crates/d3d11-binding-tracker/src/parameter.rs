//! Reflection-built lookup from parameter names to hardware slots.
//!
//! A [`ParameterTable`] covers exactly one (stage, category) pair. It is sized to the number of
//! reflected parameters and never grows; when a pipeline is recompiled the whole table is
//! rebuilt from the new reflection data.

use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use crate::binding_model::{ResourceCategory, ShaderStage, MAX_SLOTS_PER_CATEGORY};
use crate::error::BindingError;

/// Hash used to key parameter names.
pub fn name_hash(name: &str) -> u32 {
    xxh3_64(name.as_bytes()) as u32
}

/// One reflected `(name, slot, size)` triple, as supplied by the shader reflection loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDesc {
    pub name: String,
    pub slot: u32,
    /// Byte size for constant buffers, bind count for every other category.
    pub declared_size: u32,
}

impl ParameterDesc {
    pub fn new(name: impl Into<String>, slot: u32, declared_size: u32) -> Self {
        Self {
            name: name.into(),
            slot,
            declared_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: Arc<str>,
    pub name_hash: u32,
    pub slot: u32,
    pub declared_size: u32,
    pub category: ResourceCategory,
    pub stage: ShaderStage,
}

enum Probe {
    Occupied(usize),
    Vacant(usize),
    Exhausted,
}

/// Open-addressed, fixed-capacity parameter set for one (stage, category).
#[derive(Debug, Clone)]
pub struct ParameterTable {
    stage: ShaderStage,
    category: ResourceCategory,
    buckets: Box<[Option<Parameter>]>,
    start_slot: u32,
    slot_count: u32,
}

impl ParameterTable {
    /// A table with zero capacity; every lookup fails.
    pub fn empty(stage: ShaderStage, category: ResourceCategory) -> Self {
        Self {
            stage,
            category,
            buckets: Box::default(),
            start_slot: 0,
            slot_count: 0,
        }
    }

    pub fn new(
        stage: ShaderStage,
        category: ResourceCategory,
        params: impl IntoIterator<Item = ParameterDesc>,
    ) -> Result<Self, BindingError> {
        let params: Vec<ParameterDesc> = params.into_iter().collect();
        if params.is_empty() {
            return Ok(Self::empty(stage, category));
        }

        let mut buckets: Box<[Option<Parameter>]> = vec![None; params.len()].into_boxed_slice();
        let mut start_slot = u32::MAX;
        let mut max_slot = 0;
        let mut max_name = String::new();

        for desc in params {
            start_slot = start_slot.min(desc.slot);
            if desc.slot >= max_slot {
                max_slot = desc.slot;
                max_name.clone_from(&desc.name);
            }

            let hash = name_hash(&desc.name);
            match probe(&buckets, hash, &desc.name) {
                Probe::Vacant(index) => {
                    buckets[index] = Some(Parameter {
                        name: desc.name.into(),
                        name_hash: hash,
                        slot: desc.slot,
                        declared_size: desc.declared_size,
                        category,
                        stage,
                    });
                }
                Probe::Occupied(_) => {
                    return Err(BindingError::DuplicateParameter {
                        stage,
                        category,
                        name: desc.name,
                    });
                }
                // Capacity equals the parameter count, so a fresh name always finds a bucket.
                Probe::Exhausted => unreachable!("parameter table sized below its parameter count"),
            }
        }

        // Holds even when per-category limits are relaxed: the slot array spans this range.
        let slot_count = (max_slot - start_slot)
            .checked_add(1)
            .filter(|&count| count as usize <= MAX_SLOTS_PER_CATEGORY)
            .ok_or(BindingError::SlotOutOfRange {
                stage,
                category,
                name: max_name,
                slot: max_slot,
                max: MAX_SLOTS_PER_CATEGORY as u32,
            })?;

        Ok(Self {
            stage,
            category,
            buckets,
            start_slot,
            slot_count,
        })
    }

    pub fn find(&self, name: &str) -> Option<&Parameter> {
        match probe(&self.buckets, name_hash(name), name) {
            Probe::Occupied(index) => self.buckets[index].as_ref(),
            Probe::Vacant(_) | Probe::Exhausted => None,
        }
    }

    /// Offset of `parameter` into the slot array backing this table.
    pub fn offset_of(&self, parameter: &Parameter) -> usize {
        (parameter.slot - self.start_slot) as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.buckets.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn category(&self) -> ResourceCategory {
        self.category
    }

    /// Lowest slot index referenced by any parameter (0 for an empty table).
    pub fn start_slot(&self) -> u32 {
        self.start_slot
    }

    /// Width of the slot span `[start_slot, max_slot]`.
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }
}

/// Linear probe from `hash % capacity`, visiting every bucket at most once.
fn probe(buckets: &[Option<Parameter>], hash: u32, name: &str) -> Probe {
    let capacity = buckets.len();
    if capacity == 0 {
        return Probe::Exhausted;
    }

    let start = hash as usize % capacity;
    for step in 0..capacity {
        let index = (start + step) % capacity;
        match &buckets[index] {
            None => return Probe::Vacant(index),
            Some(entry) if entry.name_hash == hash && *entry.name == *name => {
                return Probe::Occupied(index)
            }
            Some(_) => {}
        }
    }
    Probe::Exhausted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srv_table(params: &[(&str, u32)]) -> ParameterTable {
        ParameterTable::new(
            ShaderStage::Pixel,
            ResourceCategory::ShaderResource,
            params.iter().map(|&(name, slot)| ParameterDesc::new(name, slot, 1)),
        )
        .unwrap()
    }

    #[test]
    fn finds_reflected_parameters() {
        let table = srv_table(&[("Albedo", 2), ("Normal", 3)]);

        let albedo = table.find("Albedo").unwrap();
        assert_eq!(albedo.slot, 2);
        assert_eq!(albedo.stage, ShaderStage::Pixel);
        assert_eq!(albedo.category, ResourceCategory::ShaderResource);
        assert_eq!(table.find("Normal").unwrap().slot, 3);
        assert!(table.find("Missing").is_none());

        assert_eq!(table.start_slot(), 2);
        assert_eq!(table.slot_count(), 2);
        assert_eq!(table.offset_of(albedo), 0);
    }

    #[test]
    fn empty_table_has_no_capacity() {
        let table = srv_table(&[]);
        assert!(table.is_empty());
        assert_eq!(table.slot_count(), 0);
        assert!(table.find("Albedo").is_none());
    }

    #[test]
    fn slot_span_is_capped_at_the_category_maximum() {
        let build = |slots: &[(&str, u32)]| {
            ParameterTable::new(
                ShaderStage::Pixel,
                ResourceCategory::ShaderResource,
                slots.iter().map(|&(name, slot)| ParameterDesc::new(name, slot, 1)),
            )
        };

        assert_eq!(build(&[("First", 10), ("Last", 137)]).unwrap().slot_count(), 128);
        assert!(matches!(
            build(&[("First", 0), ("Last", 200)]),
            Err(BindingError::SlotOutOfRange {
                ref name,
                slot: 200,
                max: 128,
                ..
            }) if name == "Last"
        ));
        assert!(matches!(
            build(&[("First", 0), ("Last", u32::MAX)]),
            Err(BindingError::SlotOutOfRange { slot: u32::MAX, max: 128, .. })
        ));
    }

    #[test]
    fn full_table_lookup_of_absent_name_terminates() {
        // Every bucket is occupied, so a miss has to give up after one full wrap.
        let names: Vec<String> = (0..37).map(|i| format!("tex{i}")).collect();
        let table = ParameterTable::new(
            ShaderStage::Compute,
            ResourceCategory::ShaderResource,
            names
                .iter()
                .enumerate()
                .map(|(slot, name)| ParameterDesc::new(name.as_str(), slot as u32, 1)),
        )
        .unwrap();

        assert_eq!(table.iter().count(), names.len());
        for (slot, name) in names.iter().enumerate() {
            assert_eq!(table.find(name).unwrap().slot, slot as u32);
        }
        assert!(table.find("not_declared").is_none());
    }

    #[test]
    fn sparse_slots_span_min_to_max() {
        let table = srv_table(&[("ShadowMap", 9), ("Albedo", 4), ("Env", 6)]);
        assert_eq!(table.start_slot(), 4);
        assert_eq!(table.slot_count(), 6);
        let shadow = table.find("ShadowMap").unwrap();
        assert_eq!(table.offset_of(shadow), 5);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ParameterTable::new(
            ShaderStage::Vertex,
            ResourceCategory::ConstantBuffer,
            [ParameterDesc::new("CameraCB", 0, 64), ParameterDesc::new("CameraCB", 1, 64)],
        )
        .unwrap_err();
        assert_eq!(
            err,
            BindingError::DuplicateParameter {
                stage: ShaderStage::Vertex,
                category: ResourceCategory::ConstantBuffer,
                name: "CameraCB".into(),
            }
        );
    }
}
