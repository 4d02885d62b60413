use std::sync::Arc;

use crate::binding_model::ResourceCategory;
use crate::error::BindingError;
use crate::parameter::Parameter;

/// CPU-side copy of one constant buffer's contents, sized to its reflected byte size.
///
/// The caller uploads [`ConstantStaging::as_bytes`] when [`ConstantStaging::is_dirty`] reports a
/// pending write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantStaging {
    name: Arc<str>,
    data: Box<[u8]>,
    dirty: bool,
}

impl ConstantStaging {
    pub fn new(name: impl Into<Arc<str>>, size: usize) -> Self {
        Self {
            name: name.into(),
            data: vec![0; size].into_boxed_slice(),
            dirty: false,
        }
    }

    pub fn from_parameter(parameter: &Parameter) -> Result<Self, BindingError> {
        if parameter.category != ResourceCategory::ConstantBuffer {
            return Err(BindingError::CategoryMismatch {
                name: parameter.name.to_string(),
                expected: ResourceCategory::ConstantBuffer,
                actual: parameter.category,
            });
        }
        Ok(Self::new(
            parameter.name.clone(),
            parameter.declared_size as usize,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Replace the whole buffer. `bytes` must be exactly the declared size.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BindingError> {
        if bytes.len() != self.data.len() {
            return Err(BindingError::SizeMismatch {
                name: self.name.to_string(),
                expected: self.data.len(),
                actual: bytes.len(),
            });
        }
        self.copy_in(0, bytes);
        Ok(())
    }

    /// Overwrite `bytes.len()` bytes starting at `offset`.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BindingError> {
        let write_end = offset.saturating_add(bytes.len());
        if write_end > self.data.len() {
            return Err(BindingError::WriteOutOfBounds {
                name: self.name.to_string(),
                size: self.data.len(),
                write_end,
            });
        }
        self.copy_in(offset, bytes);
        Ok(())
    }

    fn copy_in(&mut self, offset: usize, bytes: &[u8]) {
        let dst = &mut self.data[offset..offset + bytes.len()];
        if *dst != *bytes {
            dst.copy_from_slice(bytes);
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding_model::ShaderStage;
    use crate::parameter::name_hash;

    fn parameter(category: ResourceCategory, declared_size: u32) -> Parameter {
        Parameter {
            name: Arc::from("CameraCB"),
            name_hash: name_hash("CameraCB"),
            slot: 0,
            declared_size,
            category,
            stage: ShaderStage::Vertex,
        }
    }

    #[test]
    fn whole_buffer_writes_require_exact_size() {
        let mut staging =
            ConstantStaging::from_parameter(&parameter(ResourceCategory::ConstantBuffer, 16))
                .unwrap();
        assert_eq!(staging.len(), 16);

        let err = staging.write(&[0; 12]).unwrap_err();
        assert_eq!(
            err,
            BindingError::SizeMismatch {
                name: "CameraCB".into(),
                expected: 16,
                actual: 12,
            }
        );
        assert!(!staging.is_dirty());

        staging.write(&[1; 16]).unwrap();
        assert!(staging.is_dirty());
        assert_eq!(staging.as_bytes(), [1; 16]);
    }

    #[test]
    fn partial_writes_stay_in_bounds() {
        let mut staging = ConstantStaging::new("Lights", 8);
        staging.write_at(4, &[7, 7, 7, 7]).unwrap();
        assert_eq!(staging.as_bytes(), [0, 0, 0, 0, 7, 7, 7, 7]);

        staging.clear_dirty();
        staging.write_at(4, &[7, 7]).unwrap();
        assert!(!staging.is_dirty(), "identical bytes do not dirty the buffer");

        assert_eq!(
            staging.write_at(6, &[0; 4]).unwrap_err(),
            BindingError::WriteOutOfBounds {
                name: "Lights".into(),
                size: 8,
                write_end: 10,
            }
        );
        assert!(staging.write_at(usize::MAX, &[0]).is_err());
    }

    #[test]
    fn only_constant_buffers_get_staging() {
        let err =
            ConstantStaging::from_parameter(&parameter(ResourceCategory::ShaderResource, 1))
                .unwrap_err();
        assert_eq!(
            err,
            BindingError::CategoryMismatch {
                name: "CameraCB".into(),
                expected: ResourceCategory::ConstantBuffer,
                actual: ResourceCategory::ShaderResource,
            }
        );
    }
}
