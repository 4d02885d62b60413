use std::fmt;
use std::num::NonZeroUsize;

/// Opaque, pointer-sized handle to a native view, buffer or sampler object.
///
/// The layout is identical to a nullable native pointer (`repr(transparent)` over
/// `Option<NonZeroUsize>`), so a `&[ResourceHandle]` slice can be handed to a native
/// `XXSetShaderResources`-style entry point as its pointer array. The tracker never dereferences
/// or reference-counts handles; keeping the native objects alive is the caller's job.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceHandle(Option<NonZeroUsize>);

impl ResourceHandle {
    /// The empty slot value.
    pub const NULL: Self = Self(None);

    pub const fn from_raw(raw: usize) -> Self {
        Self(NonZeroUsize::new(raw))
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self::from_raw(ptr as usize)
    }

    pub const fn raw(self) -> usize {
        match self.0 {
            Some(raw) => raw.get(),
            None => 0,
        }
    }

    pub const fn is_null(self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(raw) => write!(f, "ResourceHandle({:#x})", raw.get()),
            None => write!(f, "ResourceHandle(null)"),
        }
    }
}

impl From<usize> for ResourceHandle {
    fn from(raw: usize) -> Self {
        Self::from_raw(raw)
    }
}
