//! Shape descriptors: extents plus hyperslab selections.

use hyve_engine as engine;
use hyve_engine::Hid;

use crate::error::Result;
use crate::handle::Handle;

/// The declared shape of a dataset or attribute, with a current selection
/// narrowing subsequent I/O.
#[derive(Debug, Clone)]
pub struct Dataspace {
    handle: Handle,
}

impl Dataspace {
    /// Rank 0: exactly one element.
    pub fn scalar() -> Result<Dataspace> {
        let id = engine::space_scalar()?;
        Ok(Dataspace {
            handle: Handle::owned(id)?,
        })
    }

    /// A simple extent from an explicit ordered dimension list.  Rank is
    /// the slice length; zero-sized dimensions are rejected.
    pub fn simple(dims: &[u64]) -> Result<Dataspace> {
        let id = engine::space_simple(dims)?;
        Ok(Dataspace {
            handle: Handle::owned(id)?,
        })
    }

    pub(crate) fn from_handle(handle: Handle) -> Dataspace {
        Dataspace { handle }
    }

    pub(crate) fn id(&self) -> Hid {
        self.handle.id()
    }

    pub fn rank(&self) -> Result<usize> {
        Ok(engine::space_rank(self.handle.id())?)
    }

    pub fn dims(&self) -> Result<Vec<u64>> {
        Ok(engine::space_dims(self.handle.id())?)
    }

    /// Total number of elements in the extent.
    pub fn npoints(&self) -> Result<u64> {
        Ok(engine::space_npoints(self.handle.id())?)
    }

    /// Select a strided rectangular sub-region for subsequent I/O.  The
    /// extent's declared shape is unchanged.
    pub fn select_hyperslab(
        &mut self,
        offset: &[u64],
        stride: &[u64],
        count: &[u64],
        block: &[u64],
    ) -> Result<()> {
        engine::space_select_hyperslab(self.handle.id(), offset, stride, count, block)?;
        Ok(())
    }

    /// Restore the full-extent selection.
    pub fn select_all(&mut self) -> Result<()> {
        engine::space_select_all(self.handle.id())?;
        Ok(())
    }

    /// Number of elements the current selection addresses.
    pub fn selected_npoints(&self) -> Result<u64> {
        Ok(engine::space_select_npoints(self.handle.id())?)
    }

    /// Whether two descriptors declare the same extent (selections are not
    /// compared).
    pub fn extent_equal(&self, other: &Dataspace) -> Result<bool> {
        Ok(engine::space_extent_equal(self.handle.id(), other.handle.id())?)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}
