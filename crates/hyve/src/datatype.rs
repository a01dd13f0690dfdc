//! Element type descriptors.

use hyve_engine as engine;
use hyve_engine::{Hid, Predefined, TypeSizeArg};

use crate::error::Result;
use crate::handle::{Handle, Ownership};

/// A mutable (until locked) descriptor of one element's layout.
#[derive(Debug, Clone)]
pub struct Datatype {
    handle: Handle,
}

impl Datatype {
    /// A fresh, modifiable copy of an engine-predefined encoding.
    pub fn predefined(pred: Predefined) -> Result<Datatype> {
        let id = engine::type_copy_predefined(pred)?;
        Ok(Datatype {
            handle: Handle::owned(id)?,
        })
    }

    /// A modifiable copy of this descriptor.
    pub fn copy(&self) -> Result<Datatype> {
        let id = engine::type_copy(self.handle.id())?;
        Ok(Datatype {
            handle: Handle::owned(id)?,
        })
    }

    /// Attach to an existing descriptor id without taking it over.
    pub(crate) fn shared(id: Hid) -> Result<Datatype> {
        Ok(Datatype {
            handle: Handle::from_raw(id, Ownership::Shared)?,
        })
    }

    pub(crate) fn from_handle(handle: Handle) -> Datatype {
        Datatype { handle }
    }

    pub(crate) fn id(&self) -> Hid {
        self.handle.id()
    }

    /// Resize a string descriptor to a fixed byte width.
    pub fn set_size(&mut self, bytes: u64) -> Result<()> {
        engine::type_set_size(self.handle.id(), TypeSizeArg::Bytes(bytes))?;
        Ok(())
    }

    /// Mark a string descriptor variable-length.
    pub fn set_variable_size(&mut self) -> Result<()> {
        engine::type_set_size(self.handle.id(), TypeSizeArg::Variable)?;
        Ok(())
    }

    /// A fixed-shape array descriptor with this descriptor as its base.
    pub fn array_of(&self, dims: &[u64]) -> Result<Datatype> {
        let id = engine::type_array_create(self.handle.id(), dims)?;
        Ok(Datatype {
            handle: Handle::owned(id)?,
        })
    }

    /// Element size in bytes; `None` for variable-length.
    pub fn size(&self) -> Result<Option<u64>> {
        Ok(engine::type_size(self.handle.id())?)
    }

    pub fn is_variable_str(&self) -> Result<bool> {
        Ok(engine::type_is_variable_str(self.handle.id())?)
    }

    /// Structural equality, resolved by the engine.
    pub fn equals(&self, other: &Datatype) -> Result<bool> {
        Ok(engine::type_equal(self.handle.id(), other.handle.id())?)
    }

    /// Make this descriptor immutable.
    pub fn lock(&self) -> Result<()> {
        engine::type_lock(self.handle.id())?;
        Ok(())
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl PartialEq for Datatype {
    fn eq(&self, other: &Datatype) -> bool {
        self.equals(other).unwrap_or(false)
    }
}
