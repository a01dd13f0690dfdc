//! Owning handle over an engine resource, plus the identity trait shared by
//! every container-bound wrapper.
//!
//! A [`Handle`] pairs a raw engine id with RAII reference counting: `Clone`
//! increments the engine-side count, `Drop` decrements it and forgets the
//! id.  The engine releases the underlying resource when its count reaches
//! zero, so the last wrapper standing closes the object.

use hyve_engine as engine;
use hyve_engine::Hid;

use crate::attribute::Attributes;
use crate::error::{Error, Result};
use crate::file::File;

/// How a wrapper comes to hold a raw id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// A brand-new id from a create/open call.  The wrapper takes over the
    /// reference the engine already counted; no increment, eventual
    /// decrement.
    Owned,
    /// An id this wrapper does not exclusively own.  The count is
    /// incremented on construction so the resource outlives the wrapper.
    Shared,
}

/// A reference-counted engine handle.
#[derive(Debug)]
pub struct Handle {
    id: Hid,
}

impl Handle {
    /// Bind a raw id.  Fails with [`Error::InvalidHandle`] when the id does
    /// not name a live resource.
    pub fn from_raw(id: Hid, ownership: Ownership) -> Result<Handle> {
        if !engine::is_valid(id) {
            return Err(Error::InvalidHandle(format!(
                "{id} does not name a live engine resource"
            )));
        }
        if ownership == Ownership::Shared {
            engine::inc_ref(id)?;
        }
        Ok(Handle { id })
    }

    /// Take ownership of a fresh id from a create/open call.
    pub(crate) fn owned(id: Hid) -> Result<Handle> {
        Handle::from_raw(id, Ownership::Owned)
    }

    pub fn id(&self) -> Hid {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        engine::is_valid(self.id)
    }

    /// Whether two handles address the same engine resource.
    pub fn is_same(&self, other: &Handle) -> bool {
        self.id == other.id
    }

    pub fn inc_ref(&self) -> Result<u32> {
        Ok(engine::inc_ref(self.id)?)
    }

    pub fn dec_ref(&self) -> Result<u32> {
        Ok(engine::dec_ref(self.id)?)
    }

    pub fn ref_count(&self) -> Result<u32> {
        Ok(engine::ref_count(self.id)?)
    }
}

impl Clone for Handle {
    fn clone(&self) -> Handle {
        if let Err(err) = engine::inc_ref(self.id) {
            tracing::error!(id = self.id, %err, "clone of a dead handle");
        }
        Handle { id: self.id }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !engine::is_valid(self.id) {
            return;
        }
        if let Err(err) = engine::dec_ref(self.id) {
            tracing::warn!(id = self.id, %err, "error while releasing handle");
        }
    }
}

/// Identity operations shared by every wrapper bound to a container object
/// (file, group, dataset, attribute).
pub trait Object {
    fn handle(&self) -> &Handle;

    /// Slash path of the object within its container.
    fn name(&self) -> Result<String> {
        Ok(engine::object_name(self.handle().id())?)
    }

    /// Filesystem path of the container this object belongs to.
    fn file_name(&self) -> Result<String> {
        Ok(engine::object_file_name(self.handle().id())?)
    }

    /// A new [`File`] wrapper for the owning container.
    fn file(&self) -> Result<File> {
        let id = engine::object_file(self.handle().id())?;
        Ok(File::from_handle(Handle::owned(id)?))
    }

    fn is_valid(&self) -> bool {
        self.handle().is_valid()
    }

    fn ref_count(&self) -> Result<u32> {
        self.handle().ref_count()
    }

    /// Whether two wrappers address the same engine resource.
    fn is_same<O: Object>(&self, other: &O) -> bool {
        self.handle().is_same(other.handle())
    }

    /// The attribute collection attached to this object.
    fn attrs(&self) -> Attributes<'_> {
        Attributes::new(self.handle())
    }
}
