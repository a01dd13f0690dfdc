//! Groups: named containers of links, with a positional link cursor.

use hyve_engine as engine;
use hyve_engine::{ErrorKind, Hid};

use crate::dataset::Dataset;
use crate::dataspace::Dataspace;
use crate::element::Element;
use crate::error::{Error, ReportGuard, Result};
use crate::handle::{Handle, Object};
use crate::properties::Properties;

/// A group bound to a container node.
#[derive(Debug, Clone)]
pub struct Group {
    handle: Handle,
}

impl Group {
    pub(crate) fn from_handle(handle: Handle) -> Group {
        Group { handle }
    }

    pub(crate) fn id(&self) -> Hid {
        self.handle.id()
    }

    pub fn create_group(&self, name: &str) -> Result<Group> {
        match engine::group_create(self.handle.id(), name) {
            Ok(id) => Ok(Group::from_handle(Handle::owned(id)?)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(Error::NameCollision(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn open_group(&self, name: &str) -> Result<Group> {
        match engine::group_open(self.handle.id(), name) {
            Ok(id) => Ok(Group::from_handle(Handle::owned(id)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::NameNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Open the named group, creating it first when absent.
    pub fn require_group(&self, name: &str) -> Result<Group> {
        if self.exists(name)? {
            self.open_group(name)
        } else {
            self.create_group(name)
        }
    }

    /// Whether a link of this name exists in the group.
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(engine::link_exists(self.handle.id(), name)?)
    }

    /// Number of links in the group.
    pub fn len(&self) -> Result<u64> {
        Ok(engine::link_count(self.handle.id())?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Link name at a position in `[0, len)`, engine-native order.
    pub fn link_name(&self, idx: u64) -> Result<String> {
        Ok(engine::link_name_by_index(self.handle.id(), idx)?)
    }

    /// Delete a link.  The object behind it is destroyed with the container
    /// once no open handle addresses it.
    pub fn remove(&self, name: &str) -> Result<()> {
        match engine::link_delete(self.handle.id(), name) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::NameNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Create a dataset with the layout of `T`, chunked with an estimated
    /// chunk shape for non-scalar extents.
    pub fn create_dataset<T: Element>(&self, name: &str, space: &Dataspace) -> Result<Dataset> {
        let props = if space.rank()? > 0 {
            Some(Properties::chunked_with_estimated_size(space)?)
        } else {
            None
        };
        Dataset::create::<T>(self, name, space, props.as_ref())
    }

    /// One-dimensional dataset created from and filled with `values`.
    pub fn create_dataset_from_slice<T: Element>(
        &self,
        name: &str,
        values: &[T],
    ) -> Result<Dataset> {
        Dataset::create_from_slice(self, name, values)
    }

    /// Scalar dataset holding a single value.
    pub fn create_scalar<T: Element>(&self, name: &str, value: &T) -> Result<Dataset> {
        Dataset::create_scalar(self, name, value)
    }

    pub fn open_dataset(&self, name: &str) -> Result<Dataset> {
        match engine::dataset_open(self.handle.id(), name) {
            Ok(id) => Ok(Dataset::from_handle(Handle::owned(id)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::NameNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Open a dataset, or `None` when no link of that name exists.  A link
    /// that exists but is not a dataset is still an error.  Reporting is
    /// suppressed around the probe.
    pub fn try_open_dataset(&self, name: &str) -> Result<Option<Dataset>> {
        let _quiet = ReportGuard::silence();
        match engine::dataset_open(self.handle.id(), name) {
            Ok(id) => Ok(Some(Dataset::from_handle(Handle::owned(id)?))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// A lazy positional cursor over the group's link names.
    pub fn iter(&self) -> Result<Links<'_>> {
        let len = self.len()?;
        Ok(Links {
            group: self,
            front: 0,
            back: len,
        })
    }
}

impl Object for Group {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Bidirectional cursor over `[0, len)` yielding link names by position.
/// The length is captured when the cursor is created.
#[derive(Debug, Clone)]
pub struct Links<'a> {
    group: &'a Group,
    front: u64,
    back: u64,
}

impl Iterator for Links<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.group.link_name(self.front);
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.back - self.front) as usize;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for Links<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.group.link_name(self.back))
    }
}

impl ExactSizeIterator for Links<'_> {}
