//! Datasets: typed N-dimensional element arrays inside a container.

use hyve_engine as engine;
use hyve_engine::{ErrorKind, Hid};

use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::group::Group;
use crate::handle::{Handle, Object};
use crate::properties::Properties;
use crate::transfer::DatasetTransfer;

/// A dataset bound to a container node.
#[derive(Debug, Clone)]
pub struct Dataset {
    handle: Handle,
}

impl Dataset {
    /// Create a dataset named `name` under `parent` with the on-disk layout
    /// of `T` and the given extent.  An existing link of that name is a
    /// [`Error::NameCollision`] and leaves the existing object intact.
    pub fn create<T: Element>(
        parent: &Group,
        name: &str,
        space: &Dataspace,
        props: Option<&Properties>,
    ) -> Result<Dataset> {
        let disktype = T::disktype()?;
        match engine::dataset_create(
            parent.id(),
            name,
            disktype.id(),
            space.id(),
            props.map(|p| p.id()),
        ) {
            Ok(id) => Ok(Dataset {
                handle: Handle::owned(id)?,
            }),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(Error::NameCollision(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// One-dimensional dataset created from and filled with `values`.
    pub fn create_from_slice<T: Element>(
        parent: &Group,
        name: &str,
        values: &[T],
    ) -> Result<Dataset> {
        let space = Dataspace::simple(&[values.len() as u64])?;
        let ds = Dataset::create::<T>(parent, name, &space, None)?;
        ds.write(values)?;
        Ok(ds)
    }

    /// Scalar dataset holding a single value.
    pub fn create_scalar<T: Element>(parent: &Group, name: &str, value: &T) -> Result<Dataset> {
        let space = Dataspace::scalar()?;
        let ds = Dataset::create::<T>(parent, name, &space, None)?;
        ds.write(std::slice::from_ref(value))?;
        Ok(ds)
    }

    pub(crate) fn from_handle(handle: Handle) -> Dataset {
        Dataset { handle }
    }

    pub(crate) fn id(&self) -> Hid {
        self.handle.id()
    }

    /// The dataset's declared shape.
    pub fn dataspace(&self) -> Result<Dataspace> {
        let id = engine::dataset_space(self.handle.id())?;
        Ok(Dataspace::from_handle(Handle::owned(id)?))
    }

    /// The dataset's stored element layout.
    pub fn datatype(&self) -> Result<Datatype> {
        let id = engine::dataset_type(self.handle.id())?;
        Ok(Datatype::from_handle(Handle::owned(id)?))
    }

    /// Write the full extent.  `values` must hold exactly one element per
    /// point of the extent.
    pub fn write<T: Element>(&self, values: &[T]) -> Result<()> {
        let space = self.dataspace()?;
        let expected = space.npoints()?;
        if values.len() as u64 != expected {
            return Err(Error::ShapeMismatch(format!(
                "{} values for an extent of {expected} elements",
                values.len()
            )));
        }
        let memtype = T::memtype()?;
        let mut channel = DatasetTransfer::new(self, &memtype, None, None);
        T::write_all(&mut channel, values)
    }

    /// Read the full extent into `values`, which must hold exactly one slot
    /// per point of the extent.
    pub fn read<T: Element>(&self, values: &mut [T]) -> Result<()> {
        let space = self.dataspace()?;
        let expected = space.npoints()?;
        if values.len() as u64 != expected {
            return Err(Error::ShapeMismatch(format!(
                "{} destination slots for an extent of {expected} elements",
                values.len()
            )));
        }
        let memtype = T::memtype()?;
        let mut channel = DatasetTransfer::new(self, &memtype, None, None);
        T::read_all(&mut channel, values)
    }

    /// Read the full extent into a fresh vector.
    pub fn read_vec<T: Element + Default + Clone>(&self) -> Result<Vec<T>> {
        let n = self.dataspace()?.npoints()? as usize;
        let mut out = vec![T::default(); n];
        self.read(&mut out)?;
        Ok(out)
    }

    /// Write through an explicit memory/file space pair.  `values` covers
    /// the full memory extent; the selections pick which elements move.
    pub fn write_slab<T: Element>(
        &self,
        values: &[T],
        mem_space: &Dataspace,
        file_space: &Dataspace,
    ) -> Result<()> {
        let expected = mem_space.npoints()?;
        if values.len() as u64 != expected {
            return Err(Error::ShapeMismatch(format!(
                "{} values for a memory extent of {expected} elements",
                values.len()
            )));
        }
        let memtype = T::memtype()?;
        let mut channel = DatasetTransfer::new(self, &memtype, Some(mem_space), Some(file_space));
        T::write_all(&mut channel, values)
    }

    /// Read through an explicit memory/file space pair.
    pub fn read_slab<T: Element>(
        &self,
        values: &mut [T],
        mem_space: &Dataspace,
        file_space: &Dataspace,
    ) -> Result<()> {
        let expected = mem_space.npoints()?;
        if values.len() as u64 != expected {
            return Err(Error::ShapeMismatch(format!(
                "{} destination slots for a memory extent of {expected} elements",
                values.len()
            )));
        }
        let memtype = T::memtype()?;
        let mut channel = DatasetTransfer::new(self, &memtype, Some(mem_space), Some(file_space));
        T::read_all(&mut channel, values)
    }
}

impl Object for Dataset {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}
