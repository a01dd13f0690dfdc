//! Attributes: small named values attached to files, groups, and datasets.

use hyve_engine as engine;
use hyve_engine::{ErrorKind, Hid};

use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::element::Element;
use crate::error::{Error, ReportGuard, Result};
use crate::handle::{Handle, Object};
use crate::transfer::AttributeTransfer;

/// One attribute, opened or created through an [`Attributes`] collection.
#[derive(Debug, Clone)]
pub struct Attribute {
    handle: Handle,
}

impl Attribute {
    pub(crate) fn from_handle(handle: Handle) -> Attribute {
        Attribute { handle }
    }

    pub(crate) fn id(&self) -> Hid {
        self.handle.id()
    }

    /// The attribute's declared shape.
    pub fn dataspace(&self) -> Result<Dataspace> {
        let id = engine::attr_space(self.handle.id())?;
        Ok(Dataspace::from_handle(Handle::owned(id)?))
    }

    /// The attribute's stored element layout.
    pub fn datatype(&self) -> Result<Datatype> {
        let id = engine::attr_type(self.handle.id())?;
        Ok(Datatype::from_handle(Handle::owned(id)?))
    }

    /// Write the whole attribute; one element per point of its extent.
    pub fn write<T: Element>(&self, values: &[T]) -> Result<()> {
        let expected = self.dataspace()?.npoints()?;
        if values.len() as u64 != expected {
            return Err(Error::ShapeMismatch(format!(
                "{} values for an extent of {expected} elements",
                values.len()
            )));
        }
        let memtype = T::memtype()?;
        let mut channel = AttributeTransfer::new(self, &memtype);
        T::write_all(&mut channel, values)
    }

    /// Read the whole attribute; one destination slot per point of its
    /// extent.
    pub fn read<T: Element>(&self, values: &mut [T]) -> Result<()> {
        let expected = self.dataspace()?.npoints()?;
        if values.len() as u64 != expected {
            return Err(Error::ShapeMismatch(format!(
                "{} destination slots for an extent of {expected} elements",
                values.len()
            )));
        }
        let memtype = T::memtype()?;
        let mut channel = AttributeTransfer::new(self, &memtype);
        T::read_all(&mut channel, values)
    }
}

impl Object for Attribute {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// The attribute collection of one object.  Borrowed from the owner; does
/// not hold its own reference.
#[derive(Debug, Clone, Copy)]
pub struct Attributes<'a> {
    owner: &'a Handle,
}

impl<'a> Attributes<'a> {
    pub(crate) fn new(owner: &'a Handle) -> Attributes<'a> {
        Attributes { owner }
    }

    /// Create a new attribute with the layout of `T` and the given extent.
    pub fn create<T: Element>(&self, name: &str, space: &Dataspace) -> Result<Attribute> {
        let disktype = T::disktype()?;
        match engine::attr_create(self.owner.id(), name, disktype.id(), space.id()) {
            Ok(id) => Ok(Attribute::from_handle(Handle::owned(id)?)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(Error::NameCollision(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn open(&self, name: &str) -> Result<Attribute> {
        match engine::attr_open(self.owner.id(), name) {
            Ok(id) => Ok(Attribute::from_handle(Handle::owned(id)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::NameNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(engine::attr_exists(self.owner.id(), name)?)
    }

    pub fn len(&self) -> Result<u64> {
        Ok(engine::attr_count(self.owner.id())?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        match engine::attr_delete(self.owner.id(), name) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::NameNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Store `values` under `name`, whatever is there now.
    ///
    /// Absent: create and write.  Present with the same extent: overwrite
    /// in place, recreating only when the stored layout is incompatible
    /// with `T` (reporting is suppressed around the optimistic attempt;
    /// genuine failures such as a read-only container still propagate).
    /// Present with a different extent: delete and recreate.
    pub fn set<T: Element>(&self, name: &str, space: &Dataspace, values: &[T]) -> Result<()> {
        let expected = space.npoints()?;
        if values.len() as u64 != expected {
            return Err(Error::ShapeMismatch(format!(
                "{} values for an extent of {expected} elements",
                values.len()
            )));
        }
        if !self.exists(name)? {
            let attr = self.create::<T>(name, space)?;
            return attr.write(values);
        }

        let attr = self.open(name)?;
        if attr.dataspace()?.extent_equal(space)? {
            let quiet = ReportGuard::silence();
            let outcome = attr.write(values);
            drop(quiet);
            match outcome {
                Ok(()) => return Ok(()),
                Err(Error::EngineCall(err))
                    if matches!(
                        err.kind(),
                        ErrorKind::TypeMismatch | ErrorKind::ShapeMismatch
                    ) => {}
                Err(err) => return Err(err),
            }
        }
        drop(attr);

        self.remove(name)?;
        let attr = self.create::<T>(name, space)?;
        attr.write(values)
    }

    /// Scalar [`Attributes::set`].
    pub fn set_scalar<T: Element>(&self, name: &str, value: &T) -> Result<()> {
        let space = Dataspace::scalar()?;
        self.set(name, &space, std::slice::from_ref(value))
    }

    /// One-dimensional [`Attributes::set`] shaped from the slice length.
    pub fn set_slice<T: Element>(&self, name: &str, values: &[T]) -> Result<()> {
        let space = Dataspace::simple(&[values.len() as u64])?;
        self.set(name, &space, values)
    }

    /// Read a scalar attribute.
    pub fn get<T: Element + Default>(&self, name: &str) -> Result<T> {
        let attr = self.open(name)?;
        let npoints = attr.dataspace()?.npoints()?;
        if npoints != 1 {
            return Err(Error::ShapeMismatch(format!(
                "attribute '{name}' holds {npoints} elements, expected a scalar"
            )));
        }
        let mut out = Vec::with_capacity(1);
        out.push(T::default());
        attr.read(&mut out)?;
        Ok(out.remove(0))
    }

    /// Read a scalar attribute, or `None` when absent.
    pub fn try_get<T: Element + Default>(&self, name: &str) -> Result<Option<T>> {
        if self.exists(name)? {
            Ok(Some(self.get(name)?))
        } else {
            Ok(None)
        }
    }

    /// Read a whole attribute into a fresh vector.
    pub fn get_vec<T: Element + Default + Clone>(&self, name: &str) -> Result<Vec<T>> {
        let attr = self.open(name)?;
        let n = attr.dataspace()?.npoints()? as usize;
        let mut out = vec![T::default(); n];
        attr.read(&mut out)?;
        Ok(out)
    }
}
