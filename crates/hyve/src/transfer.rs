//! Transfer channels: the seam between element marshalling and the engine's
//! bulk I/O calls.

use hyve_engine as engine;
use hyve_engine::VarlenItems;

use crate::attribute::Attribute;
use crate::dataset::Dataset;
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::Result;

/// A byte-level read/write channel bound to one target.
///
/// [`Element`](crate::Element) implementations drive one of these; the
/// channel decides which engine call the bytes go through.
pub trait Transfer {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
    fn read_bytes(&mut self, bytes: &mut [u8]) -> Result<()>;
    fn write_varlen(&mut self, items: &[&[u8]]) -> Result<()>;
    fn read_varlen(&mut self) -> Result<VarlenItems>;
}

/// Channel into a dataset, with optional memory and file selections.
/// `None` means the dataset's own full extent.
pub struct DatasetTransfer<'a> {
    dataset: &'a Dataset,
    memtype: &'a Datatype,
    mem_space: Option<&'a Dataspace>,
    file_space: Option<&'a Dataspace>,
}

impl<'a> DatasetTransfer<'a> {
    pub fn new(
        dataset: &'a Dataset,
        memtype: &'a Datatype,
        mem_space: Option<&'a Dataspace>,
        file_space: Option<&'a Dataspace>,
    ) -> DatasetTransfer<'a> {
        DatasetTransfer {
            dataset,
            memtype,
            mem_space,
            file_space,
        }
    }
}

impl Transfer for DatasetTransfer<'_> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        engine::dataset_write(
            self.dataset.id(),
            self.memtype.id(),
            self.mem_space.map(|s| s.id()),
            self.file_space.map(|s| s.id()),
            bytes,
        )?;
        Ok(())
    }

    fn read_bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        engine::dataset_read(
            self.dataset.id(),
            self.memtype.id(),
            self.mem_space.map(|s| s.id()),
            self.file_space.map(|s| s.id()),
            bytes,
        )?;
        Ok(())
    }

    fn write_varlen(&mut self, items: &[&[u8]]) -> Result<()> {
        engine::dataset_write_varlen(
            self.dataset.id(),
            self.memtype.id(),
            self.mem_space.map(|s| s.id()),
            self.file_space.map(|s| s.id()),
            items,
        )?;
        Ok(())
    }

    fn read_varlen(&mut self) -> Result<VarlenItems> {
        Ok(engine::dataset_read_varlen(
            self.dataset.id(),
            self.memtype.id(),
            self.mem_space.map(|s| s.id()),
            self.file_space.map(|s| s.id()),
        )?)
    }
}

/// Channel into an attribute.  Attributes transfer their whole extent;
/// there is no selection.
pub struct AttributeTransfer<'a> {
    attribute: &'a Attribute,
    memtype: &'a Datatype,
}

impl<'a> AttributeTransfer<'a> {
    pub fn new(attribute: &'a Attribute, memtype: &'a Datatype) -> AttributeTransfer<'a> {
        AttributeTransfer { attribute, memtype }
    }
}

impl Transfer for AttributeTransfer<'_> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        engine::attr_write(self.attribute.id(), self.memtype.id(), bytes)?;
        Ok(())
    }

    fn read_bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        engine::attr_read(self.attribute.id(), self.memtype.id(), bytes)?;
        Ok(())
    }

    fn write_varlen(&mut self, items: &[&[u8]]) -> Result<()> {
        engine::attr_write_varlen(self.attribute.id(), self.memtype.id(), items)?;
        Ok(())
    }

    fn read_varlen(&mut self) -> Result<VarlenItems> {
        Ok(engine::attr_read_varlen(
            self.attribute.id(),
            self.memtype.id(),
        )?)
    }
}
