//! Dataset creation properties.

use hyve_engine as engine;
use hyve_engine::Hid;

use crate::dataspace::Dataspace;
use crate::error::Result;
use crate::handle::Handle;

/// Creation-time storage properties for a dataset.
#[derive(Debug, Clone)]
pub struct Properties {
    handle: Handle,
}

impl Properties {
    /// An empty property list (contiguous storage, no compression).
    pub fn new() -> Result<Properties> {
        let id = engine::plist_create()?;
        Ok(Properties {
            handle: Handle::owned(id)?,
        })
    }

    /// Chunked storage with an explicit chunk shape.
    pub fn chunked(dims: &[u64]) -> Result<Properties> {
        let props = Properties::new()?;
        engine::plist_set_chunk(props.handle.id(), dims)?;
        Ok(props)
    }

    /// Chunked storage with a chunk shape estimated from the extent: a
    /// tenth of each dimension, floored at 32 and capped at the dimension.
    pub fn chunked_with_estimated_size(space: &Dataspace) -> Result<Properties> {
        let dims = space.dims()?;
        let chunk: Vec<u64> = dims.iter().map(|&d| estimate_chunk(d)).collect();
        Properties::chunked(&chunk)
    }

    /// Request deflate compression at the given level.
    pub fn set_deflate(&mut self, level: u8) -> Result<()> {
        engine::plist_set_deflate(self.handle.id(), level)?;
        Ok(())
    }

    pub(crate) fn id(&self) -> Hid {
        self.handle.id()
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

fn estimate_chunk(dim: u64) -> u64 {
    (dim / 10).max(32).min(dim)
}
