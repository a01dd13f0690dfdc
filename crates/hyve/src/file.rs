//! Container files and their open modes.

use std::path::Path;

use hyve_engine as engine;
use hyve_engine::{EngineError, ErrorKind};

use crate::error::{Error, Result};
use crate::group::Group;
use crate::handle::{Handle, Object};

/// An open container file.
///
/// The container itself stays open as long as any handle into it exists;
/// dropping the last one persists (for writable opens) and closes it.
#[derive(Debug, Clone)]
pub struct File {
    handle: Handle,
}

impl File {
    /// Open or create a container.  Modes:
    ///
    /// - `"w"`: create, truncating an existing file
    /// - `"a"`: open read-write when a container exists, create otherwise
    /// - `"w-"`: create, failing when the file exists
    /// - `"r"`: open read-only; the file must exist
    /// - `"r+"`: open read-write; the file must exist
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<File> {
        let path = path.as_ref();
        let id = match mode {
            "w" => engine::file_create(path, false)?,
            "w-" => match engine::file_create(path, true) {
                Ok(id) => id,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    return Err(Error::NameCollision(path.display().to_string()))
                }
                Err(err) => return Err(err.into()),
            },
            "a" => {
                if path.exists() && engine::is_container_file(path) {
                    engine::file_open(path, true)?
                } else {
                    engine::file_create(path, false)?
                }
            }
            "r" | "r+" => match engine::file_open(path, mode == "r+") {
                Ok(id) => id,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Err(Error::NameNotFound(path.display().to_string()))
                }
                Err(err) => return Err(err.into()),
            },
            other => {
                return Err(Error::EngineCall(EngineError::new(
                    ErrorKind::InvalidArgument,
                    "file_open",
                    format!("unknown mode '{other}'"),
                )))
            }
        };
        Ok(File {
            handle: Handle::owned(id)?,
        })
    }

    pub(crate) fn from_handle(handle: Handle) -> File {
        File { handle }
    }

    /// The container's root group.
    pub fn root(&self) -> Result<Group> {
        let id = engine::group_open(self.handle.id(), "/")?;
        Ok(Group::from_handle(Handle::owned(id)?))
    }

    /// Persist a writable container to disk now.
    pub fn flush(&self) -> Result<()> {
        engine::file_flush(self.handle.id())?;
        Ok(())
    }

    /// Release this handle.  The container closes once every other handle
    /// into it is gone as well.
    pub fn close(self) {}
}

impl Object for File {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}
