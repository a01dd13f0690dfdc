//! Object-layer error type and the scoped error-reporting guard.

use hyve_engine::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the object layer.
///
/// Engine failures are carried verbatim in [`Error::EngineCall`], including
/// the engine's walked diagnostic stack; the remaining variants are raised
/// by the wrapper itself before or instead of an engine call.
#[derive(Debug, Error)]
pub enum Error {
    /// A raw id did not name a live engine resource.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// An engine operation failed; the inner error carries the diagnostic
    /// stack accumulated while it propagated.
    #[error("engine call failed: {0}")]
    EngineCall(#[from] EngineError),

    /// A create call hit an existing link or attribute of that name.
    #[error("name already exists: {0}")]
    NameCollision(String),

    /// An open call named a link, attribute, or file that does not exist.
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// The element type cannot service this direction of transfer.
    #[error("unsupported element type: {0}")]
    UnsupportedType(&'static str),

    /// A caller-provided buffer does not match the selected element count.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Silences engine error reporting on this thread for the guard's scope and
/// restores the previous setting on drop.
///
/// Used around probes that are expected to fail, such as the optimistic
/// in-place attribute overwrite and `Group::try_open_dataset`.
#[derive(Debug)]
pub struct ReportGuard {
    prev: bool,
}

impl ReportGuard {
    pub fn silence() -> ReportGuard {
        ReportGuard {
            prev: hyve_engine::set_reporting(false),
        }
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        hyve_engine::set_reporting(self.prev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_guard_restores_on_drop() {
        assert!(hyve_engine::reporting_enabled());
        {
            let _quiet = ReportGuard::silence();
            assert!(!hyve_engine::reporting_enabled());
            {
                let _inner = ReportGuard::silence();
                assert!(!hyve_engine::reporting_enabled());
            }
            assert!(!hyve_engine::reporting_enabled());
        }
        assert!(hyve_engine::reporting_enabled());
    }
}
