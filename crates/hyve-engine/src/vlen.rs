//! Engine-allocated variable-length element buffers.
//!
//! Variable-length reads hand the caller buffers the engine allocated.  The
//! allocation is tracked by a process-wide counter until it is reclaimed;
//! [`VarlenItems`] releases its allocation on drop, so every exit path
//! returns the buffers.  Tests use [`vlen_outstanding`] to verify that no
//! read path leaks.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static OUTSTANDING: Lazy<Mutex<HashSet<u64>>> = Lazy::new(|| Mutex::new(HashSet::new()));
static NEXT_TOKEN: Lazy<Mutex<u64>> = Lazy::new(|| Mutex::new(1));

/// A set of engine-allocated variable-length element buffers, one row per
/// element in selection order.
#[derive(Debug)]
pub struct VarlenItems {
    token: u64,
    rows: Vec<Vec<u8>>,
}

impl VarlenItems {
    /// Register a fresh allocation with the tracker.
    pub(crate) fn register(rows: Vec<Vec<u8>>) -> VarlenItems {
        let token = {
            let mut next = NEXT_TOKEN.lock();
            let t = *next;
            *next += 1;
            t
        };
        OUTSTANDING.lock().insert(token);
        tracing::trace!(token, rows = rows.len(), "varlen allocation registered");
        VarlenItems { token, rows }
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Drop for VarlenItems {
    fn drop(&mut self) {
        OUTSTANDING.lock().remove(&self.token);
        tracing::trace!(token = self.token, "varlen allocation reclaimed");
    }
}

/// Number of variable-length allocations the engine has handed out and not
/// yet had returned.
pub fn vlen_outstanding() -> usize {
    OUTSTANDING.lock().len()
}
