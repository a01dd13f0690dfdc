//! Hierarchical binary-container storage engine.
//!
//! This crate is the low-level half of the workspace: it stores trees of
//! groups, datasets, and attributes behind opaque integer handles ([`Hid`])
//! with engine-side reference counts, and persists each container to disk in
//! a compact self-describing binary format.
//!
//! The API is deliberately flat and handle-oriented: every resource (file,
//! group, dataset, attribute, type descriptor, shape descriptor, property
//! list) is addressed by a `Hid`, acquired from a create/open call and
//! released through [`dec_ref`].  The typed, ownership-aware object layer
//! lives in the `hyve` crate; nothing here should be needed by ordinary
//! client code.
//!
//! Failures are reported as [`EngineError`] values carrying a stack of
//! context frames.  When error reporting is enabled (the default), raising
//! an error also emits a `tracing` event; see [`set_reporting`].

pub mod codec;
pub mod dtype;
pub mod error;
pub mod registry;
pub mod space;
pub mod store;
pub mod vlen;

pub use dtype::{Endian, Predefined, StrSize, TypeEncoding, TypeSizeArg};
pub use error::{EngineError, ErrorKind, reporting_enabled, set_reporting};
pub use registry::{
    attr_count, attr_create, attr_delete, attr_exists, attr_open, attr_read, attr_read_varlen,
    attr_space, attr_type, attr_write, attr_write_varlen, dataset_create, dataset_open,
    dataset_read, dataset_read_varlen, dataset_space, dataset_type, dataset_write,
    dataset_write_varlen, dec_ref, file_create, file_flush, file_open, group_create, group_open,
    inc_ref, is_container_file, is_valid, link_count, link_delete, link_exists,
    link_name_by_index, object_file, object_file_name, object_kind, object_name, plist_create,
    plist_set_chunk, plist_set_deflate, ref_count, space_dims, space_extent_equal, space_npoints,
    space_rank, space_scalar, space_select_all, space_select_hyperslab, space_select_npoints,
    space_simple, type_array_create, type_copy, type_copy_predefined, type_equal,
    type_is_variable_str, type_lock, type_set_size, type_size, ObjectKind,
};
pub use space::MAX_RANK;
pub use vlen::{vlen_outstanding, VarlenItems};

/// Opaque handle to an engine resource.  Negative values are never valid.
pub type Hid = i64;

/// The canonical invalid handle.
pub const INVALID_HID: Hid = -1;
