//! Typed, reference-counted object layer over the `hyve-engine` container
//! format.
//!
//! This crate wraps the engine's flat handle API in owning Rust types:
//! every wrapper holds a [`Handle`] whose `Clone` increments and whose
//! `Drop` decrements the engine-side reference count, so resources are
//! released deterministically when the last wrapper goes away.
//!
//! # Writing
//!
//! ```no_run
//! use hyve::{File, Object};
//!
//! let file = File::open("data.hyve", "w").unwrap();
//! let root = file.root().unwrap();
//! let grp = root.create_group("sensors").unwrap();
//! grp.create_dataset_from_slice("temperature", &[22.5f64, 23.1, 21.8])
//!     .unwrap();
//! grp.attrs().set_scalar("version", &1i64).unwrap();
//! ```
//!
//! # Reading
//!
//! ```no_run
//! use hyve::File;
//!
//! let file = File::open("data.hyve", "r").unwrap();
//! let grp = file.root().unwrap().open_group("sensors").unwrap();
//! let ds = grp.open_dataset("temperature").unwrap();
//! let values: Vec<f64> = ds.read_vec().unwrap();
//! println!("{values:?}");
//! ```

pub mod attribute;
pub mod dataset;
pub mod dataspace;
pub mod datatype;
pub mod element;
pub mod error;
pub mod file;
pub mod group;
pub mod handle;
pub mod properties;
pub mod transfer;

pub use attribute::{Attribute, Attributes};
pub use dataset::Dataset;
pub use dataspace::Dataspace;
pub use datatype::Datatype;
pub use element::Element;
pub use error::{Error, ReportGuard, Result};
pub use file::File;
pub use group::{Group, Links};
pub use handle::{Handle, Object, Ownership};
pub use properties::Properties;
pub use transfer::{AttributeTransfer, DatasetTransfer, Transfer};

// Re-exported for callers that drop down to the engine (tests, tooling).
pub use hyve_engine::{vlen_outstanding, Hid, Predefined, INVALID_HID};
