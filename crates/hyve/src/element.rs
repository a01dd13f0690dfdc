//! The closed set of element types and the process-wide descriptor cache.
//!
//! [`Element`] is sealed: exactly the types listed here can move through a
//! transfer channel, and an unregistered type is a compile error rather
//! than a runtime one.  Each type resolves its memory and disk descriptors
//! through a cache that builds every descriptor at most once, locks it
//! immutable, and pins it with an extra reference so it survives to process
//! exit.

use std::collections::HashMap;

use hyve_engine::{Hid, Predefined};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::datatype::Datatype;
use crate::error::{Error, Result};
use crate::transfer::Transfer;

mod sealed {
    pub trait Sealed {}
}

/// An element type that can be stored in datasets and attributes.
///
/// `memtype` describes the in-memory layout, `disktype` the canonical
/// stored layout; the engine converts between them during I/O.
pub trait Element: sealed::Sealed + Sized {
    fn memtype() -> Result<Datatype>;
    fn disktype() -> Result<Datatype>;

    /// Push `values` through the channel.
    fn write_all<C: Transfer>(channel: &mut C, values: &[Self]) -> Result<()>;

    /// Fill `values` from the channel.
    fn read_all<C: Transfer>(channel: &mut C, values: &mut [Self]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Descriptor cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ElemKind {
    I8,
    U8,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    Str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CacheKey {
    Mem(ElemKind),
    Disk(ElemKind),
}

static TYPE_CACHE: Lazy<Mutex<HashMap<CacheKey, Hid>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Resolve a descriptor through the cache, building it at most once.  The
/// cache holds one pinned reference per entry for the life of the process;
/// callers get their own counted reference on top.
fn cached(key: CacheKey, build: impl FnOnce() -> Result<Datatype>) -> Result<Datatype> {
    let mut cache = TYPE_CACHE.lock();
    if let Some(&id) = cache.get(&key) {
        return Datatype::shared(id);
    }
    let dt = build()?;
    dt.lock()?;
    // The pin: one extra reference owned by the cache itself.
    dt.handle().inc_ref()?;
    cache.insert(key, dt.handle().id());
    tracing::debug!(?key, id = dt.handle().id(), "type descriptor cached");
    Ok(dt)
}

fn varstr() -> Result<Datatype> {
    let mut dt = Datatype::predefined(Predefined::CString)?;
    dt.set_variable_size()?;
    Ok(dt)
}

// ---------------------------------------------------------------------------
// Numeric kinds: verbatim byte views
// ---------------------------------------------------------------------------

macro_rules! numeric_element {
    ($ty:ty, $kind:ident, $mem:ident, $disk:ident) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            fn memtype() -> Result<Datatype> {
                cached(CacheKey::Mem(ElemKind::$kind), || {
                    Datatype::predefined(Predefined::$mem)
                })
            }

            fn disktype() -> Result<Datatype> {
                cached(CacheKey::Disk(ElemKind::$kind), || {
                    Datatype::predefined(Predefined::$disk)
                })
            }

            fn write_all<C: Transfer>(channel: &mut C, values: &[Self]) -> Result<()> {
                channel.write_bytes(bytemuck::cast_slice(values))
            }

            fn read_all<C: Transfer>(channel: &mut C, values: &mut [Self]) -> Result<()> {
                channel.read_bytes(bytemuck::cast_slice_mut(values))
            }
        }
    };
}

numeric_element!(i8, I8, NativeI8, I8Le);
numeric_element!(u8, U8, NativeU8, U8Le);
numeric_element!(i32, I32, NativeI32, I32Le);
numeric_element!(u32, U32, NativeU32, U32Le);
numeric_element!(i64, I64, NativeI64, I64Le);
numeric_element!(u64, U64, NativeU64, U64Le);
numeric_element!(f32, F32, NativeF32, F32Le);
numeric_element!(f64, F64, NativeF64, F64Le);

// ---------------------------------------------------------------------------
// bool: widening copy through a byte buffer (bool is not a POD byte view)
// ---------------------------------------------------------------------------

impl sealed::Sealed for bool {}

impl Element for bool {
    fn memtype() -> Result<Datatype> {
        cached(CacheKey::Mem(ElemKind::Bool), || {
            Datatype::predefined(Predefined::NativeBool)
        })
    }

    fn disktype() -> Result<Datatype> {
        cached(CacheKey::Disk(ElemKind::Bool), || {
            Datatype::predefined(Predefined::U8Le)
        })
    }

    fn write_all<C: Transfer>(channel: &mut C, values: &[Self]) -> Result<()> {
        let bytes: Vec<u8> = values.iter().map(|&b| b as u8).collect();
        channel.write_bytes(&bytes)
    }

    fn read_all<C: Transfer>(channel: &mut C, values: &mut [Self]) -> Result<()> {
        let mut bytes = vec![0u8; values.len()];
        channel.read_bytes(&mut bytes)?;
        for (dst, b) in values.iter_mut().zip(&bytes) {
            *dst = *b != 0;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// String: variable-length path with scoped reclaim of engine buffers
// ---------------------------------------------------------------------------

impl sealed::Sealed for String {}

impl Element for String {
    fn memtype() -> Result<Datatype> {
        cached(CacheKey::Mem(ElemKind::Str), varstr)
    }

    fn disktype() -> Result<Datatype> {
        cached(CacheKey::Disk(ElemKind::Str), varstr)
    }

    fn write_all<C: Transfer>(channel: &mut C, values: &[Self]) -> Result<()> {
        let rows: Vec<&[u8]> = values.iter().map(|s| s.as_bytes()).collect();
        channel.write_varlen(&rows)
    }

    fn read_all<C: Transfer>(channel: &mut C, values: &mut [Self]) -> Result<()> {
        let items = channel.read_varlen()?;
        if items.len() != values.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} stored elements for {} destination slots",
                items.len(),
                values.len()
            )));
        }
        for (dst, row) in values.iter_mut().zip(items.rows()) {
            *dst = String::from_utf8_lossy(row).into_owned();
        }
        // `items` drops here, returning the engine allocation.
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// &str: write-only
// ---------------------------------------------------------------------------

impl<'a> sealed::Sealed for &'a str {}

impl<'a> Element for &'a str {
    fn memtype() -> Result<Datatype> {
        cached(CacheKey::Mem(ElemKind::Str), varstr)
    }

    fn disktype() -> Result<Datatype> {
        cached(CacheKey::Disk(ElemKind::Str), varstr)
    }

    fn write_all<C: Transfer>(channel: &mut C, values: &[Self]) -> Result<()> {
        let rows: Vec<&[u8]> = values.iter().map(|s| s.as_bytes()).collect();
        channel.write_varlen(&rows)
    }

    fn read_all<C: Transfer>(_channel: &mut C, _values: &mut [Self]) -> Result<()> {
        Err(Error::UnsupportedType(
            "&str is write-only; read into String instead",
        ))
    }
}
