//! Element type encodings: fixed-point, floating-point, string, and array
//! kinds, plus conversion between memory and disk representations.

use crate::error::{EngineError, ErrorKind};

/// Byte order of a fixed-width encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// The host's native byte order.
    pub fn native() -> Endian {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

/// String size: a fixed byte width or the variable-length sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrSize {
    Fixed(u64),
    Variable,
}

/// Argument to `type_set_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSizeArg {
    Bytes(u64),
    Variable,
}

/// The layout of one element.
///
/// Two encodings describe "the same object" when they are structurally
/// equal; the object layer's descriptor equality bottoms out here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeEncoding {
    /// Integer of `size` bytes.
    Fixed { size: u8, signed: bool, endian: Endian },
    /// IEEE float of `size` bytes (4 or 8).
    Float { size: u8, endian: Endian },
    /// Byte string, fixed-width or variable-length.
    Str { size: StrSize },
    /// Fixed-shape array of a base encoding.
    Array {
        base: Box<TypeEncoding>,
        dims: Vec<u64>,
    },
}

impl TypeEncoding {
    /// Size of one element in bytes, or `None` for variable-length.
    pub fn byte_size(&self) -> Option<u64> {
        match self {
            TypeEncoding::Fixed { size, .. } => Some(u64::from(*size)),
            TypeEncoding::Float { size, .. } => Some(u64::from(*size)),
            TypeEncoding::Str {
                size: StrSize::Fixed(n),
            } => Some(*n),
            TypeEncoding::Str {
                size: StrSize::Variable,
            } => None,
            TypeEncoding::Array { base, dims } => {
                let n: u64 = dims.iter().product();
                base.byte_size().map(|b| b * n)
            }
        }
    }

    pub fn is_variable(&self) -> bool {
        self.byte_size().is_none()
    }

    /// Whether elements of `self` can be converted to elements of `other`.
    ///
    /// The engine only converts within a class and only between equal-width,
    /// same-signedness encodings (an endianness swap); cross-class,
    /// cross-width, or cross-signedness requests are a `TypeMismatch`.
    pub fn convertible_to(&self, other: &TypeEncoding) -> bool {
        match (self, other) {
            (
                TypeEncoding::Fixed { size: a, signed: sa, .. },
                TypeEncoding::Fixed { size: b, signed: sb, .. },
            ) => a == b && sa == sb,
            (TypeEncoding::Float { size: a, .. }, TypeEncoding::Float { size: b, .. }) => a == b,
            (TypeEncoding::Str { size: a }, TypeEncoding::Str { size: b }) => a == b,
            (
                TypeEncoding::Array { base: a, dims: da },
                TypeEncoding::Array { base: b, dims: db },
            ) => da == db && a.convertible_to(b),
            _ => false,
        }
    }
}

/// Engine-predefined encodings, mirroring the "native layout" vs.
/// "canonical little-endian disk layout" split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predefined {
    NativeI8,
    NativeU8,
    NativeI32,
    NativeU32,
    NativeI64,
    NativeU64,
    NativeF32,
    NativeF64,
    /// Boolean-as-byte; the engine stores it as an unsigned byte.
    NativeBool,
    I8Le,
    U8Le,
    I32Le,
    U32Le,
    I64Le,
    U64Le,
    F32Le,
    F64Le,
    /// Single-byte C string base type; widen with `type_set_size`.
    CString,
}

impl Predefined {
    pub fn encoding(&self) -> TypeEncoding {
        let native = Endian::native();
        match self {
            Predefined::NativeI8 => fixed(1, true, native),
            Predefined::NativeU8 => fixed(1, false, native),
            Predefined::NativeI32 => fixed(4, true, native),
            Predefined::NativeU32 => fixed(4, false, native),
            Predefined::NativeI64 => fixed(8, true, native),
            Predefined::NativeU64 => fixed(8, false, native),
            Predefined::NativeF32 => TypeEncoding::Float { size: 4, endian: native },
            Predefined::NativeF64 => TypeEncoding::Float { size: 8, endian: native },
            Predefined::NativeBool => fixed(1, false, native),
            Predefined::I8Le => fixed(1, true, Endian::Little),
            Predefined::U8Le => fixed(1, false, Endian::Little),
            Predefined::I32Le => fixed(4, true, Endian::Little),
            Predefined::U32Le => fixed(4, false, Endian::Little),
            Predefined::I64Le => fixed(8, true, Endian::Little),
            Predefined::U64Le => fixed(8, false, Endian::Little),
            Predefined::F32Le => TypeEncoding::Float { size: 4, endian: Endian::Little },
            Predefined::F64Le => TypeEncoding::Float { size: 8, endian: Endian::Little },
            Predefined::CString => TypeEncoding::Str {
                size: StrSize::Fixed(1),
            },
        }
    }
}

fn fixed(size: u8, signed: bool, endian: Endian) -> TypeEncoding {
    TypeEncoding::Fixed { size, signed, endian }
}

fn element_width_and_swap(
    src: &TypeEncoding,
    dst: &TypeEncoding,
) -> Option<(usize, bool)> {
    match (src, dst) {
        (
            TypeEncoding::Fixed { size: a, signed: sa, endian: ea },
            TypeEncoding::Fixed { size: b, signed: sb, endian: eb },
        ) if a == b && sa == sb => Some((usize::from(*a), ea != eb)),
        (
            TypeEncoding::Float { size: a, endian: ea },
            TypeEncoding::Float { size: b, endian: eb },
        ) if a == b => Some((usize::from(*a), ea != eb)),
        (
            TypeEncoding::Str { size: StrSize::Fixed(a) },
            TypeEncoding::Str { size: StrSize::Fixed(b) },
        ) if a == b => Some((*a as usize, false)),
        _ => None,
    }
}

/// Convert a packed buffer of `count` elements from `src` encoding to `dst`
/// encoding.  Equal-width kinds only; a differing byte order swaps each
/// element in place.
pub fn convert_elements(
    src: &TypeEncoding,
    dst: &TypeEncoding,
    data: &[u8],
    count: u64,
) -> Result<Vec<u8>, EngineError> {
    // Arrays convert per base element over the flattened extent.
    if let (TypeEncoding::Array { base: sb, dims: sd }, TypeEncoding::Array { base: db, dims: dd }) =
        (src, dst)
    {
        if sd != dd {
            return Err(EngineError::new(
                ErrorKind::TypeMismatch,
                "convert_elements",
                "array dimensions differ",
            ));
        }
        let per: u64 = sd.iter().product();
        return convert_elements(sb, db, data, count * per);
    }

    let (width, swap) = element_width_and_swap(src, dst).ok_or_else(|| {
        EngineError::new(
            ErrorKind::TypeMismatch,
            "convert_elements",
            format!("cannot convert {src:?} to {dst:?}"),
        )
    })?;

    let expected = width
        .checked_mul(count as usize)
        .filter(|&n| n == data.len());
    if expected.is_none() {
        return Err(EngineError::new(
            ErrorKind::ShapeMismatch,
            "convert_elements",
            format!(
                "buffer holds {} bytes, expected {} x {width}",
                data.len(),
                count
            ),
        ));
    }

    let mut out = data.to_vec();
    if swap && width > 1 {
        for chunk in out.chunks_exact_mut(width) {
            chunk.reverse();
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes() {
        assert_eq!(Predefined::NativeI32.encoding().byte_size(), Some(4));
        assert_eq!(Predefined::NativeF64.encoding().byte_size(), Some(8));
        let vl = TypeEncoding::Str { size: StrSize::Variable };
        assert_eq!(vl.byte_size(), None);
        assert!(vl.is_variable());
        let arr = TypeEncoding::Array {
            base: Box::new(Predefined::F32Le.encoding()),
            dims: vec![2, 3],
        };
        assert_eq!(arr.byte_size(), Some(24));
    }

    #[test]
    fn identity_conversion() {
        let enc = Predefined::I32Le.encoding();
        let data = 7i32.to_le_bytes().to_vec();
        let out = convert_elements(&enc, &enc, &data, 1).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn endian_swap_conversion() {
        let le = Predefined::I32Le.encoding();
        let be = TypeEncoding::Fixed {
            size: 4,
            signed: true,
            endian: Endian::Big,
        };
        let data = 0x0102_0304i32.to_le_bytes().to_vec();
        let out = convert_elements(&le, &be, &data, 1).unwrap();
        assert_eq!(out, 0x0102_0304i32.to_be_bytes().to_vec());
    }

    #[test]
    fn cross_class_conversion_rejected() {
        let int = Predefined::I32Le.encoding();
        let float = Predefined::F32Le.encoding();
        let err = convert_elements(&int, &float, &[0; 4], 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn cross_signedness_conversion_rejected() {
        let signed = Predefined::I32Le.encoding();
        let unsigned = Predefined::U32Le.encoding();
        assert!(!signed.convertible_to(&unsigned));
        let err = convert_elements(&signed, &unsigned, &[0; 4], 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn short_buffer_rejected() {
        let enc = Predefined::I64Le.encoding();
        let err = convert_elements(&enc, &enc, &[0; 4], 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }
}
