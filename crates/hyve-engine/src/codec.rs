//! Container persistence: a compact self-describing binary format.
//!
//! Layout: magic signature, format version, then the node tree serialized
//! depth-first.  All integers are little-endian.  The format round-trips
//! the full container state (links in order, attributes, dataset payloads,
//! creation properties) bit-exactly.

use byteorder::{ByteOrder, LittleEndian};

use crate::dtype::{Endian, StrSize, TypeEncoding};
use crate::error::{EngineError, ErrorKind};
use crate::space::Extent;
use crate::store::{AttrRow, Container, DatasetDef, NodeBody, Payload, PlistDef};

/// Magic signature at offset 0.
pub const MAGIC: &[u8; 4] = b"HYVE";
/// Current format version.
pub const VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize a container to bytes.
pub fn serialize(c: &Container) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    write_node(&mut buf, c, Container::ROOT);
    buf
}

fn write_node(buf: &mut Vec<u8>, c: &Container, idx: usize) {
    let node = c.node(idx);
    write_str(buf, &node.name);
    buf.extend_from_slice(&(node.attrs.len() as u32).to_le_bytes());
    for attr in &node.attrs {
        write_str(buf, &attr.name);
        write_encoding(buf, &attr.dtype);
        write_extent(buf, &attr.extent);
        write_payload(buf, &attr.payload);
    }
    match &node.body {
        NodeBody::Group { children } => {
            buf.push(0);
            buf.extend_from_slice(&(children.len() as u32).to_le_bytes());
            for &child in children {
                write_node(buf, c, child);
            }
        }
        NodeBody::Dataset(ds) => {
            buf.push(1);
            write_encoding(buf, &ds.dtype);
            write_extent(buf, &ds.extent);
            write_plist(buf, &ds.plist);
            write_payload(buf, &ds.payload);
        }
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn write_encoding(buf: &mut Vec<u8>, enc: &TypeEncoding) {
    match enc {
        TypeEncoding::Fixed { size, signed, endian } => {
            buf.push(0);
            buf.push(*size);
            buf.push(u8::from(*signed));
            buf.push(endian_byte(*endian));
        }
        TypeEncoding::Float { size, endian } => {
            buf.push(1);
            buf.push(*size);
            buf.push(endian_byte(*endian));
        }
        TypeEncoding::Str { size } => {
            buf.push(2);
            match size {
                StrSize::Fixed(n) => {
                    buf.push(0);
                    buf.extend_from_slice(&n.to_le_bytes());
                }
                StrSize::Variable => buf.push(1),
            }
        }
        TypeEncoding::Array { base, dims } => {
            buf.push(3);
            write_encoding(buf, base);
            buf.push(dims.len() as u8);
            for &d in dims {
                buf.extend_from_slice(&d.to_le_bytes());
            }
        }
    }
}

fn write_extent(buf: &mut Vec<u8>, extent: &Extent) {
    match extent {
        Extent::Scalar => buf.push(0),
        Extent::Simple(dims) => {
            buf.push(1);
            buf.push(dims.len() as u8);
            for &d in dims {
                buf.extend_from_slice(&d.to_le_bytes());
            }
        }
    }
}

fn write_plist(buf: &mut Vec<u8>, plist: &PlistDef) {
    let mut flags = 0u8;
    if plist.chunk.is_some() {
        flags |= 0x01;
    }
    if plist.deflate.is_some() {
        flags |= 0x02;
    }
    buf.push(flags);
    if let Some(chunk) = &plist.chunk {
        buf.push(chunk.len() as u8);
        for &d in chunk {
            buf.extend_from_slice(&d.to_le_bytes());
        }
    }
    if let Some(level) = plist.deflate {
        buf.push(level);
    }
}

fn write_payload(buf: &mut Vec<u8>, payload: &Payload) {
    match payload {
        Payload::Fixed(bytes) => {
            buf.push(0);
            buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        Payload::Varlen(rows) => {
            buf.push(1);
            buf.extend_from_slice(&(rows.len() as u64).to_le_bytes());
            for row in rows {
                buf.extend_from_slice(&(row.len() as u64).to_le_bytes());
                buf.extend_from_slice(row);
            }
        }
    }
}

fn endian_byte(e: Endian) -> u8 {
    match e {
        Endian::Little => 0,
        Endian::Big => 1,
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EngineError> {
        if n > self.remaining() {
            return Err(EngineError::new(
                ErrorKind::Corrupt,
                "codec_parse",
                format!(
                    "unexpected end of container: need {} bytes at {}, have {}",
                    n,
                    self.pos,
                    self.data.len()
                ),
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Validate a length-prefixed element count before reserving for it.
    /// Every element occupies at least `min_each` bytes, so a count that
    /// cannot fit in the remaining input is corrupt no matter what follows.
    fn count(&self, count: u64, min_each: usize, what: &str) -> Result<usize, EngineError> {
        if count > (self.remaining() / min_each) as u64 {
            return Err(EngineError::new(
                ErrorKind::Corrupt,
                "codec_parse",
                format!("{what} count {count} exceeds the container size"),
            ));
        }
        Ok(count as usize)
    }

    fn u8(&mut self) -> Result<u8, EngineError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, EngineError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64, EngineError> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    fn string(&mut self) -> Result<String, EngineError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            EngineError::new(ErrorKind::Corrupt, "codec_parse", "non-UTF-8 name")
        })
    }
}

/// Parse a serialized container.
pub fn parse(data: &[u8]) -> Result<Container, EngineError> {
    if data.len() < 5 || &data[..4] != MAGIC {
        return Err(EngineError::new(
            ErrorKind::Corrupt,
            "codec_parse",
            "container signature not found",
        ));
    }
    if data[4] != VERSION {
        return Err(EngineError::new(
            ErrorKind::Corrupt,
            "codec_parse",
            format!("unsupported container version {}", data[4]),
        ));
    }
    let mut r = Reader { data, pos: 5 };
    let mut c = Container {
        nodes: Vec::new(),
        next_attr_id: 1,
    };
    read_node(&mut r, &mut c, None)?;
    Ok(c)
}

/// Whether the byte prefix looks like a serialized container.
pub fn has_signature(data: &[u8]) -> bool {
    data.len() >= 4 && &data[..4] == MAGIC
}

fn read_node(
    r: &mut Reader<'_>,
    c: &mut Container,
    parent: Option<usize>,
) -> Result<usize, EngineError> {
    let name = r.string()?;
    // Smallest attribute on disk: 4-byte name length, 2-byte encoding,
    // 1-byte extent tag, 9-byte empty payload.
    let attr_count = {
        let raw = r.u32()?;
        r.count(raw as u64, 16, "attribute")?
    };
    let mut attrs = Vec::with_capacity(attr_count);
    for _ in 0..attr_count {
        let attr_name = r.string()?;
        let dtype = read_encoding(r)?;
        let extent = read_extent(r)?;
        let payload = read_payload(r)?;
        let id = c.next_attr_id;
        c.next_attr_id += 1;
        attrs.push(AttrRow {
            id,
            name: attr_name,
            dtype,
            extent,
            payload,
        });
    }

    let idx = c.nodes.len();
    c.nodes.push(crate::store::Node {
        name,
        parent,
        attrs,
        body: NodeBody::Group {
            children: Vec::new(),
        },
    });

    match r.u8()? {
        0 => {
            // Smallest child node: 4-byte name length, 4-byte attribute
            // count, 1-byte body tag, 4-byte child count.
            let child_count = {
                let raw = r.u32()?;
                r.count(raw as u64, 13, "child node")?
            };
            let mut children = Vec::with_capacity(child_count);
            for _ in 0..child_count {
                children.push(read_node(r, c, Some(idx))?);
            }
            c.nodes[idx].body = NodeBody::Group { children };
        }
        1 => {
            let dtype = read_encoding(r)?;
            let extent = read_extent(r)?;
            let plist = read_plist(r)?;
            let payload = read_payload(r)?;
            c.nodes[idx].body = NodeBody::Dataset(DatasetDef {
                dtype,
                extent,
                plist,
                payload,
            });
        }
        tag => {
            return Err(EngineError::new(
                ErrorKind::Corrupt,
                "codec_parse",
                format!("unknown node tag {tag}"),
            ));
        }
    }
    Ok(idx)
}

fn read_encoding(r: &mut Reader<'_>) -> Result<TypeEncoding, EngineError> {
    match r.u8()? {
        0 => {
            let size = r.u8()?;
            let signed = r.u8()? != 0;
            let endian = read_endian(r)?;
            Ok(TypeEncoding::Fixed { size, signed, endian })
        }
        1 => {
            let size = r.u8()?;
            let endian = read_endian(r)?;
            Ok(TypeEncoding::Float { size, endian })
        }
        2 => match r.u8()? {
            0 => Ok(TypeEncoding::Str {
                size: StrSize::Fixed(r.u64()?),
            }),
            1 => Ok(TypeEncoding::Str {
                size: StrSize::Variable,
            }),
            tag => Err(EngineError::new(
                ErrorKind::Corrupt,
                "codec_parse",
                format!("unknown string size tag {tag}"),
            )),
        },
        3 => {
            let base = read_encoding(r)?;
            let rank = {
                let raw = r.u8()?;
                r.count(raw as u64, 8, "array dimension")?
            };
            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                dims.push(r.u64()?);
            }
            Ok(TypeEncoding::Array {
                base: Box::new(base),
                dims,
            })
        }
        tag => Err(EngineError::new(
            ErrorKind::Corrupt,
            "codec_parse",
            format!("unknown encoding tag {tag}"),
        )),
    }
}

fn read_endian(r: &mut Reader<'_>) -> Result<Endian, EngineError> {
    match r.u8()? {
        0 => Ok(Endian::Little),
        1 => Ok(Endian::Big),
        tag => Err(EngineError::new(
            ErrorKind::Corrupt,
            "codec_parse",
            format!("unknown endian tag {tag}"),
        )),
    }
}

fn read_extent(r: &mut Reader<'_>) -> Result<Extent, EngineError> {
    match r.u8()? {
        0 => Ok(Extent::Scalar),
        1 => {
            let rank = {
                let raw = r.u8()?;
                r.count(raw as u64, 8, "extent dimension")?
            };
            let mut dims = Vec::with_capacity(rank);
            for _ in 0..rank {
                dims.push(r.u64()?);
            }
            Ok(Extent::Simple(dims))
        }
        tag => Err(EngineError::new(
            ErrorKind::Corrupt,
            "codec_parse",
            format!("unknown extent tag {tag}"),
        )),
    }
}

fn read_plist(r: &mut Reader<'_>) -> Result<PlistDef, EngineError> {
    let flags = r.u8()?;
    let chunk = if flags & 0x01 != 0 {
        let rank = {
            let raw = r.u8()?;
            r.count(raw as u64, 8, "chunk dimension")?
        };
        let mut dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            dims.push(r.u64()?);
        }
        Some(dims)
    } else {
        None
    };
    let deflate = if flags & 0x02 != 0 {
        Some(r.u8()?)
    } else {
        None
    };
    Ok(PlistDef { chunk, deflate })
}

fn read_payload(r: &mut Reader<'_>) -> Result<Payload, EngineError> {
    match r.u8()? {
        0 => {
            let len = {
                let raw = r.u64()?;
                r.count(raw, 1, "payload byte")?
            };
            Ok(Payload::Fixed(r.take(len)?.to_vec()))
        }
        1 => {
            // Each row carries its own 8-byte length prefix.
            let count = {
                let raw = r.u64()?;
                r.count(raw, 8, "variable-length row")?
            };
            let mut rows = Vec::with_capacity(count);
            for _ in 0..count {
                let len = {
                    let raw = r.u64()?;
                    r.count(raw, 1, "row byte")?
                };
                rows.push(r.take(len)?.to_vec());
            }
            Ok(Payload::Varlen(rows))
        }
        tag => Err(EngineError::new(
            ErrorKind::Corrupt,
            "codec_parse",
            format!("unknown payload tag {tag}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Predefined;
    use crate::store::Node;

    fn sample_container() -> Container {
        let mut c = Container::new();
        let g = c.insert_node(
            Container::ROOT,
            "sensors",
            NodeBody::Group { children: Vec::new() },
        );
        let enc = Predefined::F64Le.encoding();
        c.insert_node(
            g,
            "temperature",
            NodeBody::Dataset(DatasetDef {
                dtype: enc.clone(),
                extent: Extent::Simple(vec![3]),
                plist: PlistDef {
                    chunk: Some(vec![32]),
                    deflate: Some(6),
                },
                payload: Payload::Fixed(vec![1; 24]),
            }),
        );
        c.node_mut(g).attrs.push(AttrRow {
            id: 1,
            name: "location".into(),
            dtype: TypeEncoding::Str { size: StrSize::Variable },
            extent: Extent::Scalar,
            payload: Payload::Varlen(vec![b"lab".to_vec()]),
        });
        c.next_attr_id = 2;
        c
    }

    #[test]
    fn round_trip_is_exact() {
        let c = sample_container();
        let bytes = serialize(&c);
        assert!(has_signature(&bytes));
        let parsed = parse(&bytes).unwrap();
        // Node tree, attrs, payloads, and plists all survive.
        assert_eq!(parsed.nodes.len(), c.nodes.len());
        for (a, b) in parsed.nodes.iter().zip(&c.nodes) {
            let (a, b): (&Node, &Node) = (a, b);
            assert_eq!(a.name, b.name);
            assert_eq!(a.body, b.body);
            assert_eq!(a.attrs.len(), b.attrs.len());
            for (x, y) in a.attrs.iter().zip(&b.attrs) {
                assert_eq!(x.name, y.name);
                assert_eq!(x.dtype, y.dtype);
                assert_eq!(x.extent, y.extent);
                assert_eq!(x.payload, y.payload);
            }
        }
    }

    #[test]
    fn bad_magic_rejected() {
        let err = parse(b"NOPE\x01").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn bad_version_rejected() {
        let err = parse(b"HYVE\x63").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn truncated_container_rejected() {
        let bytes = serialize(&sample_container());
        let err = parse(&bytes[..bytes.len() / 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    // Header for a container whose root is a scalar i64 dataset, up to but
    // not including the payload.
    fn dataset_header() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(MAGIC);
        b.push(VERSION);
        b.extend_from_slice(&0u32.to_le_bytes()); // empty name
        b.extend_from_slice(&0u32.to_le_bytes()); // no attributes
        b.push(1); // dataset body
        b.extend_from_slice(&[0, 8, 1, 0]); // fixed, 8 bytes, signed, LE
        b.push(0); // scalar extent
        b.push(0); // no chunk, no deflate
        b
    }

    #[test]
    fn oversized_fixed_payload_length_rejected() {
        let mut b = dataset_header();
        b.push(0); // fixed payload
        b.extend_from_slice(&u64::MAX.to_le_bytes());
        let err = parse(&b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn oversized_varlen_row_count_rejected() {
        let mut b = dataset_header();
        b.push(1); // varlen payload
        b.extend_from_slice(&u64::MAX.to_le_bytes());
        let err = parse(&b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn oversized_attribute_count_rejected() {
        let mut b = Vec::new();
        b.extend_from_slice(MAGIC);
        b.push(VERSION);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = parse(&b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn oversized_extent_rank_rejected() {
        let mut b = Vec::new();
        b.extend_from_slice(MAGIC);
        b.push(VERSION);
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.push(1); // dataset body
        b.extend_from_slice(&[0, 8, 1, 0]);
        b.push(1); // simple extent
        b.push(u8::MAX); // rank far beyond the remaining bytes
        let err = parse(&b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}
