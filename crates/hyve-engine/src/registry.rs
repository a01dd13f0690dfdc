//! The process-wide engine: a table of reference-counted handles over
//! containers, nodes, attributes, type descriptors, shape descriptors, and
//! property lists, plus the bulk I/O entry points.
//!
//! Every public function locks the single engine mutex for its whole
//! duration; the engine is synchronous and not reentrant.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::codec;
use crate::dtype::{Predefined, StrSize, TypeEncoding, TypeSizeArg};
use crate::error::{EngineError, ErrorKind};
use crate::space::SpaceDef;
use crate::store::{AttrRow, Container, DatasetDef, NodeBody, Payload, PlistDef};
use crate::vlen::VarlenItems;
use crate::Hid;

type Result<T> = std::result::Result<T, EngineError>;

/// What kind of resource a handle names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    File,
    Group,
    Dataset,
    Attribute,
    Datatype,
    Dataspace,
    Plist,
}

#[derive(Debug)]
struct TypeState {
    enc: TypeEncoding,
    locked: bool,
}

#[derive(Debug)]
enum Resource {
    File(u64),
    Node { file: u64, node: usize },
    Attr { file: u64, node: usize, attr: u64 },
    Type(TypeState),
    Space(SpaceDef),
    Plist(PlistDef),
}

#[derive(Debug)]
struct Entry {
    refcount: u32,
    kind: ObjectKind,
    res: Resource,
}

#[derive(Debug)]
struct FileState {
    path: PathBuf,
    writable: bool,
    container: Container,
    /// Open file-class handles.
    file_handles: u32,
    /// Open node- and attribute-class handles.
    object_handles: u32,
}

#[derive(Debug, Default)]
struct Engine {
    next_hid: Hid,
    handles: HashMap<Hid, Entry>,
    files: HashMap<u64, FileState>,
    next_file: u64,
}

static ENGINE: Lazy<Mutex<Engine>> = Lazy::new(|| {
    Mutex::new(Engine {
        next_hid: 1,
        next_file: 1,
        ..Engine::default()
    })
});

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

impl Engine {
    fn alloc(&mut self, kind: ObjectKind, res: Resource) -> Hid {
        let id = self.next_hid;
        self.next_hid += 1;
        match &res {
            Resource::File(fid) => {
                if let Some(fs) = self.files.get_mut(fid) {
                    fs.file_handles += 1;
                }
            }
            Resource::Node { file, .. } | Resource::Attr { file, .. } => {
                if let Some(fs) = self.files.get_mut(file) {
                    fs.object_handles += 1;
                }
            }
            _ => {}
        }
        self.handles.insert(
            id,
            Entry {
                refcount: 1,
                kind,
                res,
            },
        );
        id
    }

    fn entry(&self, id: Hid, op: &'static str) -> Result<&Entry> {
        if id < 0 {
            return Err(EngineError::new(ErrorKind::InvalidHandle, op, "negative handle"));
        }
        self.handles
            .get(&id)
            .ok_or_else(|| EngineError::new(ErrorKind::InvalidHandle, op, format!("no handle {id}")))
    }

    fn entry_mut(&mut self, id: Hid, op: &'static str) -> Result<&mut Entry> {
        if id < 0 {
            return Err(EngineError::new(ErrorKind::InvalidHandle, op, "negative handle"));
        }
        self.handles
            .get_mut(&id)
            .ok_or_else(|| EngineError::new(ErrorKind::InvalidHandle, op, format!("no handle {id}")))
    }

    fn file_state(&self, fid: u64, op: &'static str) -> Result<&FileState> {
        self.files
            .get(&fid)
            .ok_or_else(|| EngineError::new(ErrorKind::InvalidHandle, op, "container is closed"))
    }

    fn file_state_mut(&mut self, fid: u64, op: &'static str) -> Result<&mut FileState> {
        self.files
            .get_mut(&fid)
            .ok_or_else(|| EngineError::new(ErrorKind::InvalidHandle, op, "container is closed"))
    }

    /// Resolve a location handle (file, group, or dataset) to its node.
    fn node_of(&self, id: Hid, op: &'static str) -> Result<(u64, usize)> {
        match &self.entry(id, op)?.res {
            Resource::File(fid) => Ok((*fid, Container::ROOT)),
            Resource::Node { file, node } => Ok((*file, *node)),
            Resource::Attr { .. } => Err(EngineError::new(
                ErrorKind::InvalidArgument,
                op,
                "attribute handle where an object was expected",
            )),
            _ => Err(EngineError::new(
                ErrorKind::InvalidArgument,
                op,
                "handle does not name a container object",
            )),
        }
    }

    fn type_enc(&self, id: Hid, op: &'static str) -> Result<&TypeEncoding> {
        match &self.entry(id, op)?.res {
            Resource::Type(t) => Ok(&t.enc),
            _ => Err(EngineError::new(
                ErrorKind::InvalidArgument,
                op,
                "handle is not a type descriptor",
            )),
        }
    }

    fn space_def(&self, id: Hid, op: &'static str) -> Result<&SpaceDef> {
        match &self.entry(id, op)?.res {
            Resource::Space(s) => Ok(s),
            _ => Err(EngineError::new(
                ErrorKind::InvalidArgument,
                op,
                "handle is not a shape descriptor",
            )),
        }
    }

    fn check_writable(&self, fid: u64, op: &'static str) -> Result<()> {
        let fs = self.file_state(fid, op)?;
        if fs.writable {
            Ok(())
        } else {
            Err(EngineError::new(
                ErrorKind::ReadOnly,
                op,
                format!("'{}' is open read-only", fs.path.display()),
            ))
        }
    }

    fn persist(&self, fid: u64, op: &'static str) -> Result<()> {
        let fs = self.file_state(fid, op)?;
        let bytes = codec::serialize(&fs.container);
        std::fs::write(&fs.path, bytes).map_err(|e| {
            EngineError::new(
                ErrorKind::Io,
                op,
                format!("cannot write '{}': {e}", fs.path.display()),
            )
        })
    }

    /// Drop the file state once the last handle of any class is gone,
    /// persisting writable containers first.
    fn maybe_close_file(&mut self, fid: u64) -> Result<()> {
        let done = match self.files.get(&fid) {
            Some(fs) => fs.file_handles == 0 && fs.object_handles == 0,
            None => false,
        };
        if !done {
            return Ok(());
        }
        let writable = self.files[&fid].writable;
        if writable {
            self.persist(fid, "file_close")?;
        }
        if let Some(fs) = self.files.remove(&fid) {
            tracing::debug!(path = %fs.path.display(), "container closed");
        }
        Ok(())
    }

    /// Walk slash-separated path components from a starting node.
    fn resolve_path(&self, fid: u64, start: usize, path: &str, op: &'static str) -> Result<usize> {
        let c = &self.file_state(fid, op)?.container;
        let mut cur = if path.starts_with('/') {
            Container::ROOT
        } else {
            start
        };
        for comp in path.split('/') {
            if comp.is_empty() || comp == "." {
                continue;
            }
            cur = c.child_by_name(cur, comp)?.ok_or_else(|| {
                EngineError::new(ErrorKind::NotFound, op, format!("no link '{comp}'"))
            })?;
        }
        Ok(cur)
    }
}

// ---------------------------------------------------------------------------
// Handle lifecycle
// ---------------------------------------------------------------------------

/// Whether `id` names a live resource.
pub fn is_valid(id: Hid) -> bool {
    id >= 0 && ENGINE.lock().handles.contains_key(&id)
}

/// Increment a handle's reference count, returning the new count.
pub fn inc_ref(id: Hid) -> Result<u32> {
    let mut e = ENGINE.lock();
    let entry = e.entry_mut(id, "inc_ref")?;
    entry.refcount += 1;
    tracing::trace!(id, refcount = entry.refcount, "inc_ref");
    Ok(entry.refcount)
}

/// Decrement a handle's reference count, returning the new count.  At zero
/// the handle is removed and its resource released; for the last handle on
/// a writable container this persists and closes it.
pub fn dec_ref(id: Hid) -> Result<u32> {
    let mut e = ENGINE.lock();
    {
        let entry = e.entry_mut(id, "dec_ref")?;
        if entry.refcount > 1 {
            entry.refcount -= 1;
            tracing::trace!(id, refcount = entry.refcount, "dec_ref");
            return Ok(entry.refcount);
        }
    }
    let entry = match e.handles.remove(&id) {
        Some(entry) => entry,
        None => return Ok(0),
    };
    tracing::trace!(id, "handle released");
    match entry.res {
        Resource::File(fid) => {
            if let Some(fs) = e.files.get_mut(&fid) {
                fs.file_handles -= 1;
            }
            e.maybe_close_file(fid)?;
        }
        Resource::Node { file, .. } | Resource::Attr { file, .. } => {
            if let Some(fs) = e.files.get_mut(&file) {
                fs.object_handles -= 1;
            }
            e.maybe_close_file(file)?;
        }
        _ => {}
    }
    Ok(0)
}

/// Current reference count of a handle.
pub fn ref_count(id: Hid) -> Result<u32> {
    Ok(ENGINE.lock().entry(id, "ref_count")?.refcount)
}

// ---------------------------------------------------------------------------
// Identity / introspection
// ---------------------------------------------------------------------------

pub fn object_kind(id: Hid) -> Result<ObjectKind> {
    Ok(ENGINE.lock().entry(id, "object_kind")?.kind)
}

/// Slash path of the object within its container.
pub fn object_name(id: Hid) -> Result<String> {
    let e = ENGINE.lock();
    match &e.entry(id, "object_name")?.res {
        Resource::File(_) => Ok("/".to_string()),
        Resource::Node { file, node } | Resource::Attr { file, node, .. } => {
            Ok(e.file_state(*file, "object_name")?.container.path_of(*node))
        }
        _ => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "object_name",
            "handle is not bound to a container",
        )),
    }
}

/// Filesystem path of the container an object belongs to.
pub fn object_file_name(id: Hid) -> Result<String> {
    let e = ENGINE.lock();
    let fid = match &e.entry(id, "object_file_name")?.res {
        Resource::File(fid) => *fid,
        Resource::Node { file, .. } | Resource::Attr { file, .. } => *file,
        _ => {
            return Err(EngineError::new(
                ErrorKind::InvalidArgument,
                "object_file_name",
                "handle is not bound to a container",
            ))
        }
    };
    Ok(e.file_state(fid, "object_file_name")?
        .path
        .display()
        .to_string())
}

/// A fresh file handle for the container that owns `id`.
pub fn object_file(id: Hid) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let fid = match &e.entry(id, "object_file")?.res {
        Resource::File(fid) => *fid,
        Resource::Node { file, .. } | Resource::Attr { file, .. } => *file,
        _ => {
            return Err(EngineError::new(
                ErrorKind::InvalidArgument,
                "object_file",
                "handle is not bound to a container",
            ))
        }
    };
    e.file_state(fid, "object_file")?;
    Ok(e.alloc(ObjectKind::File, Resource::File(fid)))
}

// ---------------------------------------------------------------------------
// Type operations
// ---------------------------------------------------------------------------

/// Copy an engine-predefined encoding into a fresh, unlocked descriptor.
pub fn type_copy_predefined(pred: Predefined) -> Result<Hid> {
    let mut e = ENGINE.lock();
    Ok(e.alloc(
        ObjectKind::Datatype,
        Resource::Type(TypeState {
            enc: pred.encoding(),
            locked: false,
        }),
    ))
}

/// Copy an existing descriptor.
pub fn type_copy(id: Hid) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let enc = e.type_enc(id, "type_copy")?.clone();
    Ok(e.alloc(
        ObjectKind::Datatype,
        Resource::Type(TypeState { enc, locked: false }),
    ))
}

/// Resize a string descriptor; `TypeSizeArg::Variable` is the
/// variable-length sentinel.
pub fn type_set_size(id: Hid, size: TypeSizeArg) -> Result<()> {
    let mut e = ENGINE.lock();
    match &mut e.entry_mut(id, "type_set_size")?.res {
        Resource::Type(t) => {
            if t.locked {
                return Err(EngineError::new(
                    ErrorKind::InvalidArgument,
                    "type_set_size",
                    "descriptor is locked",
                ));
            }
            match &mut t.enc {
                TypeEncoding::Str { size: s } => {
                    *s = match size {
                        TypeSizeArg::Bytes(n) => StrSize::Fixed(n),
                        TypeSizeArg::Variable => StrSize::Variable,
                    };
                    Ok(())
                }
                _ => Err(EngineError::new(
                    ErrorKind::InvalidArgument,
                    "type_set_size",
                    "only string descriptors are resizable",
                )),
            }
        }
        _ => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "type_set_size",
            "handle is not a type descriptor",
        )),
    }
}

/// Build a fixed-shape array descriptor over a base descriptor.
pub fn type_array_create(base: Hid, dims: &[u64]) -> Result<Hid> {
    let mut e = ENGINE.lock();
    if dims.is_empty() || dims.iter().any(|&d| d == 0) {
        return Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "type_array_create",
            "array dimensions must be nonzero",
        ));
    }
    let base_enc = e.type_enc(base, "type_array_create")?.clone();
    Ok(e.alloc(
        ObjectKind::Datatype,
        Resource::Type(TypeState {
            enc: TypeEncoding::Array {
                base: Box::new(base_enc),
                dims: dims.to_vec(),
            },
            locked: false,
        }),
    ))
}

/// Structural equality of two descriptors.
pub fn type_equal(a: Hid, b: Hid) -> Result<bool> {
    let e = ENGINE.lock();
    Ok(e.type_enc(a, "type_equal")? == e.type_enc(b, "type_equal")?)
}

/// Element size in bytes; `None` for variable-length.
pub fn type_size(id: Hid) -> Result<Option<u64>> {
    Ok(ENGINE.lock().type_enc(id, "type_size")?.byte_size())
}

/// Mark a descriptor immutable.
pub fn type_lock(id: Hid) -> Result<()> {
    let mut e = ENGINE.lock();
    match &mut e.entry_mut(id, "type_lock")?.res {
        Resource::Type(t) => {
            t.locked = true;
            Ok(())
        }
        _ => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "type_lock",
            "handle is not a type descriptor",
        )),
    }
}

pub fn type_is_variable_str(id: Hid) -> Result<bool> {
    let e = ENGINE.lock();
    Ok(matches!(
        e.type_enc(id, "type_is_variable_str")?,
        TypeEncoding::Str {
            size: StrSize::Variable
        }
    ))
}

// ---------------------------------------------------------------------------
// Shape operations
// ---------------------------------------------------------------------------

pub fn space_scalar() -> Result<Hid> {
    let mut e = ENGINE.lock();
    Ok(e.alloc(ObjectKind::Dataspace, Resource::Space(SpaceDef::scalar())))
}

pub fn space_simple(dims: &[u64]) -> Result<Hid> {
    let def = SpaceDef::simple(dims)?;
    let mut e = ENGINE.lock();
    Ok(e.alloc(ObjectKind::Dataspace, Resource::Space(def)))
}

pub fn space_rank(id: Hid) -> Result<usize> {
    Ok(ENGINE.lock().space_def(id, "space_rank")?.extent.rank())
}

pub fn space_dims(id: Hid) -> Result<Vec<u64>> {
    Ok(ENGINE
        .lock()
        .space_def(id, "space_dims")?
        .extent
        .dims()
        .to_vec())
}

pub fn space_npoints(id: Hid) -> Result<u64> {
    Ok(ENGINE
        .lock()
        .space_def(id, "space_npoints")?
        .extent
        .npoints())
}

pub fn space_select_hyperslab(
    id: Hid,
    offset: &[u64],
    stride: &[u64],
    count: &[u64],
    block: &[u64],
) -> Result<()> {
    let mut e = ENGINE.lock();
    match &mut e.entry_mut(id, "space_select_hyperslab")?.res {
        Resource::Space(s) => s.select_hyperslab(offset, stride, count, block),
        _ => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "space_select_hyperslab",
            "handle is not a shape descriptor",
        )),
    }
}

pub fn space_select_all(id: Hid) -> Result<()> {
    let mut e = ENGINE.lock();
    match &mut e.entry_mut(id, "space_select_all")?.res {
        Resource::Space(s) => {
            s.select_all();
            Ok(())
        }
        _ => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "space_select_all",
            "handle is not a shape descriptor",
        )),
    }
}

pub fn space_select_npoints(id: Hid) -> Result<u64> {
    Ok(ENGINE
        .lock()
        .space_def(id, "space_select_npoints")?
        .selected_npoints())
}

pub fn space_extent_equal(a: Hid, b: Hid) -> Result<bool> {
    let e = ENGINE.lock();
    Ok(e.space_def(a, "space_extent_equal")?.extent
        == e.space_def(b, "space_extent_equal")?.extent)
}

// ---------------------------------------------------------------------------
// Property lists
// ---------------------------------------------------------------------------

pub fn plist_create() -> Result<Hid> {
    let mut e = ENGINE.lock();
    Ok(e.alloc(ObjectKind::Plist, Resource::Plist(PlistDef::default())))
}

pub fn plist_set_chunk(id: Hid, dims: &[u64]) -> Result<()> {
    let mut e = ENGINE.lock();
    match &mut e.entry_mut(id, "plist_set_chunk")?.res {
        Resource::Plist(p) => {
            p.chunk = Some(dims.to_vec());
            Ok(())
        }
        _ => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "plist_set_chunk",
            "handle is not a property list",
        )),
    }
}

pub fn plist_set_deflate(id: Hid, level: u8) -> Result<()> {
    let mut e = ENGINE.lock();
    match &mut e.entry_mut(id, "plist_set_deflate")?.res {
        Resource::Plist(p) => {
            p.deflate = Some(level);
            Ok(())
        }
        _ => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "plist_set_deflate",
            "handle is not a property list",
        )),
    }
}

// ---------------------------------------------------------------------------
// Containers: files
// ---------------------------------------------------------------------------

/// Create a fresh container at `path`.  With `exclusive`, an existing file
/// is an error; otherwise it is truncated.
pub fn file_create(path: &Path, exclusive: bool) -> Result<Hid> {
    let mut e = ENGINE.lock();
    if exclusive && path.exists() {
        return Err(EngineError::new(
            ErrorKind::AlreadyExists,
            "file_create",
            format!("'{}' already exists", path.display()),
        ));
    }
    let container = Container::new();
    let bytes = codec::serialize(&container);
    std::fs::write(path, bytes).map_err(|err| {
        EngineError::new(
            ErrorKind::Io,
            "file_create",
            format!("cannot create '{}': {err}", path.display()),
        )
    })?;
    let fid = e.next_file;
    e.next_file += 1;
    e.files.insert(
        fid,
        FileState {
            path: path.to_path_buf(),
            writable: true,
            container,
            file_handles: 0,
            object_handles: 0,
        },
    );
    tracing::debug!(path = %path.display(), "container created");
    Ok(e.alloc(ObjectKind::File, Resource::File(fid)))
}

/// Open an existing container.
pub fn file_open(path: &Path, writable: bool) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let bytes = std::fs::read(path).map_err(|err| {
        let kind = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::NotFound
        } else {
            ErrorKind::Io
        };
        EngineError::new(
            kind,
            "file_open",
            format!("cannot read '{}': {err}", path.display()),
        )
    })?;
    let container = codec::parse(&bytes)
        .map_err(|err| err.context("file_open", format!("while opening '{}'", path.display())))?;
    let fid = e.next_file;
    e.next_file += 1;
    e.files.insert(
        fid,
        FileState {
            path: path.to_path_buf(),
            writable,
            container,
            file_handles: 0,
            object_handles: 0,
        },
    );
    tracing::debug!(path = %path.display(), writable, "container opened");
    Ok(e.alloc(ObjectKind::File, Resource::File(fid)))
}

/// Whether `path` holds a container signature.
pub fn is_container_file(path: &Path) -> bool {
    let mut prefix = [0u8; 4];
    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            f.read_exact(&mut prefix).is_ok() && codec::has_signature(&prefix)
        }
        Err(_) => false,
    }
}

/// Persist a writable container to disk now.
pub fn file_flush(id: Hid) -> Result<()> {
    let e = ENGINE.lock();
    let fid = match &e.entry(id, "file_flush")?.res {
        Resource::File(fid) => *fid,
        _ => {
            return Err(EngineError::new(
                ErrorKind::InvalidArgument,
                "file_flush",
                "handle is not a file",
            ))
        }
    };
    if e.file_state(fid, "file_flush")?.writable {
        e.persist(fid, "file_flush")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Containers: groups and links
// ---------------------------------------------------------------------------

pub fn group_create(loc: Hid, name: &str) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let (fid, node) = e.node_of(loc, "group_create")?;
    e.check_writable(fid, "group_create")?;
    let parent = e.resolve_parent(fid, node, name, "group_create")?;
    let leaf = leaf_name(name);
    let c = &mut e.file_state_mut(fid, "group_create")?.container;
    if c.child_by_name(parent, leaf)?.is_some() {
        return Err(EngineError::new(
            ErrorKind::AlreadyExists,
            "group_create",
            format!("link '{leaf}' already exists"),
        ));
    }
    let idx = c.insert_node(
        parent,
        leaf,
        NodeBody::Group {
            children: Vec::new(),
        },
    );
    tracing::debug!(name, "group created");
    Ok(e.alloc(ObjectKind::Group, Resource::Node { file: fid, node: idx }))
}

pub fn group_open(loc: Hid, name: &str) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let (fid, node) = e.node_of(loc, "group_open")?;
    let idx = e.resolve_path(fid, node, name, "group_open")?;
    let c = &e.file_state(fid, "group_open")?.container;
    if !matches!(c.node(idx).body, NodeBody::Group { .. }) {
        return Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "group_open",
            format!("'{name}' is not a group"),
        ));
    }
    Ok(e.alloc(ObjectKind::Group, Resource::Node { file: fid, node: idx }))
}

pub fn link_exists(loc: Hid, name: &str) -> Result<bool> {
    let e = ENGINE.lock();
    let (fid, node) = e.node_of(loc, "link_exists")?;
    let c = &e.file_state(fid, "link_exists")?.container;
    Ok(c.child_by_name(node, name)?.is_some())
}

pub fn link_count(loc: Hid) -> Result<u64> {
    let e = ENGINE.lock();
    let (fid, node) = e.node_of(loc, "link_count")?;
    e.file_state(fid, "link_count")?.container.link_count(node)
}

pub fn link_name_by_index(loc: Hid, idx: u64) -> Result<String> {
    let e = ENGINE.lock();
    let (fid, node) = e.node_of(loc, "link_name_by_index")?;
    e.file_state(fid, "link_name_by_index")?
        .container
        .link_name(node, idx)
}

pub fn link_delete(loc: Hid, name: &str) -> Result<()> {
    let mut e = ENGINE.lock();
    let (fid, node) = e.node_of(loc, "link_delete")?;
    e.check_writable(fid, "link_delete")?;
    e.file_state_mut(fid, "link_delete")?
        .container
        .remove_link(node, name)?;
    tracing::debug!(name, "link deleted");
    Ok(())
}

impl Engine {
    /// For creation calls: resolve all but the last path component.
    fn resolve_parent(
        &self,
        fid: u64,
        start: usize,
        name: &str,
        op: &'static str,
    ) -> Result<usize> {
        match name.rfind('/') {
            Some(split) => self.resolve_path(fid, start, &name[..split], op),
            None => Ok(start),
        }
    }
}

fn leaf_name(name: &str) -> &str {
    match name.rfind('/') {
        Some(split) => &name[split + 1..],
        None => name,
    }
}

// ---------------------------------------------------------------------------
// Containers: datasets
// ---------------------------------------------------------------------------

pub fn dataset_create(
    loc: Hid,
    name: &str,
    dtype: Hid,
    space: Hid,
    plist: Option<Hid>,
) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let (fid, node) = e.node_of(loc, "dataset_create")?;
    e.check_writable(fid, "dataset_create")?;
    let enc = e.type_enc(dtype, "dataset_create")?.clone();
    let extent = e.space_def(space, "dataset_create")?.extent.clone();
    let props = match plist {
        Some(id) => match &e.entry(id, "dataset_create")?.res {
            Resource::Plist(p) => p.clone(),
            _ => {
                return Err(EngineError::new(
                    ErrorKind::InvalidArgument,
                    "dataset_create",
                    "handle is not a property list",
                ))
            }
        },
        None => PlistDef::default(),
    };
    let parent = e.resolve_parent(fid, node, name, "dataset_create")?;
    let leaf = leaf_name(name);
    let payload = Payload::zeroed(&enc, extent.npoints());
    let c = &mut e.file_state_mut(fid, "dataset_create")?.container;
    if c.child_by_name(parent, leaf)?.is_some() {
        return Err(EngineError::new(
            ErrorKind::AlreadyExists,
            "dataset_create",
            format!("link '{leaf}' already exists"),
        ));
    }
    let idx = c.insert_node(
        parent,
        leaf,
        NodeBody::Dataset(DatasetDef {
            dtype: enc,
            extent,
            plist: props,
            payload,
        }),
    );
    tracing::debug!(name, "dataset created");
    Ok(e.alloc(ObjectKind::Dataset, Resource::Node { file: fid, node: idx }))
}

pub fn dataset_open(loc: Hid, name: &str) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let (fid, node) = e.node_of(loc, "dataset_open")?;
    let idx = e.resolve_path(fid, node, name, "dataset_open")?;
    let c = &e.file_state(fid, "dataset_open")?.container;
    if !matches!(c.node(idx).body, NodeBody::Dataset(_)) {
        return Err(EngineError::new(
            ErrorKind::InvalidArgument,
            "dataset_open",
            format!("'{name}' is not a dataset"),
        ));
    }
    Ok(e.alloc(ObjectKind::Dataset, Resource::Node { file: fid, node: idx }))
}

/// A fresh shape descriptor carrying the dataset's extent.
pub fn dataset_space(ds: Hid) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let def = e.dataset_def(ds, "dataset_space")?;
    let extent = def.extent.clone();
    Ok(e.alloc(
        ObjectKind::Dataspace,
        Resource::Space(SpaceDef {
            extent,
            selection: crate::space::Selection::All,
        }),
    ))
}

/// A fresh type descriptor carrying the dataset's stored encoding.
pub fn dataset_type(ds: Hid) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let def = e.dataset_def(ds, "dataset_type")?;
    let enc = def.dtype.clone();
    Ok(e.alloc(
        ObjectKind::Datatype,
        Resource::Type(TypeState { enc, locked: false }),
    ))
}

impl Engine {
    fn dataset_def(&self, ds: Hid, op: &'static str) -> Result<&DatasetDef> {
        let (fid, node) = self.node_of(ds, op)?;
        match &self.file_state(fid, op)?.container.node(node).body {
            NodeBody::Dataset(def) => Ok(def),
            NodeBody::Group { .. } => Err(EngineError::new(
                ErrorKind::InvalidArgument,
                op,
                "handle is not a dataset",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Containers: attributes
// ---------------------------------------------------------------------------

pub fn attr_create(obj: Hid, name: &str, dtype: Hid, space: Hid) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let (fid, node) = e.node_of(obj, "attr_create")?;
    e.check_writable(fid, "attr_create")?;
    let enc = e.type_enc(dtype, "attr_create")?.clone();
    let extent = e.space_def(space, "attr_create")?.extent.clone();
    let payload = Payload::zeroed(&enc, extent.npoints());
    let c = &mut e.file_state_mut(fid, "attr_create")?.container;
    if c.attr_by_name(node, name).is_some() {
        return Err(EngineError::new(
            ErrorKind::AlreadyExists,
            "attr_create",
            format!("attribute '{name}' already exists"),
        ));
    }
    let id = c.next_attr_id;
    c.next_attr_id += 1;
    c.node_mut(node).attrs.push(AttrRow {
        id,
        name: name.to_string(),
        dtype: enc,
        extent,
        payload,
    });
    tracing::debug!(name, "attribute created");
    Ok(e.alloc(
        ObjectKind::Attribute,
        Resource::Attr {
            file: fid,
            node,
            attr: id,
        },
    ))
}

pub fn attr_open(obj: Hid, name: &str) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let (fid, node) = e.node_of(obj, "attr_open")?;
    let c = &e.file_state(fid, "attr_open")?.container;
    let id = c
        .attr_by_name(node, name)
        .map(|a| a.id)
        .ok_or_else(|| {
            EngineError::new(
                ErrorKind::NotFound,
                "attr_open",
                format!("no attribute '{name}'"),
            )
        })?;
    Ok(e.alloc(
        ObjectKind::Attribute,
        Resource::Attr {
            file: fid,
            node,
            attr: id,
        },
    ))
}

pub fn attr_exists(obj: Hid, name: &str) -> Result<bool> {
    let e = ENGINE.lock();
    let (fid, node) = e.node_of(obj, "attr_exists")?;
    Ok(e.file_state(fid, "attr_exists")?
        .container
        .attr_by_name(node, name)
        .is_some())
}

pub fn attr_count(obj: Hid) -> Result<u64> {
    let e = ENGINE.lock();
    let (fid, node) = e.node_of(obj, "attr_count")?;
    Ok(e.file_state(fid, "attr_count")?.container.node(node).attrs.len() as u64)
}

pub fn attr_delete(obj: Hid, name: &str) -> Result<()> {
    let mut e = ENGINE.lock();
    let (fid, node) = e.node_of(obj, "attr_delete")?;
    e.check_writable(fid, "attr_delete")?;
    let c = &mut e.file_state_mut(fid, "attr_delete")?.container;
    let attrs = &mut c.node_mut(node).attrs;
    let before = attrs.len();
    attrs.retain(|a| a.name != name);
    if attrs.len() == before {
        return Err(EngineError::new(
            ErrorKind::NotFound,
            "attr_delete",
            format!("no attribute '{name}'"),
        ));
    }
    tracing::debug!(name, "attribute deleted");
    Ok(())
}

/// A fresh shape descriptor carrying the attribute's extent.
pub fn attr_space(attr: Hid) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let extent = e.attr_row(attr, "attr_space")?.extent.clone();
    Ok(e.alloc(
        ObjectKind::Dataspace,
        Resource::Space(SpaceDef {
            extent,
            selection: crate::space::Selection::All,
        }),
    ))
}

/// A fresh type descriptor carrying the attribute's stored encoding.
pub fn attr_type(attr: Hid) -> Result<Hid> {
    let mut e = ENGINE.lock();
    let enc = e.attr_row(attr, "attr_type")?.dtype.clone();
    Ok(e.alloc(
        ObjectKind::Datatype,
        Resource::Type(TypeState { enc, locked: false }),
    ))
}

impl Engine {
    fn attr_row(&self, id: Hid, op: &'static str) -> Result<&AttrRow> {
        match &self.entry(id, op)?.res {
            Resource::Attr { file, node, attr } => self
                .file_state(*file, op)?
                .container
                .attr_by_id(*node, *attr)
                .ok_or_else(|| {
                    EngineError::new(ErrorKind::NotFound, op, "attribute was deleted")
                }),
            _ => Err(EngineError::new(
                ErrorKind::InvalidArgument,
                op,
                "handle is not an attribute",
            )),
        }
    }

    fn attr_target(&self, id: Hid, op: &'static str) -> Result<(u64, usize, u64)> {
        match &self.entry(id, op)?.res {
            Resource::Attr { file, node, attr } => Ok((*file, *node, *attr)),
            _ => Err(EngineError::new(
                ErrorKind::InvalidArgument,
                op,
                "handle is not an attribute",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Bulk I/O: datasets
// ---------------------------------------------------------------------------

struct IoPlan {
    fid: u64,
    node: usize,
    mem_enc: TypeEncoding,
    disk_enc: TypeEncoding,
    mem_space: SpaceDef,
    file_space: SpaceDef,
}

impl Engine {
    fn io_plan(
        &self,
        ds: Hid,
        mem_type: Hid,
        mem_space: Option<Hid>,
        file_space: Option<Hid>,
        op: &'static str,
    ) -> Result<IoPlan> {
        let (fid, node) = self.node_of(ds, op)?;
        let def = self.dataset_def(ds, op)?;
        let disk_enc = def.dtype.clone();
        let extent = def.extent.clone();
        let mem_enc = self.type_enc(mem_type, op)?.clone();
        let mem_space = match mem_space {
            Some(id) => self.space_def(id, op)?.clone(),
            None => SpaceDef {
                extent: extent.clone(),
                selection: crate::space::Selection::All,
            },
        };
        let file_space = match file_space {
            Some(id) => self.space_def(id, op)?.clone(),
            None => SpaceDef {
                extent: extent.clone(),
                selection: crate::space::Selection::All,
            },
        };
        if file_space.extent != extent {
            return Err(EngineError::new(
                ErrorKind::ShapeMismatch,
                op,
                "file shape does not match the dataset extent",
            ));
        }
        if mem_space.selected_npoints() != file_space.selected_npoints() {
            return Err(EngineError::new(
                ErrorKind::ShapeMismatch,
                op,
                format!(
                    "memory selection has {} elements, file selection {}",
                    mem_space.selected_npoints(),
                    file_space.selected_npoints()
                ),
            ));
        }
        if !mem_enc.convertible_to(&disk_enc) && !disk_enc.convertible_to(&mem_enc) {
            return Err(EngineError::new(
                ErrorKind::TypeMismatch,
                op,
                "memory and stored element types are not convertible",
            ));
        }
        Ok(IoPlan {
            fid,
            node,
            mem_enc,
            disk_enc,
            mem_space,
            file_space,
        })
    }
}

pub fn dataset_write(
    ds: Hid,
    mem_type: Hid,
    mem_space: Option<Hid>,
    file_space: Option<Hid>,
    buf: &[u8],
) -> Result<()> {
    let mut e = ENGINE.lock();
    let plan = e.io_plan(ds, mem_type, mem_space, file_space, "dataset_write")?;
    e.check_writable(plan.fid, "dataset_write")?;
    let mem_width = fixed_width(&plan.mem_enc, "dataset_write")?;
    let disk_width = fixed_width(&plan.disk_enc, "dataset_write")?;

    let gathered = gather_fixed(buf, &plan.mem_space, mem_width, "dataset_write")?;
    let converted = crate::dtype::convert_elements(
        &plan.mem_enc,
        &plan.disk_enc,
        &gathered,
        plan.mem_space.selected_npoints(),
    )?;

    let c = &mut e.file_state_mut(plan.fid, "dataset_write")?.container;
    let payload = dataset_payload_mut(c, plan.node, "dataset_write")?;
    scatter_fixed(payload, &plan.file_space, disk_width, &converted, "dataset_write")
}

pub fn dataset_read(
    ds: Hid,
    mem_type: Hid,
    mem_space: Option<Hid>,
    file_space: Option<Hid>,
    buf: &mut [u8],
) -> Result<()> {
    let e = ENGINE.lock();
    let plan = e.io_plan(ds, mem_type, mem_space, file_space, "dataset_read")?;
    let mem_width = fixed_width(&plan.mem_enc, "dataset_read")?;
    let disk_width = fixed_width(&plan.disk_enc, "dataset_read")?;

    let c = &e.file_state(plan.fid, "dataset_read")?.container;
    let payload = dataset_payload(c, plan.node, "dataset_read")?;
    let gathered = gather_fixed(payload_fixed(payload, "dataset_read")?, &plan.file_space, disk_width, "dataset_read")?;
    let converted = crate::dtype::convert_elements(
        &plan.disk_enc,
        &plan.mem_enc,
        &gathered,
        plan.file_space.selected_npoints(),
    )?;
    scatter_fixed_into(buf, &plan.mem_space, mem_width, &converted, "dataset_read")
}

pub fn dataset_write_varlen(
    ds: Hid,
    mem_type: Hid,
    mem_space: Option<Hid>,
    file_space: Option<Hid>,
    items: &[&[u8]],
) -> Result<()> {
    let mut e = ENGINE.lock();
    let plan = e.io_plan(ds, mem_type, mem_space, file_space, "dataset_write_varlen")?;
    e.check_writable(plan.fid, "dataset_write_varlen")?;
    require_varlen(&plan.mem_enc, &plan.disk_enc, "dataset_write_varlen")?;
    if items.len() as u64 != plan.file_space.selected_npoints() {
        return Err(EngineError::new(
            ErrorKind::ShapeMismatch,
            "dataset_write_varlen",
            format!(
                "{} items for a selection of {} elements",
                items.len(),
                plan.file_space.selected_npoints()
            ),
        ));
    }
    let c = &mut e.file_state_mut(plan.fid, "dataset_write_varlen")?.container;
    let payload = dataset_payload_mut(c, plan.node, "dataset_write_varlen")?;
    let rows = payload_varlen_mut(payload, "dataset_write_varlen")?;
    for (item, idx) in items.iter().zip(plan.file_space.selected_indices()) {
        rows[idx as usize] = item.to_vec();
    }
    Ok(())
}

pub fn dataset_read_varlen(
    ds: Hid,
    mem_type: Hid,
    mem_space: Option<Hid>,
    file_space: Option<Hid>,
) -> Result<VarlenItems> {
    let e = ENGINE.lock();
    let plan = e.io_plan(ds, mem_type, mem_space, file_space, "dataset_read_varlen")?;
    require_varlen(&plan.mem_enc, &plan.disk_enc, "dataset_read_varlen")?;
    let c = &e.file_state(plan.fid, "dataset_read_varlen")?.container;
    let payload = dataset_payload(c, plan.node, "dataset_read_varlen")?;
    let rows = payload_varlen(payload, "dataset_read_varlen")?;
    let out: Vec<Vec<u8>> = plan
        .file_space
        .selected_indices()
        .iter()
        .map(|&i| rows[i as usize].clone())
        .collect();
    Ok(VarlenItems::register(out))
}

// ---------------------------------------------------------------------------
// Bulk I/O: attributes (whole-extent only)
// ---------------------------------------------------------------------------

pub fn attr_write(attr: Hid, mem_type: Hid, buf: &[u8]) -> Result<()> {
    let mut e = ENGINE.lock();
    let (fid, node, id) = e.attr_target(attr, "attr_write")?;
    e.check_writable(fid, "attr_write")?;
    let mem_enc = e.type_enc(mem_type, "attr_write")?.clone();
    let row = e.attr_row(attr, "attr_write")?;
    let disk_enc = row.dtype.clone();
    let npoints = row.extent.npoints();
    let converted = crate::dtype::convert_elements(&mem_enc, &disk_enc, buf, npoints)?;
    let c = &mut e.file_state_mut(fid, "attr_write")?.container;
    let row = c.attr_by_id_mut(node, id).ok_or_else(|| {
        EngineError::new(ErrorKind::NotFound, "attr_write", "attribute was deleted")
    })?;
    row.payload = Payload::Fixed(converted);
    Ok(())
}

pub fn attr_read(attr: Hid, mem_type: Hid, buf: &mut [u8]) -> Result<()> {
    let e = ENGINE.lock();
    let mem_enc = e.type_enc(mem_type, "attr_read")?.clone();
    let row = e.attr_row(attr, "attr_read")?;
    let stored = payload_fixed(&row.payload, "attr_read")?;
    let converted =
        crate::dtype::convert_elements(&row.dtype, &mem_enc, stored, row.extent.npoints())?;
    if buf.len() != converted.len() {
        return Err(EngineError::new(
            ErrorKind::ShapeMismatch,
            "attr_read",
            format!(
                "destination holds {} bytes, attribute holds {}",
                buf.len(),
                converted.len()
            ),
        ));
    }
    buf.copy_from_slice(&converted);
    Ok(())
}

pub fn attr_write_varlen(attr: Hid, mem_type: Hid, items: &[&[u8]]) -> Result<()> {
    let mut e = ENGINE.lock();
    let (fid, node, id) = e.attr_target(attr, "attr_write_varlen")?;
    e.check_writable(fid, "attr_write_varlen")?;
    let mem_enc = e.type_enc(mem_type, "attr_write_varlen")?.clone();
    let row = e.attr_row(attr, "attr_write_varlen")?;
    require_varlen(&mem_enc, &row.dtype, "attr_write_varlen")?;
    if items.len() as u64 != row.extent.npoints() {
        return Err(EngineError::new(
            ErrorKind::ShapeMismatch,
            "attr_write_varlen",
            format!(
                "{} items for an extent of {} elements",
                items.len(),
                row.extent.npoints()
            ),
        ));
    }
    let c = &mut e.file_state_mut(fid, "attr_write_varlen")?.container;
    let row = c.attr_by_id_mut(node, id).ok_or_else(|| {
        EngineError::new(ErrorKind::NotFound, "attr_write_varlen", "attribute was deleted")
    })?;
    row.payload = Payload::Varlen(items.iter().map(|i| i.to_vec()).collect());
    Ok(())
}

pub fn attr_read_varlen(attr: Hid, mem_type: Hid) -> Result<VarlenItems> {
    let e = ENGINE.lock();
    let mem_enc = e.type_enc(mem_type, "attr_read_varlen")?.clone();
    let row = e.attr_row(attr, "attr_read_varlen")?;
    require_varlen(&mem_enc, &row.dtype, "attr_read_varlen")?;
    let rows = payload_varlen(&row.payload, "attr_read_varlen")?;
    Ok(VarlenItems::register(rows.clone()))
}

// ---------------------------------------------------------------------------
// I/O plumbing
// ---------------------------------------------------------------------------

fn fixed_width(enc: &TypeEncoding, op: &'static str) -> Result<usize> {
    enc.byte_size().map(|w| w as usize).ok_or_else(|| {
        EngineError::new(
            ErrorKind::TypeMismatch,
            op,
            "variable-length elements require the varlen I/O calls",
        )
    })
}

fn require_varlen(mem: &TypeEncoding, disk: &TypeEncoding, op: &'static str) -> Result<()> {
    if mem.is_variable() && disk.is_variable() {
        Ok(())
    } else {
        Err(EngineError::new(
            ErrorKind::TypeMismatch,
            op,
            "varlen I/O requires variable-length memory and stored types",
        ))
    }
}

fn dataset_payload<'a>(c: &'a Container, node: usize, op: &'static str) -> Result<&'a Payload> {
    match &c.node(node).body {
        NodeBody::Dataset(def) => Ok(&def.payload),
        NodeBody::Group { .. } => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            op,
            "handle is not a dataset",
        )),
    }
}

fn dataset_payload_mut<'a>(
    c: &'a mut Container,
    node: usize,
    op: &'static str,
) -> Result<&'a mut Payload> {
    match &mut c.node_mut(node).body {
        NodeBody::Dataset(def) => Ok(&mut def.payload),
        NodeBody::Group { .. } => Err(EngineError::new(
            ErrorKind::InvalidArgument,
            op,
            "handle is not a dataset",
        )),
    }
}

fn payload_fixed<'a>(p: &'a Payload, op: &'static str) -> Result<&'a [u8]> {
    match p {
        Payload::Fixed(bytes) => Ok(bytes),
        Payload::Varlen(_) => Err(EngineError::new(
            ErrorKind::TypeMismatch,
            op,
            "stored elements are variable-length",
        )),
    }
}

fn payload_varlen<'a>(p: &'a Payload, op: &'static str) -> Result<&'a Vec<Vec<u8>>> {
    match p {
        Payload::Varlen(rows) => Ok(rows),
        Payload::Fixed(_) => Err(EngineError::new(
            ErrorKind::TypeMismatch,
            op,
            "stored elements are fixed-width",
        )),
    }
}

fn payload_varlen_mut<'a>(p: &'a mut Payload, op: &'static str) -> Result<&'a mut Vec<Vec<u8>>> {
    match p {
        Payload::Varlen(rows) => Ok(rows),
        Payload::Fixed(_) => Err(EngineError::new(
            ErrorKind::TypeMismatch,
            op,
            "stored elements are fixed-width",
        )),
    }
}

/// Gather selected elements of a packed buffer into selection order.
fn gather_fixed(
    buf: &[u8],
    space: &SpaceDef,
    width: usize,
    op: &'static str,
) -> Result<Vec<u8>> {
    let total = space.extent.npoints() as usize * width;
    if buf.len() < total {
        return Err(EngineError::new(
            ErrorKind::ShapeMismatch,
            op,
            format!("buffer holds {} bytes, shape needs {total}", buf.len()),
        ));
    }
    let mut out = Vec::with_capacity(space.selected_npoints() as usize * width);
    for idx in space.selected_indices() {
        let start = idx as usize * width;
        out.extend_from_slice(&buf[start..start + width]);
    }
    Ok(out)
}

/// Scatter packed elements (in selection order) into a payload.
fn scatter_fixed(
    payload: &mut Payload,
    space: &SpaceDef,
    width: usize,
    data: &[u8],
    op: &'static str,
) -> Result<()> {
    let bytes = match payload {
        Payload::Fixed(bytes) => bytes,
        Payload::Varlen(_) => {
            return Err(EngineError::new(
                ErrorKind::TypeMismatch,
                op,
                "stored elements are variable-length",
            ))
        }
    };
    scatter_fixed_into(bytes, space, width, data, op)
}

fn scatter_fixed_into(
    dst: &mut [u8],
    space: &SpaceDef,
    width: usize,
    data: &[u8],
    op: &'static str,
) -> Result<()> {
    let total = space.extent.npoints() as usize * width;
    if dst.len() < total {
        return Err(EngineError::new(
            ErrorKind::ShapeMismatch,
            op,
            format!("destination holds {} bytes, shape needs {total}", dst.len()),
        ));
    }
    for (i, idx) in space.selected_indices().into_iter().enumerate() {
        let src = i * width;
        let at = idx as usize * width;
        dst[at..at + width].copy_from_slice(&data[src..src + width]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Predefined;

    fn tmp(name: &str) -> std::path::PathBuf {
        let dir = tempfile::tempdir().unwrap();
        // Keep the dir alive for the process; tests here are short-lived.
        let path = dir.path().join(name);
        std::mem::forget(dir);
        path
    }

    #[test]
    fn handle_refcount_lifecycle() {
        let f = file_create(&tmp("rc.hyve"), false).unwrap();
        assert!(is_valid(f));
        assert_eq!(ref_count(f).unwrap(), 1);
        assert_eq!(inc_ref(f).unwrap(), 2);
        assert_eq!(dec_ref(f).unwrap(), 1);
        assert_eq!(dec_ref(f).unwrap(), 0);
        assert!(!is_valid(f));
        assert!(ref_count(f).is_err());
    }

    #[test]
    fn create_write_read_fixed() {
        let f = file_create(&tmp("rw.hyve"), false).unwrap();
        let dt_disk = type_copy_predefined(Predefined::I32Le).unwrap();
        let dt_mem = type_copy_predefined(Predefined::NativeI32).unwrap();
        let sp = space_simple(&[4]).unwrap();
        let ds = dataset_create(f, "values", dt_disk, sp, None).unwrap();

        let data: Vec<u8> = [1i32, 2, 3, 4]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        dataset_write(ds, dt_mem, None, None, &data).unwrap();

        let mut back = vec![0u8; 16];
        dataset_read(ds, dt_mem, None, None, &mut back).unwrap();
        assert_eq!(back, data);

        for id in [ds, sp, dt_mem, dt_disk, f] {
            dec_ref(id).unwrap();
        }
    }

    #[test]
    fn hyperslab_write_targets_selection() {
        let f = file_create(&tmp("slab.hyve"), false).unwrap();
        let dt_disk = type_copy_predefined(Predefined::F64Le).unwrap();
        let dt_mem = type_copy_predefined(Predefined::NativeF64).unwrap();
        let sp = space_simple(&[6]).unwrap();
        let ds = dataset_create(f, "d", dt_disk, sp, None).unwrap();

        // Write only elements 1, 3, 5.
        let file_sp = dataset_space(ds).unwrap();
        space_select_hyperslab(file_sp, &[1], &[2], &[3], &[1]).unwrap();
        let mem_sp = space_simple(&[3]).unwrap();
        let vals: Vec<u8> = [10.0f64, 20.0, 30.0]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        dataset_write(ds, dt_mem, Some(mem_sp), Some(file_sp), &vals).unwrap();

        let mut back = vec![0u8; 48];
        dataset_read(ds, dt_mem, None, None, &mut back).unwrap();
        let floats: Vec<f64> = back
            .chunks_exact(8)
            .map(|c| f64::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, vec![0.0, 10.0, 0.0, 20.0, 0.0, 30.0]);

        for id in [mem_sp, file_sp, ds, sp, dt_mem, dt_disk, f] {
            dec_ref(id).unwrap();
        }
    }

    #[test]
    fn read_only_rejects_mutation() {
        let path = tmp("ro.hyve");
        let f = file_create(&path, false).unwrap();
        dec_ref(f).unwrap();

        let f = file_open(&path, false).unwrap();
        let err = group_create(f, "g").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadOnly);
        dec_ref(f).unwrap();
    }

    #[test]
    fn persistence_round_trip() {
        let path = tmp("persist.hyve");
        {
            let f = file_create(&path, false).unwrap();
            let g = group_create(f, "grp").unwrap();
            let dt = type_copy_predefined(Predefined::I64Le).unwrap();
            let sp = space_scalar().unwrap();
            let ds = dataset_create(g, "x", dt, sp, None).unwrap();
            let mem = type_copy_predefined(Predefined::NativeI64).unwrap();
            dataset_write(ds, mem, None, None, &42i64.to_ne_bytes()).unwrap();
            for id in [mem, ds, sp, dt, g, f] {
                dec_ref(id).unwrap();
            }
        }
        let f = file_open(&path, false).unwrap();
        let ds = dataset_open(f, "grp/x").unwrap();
        let mem = type_copy_predefined(Predefined::NativeI64).unwrap();
        let mut back = [0u8; 8];
        dataset_read(ds, mem, None, None, &mut back).unwrap();
        assert_eq!(i64::from_ne_bytes(back), 42);
        for id in [mem, ds, f] {
            dec_ref(id).unwrap();
        }
    }

    #[test]
    fn attr_type_mismatch_on_cross_class_write() {
        let f = file_create(&tmp("attr.hyve"), false).unwrap();
        let dt = type_copy_predefined(Predefined::F64Le).unwrap();
        let sp = space_scalar().unwrap();
        let a = attr_create(f, "version", dt, sp).unwrap();
        let mem_int = type_copy_predefined(Predefined::NativeI32).unwrap();
        let err = attr_write(a, mem_int, &7i32.to_ne_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        for id in [mem_int, a, sp, dt, f] {
            dec_ref(id).unwrap();
        }
    }
}
