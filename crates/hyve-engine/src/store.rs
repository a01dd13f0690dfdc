//! In-memory container model: a tree of named nodes (groups and datasets)
//! with attribute rows and typed payloads.

use crate::dtype::TypeEncoding;
use crate::error::{EngineError, ErrorKind};
use crate::space::Extent;

/// Dataset creation properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlistDef {
    /// Chunk shape, when chunked storage was requested.
    pub chunk: Option<Vec<u64>>,
    /// Deflate level, when compression was requested.
    pub deflate: Option<u8>,
}

/// Element storage for a dataset or attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Packed fixed-width elements in disk encoding.
    Fixed(Vec<u8>),
    /// One row of bytes per element, for variable-length types.
    Varlen(Vec<Vec<u8>>),
}

impl Payload {
    /// Zeroed storage for `npoints` elements of the given encoding.
    pub fn zeroed(dtype: &TypeEncoding, npoints: u64) -> Payload {
        match dtype.byte_size() {
            Some(width) => Payload::Fixed(vec![0; (width * npoints) as usize]),
            None => Payload::Varlen(vec![Vec::new(); npoints as usize]),
        }
    }
}

/// One named attribute on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRow {
    /// Stable identity that survives unrelated deletions.
    pub id: u64,
    pub name: String,
    pub dtype: TypeEncoding,
    pub extent: Extent,
    pub payload: Payload,
}

/// Dataset storage: type, shape, creation properties, and elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDef {
    pub dtype: TypeEncoding,
    pub extent: Extent,
    pub plist: PlistDef,
    pub payload: Payload,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    /// Child node indices in link order (engine-native enumeration order).
    Group { children: Vec<usize> },
    Dataset(DatasetDef),
}

/// One entry of the container tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub parent: Option<usize>,
    pub attrs: Vec<AttrRow>,
    pub body: NodeBody,
}

/// A whole container: an arena of nodes rooted at index 0.
///
/// Unlinked nodes stay in the arena (open handles may still address them);
/// reachability is defined by the `children` lists alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub nodes: Vec<Node>,
    pub next_attr_id: u64,
}

impl Container {
    /// A fresh container holding only the root group.
    pub fn new() -> Container {
        Container {
            nodes: vec![Node {
                name: String::new(),
                parent: None,
                attrs: Vec::new(),
                body: NodeBody::Group {
                    children: Vec::new(),
                },
            }],
            next_attr_id: 1,
        }
    }

    pub const ROOT: usize = 0;

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    fn group_children(&self, idx: usize) -> Result<&Vec<usize>, EngineError> {
        match &self.nodes[idx].body {
            NodeBody::Group { children } => Ok(children),
            NodeBody::Dataset(_) => Err(EngineError::new(
                ErrorKind::InvalidArgument,
                "group_lookup",
                format!("'{}' is a dataset, not a group", self.path_of(idx)),
            )),
        }
    }

    /// Find a direct child by link name.
    pub fn child_by_name(&self, idx: usize, name: &str) -> Result<Option<usize>, EngineError> {
        let children = self.group_children(idx)?;
        Ok(children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name == name))
    }

    /// Number of links in a group.
    pub fn link_count(&self, idx: usize) -> Result<u64, EngineError> {
        Ok(self.group_children(idx)?.len() as u64)
    }

    /// Link name at a position in `[0, link_count)`, engine-native order.
    pub fn link_name(&self, idx: usize, pos: u64) -> Result<String, EngineError> {
        let children = self.group_children(idx)?;
        children
            .get(pos as usize)
            .map(|&c| self.nodes[c].name.clone())
            .ok_or_else(|| {
                EngineError::new(
                    ErrorKind::NotFound,
                    "link_name_by_index",
                    format!("position {pos} out of {} links", children.len()),
                )
            })
    }

    /// Attach a new node under `parent`.  The caller has already checked
    /// for link collisions.
    pub fn insert_node(&mut self, parent: usize, name: &str, body: NodeBody) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            parent: Some(parent),
            attrs: Vec::new(),
            body,
        });
        if let NodeBody::Group { children } = &mut self.nodes[parent].body {
            children.push(idx);
        }
        idx
    }

    /// Remove the link `name` from the group at `idx`.  The target node is
    /// unlinked, not destroyed.
    pub fn remove_link(&mut self, idx: usize, name: &str) -> Result<(), EngineError> {
        let target = self.child_by_name(idx, name)?.ok_or_else(|| {
            EngineError::new(
                ErrorKind::NotFound,
                "link_delete",
                format!("no link '{name}'"),
            )
        })?;
        if let NodeBody::Group { children } = &mut self.nodes[idx].body {
            children.retain(|&c| c != target);
        }
        self.nodes[target].parent = None;
        Ok(())
    }

    /// Slash-separated path of a node from the root.
    pub fn path_of(&self, idx: usize) -> String {
        if idx == Self::ROOT {
            return "/".to_string();
        }
        let mut parts = Vec::new();
        let mut cur = Some(idx);
        while let Some(i) = cur {
            if i == Self::ROOT {
                break;
            }
            parts.push(self.nodes[i].name.clone());
            cur = self.nodes[i].parent;
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    pub fn attr_by_name(&self, idx: usize, name: &str) -> Option<&AttrRow> {
        self.nodes[idx].attrs.iter().find(|a| a.name == name)
    }

    pub fn attr_by_id(&self, idx: usize, id: u64) -> Option<&AttrRow> {
        self.nodes[idx].attrs.iter().find(|a| a.id == id)
    }

    pub fn attr_by_id_mut(&mut self, idx: usize, id: u64) -> Option<&mut AttrRow> {
        self.nodes[idx].attrs.iter_mut().find(|a| a.id == id)
    }
}

impl Default for Container {
    fn default() -> Self {
        Container::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Predefined;

    #[test]
    fn tree_paths_and_links() {
        let mut c = Container::new();
        let g = c.insert_node(
            Container::ROOT,
            "sensors",
            NodeBody::Group { children: Vec::new() },
        );
        let d = c.insert_node(
            g,
            "temperature",
            NodeBody::Dataset(DatasetDef {
                dtype: Predefined::F64Le.encoding(),
                extent: Extent::Simple(vec![3]),
                plist: PlistDef::default(),
                payload: Payload::zeroed(&Predefined::F64Le.encoding(), 3),
            }),
        );
        assert_eq!(c.path_of(Container::ROOT), "/");
        assert_eq!(c.path_of(g), "/sensors");
        assert_eq!(c.path_of(d), "/sensors/temperature");
        assert_eq!(c.link_count(Container::ROOT).unwrap(), 1);
        assert_eq!(c.link_name(g, 0).unwrap(), "temperature");
        assert_eq!(c.child_by_name(g, "temperature").unwrap(), Some(d));
        assert_eq!(c.child_by_name(g, "missing").unwrap(), None);
    }

    #[test]
    fn remove_link_unlinks_but_keeps_node() {
        let mut c = Container::new();
        let g = c.insert_node(
            Container::ROOT,
            "g",
            NodeBody::Group { children: Vec::new() },
        );
        c.remove_link(Container::ROOT, "g").unwrap();
        assert_eq!(c.link_count(Container::ROOT).unwrap(), 0);
        assert!(c.nodes[g].parent.is_none());
        let err = c.remove_link(Container::ROOT, "g").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn dataset_is_not_a_group() {
        let mut c = Container::new();
        let d = c.insert_node(
            Container::ROOT,
            "d",
            NodeBody::Dataset(DatasetDef {
                dtype: Predefined::I32Le.encoding(),
                extent: Extent::Scalar,
                plist: PlistDef::default(),
                payload: Payload::zeroed(&Predefined::I32Le.encoding(), 1),
            }),
        );
        let err = c.link_count(d).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
