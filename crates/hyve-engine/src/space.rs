//! Shape descriptors: scalar or N-dimensional extents with an optional
//! hyperslab selection, and the row-major index enumeration used by
//! partial I/O.

use crate::error::{EngineError, ErrorKind};

/// Upper bound on the rank of a simple extent.
pub const MAX_RANK: usize = 32;

/// The declared shape of an array-like entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extent {
    /// Rank 0: exactly one element.
    Scalar,
    /// Rank >= 1 with per-axis sizes.
    Simple(Vec<u64>),
}

impl Extent {
    pub fn rank(&self) -> usize {
        match self {
            Extent::Scalar => 0,
            Extent::Simple(dims) => dims.len(),
        }
    }

    pub fn dims(&self) -> &[u64] {
        match self {
            Extent::Scalar => &[],
            Extent::Simple(dims) => dims,
        }
    }

    /// Total number of elements the extent declares.
    pub fn npoints(&self) -> u64 {
        match self {
            Extent::Scalar => 1,
            Extent::Simple(dims) => dims.iter().product(),
        }
    }
}

/// The element subset addressed by subsequent I/O.  A selection narrows the
/// logical element set without altering the extent's declared shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Hyperslab {
        offset: Vec<u64>,
        stride: Vec<u64>,
        count: Vec<u64>,
        block: Vec<u64>,
    },
}

/// A shape descriptor: extent plus current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceDef {
    pub extent: Extent,
    pub selection: Selection,
}

impl SpaceDef {
    pub fn scalar() -> SpaceDef {
        SpaceDef {
            extent: Extent::Scalar,
            selection: Selection::All,
        }
    }

    /// Build a simple extent from an explicit ordered dimension list.
    /// Rank 0 and zero-sized axes are rejected; use [`SpaceDef::scalar`]
    /// for rank 0.
    pub fn simple(dims: &[u64]) -> Result<SpaceDef, EngineError> {
        if dims.is_empty() {
            return Err(EngineError::new(
                ErrorKind::InvalidArgument,
                "space_simple",
                "rank 0 requires the scalar constructor",
            ));
        }
        if dims.len() > MAX_RANK {
            return Err(EngineError::new(
                ErrorKind::InvalidArgument,
                "space_simple",
                format!("rank {} exceeds the maximum of {MAX_RANK}", dims.len()),
            ));
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(EngineError::new(
                ErrorKind::InvalidArgument,
                "space_simple",
                "zero-sized dimension",
            ));
        }
        Ok(SpaceDef {
            extent: Extent::Simple(dims.to_vec()),
            selection: Selection::All,
        })
    }

    /// Replace the selection with a strided rectangular sub-region.
    pub fn select_hyperslab(
        &mut self,
        offset: &[u64],
        stride: &[u64],
        count: &[u64],
        block: &[u64],
    ) -> Result<(), EngineError> {
        let rank = self.extent.rank();
        for (name, arg) in [
            ("offset", offset),
            ("stride", stride),
            ("count", count),
            ("block", block),
        ] {
            if arg.len() != rank {
                return Err(EngineError::new(
                    ErrorKind::InvalidArgument,
                    "space_select_hyperslab",
                    format!("{name} has {} entries for a rank-{rank} extent", arg.len()),
                ));
            }
        }
        if stride.iter().any(|&s| s == 0) || count.iter().any(|&c| c == 0) {
            return Err(EngineError::new(
                ErrorKind::InvalidArgument,
                "space_select_hyperslab",
                "stride and count must be nonzero",
            ));
        }
        let dims = self.extent.dims();
        for i in 0..rank {
            // Last block starts at offset + (count-1)*stride and spans block.
            let end = offset[i] + (count[i] - 1) * stride[i] + block[i];
            if end > dims[i] {
                return Err(EngineError::new(
                    ErrorKind::ShapeMismatch,
                    "space_select_hyperslab",
                    format!("selection reaches {end} on axis {i} of size {}", dims[i]),
                ));
            }
        }
        self.selection = Selection::Hyperslab {
            offset: offset.to_vec(),
            stride: stride.to_vec(),
            count: count.to_vec(),
            block: block.to_vec(),
        };
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.selection = Selection::All;
    }

    /// Number of elements the current selection addresses.
    pub fn selected_npoints(&self) -> u64 {
        match &self.selection {
            Selection::All => self.extent.npoints(),
            Selection::Hyperslab { count, block, .. } => count
                .iter()
                .zip(block)
                .map(|(c, b)| c * b)
                .product(),
        }
    }

    /// Row-major linear indices of the selected elements, in traversal
    /// order.
    pub fn selected_indices(&self) -> Vec<u64> {
        match &self.selection {
            Selection::All => (0..self.extent.npoints()).collect(),
            Selection::Hyperslab {
                offset,
                stride,
                count,
                block,
            } => {
                let dims = self.extent.dims();
                let rank = dims.len();
                // Per-axis selected coordinates.
                let mut axes: Vec<Vec<u64>> = Vec::with_capacity(rank);
                for i in 0..rank {
                    let mut coords = Vec::new();
                    for c in 0..count[i] {
                        let start = offset[i] + c * stride[i];
                        for b in 0..block[i] {
                            coords.push(start + b);
                        }
                    }
                    axes.push(coords);
                }
                // Row-major cartesian product.
                let total: usize = axes.iter().map(|a| a.len()).product();
                let mut out = Vec::with_capacity(total);
                let mut cursor = vec![0usize; rank];
                for _ in 0..total {
                    let mut linear = 0u64;
                    for i in 0..rank {
                        linear = linear * dims[i] + axes[i][cursor[i]];
                    }
                    out.push(linear);
                    for i in (0..rank).rev() {
                        cursor[i] += 1;
                        if cursor[i] < axes[i].len() {
                            break;
                        }
                        cursor[i] = 0;
                    }
                }
                out
            }
        }
    }
}
