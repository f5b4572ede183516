//! One triangular patch of the subdivision mesh.
//!
//! Edge/corner conventions: edge `i` is opposite corner `i`; midpoint `i`
//! (when present) lies on edge `i`; cousin `i` is the neighbor across edge
//! `i`. Child `i < 3` keeps the parent's corner `i`, child 3 is the
//! centrally-inverted middle triangle.

use glam::DVec3;

use crate::point_store::PointIndex;

/// Bounds-checked handle into the node arena.
///
/// Nodes are only ever allocated in blocks of four siblings, so a block start
/// is always a multiple of 4.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub(crate) u32);

impl NodeIndex {
    /// Handle for the arena slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit the handle width.
    #[must_use]
    pub fn new(index: usize) -> Self {
        NodeIndex(u32::try_from(index).expect("node index fits the handle width"))
    }

    /// The raw arena slot.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Start of the 4-sibling block containing this node.
    #[must_use]
    pub fn block_start(self) -> NodeIndex {
        NodeIndex(self.0 & !3)
    }

    /// This node's slot within its block (0..4; 3 is the center child).
    #[must_use]
    pub fn slot_in_block(self) -> usize {
        (self.0 & 3) as usize
    }

    /// Sibling `slot` of the block starting at `self`.
    #[must_use]
    pub(crate) fn sibling(self, slot: usize) -> NodeIndex {
        debug_assert_eq!(self.0 & 3, 0, "sibling() wants a block start");
        NodeIndex(self.0 + slot as u32)
    }
}

/// Parent link of a used node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeParent {
    /// Child of the synthetic root (a face of the initial shell).
    Root,
    /// Child of a regular node.
    Node(NodeIndex),
}

/// One triangular patch.
///
/// A node is "used" iff its parent link is present; clearing a node severs
/// every link and resets it to the unused state.
#[derive(Clone, Debug, Default)]
pub struct Node {
    /// Corner points; all present iff the node is used.
    pub corners: [Option<PointIndex>; 3],
    /// Edge midpoints, present once the corresponding edge has been subdivided.
    pub midpoints: [Option<PointIndex>; 3],
    /// Edge neighbors, absent until the neighbor exists.
    pub cousins: [Option<NodeIndex>; 3],
    /// Parent link; `None` iff this slot is unused.
    pub parent: Option<NodeParent>,
    /// Start of the 4-child block, if subdivided.
    pub children: Option<NodeIndex>,
    /// Deterministic per-patch seed, derived from the parent's.
    pub seed: u64,
}

impl Node {
    /// Whether this arena slot holds a live patch.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.parent.is_some()
    }

    /// Whether this node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Whether all three edge neighbors exist.
    #[must_use]
    pub fn has_all_cousins(&self) -> bool {
        self.cousins.iter().all(Option::is_some)
    }

    /// Which of this node's edges faces `other`, if any.
    #[must_use]
    pub fn mirror_edge(&self, other: NodeIndex) -> Option<usize> {
        self.cousins.iter().position(|c| *c == Some(other))
    }

    /// Endpoint corner slots of edge `edge` (the two corners it runs between).
    #[must_use]
    pub fn edge_corner_slots(edge: usize) -> (usize, usize) {
        ((edge + 1) % 3, (edge + 2) % 3)
    }

    /// Reset to the unused state.
    pub(crate) fn clear(&mut self) {
        *self = Node::default();
    }
}

/// Corner point sets for the 4 children of a parent with corners `c` and
/// midpoints `m`.
///
/// Child `i < 3` keeps parent corner `i` at its own slot `i` and takes
/// midpoints elsewhere; child 3 is the inverted center triangle made of the
/// three midpoints. The layout preserves counter-clockwise winding.
#[must_use]
pub(crate) fn child_corner_sets(c: [PointIndex; 3], m: [PointIndex; 3]) -> [[PointIndex; 3]; 4] {
    [
        [c[0], m[2], m[1]],
        [m[2], c[1], m[0]],
        [m[1], m[0], c[2]],
        [m[0], m[1], m[2]],
    ]
}

/// Same mapping over positions, for the speculative geometry check.
#[must_use]
pub(crate) fn child_corner_positions(c: [DVec3; 3], m: [DVec3; 3]) -> [[DVec3; 3]; 4] {
    [
        [c[0], m[2], m[1]],
        [m[2], c[1], m[0]],
        [m[1], m[0], c[2]],
        [m[0], m[1], m[2]],
    ]
}

/// Whether every edge of every prospective child is numerically sound.
///
/// Written so that NaN positions (e.g. from a normalize of a zero vector)
/// fail the check rather than passing it.
#[must_use]
pub(crate) fn child_geometry_ok(c: [DVec3; 3], m: [DVec3; 3], min_edge: f64) -> bool {
    let min_sq = min_edge * min_edge;
    for tri in child_corner_positions(c, m) {
        for edge in 0..3 {
            let (a, b) = Node::edge_corner_slots(edge);
            let len_sq = (tri[a] - tri[b]).length_squared();
            if !(len_sq > min_sq) {
                return false;
            }
        }
    }
    true
}
