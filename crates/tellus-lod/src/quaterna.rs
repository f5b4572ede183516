//! The quaterna: a block of four sibling nodes, the unit of sorting and eviction.

use crate::node::NodeIndex;

/// Sentinel cached score marking an unused quaterna.
pub(crate) const UNUSED_PARENT_SCORE: f32 = -1.0;

/// One quaterna entry: the handle to its 4-node block plus the cached score
/// of the block's parent.
///
/// The parent's score (not the children's) is the sort and eviction key:
/// children are not yet scored when a quaterna is newly created. Entries are
/// permuted freely by sorting; the node blocks they reference never move
/// except during the budget-shrink repair pass.
#[derive(Clone, Copy, Debug)]
pub struct Quaterna {
    /// Start of the 4-node block this entry owns.
    pub block: NodeIndex,
    /// Cached score of the block's parent; `-1.0` iff the entry is unused.
    pub parent_score: f32,
}

impl Quaterna {
    /// An unused entry resting on `block`.
    #[must_use]
    pub(crate) fn unused(block: NodeIndex) -> Self {
        Self {
            block,
            parent_score: UNUSED_PARENT_SCORE,
        }
    }

    /// Whether this entry currently owns a live block.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.parent_score >= 0.0
    }
}
