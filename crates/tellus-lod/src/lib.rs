//! Adaptive terrain level-of-detail: a bounded-memory, incrementally-refining
//! triangular mesh over a sphere.
//!
//! The tree lives in fixed-capacity arenas. Nodes are triangular patches that
//! subdivide in groups of four siblings (a *quaterna*, the sort/eviction
//! unit); midpoints are shared across edges through *cousin* links so each
//! edge is evaluated at most once no matter which side subdivides first.
//! [`NodeBuffer::tick`] scores, sorts, and churns within a per-tick work
//! bound; an external regulator supplies the target quaterna count. The
//! structural tree is shared with a concurrent read-only physics thread via
//! [`TreeReader`], with a write lock scoped to the narrow child/cousin
//! mutation moments only.

mod buffer;
mod node;
mod point_store;
mod polyhedron;
mod quaterna;
mod reader;
mod score;
mod tree;
mod tuning;

pub use buffer::{NodeBuffer, TickStats};
pub use node::{Node, NodeIndex, NodeParent};
pub use point_store::{PointArena, PointIndex};
pub use polyhedron::Polyhedron;
pub use quaterna::Quaterna;
pub use reader::{ProbeHit, TreeReader};
pub use score::{ray_moved_significantly, score_node};
pub use tree::{RootNode, TreeCore};
pub use tuning::LodTuning;
