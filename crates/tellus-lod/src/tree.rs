//! The shared structural tree: node arena, point arena, and the synthetic root.
//!
//! `TreeCore` is the state the physics thread reads concurrently. It holds no
//! scores and no quaterna bookkeeping — those stay with the single-writer
//! [`crate::NodeBuffer`] — so everything here changes only inside the narrow
//! structural write sections.

use glam::DVec3;
use tellus_terrain::HeightField;

use crate::node::{Node, NodeIndex, NodeParent};
use crate::point_store::{PointArena, PointIndex};

/// The synthetic root. It has no geometry of its own; its children are the
/// four faces of the initial tetrahedral shell.
#[derive(Debug)]
pub struct RootNode {
    /// Block start of the shell quaterna, once expanded.
    pub children: Option<NodeIndex>,
    /// The formation seed; per-face seeds derive from it.
    pub seed: u64,
}

/// Outcome of ensuring a node's three midpoints, with enough information to
/// roll the operation back if the caller aborts.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MidpointsEnsured {
    /// The three midpoints, in edge order.
    pub points: [PointIndex; 3],
    /// Which of them were allocated by this call (vs. pre-existing/shared).
    pub newly_allocated: [bool; 3],
}

/// Node arena, point arena, and root — the concurrently readable tree.
#[derive(Debug)]
pub struct TreeCore {
    pub(crate) nodes: Vec<Node>,
    pub(crate) points: PointArena,
    pub(crate) root: RootNode,
    /// Number of used node slots; always the arena prefix `[0, used_nodes)`.
    pub(crate) used_nodes: usize,
}

impl TreeCore {
    /// Create an empty tree sized for `max_quaterna` quaterna.
    ///
    /// The point arena is sized for the worst case of three fresh midpoints
    /// per expansion plus the four shell corners.
    pub(crate) fn new(max_quaterna: usize, seed: u64) -> Self {
        Self {
            nodes: vec![Node::default(); max_quaterna * 4],
            points: PointArena::with_capacity(max_quaterna * 3 + 4),
            root: RootNode {
                children: None,
                seed,
            },
            used_nodes: 0,
        }
    }

    /// The node at `index`.
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.index()]
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index.index()]
    }

    /// Position of the point at `index`.
    #[must_use]
    pub fn point(&self, index: PointIndex) -> DVec3 {
        self.points.get(index)
    }

    /// The synthetic root.
    #[must_use]
    pub fn root(&self) -> &RootNode {
        &self.root
    }

    /// Number of used node slots (always the arena prefix).
    #[must_use]
    pub fn used_nodes(&self) -> usize {
        self.used_nodes
    }

    /// Total node arena capacity.
    #[must_use]
    pub fn node_capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Number of points currently allocated.
    #[must_use]
    pub fn points_in_use(&self) -> usize {
        self.points.in_use()
    }

    /// Corner positions of a used node.
    #[must_use]
    pub fn corner_positions(&self, index: NodeIndex) -> [DVec3; 3] {
        let node = self.node(index);
        node.corners
            .map(|c| self.points.get(c.expect("corner of a used node")))
    }

    /// Ensure all three midpoints of `n` exist, sharing through cousins where
    /// the other side already computed one and evaluating the height field
    /// for the rest.
    ///
    /// Newly allocated midpoints are immediately mirrored onto the cousin's
    /// matching edge, preserving the shared-or-absent invariant. On point
    /// exhaustion every allocation made by this call is rolled back and
    /// `None` is returned, leaving the tree as it was.
    pub(crate) fn init_mid_points(
        &mut self,
        n: NodeIndex,
        field: &dyn HeightField,
    ) -> Option<MidpointsEnsured> {
        let mut points = [PointIndex(0); 3];
        let mut newly_allocated = [false; 3];

        for edge in 0..3 {
            if let Some(existing) = self.node(n).midpoints[edge] {
                points[edge] = existing;
                continue;
            }

            let cousin = self.node(n).cousins[edge];
            let mirror = cousin.and_then(|c| self.node(c).mirror_edge(n).map(|y| (c, y)));

            // Reuse the cousin's midpoint when it subdivided this edge first.
            if let Some((c, y)) = mirror
                && let Some(shared) = self.node(c).midpoints[y]
            {
                self.node_mut(n).midpoints[edge] = Some(shared);
                points[edge] = shared;
                continue;
            }

            let (a_slot, b_slot) = Node::edge_corner_slots(edge);
            let [pa, pb] = {
                let node = self.node(n);
                [
                    self.points
                        .get(node.corners[a_slot].expect("corner of a used node")),
                    self.points
                        .get(node.corners[b_slot].expect("corner of a used node")),
                ]
            };
            let seed = self.node(n).seed;
            let position = field.midpoint(pa, pb, seed);

            let Some(allocated) = self.points.alloc(position) else {
                // Point arena full: undo this call's allocations entirely.
                let partial = MidpointsEnsured {
                    points,
                    newly_allocated,
                };
                self.rollback_midpoints(n, &partial);
                return None;
            };

            self.node_mut(n).midpoints[edge] = Some(allocated);
            if let Some((c, y)) = mirror {
                self.node_mut(c).midpoints[y] = Some(allocated);
            }
            points[edge] = allocated;
            newly_allocated[edge] = true;
        }

        Some(MidpointsEnsured {
            points,
            newly_allocated,
        })
    }

    /// Undo the allocations of a failed or aborted [`Self::init_mid_points`].
    pub(crate) fn rollback_midpoints(&mut self, n: NodeIndex, ensured: &MidpointsEnsured) {
        for edge in 0..3 {
            if !ensured.newly_allocated[edge] {
                continue;
            }
            let midpoint = ensured.points[edge];
            self.node_mut(n).midpoints[edge] = None;
            if let Some(c) = self.node(n).cousins[edge]
                && let Some(y) = self.node(c).mirror_edge(n)
            {
                self.node_mut(c).midpoints[y] = None;
            }
            self.points.free(midpoint);
        }
    }

    /// Audit every structural invariant, returning the first violation found.
    ///
    /// Intended for tests and `debug_assert!`s; not called on hot paths.
    pub fn check_invariants(&self) -> Result<(), String> {
        // Used prefix: everything before the boundary used, nothing after it.
        for (i, node) in self.nodes.iter().enumerate() {
            let should_be_used = i < self.used_nodes;
            if node.is_used() != should_be_used {
                return Err(format!(
                    "node {i}: used={} but boundary is {}",
                    node.is_used(),
                    self.used_nodes
                ));
            }
        }

        if let Some(shell) = self.root.children {
            for slot in 0..4 {
                let face = self.node(shell.sibling(slot));
                if face.parent != Some(NodeParent::Root) {
                    return Err(format!("shell face {slot} does not point back at root"));
                }
            }
        }

        for i in 0..self.used_nodes {
            let index = NodeIndex(i as u32);
            let node = self.node(index);

            if node.corners.iter().any(Option::is_none) {
                return Err(format!("used node {i} is missing a corner"));
            }

            if let Some(block) = node.children {
                if block.index() % 4 != 0 {
                    return Err(format!("node {i} children block {block:?} misaligned"));
                }
                for slot in 0..4 {
                    let child = self.node(block.sibling(slot));
                    if child.parent != Some(NodeParent::Node(index)) {
                        return Err(format!(
                            "child {slot} of node {i} has parent {:?}",
                            child.parent
                        ));
                    }
                }
            }

            for edge in 0..3 {
                let Some(c) = node.cousins[edge] else {
                    continue;
                };
                if !self.node(c).is_used() {
                    return Err(format!("node {i} edge {edge} cousin {c:?} is unused"));
                }
                let Some(y) = self.node(c).mirror_edge(index) else {
                    return Err(format!(
                        "node {i} edge {edge}: cousin {c:?} has no back-reference"
                    ));
                };
                if node.midpoints[edge] != self.node(c).midpoints[y] {
                    return Err(format!(
                        "node {i} edge {edge}: midpoint {:?} != cousin's {:?}",
                        node.midpoints[edge],
                        self.node(c).midpoints[y]
                    ));
                }
            }
        }

        Ok(())
    }
}
