//! The node buffer: owns the arenas and drives scoring, sorting, churn,
//! collapse, and budget resize.
//!
//! Single-writer: exactly one thread calls the mutating operations. The
//! structural tree is shared with concurrent readers through an `RwLock`
//! whose write lock is taken only around the child/cousin mutation moments
//! (expand-install, collapse-detach, shrink repair). Scoring and telemetry
//! touch only buffer-local state plus a read lock.

use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tellus_math::CameraRay;
use tellus_terrain::{HeightField, derive_seed};
use tracing::{debug, trace};

use crate::node::{self, NodeIndex, NodeParent};
use crate::point_store::PointIndex;
use crate::quaterna::{Quaterna, UNUSED_PARENT_SCORE};
use crate::reader::TreeReader;
use crate::score::{ray_moved_significantly, score_node};
use crate::tree::TreeCore;
use crate::tuning::LodTuning;

/// Corner assignment of the four shell faces, as indices into the root
/// tetrahedron's vertex array, wound counter-clockwise seen from outside.
///
/// The same table gives the cousins: the neighbor across edge `k` is the
/// face that omits the vertex sitting at corner `k`, and face `i` is exactly
/// the face omitting vertex `i`.
const SHELL_FACES: [[usize; 3]; 4] = [[1, 3, 2], [0, 2, 3], [0, 3, 1], [0, 1, 2]];

/// Where an expansion's 4-child block comes from.
enum Destination {
    /// A reserved-but-unused slot below the target.
    Reserved,
    /// Evict the used quaterna at this entry position.
    Evict(usize),
}

/// What one `tick` did, for telemetry and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Whether the camera moved enough to trigger a full re-score.
    pub rescored: bool,
    /// Churn passes run this tick.
    pub passes: usize,
    /// Successful expansions across all passes.
    pub expansions: usize,
}

fn lock_read(core: &RwLock<TreeCore>) -> RwLockReadGuard<'_, TreeCore> {
    core.read().unwrap_or_else(PoisonError::into_inner)
}

fn lock_write(core: &RwLock<TreeCore>) -> RwLockWriteGuard<'_, TreeCore> {
    core.write().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the node and quaterna arenas and orchestrates the per-tick work.
pub struct NodeBuffer {
    core: Arc<RwLock<TreeCore>>,
    /// Per-node visual importance; 0 for unscored/unused slots. Lives outside
    /// the shared tree so scoring never contends with readers.
    scores: Vec<f32>,
    /// The sort/eviction array. Entries permute; their blocks do not.
    quaterna: Vec<Quaterna>,
    /// Zone boundaries of the quaterna array: `[0, sorted)` sorted used,
    /// `[sorted, used)` used unsorted, `[used, target)` reserved,
    /// `[target, len)` beyond the current budget.
    sorted_quaterna: usize,
    used_quaterna: usize,
    target_quaterna: usize,
    field: Arc<dyn HeightField>,
    tuning: LodTuning,
    last_scored_ray: Option<CameraRay>,
    score_evaluations: u64,
}

impl NodeBuffer {
    /// Create a buffer with fixed capacity for `max_quaterna` quaterna.
    ///
    /// `seed` is the formation seed; `target_quaterna` is clamped to
    /// `1..=max_quaterna`.
    ///
    /// # Panics
    ///
    /// Panics if `max_quaterna` is zero.
    pub fn new(
        field: Arc<dyn HeightField>,
        seed: u64,
        max_quaterna: usize,
        target_quaterna: usize,
        tuning: LodTuning,
    ) -> Self {
        assert!(max_quaterna > 0, "need capacity for at least one quaterna");
        let quaterna = (0..max_quaterna)
            .map(|i| Quaterna::unused(NodeIndex((i * 4) as u32)))
            .collect();
        Self {
            core: Arc::new(RwLock::new(TreeCore::new(max_quaterna, seed))),
            scores: vec![0.0; max_quaterna * 4],
            quaterna,
            sorted_quaterna: 0,
            used_quaterna: 0,
            target_quaterna: target_quaterna.clamp(1, max_quaterna),
            field,
            tuning,
            last_scored_ray: None,
            score_evaluations: 0,
        }
    }

    /// A cloneable read handle for the physics thread.
    #[must_use]
    pub fn reader(&self) -> TreeReader {
        TreeReader::new(Arc::clone(&self.core))
    }

    /// Read access to the shared tree (used by mesh extraction).
    #[must_use]
    pub fn read(&self) -> RwLockReadGuard<'_, TreeCore> {
        lock_read(&self.core)
    }

    // --- telemetry ---

    /// Number of used nodes.
    #[must_use]
    pub fn used_node_count(&self) -> usize {
        self.used_quaterna * 4
    }

    /// Number of used quaterna.
    #[must_use]
    pub fn used_quaterna_count(&self) -> usize {
        self.used_quaterna
    }

    /// The current target quaterna count.
    #[must_use]
    pub fn target_quaterna_count(&self) -> usize {
        self.target_quaterna
    }

    /// Fixed quaterna capacity.
    #[must_use]
    pub fn max_quaterna(&self) -> usize {
        self.quaterna.len()
    }

    /// Smallest cached parent score in the used set, for the external
    /// regulator. `None` while the buffer is empty.
    #[must_use]
    pub fn min_used_parent_score(&self) -> Option<f32> {
        self.quaterna[..self.used_quaterna]
            .iter()
            .map(|q| q.parent_score)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
    }

    /// Total node score evaluations performed so far.
    #[must_use]
    pub fn score_evaluations(&self) -> u64 {
        self.score_evaluations
    }

    /// The tuning constants in effect.
    #[must_use]
    pub fn tuning(&self) -> &LodTuning {
        &self.tuning
    }

    // --- tick control ---

    /// One tick: re-score if the camera moved significantly, then churn
    /// within the per-tick work bound, deferring the rest to the next tick.
    pub fn tick(&mut self, ray: CameraRay) -> TickStats {
        let rescored = ray_moved_significantly(self.last_scored_ray.as_ref(), &ray, &self.tuning);
        if rescored {
            self.score_all(&ray);
            self.last_scored_ray = Some(ray);
        }

        let mut stats = TickStats {
            rescored,
            ..TickStats::default()
        };
        loop {
            self.refresh_parent_scores();
            self.sort_used();
            let expansions = self.churn_pass(&ray);
            stats.passes += 1;
            stats.expansions += expansions;
            if expansions < self.tuning.churn_intensity_threshold
                || stats.passes >= self.tuning.max_churn_passes
            {
                break;
            }
        }

        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(self.audit(), Ok(()));
        }
        stats
    }

    /// Update the quaterna budget.
    ///
    /// Growing is O(1) bookkeeping. Shrinking synchronously collapses leaf
    /// quaterna from the used tail and halts early — leaving the budget
    /// higher than requested — at the first quaterna with grandchildren,
    /// then repairs the block layout. Repeating an identical request is a
    /// no-op.
    pub fn set_target_quaterna(&mut self, requested: usize) {
        let clamped = requested.clamp(1, self.quaterna.len());
        if clamped != requested {
            debug!(requested, clamped, "target quaterna clamped to capacity");
        }
        if clamped >= self.used_quaterna {
            self.target_quaterna = clamped;
            return;
        }

        {
            let mut core = lock_write(&self.core);
            while self.used_quaterna > clamped {
                let tail = self.used_quaterna - 1;
                let block = self.quaterna[tail].block;
                if (0..4).any(|slot| !core.node(block.sibling(slot)).is_leaf()) {
                    debug!(
                        remaining = self.used_quaterna,
                        requested = clamped,
                        "budget shrink halted at a non-leaf quaterna"
                    );
                    break;
                }
                Self::detach_block(&mut core, &mut self.scores, block);
                self.quaterna[tail].parent_score = UNUSED_PARENT_SCORE;
                core.used_nodes -= 4;
                self.used_quaterna -= 1;
            }
            self.sorted_quaterna = self.sorted_quaterna.min(self.used_quaterna);
            Self::fix_up_decreased_nodes(
                &mut core,
                &mut self.quaterna,
                &mut self.scores,
                self.used_quaterna,
            );
        }
        self.sort_unused_by_block();
        self.target_quaterna = self.used_quaterna.max(clamped);
        debug!(
            target = self.target_quaterna,
            used = self.used_quaterna,
            "budget shrink complete"
        );
    }

    /// Recursively detach and clear the entire subtree below `at`, bottom-up,
    /// folding freed quaterna back to the tail of the used region.
    ///
    /// `NodeParent::Root` tears the whole tree down (the next tick rebuilds
    /// the shell).
    pub fn collapse_subtree(&mut self, at: NodeParent) {
        {
            let mut core = lock_write(&self.core);
            let start = match at {
                NodeParent::Root => core.root.children,
                NodeParent::Node(n) => core.node(n).children,
            };
            let Some(start) = start else {
                return;
            };

            // Collect blocks top-down, then clear in reverse so children are
            // always gone before their parents.
            let mut order = vec![start];
            let mut cursor = 0;
            while cursor < order.len() {
                let block = order[cursor];
                cursor += 1;
                for slot in 0..4 {
                    if let Some(cb) = core.node(block.sibling(slot)).children {
                        order.push(cb);
                    }
                }
            }

            for &block in order.iter().rev() {
                Self::detach_block(&mut core, &mut self.scores, block);
                core.used_nodes -= 4;
                let pos = self.quaterna[..self.used_quaterna]
                    .iter()
                    .position(|q| q.block == block)
                    .expect("freed block has a used quaterna entry");
                self.used_quaterna -= 1;
                self.quaterna.swap(pos, self.used_quaterna);
                self.quaterna[self.used_quaterna].parent_score = UNUSED_PARENT_SCORE;
            }
            self.sorted_quaterna = self.sorted_quaterna.min(self.used_quaterna);
            Self::fix_up_decreased_nodes(
                &mut core,
                &mut self.quaterna,
                &mut self.scores,
                self.used_quaterna,
            );
        }
        self.sort_unused_by_block();
        self.sort_used();
        debug!(used = self.used_quaterna, "collapsed subtree");
    }

    // --- scoring and sorting ---

    fn score_all(&mut self, ray: &CameraRay) {
        let core = lock_read(&self.core);
        for i in 0..core.used_nodes() {
            self.scores[i] = score_node(core.corner_positions(NodeIndex(i as u32)), ray);
            self.score_evaluations += 1;
        }
    }

    fn refresh_parent_scores(&mut self) {
        let core = lock_read(&self.core);
        let used = self.used_quaterna;
        for entry in self.quaterna[..used].iter_mut() {
            entry.parent_score = match core.node(entry.block).parent {
                Some(NodeParent::Root) => f32::MAX,
                Some(NodeParent::Node(p)) => self.scores[p.index()],
                None => {
                    debug_assert!(false, "used quaterna entry {entry:?} with unused block");
                    UNUSED_PARENT_SCORE
                }
            };
        }
        // Stale until the next sort.
        self.sorted_quaterna = 0;
    }

    fn sort_used(&mut self) {
        let used = self.used_quaterna;
        self.quaterna[..used].sort_by(|a, b| {
            b.parent_score
                .partial_cmp(&a.parent_score)
                .unwrap_or(Ordering::Equal)
        });
        self.sorted_quaterna = used;
    }

    fn sort_unused_by_block(&mut self) {
        let used = self.used_quaterna;
        self.quaterna[used..].sort_by_key(|q| q.block.index());
    }

    // --- churn ---

    /// One expansion pass over the sorted prefix in priority order.
    fn churn_pass(&mut self, ray: &CameraRay) -> usize {
        if lock_read(&self.core).root().children.is_none() {
            return usize::from(self.expand_shell(ray));
        }

        let mut candidates = Vec::new();
        {
            let core = lock_read(&self.core);
            for entry in &self.quaterna[..self.sorted_quaterna] {
                for slot in 0..4 {
                    let n = entry.block.sibling(slot);
                    if Self::is_expandable(&core, &self.scores, n) {
                        candidates.push(n);
                    }
                }
            }
        }

        let mut expansions = 0;
        for n in candidates {
            if self.expand_node(n, ray) {
                expansions += 1;
            }
        }
        expansions
    }

    fn is_expandable(core: &TreeCore, scores: &[f32], n: NodeIndex) -> bool {
        let node = core.node(n);
        node.is_used() && node.is_leaf() && node.has_all_cousins() && scores[n.index()] > 0.0
    }

    /// Expand the root into the tetrahedral shell quaterna.
    fn expand_shell(&mut self, ray: &CameraRay) -> bool {
        if self.used_quaterna >= self.target_quaterna {
            return false;
        }
        let entry_pos = self.used_quaterna;
        let block = self.quaterna[entry_pos].block;
        debug_assert_eq!(
            block.index(),
            entry_pos * 4,
            "unused quaterna out of allocation order"
        );

        let positions = self.field.root_points();
        {
            let mut core = lock_write(&self.core);
            debug_assert!(core.root.children.is_none());

            let mut shell_points = [PointIndex(0); 4];
            for (i, position) in positions.iter().enumerate() {
                match core.points.alloc(*position) {
                    Some(p) => shell_points[i] = p,
                    None => {
                        for p in &shell_points[..i] {
                            core.points.free(*p);
                        }
                        return false;
                    }
                }
            }

            let shell_seed = core.root.seed;
            for (slot, face) in SHELL_FACES.iter().enumerate() {
                let idx = block.sibling(slot);
                let node = core.node_mut(idx);
                node.corners = face.map(|v| Some(shell_points[v]));
                node.cousins = face.map(|v| Some(block.sibling(v)));
                node.midpoints = [None; 3];
                node.parent = Some(NodeParent::Root);
                node.children = None;
                node.seed = derive_seed(shell_seed, slot as u32);
            }
            core.root.children = Some(block);
            core.used_nodes += 4;
        }

        for (slot, face) in SHELL_FACES.iter().enumerate() {
            let corners = face.map(|v| positions[v]);
            self.scores[block.sibling(slot).index()] = score_node(corners, ray);
            self.score_evaluations += 1;
        }
        self.quaterna[entry_pos].parent_score = f32::MAX;
        self.used_quaterna += 1;
        trace!("expanded root shell");
        true
    }

    /// Attempt to subdivide `n` into a new 4-child quaterna.
    ///
    /// Returns `false` — leaving every existing structure unchanged — when
    /// the node is no longer eligible, no quaterna can be claimed, the point
    /// arena is exhausted, or the child geometry would be degenerate.
    fn expand_node(&mut self, n: NodeIndex, ray: &CameraRay) -> bool {
        {
            // Revalidate: earlier expansions this pass can change eligibility.
            let core = lock_read(&self.core);
            if !Self::is_expandable(&core, &self.scores, n) {
                return false;
            }
        }

        let destination = if self.used_quaterna < self.target_quaterna {
            Destination::Reserved
        } else {
            let Some(pos) = self.sorted_quaterna.checked_sub(1) else {
                return false;
            };
            let candidate = self.quaterna[pos];
            // (a) strictly worse than the node asking for the slot.
            if candidate.parent_score >= self.scores[n.index()] {
                return false;
            }
            let core = lock_read(&self.core);
            // (b) a leaf quaterna: no grandchildren to orphan.
            if (0..4).any(|slot| !core.node(candidate.block.sibling(slot)).is_leaf()) {
                return false;
            }
            // (c) not an ancestor of `n`; the walk starts at `n` itself so
            // its own quaterna is covered.
            let mut walk = n;
            loop {
                if walk.block_start() == candidate.block {
                    return false;
                }
                match core.node(walk).parent {
                    Some(NodeParent::Node(p)) => walk = p,
                    Some(NodeParent::Root) => break,
                    None => {
                        debug_assert!(false, "ancestor walk reached an unused node");
                        return false;
                    }
                }
            }
            Destination::Evict(pos)
        };

        let mut core = lock_write(&self.core);

        let Some(midpoints) = core.init_mid_points(n, self.field.as_ref()) else {
            trace!(node = n.index(), "expansion failed: point arena full");
            return false;
        };

        // Speculate on the child geometry before touching any shared state.
        let parent_positions = core.corner_positions(n);
        let mid_positions = midpoints.points.map(|m| core.point(m));
        if !node::child_geometry_ok(parent_positions, mid_positions, self.tuning.min_child_edge) {
            core.rollback_midpoints(n, &midpoints);
            trace!(node = n.index(), "expansion aborted: degenerate child geometry");
            return false;
        }

        let (entry_pos, block) = match destination {
            Destination::Reserved => {
                let pos = self.used_quaterna;
                let block = self.quaterna[pos].block;
                debug_assert_eq!(
                    block.index(),
                    pos * 4,
                    "unused quaterna out of allocation order"
                );
                core.used_nodes += 4;
                self.used_quaterna += 1;
                (pos, block)
            }
            Destination::Evict(pos) => {
                let block = self.quaterna[pos].block;
                Self::detach_block(&mut core, &mut self.scores, block);
                // The reused entry's new score is out of order with the
                // sorted prefix; shrink the prefix past it.
                self.sorted_quaterna = pos;
                (pos, block)
            }
        };

        // Install the 4 children.
        let parent_corners = core.node(n).corners.map(|c| c.expect("corner of a used node"));
        let child_corners = node::child_corner_sets(parent_corners, midpoints.points);
        let parent_seed = core.node(n).seed;
        for slot in 0..4 {
            let idx = block.sibling(slot);
            debug_assert!(!core.node(idx).is_used(), "installing into a live block");
            let child = core.node_mut(idx);
            child.corners = child_corners[slot].map(Some);
            child.midpoints = [None; 3];
            child.cousins = [None; 3];
            child.parent = Some(NodeParent::Node(n));
            child.children = None;
            child.seed = derive_seed(parent_seed, slot as u32);
        }

        // Sibling stitching: corner child `i` faces the center across edge `i`.
        let center = block.sibling(3);
        for i in 0..3 {
            core.node_mut(block.sibling(i)).cousins[i] = Some(center);
            core.node_mut(center).cousins[i] = Some(block.sibling(i));
        }

        // Cross-quaterna stitching against the parent's cousins' children.
        // A cousin may just have been severed by the eviction; children on
        // that side stay unstitched until the neighbor re-forms.
        for i in 0..3 {
            for edge in 0..3 {
                if edge == i {
                    continue;
                }
                let Some(b) = core.node(n).cousins[edge] else {
                    continue;
                };
                let Some(neighbor_block) = core.node(b).children else {
                    continue;
                };
                let shared_corner = Some(parent_corners[i]);
                let Some(x) = core.node(b).corners.iter().position(|c| *c == shared_corner)
                else {
                    debug_assert!(false, "cousins without a shared corner point");
                    continue;
                };
                let Some(y) = core.node(b).mirror_edge(n) else {
                    debug_assert!(false, "cousin without a back-reference");
                    continue;
                };
                let child = block.sibling(i);
                let neighbor_child = neighbor_block.sibling(x);
                core.node_mut(child).cousins[edge] = Some(neighbor_child);
                core.node_mut(neighbor_child).cousins[y] = Some(child);
                // Adopt a midpoint the neighbor's child already computed on
                // this half-edge, keeping the shared-or-absent invariant.
                let shared_mid = core.node(neighbor_child).midpoints[y];
                core.node_mut(child).midpoints[edge] = shared_mid;
            }
        }

        core.node_mut(n).children = Some(block);

        // Score the new children now so they can become expandable without
        // waiting for the next camera-driven re-score.
        for slot in 0..4 {
            let idx = block.sibling(slot);
            self.scores[idx.index()] = score_node(core.corner_positions(idx), ray);
            self.score_evaluations += 1;
        }
        drop(core);

        self.quaterna[entry_pos] = Quaterna {
            block,
            parent_score: self.scores[n.index()],
        };
        trace!(node = n.index(), block = block.index(), "expanded node");
        true
    }

    // --- detach / repair ---

    /// Clear a leaf block: free unshared midpoints, sever cousin
    /// back-references, sever the parent's child link, zero the scores.
    fn detach_block(core: &mut TreeCore, scores: &mut [f32], block: NodeIndex) {
        let parent = core.node(block).parent;
        match parent {
            Some(NodeParent::Root) => core.root.children = None,
            Some(NodeParent::Node(p)) => core.node_mut(p).children = None,
            None => debug_assert!(false, "detaching an unused block"),
        }

        // The shell block owns the four root corner points; everyone else's
        // corners are owned by the parent.
        let mut shell_corners: Vec<PointIndex> = Vec::new();
        if parent == Some(NodeParent::Root) {
            for slot in 0..4 {
                for corner in core.node(block.sibling(slot)).corners {
                    let corner = corner.expect("corner of a used node");
                    if !shell_corners.contains(&corner) {
                        shell_corners.push(corner);
                    }
                }
            }
            debug_assert_eq!(shell_corners.len(), 4);
        }

        for slot in 0..4 {
            let idx = block.sibling(slot);
            debug_assert!(
                core.node(idx).is_leaf(),
                "detaching a block with grandchildren"
            );

            for edge in 0..3 {
                let Some(m) = core.node(idx).midpoints[edge] else {
                    continue;
                };
                let kept_by_cousin = core.node(idx).cousins[edge]
                    .is_some_and(|c| core.node(c).midpoints.contains(&Some(m)));
                if !kept_by_cousin {
                    core.points.free(m);
                }
            }

            for edge in 0..3 {
                if let Some(c) = core.node(idx).cousins[edge]
                    && let Some(y) = core.node(c).mirror_edge(idx)
                {
                    core.node_mut(c).cousins[y] = None;
                }
            }

            core.node_mut(idx).clear();
            scores[idx.index()] = 0.0;
        }

        for corner in shell_corners {
            core.points.free(corner);
        }
    }

    /// Restore the used-blocks-form-a-prefix invariant after a shrink.
    ///
    /// Every used block at or past the boundary is content-swapped with a
    /// free block before it, repairing the parent's children reference, each
    /// child's parent reference, and all cousin cross-references.
    fn fix_up_decreased_nodes(
        core: &mut TreeCore,
        quaterna: &mut [Quaterna],
        scores: &mut [f32],
        used_quaterna: usize,
    ) {
        let boundary = used_quaterna * 4;
        let mut free_below: Vec<NodeIndex> = quaterna[used_quaterna..]
            .iter()
            .map(|q| q.block)
            .filter(|b| b.index() < boundary)
            .collect();

        for pos in 0..used_quaterna {
            let src = quaterna[pos].block;
            if src.index() < boundary {
                continue;
            }
            let Some(dst) = free_below.pop() else {
                debug_assert!(false, "no free block below the boundary");
                break;
            };
            Self::relocate_block(core, scores, src, dst);
            // Hand the vacated block to the unused entry that owned `dst`.
            if let Some(entry) = quaterna[used_quaterna..].iter_mut().find(|q| q.block == dst) {
                entry.block = src;
            }
            quaterna[pos].block = dst;
        }
    }

    /// Move a live block from `src` to the unused block `dst`, repairing
    /// every reference into it.
    fn relocate_block(core: &mut TreeCore, scores: &mut [f32], src: NodeIndex, dst: NodeIndex) {
        debug_assert_eq!(src.index() % 4, 0);
        debug_assert_eq!(dst.index() % 4, 0);

        for slot in 0..4 {
            let s = src.sibling(slot);
            let d = dst.sibling(slot);
            debug_assert!(!core.node(d).is_used(), "relocation target is live");
            core.nodes[d.index()] = std::mem::take(&mut core.nodes[s.index()]);
            scores[d.index()] = scores[s.index()];
            scores[s.index()] = 0.0;
        }

        match core.node(dst).parent {
            Some(NodeParent::Root) => core.root.children = Some(dst),
            Some(NodeParent::Node(p)) => core.node_mut(p).children = Some(dst),
            None => debug_assert!(false, "relocated an unused block"),
        }

        for slot in 0..4 {
            let d = dst.sibling(slot);

            if let Some(cb) = core.node(d).children {
                for child_slot in 0..4 {
                    core.node_mut(cb.sibling(child_slot)).parent = Some(NodeParent::Node(d));
                }
            }

            for edge in 0..3 {
                let Some(c) = core.node(d).cousins[edge] else {
                    continue;
                };
                if c.block_start() == src {
                    // Sibling link: remap to the new block directly.
                    core.node_mut(d).cousins[edge] = Some(dst.sibling(c.slot_in_block()));
                } else if let Some(y) = core.node(c).mirror_edge(src.sibling(slot)) {
                    core.node_mut(c).cousins[y] = Some(d);
                } else {
                    debug_assert!(false, "cousin of a relocated node has no back-reference");
                }
            }
        }
    }

    // --- audit ---

    /// Check every buffer-level and tree-level invariant; for tests and
    /// debug assertions.
    pub fn audit(&self) -> Result<(), String> {
        let core = lock_read(&self.core);
        core.check_invariants()?;

        if core.used_nodes() != self.used_quaterna * 4 {
            return Err(format!(
                "used node count {} != used quaterna {} * 4",
                core.used_nodes(),
                self.used_quaterna
            ));
        }
        if self.sorted_quaterna > self.used_quaterna {
            return Err("sorted region exceeds used region".to_string());
        }

        // Entry blocks form a permutation of all block starts.
        let mut seen = vec![false; self.quaterna.len()];
        for entry in &self.quaterna {
            let b = entry.block.index();
            if b % 4 != 0 || b / 4 >= seen.len() || seen[b / 4] {
                return Err(format!("bad or duplicate block {b} in quaterna array"));
            }
            seen[b / 4] = true;
        }

        let boundary = self.used_quaterna * 4;
        for (i, entry) in self.quaterna.iter().enumerate() {
            let used_zone = i < self.used_quaterna;
            if entry.is_used() != used_zone {
                return Err(format!("quaterna {i}: used flag out of zone"));
            }
            if used_zone && entry.block.index() >= boundary {
                return Err(format!("used quaterna {i} owns block past the boundary"));
            }
        }

        // Sorted prefix is non-increasing in cached parent score.
        for window in self.quaterna[..self.sorted_quaterna].windows(2) {
            if window[0].parent_score < window[1].parent_score {
                return Err("sorted prefix out of order".to_string());
            }
        }

        // Unused entries stay sorted by block so slot `used` hands out the
        // boundary block.
        for window in self.quaterna[self.used_quaterna..].windows(2) {
            if window[0].block.index() > window[1].block.index() {
                return Err("unused quaterna not sorted by block".to_string());
            }
        }

        for i in 0..self.scores.len() {
            let in_prefix = i < boundary;
            if !in_prefix && self.scores[i] != 0.0 {
                return Err(format!("unused node {i} has score {}", self.scores[i]));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;
    use tellus_terrain::FlatField;

    use super::*;

    const RADIUS: f64 = 100.0;

    fn far_ray() -> CameraRay {
        CameraRay::new(DVec3::new(0.0, 0.0, RADIUS * 10.0), -DVec3::Z)
    }

    fn near_ray() -> CameraRay {
        CameraRay::new(DVec3::new(0.0, 0.0, RADIUS * 1.2), -DVec3::Z)
    }

    fn buffer_with(max: usize, target: usize) -> NodeBuffer {
        NodeBuffer::new(
            Arc::new(FlatField::new(RADIUS)),
            7,
            max,
            target,
            LodTuning::default(),
        )
    }

    /// Tick until a fixed point (a tick with zero expansions); panics if one
    /// is not reached within `max_ticks`.
    fn tick_to_fixed_point(buffer: &mut NodeBuffer, ray: CameraRay, max_ticks: usize) {
        for _ in 0..max_ticks {
            if buffer.tick(ray).expansions == 0 {
                return;
            }
        }
        panic!("no fixed point within {max_ticks} ticks");
    }

    fn entry_is_leaf(buffer: &NodeBuffer, pos: usize) -> bool {
        let core = lock_read(&buffer.core);
        let block = buffer.quaterna[pos].block;
        (0..4).all(|slot| core.node(block.sibling(slot)).is_leaf())
    }

    /// Empty buffer, target 1: one tick produces exactly the 4-node shell.
    #[test]
    fn test_first_tick_creates_shell() {
        let mut buffer = buffer_with(8, 1);
        assert_eq!(buffer.used_quaterna_count(), 0);
        assert_eq!(buffer.used_node_count(), 0);

        let stats = buffer.tick(far_ray());
        assert!(stats.rescored);
        assert_eq!(stats.expansions, 1);
        assert_eq!(buffer.used_quaterna_count(), 1);
        assert_eq!(buffer.used_node_count(), 4);
        // The shell quaterna caches the synthetic root's score.
        assert_eq!(buffer.min_used_parent_score(), Some(f32::MAX));
        assert_eq!(buffer.audit(), Ok(()));
    }

    /// With a held-constant ray and target, repeated ticks reach a fixed
    /// point at the target, and every structural invariant holds there.
    #[test]
    fn test_growth_reaches_target_and_fixed_point() {
        let mut buffer = buffer_with(64, 10);
        tick_to_fixed_point(&mut buffer, far_ray(), 60);

        assert_eq!(buffer.used_quaterna_count(), 10);
        assert_eq!(buffer.used_node_count(), 40);
        assert_eq!(buffer.audit(), Ok(()));

        // Still at the fixed point on the next tick.
        let stats = buffer.tick(far_ray());
        assert_eq!(stats.expansions, 0);
        assert!(!stats.rescored);
    }

    /// Each tetrahedron edge gets exactly one midpoint no matter which face
    /// subdivides first: 4 shell corners + 6 edge midpoints.
    #[test]
    fn test_midpoints_allocated_once_per_edge() {
        let mut buffer = buffer_with(8, 5);
        tick_to_fixed_point(&mut buffer, far_ray(), 30);

        assert_eq!(buffer.used_quaterna_count(), 5);
        let core = buffer.read();
        assert_eq!(core.points_in_use(), 10);
    }

    /// Raising the target grows the used count monotonically up to the new
    /// target, never past it.
    #[test]
    fn test_raised_target_grows_monotonically() {
        let mut buffer = buffer_with(64, 10);
        tick_to_fixed_point(&mut buffer, far_ray(), 60);
        assert_eq!(buffer.used_quaterna_count(), 10);

        buffer.set_target_quaterna(50);
        assert_eq!(buffer.target_quaterna_count(), 50);

        let mut previous = buffer.used_quaterna_count();
        for _ in 0..120 {
            buffer.tick(far_ray());
            let used = buffer.used_quaterna_count();
            assert!(used >= previous, "used count regressed: {used} < {previous}");
            assert!(used <= 50, "used count overshot the target");
            previous = used;
            if used == 50 {
                break;
            }
        }
        assert_eq!(buffer.used_quaterna_count(), 50);
        assert_eq!(buffer.audit(), Ok(()));
    }

    /// A camera movement below the significance thresholds reuses cached
    /// scores: no re-scoring, churn only.
    #[test]
    fn test_insignificant_ray_skips_rescoring() {
        let mut buffer = buffer_with(32, 8);
        tick_to_fixed_point(&mut buffer, far_ray(), 60);

        let evaluations = buffer.score_evaluations();
        // ~0.57 degrees: 1 - cos is ~5e-5, well under the 1e-3 default.
        let nudged = CameraRay::new(
            DVec3::new(0.0, 0.0, RADIUS * 10.0),
            DVec3::new(0.01, 0.0, -1.0),
        );
        let stats = buffer.tick(nudged);
        assert!(!stats.rescored);
        assert_eq!(stats.expansions, 0);
        assert_eq!(buffer.score_evaluations(), evaluations);

        // A quarter-turn-scale swing does trigger a full re-score.
        let used = buffer.used_node_count() as u64;
        let swung = CameraRay::new(
            DVec3::new(0.0, 0.0, RADIUS * 10.0),
            DVec3::new(0.5, 0.0, -1.0),
        );
        let stats = buffer.tick(swung);
        assert!(stats.rescored);
        // At least one evaluation per used node; churn may add more.
        assert!(buffer.score_evaluations() >= evaluations + used);
    }

    /// Lowering the target from an all-leaves-at-the-tail state shrinks to
    /// exactly the requested count, and every freed node is fully cleared.
    #[test]
    fn test_shrink_to_lower_target() {
        let mut buffer = buffer_with(64, 50);
        for _ in 0..120 {
            if buffer.tick(far_ray()).expansions == 0 && buffer.used_quaterna_count() == 50 {
                break;
            }
        }
        assert_eq!(buffer.used_quaterna_count(), 50);

        buffer.set_target_quaterna(10);
        assert_eq!(buffer.used_quaterna_count(), 10);
        assert_eq!(buffer.target_quaterna_count(), 10);
        assert_eq!(buffer.audit(), Ok(()));

        let core = buffer.read();
        for i in core.used_nodes()..core.node_capacity() {
            let node = core.node(NodeIndex(i as u32));
            assert!(node.parent.is_none(), "freed node {i} still has a parent");
            assert!(node.children.is_none());
            assert_eq!(buffer.scores[i], 0.0, "freed node {i} keeps a score");
        }
    }

    /// Shrink halts the moment the used tail is a quaterna with
    /// grandchildren, reporting the adjusted boundary, and repeating the
    /// request changes nothing.
    #[test]
    fn test_shrink_halts_at_non_leaf_tail() {
        let mut buffer = buffer_with(64, 16);
        tick_to_fixed_point(&mut buffer, near_ray(), 120);
        assert_eq!(buffer.used_quaterna_count(), 16);

        // Plant the shell quaterna (always non-leaf once the faces have
        // children) at the used tail.
        let shell_block = lock_read(&buffer.core).root().children.expect("shell exists");
        let shell_pos = (0..buffer.used_quaterna)
            .find(|&p| buffer.quaterna[p].block == shell_block)
            .expect("shell entry in the used region");
        assert!(!entry_is_leaf(&buffer, shell_pos));
        let last = buffer.used_quaterna - 1;
        buffer.quaterna.swap(shell_pos, last);
        buffer.sorted_quaterna = 0;

        let used_before = buffer.used_quaterna_count();
        buffer.set_target_quaterna(1);
        assert_eq!(
            buffer.used_quaterna_count(),
            used_before,
            "shrink should halt before evicting a non-leaf quaterna"
        );
        assert_eq!(buffer.target_quaterna_count(), used_before);
        assert_eq!(buffer.audit(), Ok(()));

        // Idempotent: the same request again is a no-op.
        buffer.set_target_quaterna(1);
        assert_eq!(buffer.used_quaterna_count(), used_before);
    }

    /// Shrink evicts leaf quaterna from the tail until the first non-leaf,
    /// then stops at that larger boundary.
    #[test]
    fn test_shrink_stops_at_nearest_safe_boundary() {
        let mut buffer = buffer_with(64, 16);
        tick_to_fixed_point(&mut buffer, near_ray(), 120);

        let used = buffer.used_quaterna;
        let shell_block = lock_read(&buffer.core).root().children.expect("shell exists");
        let shell_pos = (0..used)
            .find(|&p| buffer.quaterna[p].block == shell_block)
            .expect("shell entry in the used region");
        // Two leaf quaterna strip children from at most two shell faces, so
        // the shell stays a non-leaf behind them.
        let leaves: Vec<usize> = (0..used)
            .filter(|&p| p != shell_pos && entry_is_leaf(&buffer, p))
            .take(2)
            .collect();
        assert_eq!(leaves.len(), 2, "expected at least two leaf quaterna");

        // Rebuild the used region as [rest..., shell, leaf0, leaf1].
        let mut order: Vec<usize> = (0..used)
            .filter(|&p| p != shell_pos && p != leaves[0] && p != leaves[1])
            .collect();
        order.extend([shell_pos, leaves[0], leaves[1]]);
        let reordered: Vec<Quaterna> = order.iter().map(|&p| buffer.quaterna[p]).collect();
        buffer.quaterna[..used].copy_from_slice(&reordered);
        buffer.sorted_quaterna = 0;

        buffer.set_target_quaterna(1);
        assert_eq!(
            buffer.used_quaterna_count(),
            used - 2,
            "exactly the two tail leaves should be evicted"
        );
        assert_eq!(buffer.target_quaterna_count(), used - 2);
        assert_eq!(buffer.audit(), Ok(()));
    }

    /// Collapsing the whole tree clears every node and point; the next tick
    /// rebuilds the shell from scratch.
    #[test]
    fn test_collapse_root_resets_everything() {
        let mut buffer = buffer_with(32, 12);
        tick_to_fixed_point(&mut buffer, far_ray(), 60);
        assert!(buffer.used_quaterna_count() > 1);

        buffer.collapse_subtree(NodeParent::Root);
        assert_eq!(buffer.used_quaterna_count(), 0);
        assert_eq!(buffer.used_node_count(), 0);
        assert_eq!(buffer.read().points_in_use(), 0);
        assert_eq!(buffer.audit(), Ok(()));

        buffer.tick(far_ray());
        assert_eq!(buffer.used_quaterna_count(), 1);
    }

    /// Collapsing an interior subtree leaves its root as a consistent leaf.
    #[test]
    fn test_collapse_interior_subtree() {
        let mut buffer = buffer_with(64, 16);
        tick_to_fixed_point(&mut buffer, near_ray(), 120);

        // The shell block is never relocated (it is always inside the used
        // prefix), so a face index stays valid across the collapse.
        let face = {
            let core = lock_read(&buffer.core);
            let shell = core.root().children.expect("shell exists");
            (0..4)
                .map(|slot| shell.sibling(slot))
                .find(|f| core.node(*f).children.is_some())
                .expect("some shell face has children")
        };
        let used_before = buffer.used_quaterna_count();

        buffer.collapse_subtree(NodeParent::Node(face));
        assert!(buffer.used_quaterna_count() < used_before);
        assert!(lock_read(&buffer.core).node(face).is_leaf());
        assert_eq!(buffer.audit(), Ok(()));
    }

    /// At full capacity the buffer keeps refining by evicting strictly worse
    /// quaterna, never wedging and never corrupting the structure.
    #[test]
    fn test_eviction_churn_at_full_capacity() {
        let mut buffer = buffer_with(6, 6);
        let mut total_expansions = 0;
        let mut stable = false;
        for _ in 0..300 {
            let stats = buffer.tick(near_ray());
            total_expansions += stats.expansions;
            assert_eq!(buffer.audit(), Ok(()));
            if stats.expansions == 0 {
                stable = true;
                break;
            }
        }
        assert!(stable, "no fixed point under eviction churn");
        assert_eq!(buffer.used_quaterna_count(), 6);
        // More expansions than the reserve can explain means evictions ran.
        assert!(total_expansions > 6, "expected at least one eviction");
    }

    /// A capacity of 2 can never evict (everything is an ancestor or the
    /// expanding node's own quaterna) and must stay stable.
    #[test]
    fn test_tiny_capacity_is_stable() {
        let mut buffer = buffer_with(2, 2);
        for _ in 0..10 {
            buffer.tick(near_ray());
            assert_eq!(buffer.audit(), Ok(()));
        }
        assert_eq!(buffer.used_quaterna_count(), 2);
        assert_eq!(buffer.used_node_count(), 8);
    }

    /// Point-arena exhaustion makes expansions fail locally and harmlessly.
    #[test]
    fn test_point_exhaustion_is_non_fatal() {
        let mut buffer = buffer_with(16, 8);
        buffer.tick(far_ray());
        assert_eq!(buffer.used_quaterna_count(), 1);

        {
            let mut core = lock_write(&buffer.core);
            while core.points.alloc(DVec3::ZERO).is_some() {}
        }

        for _ in 0..3 {
            let stats = buffer.tick(far_ray());
            assert_eq!(stats.expansions, 0);
        }
        assert_eq!(buffer.used_quaterna_count(), 1);
        assert_eq!(buffer.audit(), Ok(()));
    }

    /// Target requests are clamped to `1..=capacity`.
    #[test]
    fn test_target_clamped_to_capacity() {
        let mut buffer = buffer_with(16, 8);
        buffer.set_target_quaterna(0);
        assert_eq!(buffer.target_quaterna_count(), 1);
        buffer.set_target_quaterna(1000);
        assert_eq!(buffer.target_quaterna_count(), 16);
    }

    /// The minimum used parent score is finite and positive once regular
    /// quaterna exist beside the shell.
    #[test]
    fn test_min_parent_score_telemetry() {
        let mut buffer = buffer_with(32, 6);
        tick_to_fixed_point(&mut buffer, far_ray(), 60);
        let min = buffer.min_used_parent_score().expect("used set is non-empty");
        assert!(min > 0.0);
        assert!(min < f32::MAX);
    }
}
