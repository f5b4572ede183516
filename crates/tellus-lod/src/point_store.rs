//! Fixed-capacity arena of shared vertex positions.
//!
//! Midpoints are the only points referenced from two nodes at once (one per
//! side of a subdivided edge); everything else has a single referencing
//! owner. The arena never grows: exhaustion is reported to the caller, which
//! treats it as a non-fatal local failure.

use glam::DVec3;

/// Bounds-checked handle into a [`PointArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PointIndex(pub(crate) u32);

impl PointIndex {
    /// The raw arena slot.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Flat arena of 3D positions with an explicit free list.
///
/// Allocated once per formation with fixed capacity; never resized.
#[derive(Debug)]
pub struct PointArena {
    positions: Vec<DVec3>,
    /// Stack of free slots; popped on alloc, pushed on free.
    free: Vec<u32>,
}

impl PointArena {
    /// Create an arena with the given fixed capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: vec![DVec3::ZERO; capacity],
            // Reversed so the first allocations hand out the low slots.
            free: (0..capacity as u32).rev().collect(),
        }
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    /// Number of slots currently allocated.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.positions.len() - self.free.len()
    }

    /// Allocate a slot holding `position`, or `None` when the arena is full.
    pub fn alloc(&mut self, position: DVec3) -> Option<PointIndex> {
        let slot = self.free.pop()?;
        self.positions[slot as usize] = position;
        Some(PointIndex(slot))
    }

    /// Return a slot to the free list.
    pub fn free(&mut self, index: PointIndex) {
        debug_assert!(
            (index.index()) < self.positions.len(),
            "point index {index:?} out of bounds"
        );
        debug_assert!(
            !self.free.contains(&index.0),
            "double free of point {index:?}"
        );
        self.positions[index.index()] = DVec3::ZERO;
        self.free.push(index.0);
    }

    /// Position stored at `index`.
    #[must_use]
    pub fn get(&self, index: PointIndex) -> DVec3 {
        self.positions[index.index()]
    }
}
