//! Named tuning constants for the tick loop, with conservative defaults.

/// Tuning knobs of the LOD engine.
///
/// These are the constants the tick loop consults every frame. Callers that
/// persist configuration convert their config section into this struct.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodTuning {
    /// Camera movement (world units) below which cached scores are reused.
    pub ray_position_epsilon: f64,
    /// Camera rotation tolerance, expressed as `1 - dot` of the normalized
    /// view directions, below which cached scores are reused.
    pub ray_direction_epsilon: f64,
    /// Minimum expansions in one churn pass for the tick to run another pass
    /// instead of deferring remaining work to the next tick.
    pub churn_intensity_threshold: usize,
    /// Hard cap on churn passes per tick.
    pub max_churn_passes: usize,
    /// Child edges shorter than this (world units) abort a subdivision.
    pub min_child_edge: f64,
}

impl Default for LodTuning {
    fn default() -> Self {
        Self {
            ray_position_epsilon: 0.05,
            ray_direction_epsilon: 1e-3,
            churn_intensity_threshold: 16,
            max_churn_passes: 4,
            min_child_edge: 1e-6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let t = LodTuning::default();
        assert!(t.ray_position_epsilon > 0.0);
        assert!(t.ray_direction_epsilon > 0.0);
        assert!(t.churn_intensity_threshold >= 1);
        assert!(t.max_churn_passes >= 1);
        assert!(t.min_child_edge > 0.0);
    }
}
