//! Formation definition — the canonical data structure for a body's immutable parameters.

/// Definition of a formation (planet or moon).
///
/// This is the immutable specification of a body. It does not contain runtime
/// state (the node tree, scores, mesh snapshots) — those belong to the
/// per-scene `Polyhedron` instance that is built from this definition.
#[derive(Clone, Debug, PartialEq)]
pub struct FormationDef {
    /// Unique human-readable name (e.g., "Terra", "Luna").
    pub name: String,

    /// Radius of the body's base sphere in meters (before carving).
    /// Must be positive.
    pub radius: f64,

    /// Seed for all procedural features of this formation (crater placement,
    /// per-patch sampling variation). The same `(radius, seed)` pair always
    /// reproduces the same surface.
    pub seed: u64,
}

impl FormationDef {
    /// Construct a new formation definition.
    ///
    /// # Panics
    ///
    /// Panics if `radius` is not positive.
    pub fn new(name: impl Into<String>, radius: f64, seed: u64) -> Self {
        assert!(radius > 0.0, "Formation radius must be positive, got {radius}");
        Self {
            name: name.into(),
            radius,
            seed,
        }
    }

    /// Earth-like body preset (radius 6,371 km).
    pub fn earth_like(name: impl Into<String>, seed: u64) -> Self {
        Self::new(name, 6_371_000.0, seed)
    }

    /// Moon-like body preset (radius 1,737.4 km).
    pub fn moon_like(name: impl Into<String>, seed: u64) -> Self {
        Self::new(name, 1_737_400.0, seed)
    }

    /// Surface area of the base sphere in m².
    pub fn surface_area(&self) -> f64 {
        4.0 * std::f64::consts::PI * self.radius * self.radius
    }

    /// Circumference of the base sphere in m.
    pub fn circumference(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let earth = FormationDef::earth_like("Terra", 1);
        assert_eq!(earth.radius, 6_371_000.0);

        let moon = FormationDef::moon_like("Luna", 2);
        assert_eq!(moon.radius, 1_737_400.0);
    }

    #[test]
    #[should_panic(expected = "radius must be positive")]
    fn test_zero_radius_panics() {
        FormationDef::new("Bad", 0.0, 1);
    }

    #[test]
    fn test_surface_measures() {
        let f = FormationDef::new("Unit", 1.0, 0);
        assert!((f.surface_area() - 4.0 * std::f64::consts::PI).abs() < 1e-12);
        assert!((f.circumference() - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    }
}
