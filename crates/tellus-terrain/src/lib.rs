//! Formation definitions and height-field strategies for spherical terrain.
//!
//! A [`FormationDef`] is the immutable description of one planet or moon; a
//! [`HeightField`] is the pluggable strategy that turns a direction from the
//! formation center into a surface position. Two strategies ship here: the
//! plain sphere ([`FlatField`]) and a cratered sphere ([`CrateredField`]) that
//! carves a fixed, seed-derived set of spherical cavities out of the radius.

mod craters;
mod formation;
mod height_field;
mod seed;

pub use craters::{Crater, CrateredField};
pub use formation::FormationDef;
pub use height_field::{FlatField, HeightField, ROOT_DIRECTIONS};
pub use seed::{derive_seed, det_acos, det_cos, det_sin};
