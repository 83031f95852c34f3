//! `moskbridge-math` – rotation and vector algebra.
//!
//! Everything the retargeting engine composes is a unit quaternion or a
//! 3-vector.  Operand order matters: quaternion multiplication is the
//! Hamilton product and is **not** commutative.
//!
//! # Modules
//!
//! - [`algebra`] – [`Quaternion`][algebra::Quaternion] and
//!   [`Vec3`][algebra::Vec3], Euler conversion, vector rotation and the
//!   host/canonical unit conversions.

pub mod algebra;

pub use algebra::{
    CANONICAL_PER_HOST_UNIT, HOST_UNITS_PER_METER, Quaternion, Vec3, to_canonical_units,
    to_host_units,
};
