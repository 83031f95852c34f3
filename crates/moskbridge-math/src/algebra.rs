//! Quaternion and vector algebra.
//!
//! Quaternions are stored with the components in wire order `[x, y, z, w]`
//! so [`Quaternion::from_array`] / [`Quaternion::to_array`] map directly onto
//! the `LR` field of a pose packet.
//!
//! # Example
//!
//! ```rust
//! use moskbridge_math::{Quaternion, Vec3};
//! use std::f64::consts::FRAC_PI_2;
//!
//! // 90° about Z turns +X into +Y.
//! let q = Quaternion::from_euler_xyz(Vec3::new(0.0, 0.0, FRAC_PI_2));
//! let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
//! assert!(v.approx_eq(Vec3::new(0.0, 1.0, 0.0), 1e-9));
//! ```

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Host linear units (centimetres) per canonical metre.
pub const HOST_UNITS_PER_METER: f64 = 100.0;

/// Canonical metres per host linear unit.
pub const CANONICAL_PER_HOST_UNIT: f64 = 0.01;

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector (translation or Euler triple).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Multiply every component by `factor`.
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Component-wise comparison within `tolerance`.
    pub fn approx_eq(self, other: Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, factor: f64) -> Self {
        self.scale(factor)
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::from_array(v)
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

/// Convert a host-space translation (centimetres) into canonical metres.
pub fn to_canonical_units(host: Vec3) -> Vec3 {
    host * CANONICAL_PER_HOST_UNIT
}

/// Convert a canonical translation (metres) into host centimetres.
pub fn to_host_units(canonical: Vec3) -> Vec3 {
    canonical * HOST_UNITS_PER_METER
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A rotation quaternion, components in `[x, y, z, w]` order.
///
/// Every quaternion the bridge stores is expected to be unit-norm; for those
/// [`inverse`][Self::inverse] equals [`conjugate`][Self::conjugate].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// Create a quaternion from its components in wire order.
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation.
    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    pub fn from_array(q: [f64; 4]) -> Self {
        Self::new(q[0], q[1], q[2], q[3])
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Rotation of `angle_rad` around a unit `axis`.
    pub fn from_axis_angle(axis: Vec3, angle_rad: f64) -> Self {
        let (s, c) = (angle_rad * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Build a rotation from Euler angles (radians) with XYZ rotation order:
    /// X is applied first, then Y, then Z, i.e. `qz * qy * qx`.
    pub fn from_euler_xyz(angles: Vec3) -> Self {
        let qx = Self::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), angles.x);
        let qy = Self::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), angles.y);
        let qz = Self::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), angles.z);
        qz * qy * qx
    }

    pub fn norm_squared(self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    pub fn norm(self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Multiplicative inverse: conjugate divided by the squared norm.
    ///
    /// A zero quaternion has no inverse; the identity is returned for it.
    pub fn inverse(self) -> Self {
        let n2 = self.norm_squared();
        if n2 <= f64::EPSILON {
            return Self::identity();
        }
        let c = self.conjugate();
        Self::new(c.x / n2, c.y / n2, c.z / n2, c.w / n2)
    }

    /// Scale to unit norm.  A zero quaternion normalises to the identity.
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n <= f64::EPSILON {
            return Self::identity();
        }
        Self::new(self.x / n, self.y / n, self.z / n, self.w / n)
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Rotate a vector by this quaternion: `v' = q * v * q*`.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(v.x, v.y, v.z, 0.0);
        let r = self * p * self.conjugate();
        Vec3::new(r.x, r.y, r.z)
    }

    /// Component-wise comparison within `tolerance`.
    pub fn approx_eq(self, other: Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
            && (self.w - other.w).abs() <= tolerance
    }

    /// `true` when both quaternions describe the same rotation (`q` and `-q`
    /// are equivalent).
    pub fn same_rotation(self, other: Self, tolerance: f64) -> bool {
        self.approx_eq(other, tolerance) || self.approx_eq(-other, tolerance)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// Hamilton product: `a * b` applies `b` first, then `a`, to a vector.
impl Mul for Quaternion {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

impl Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, -self.w)
    }
}

impl From<[f64; 4]> for Quaternion {
    fn from(q: [f64; 4]) -> Self {
        Self::from_array(q)
    }
}

impl From<Quaternion> for [f64; 4] {
    fn from(q: Quaternion) -> Self {
        q.to_array()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
