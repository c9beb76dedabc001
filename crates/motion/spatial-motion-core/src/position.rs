//! Cartesian track position and the polar (AED) view used on the wire.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A point in the room, in meters. `z` is up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Build a position from azimuth/elevation in degrees and a distance.
    pub fn from_polar(azimuth: f64, elevation: f64, distance: f64) -> Self {
        let azim = azimuth.to_radians();
        let elev = elevation.to_radians();
        Self {
            x: distance * azim.cos() * elev.cos(),
            y: distance * azim.sin() * elev.cos(),
            z: distance * elev.sin(),
        }
    }

    /// Azimuth, elevation (degrees) and distance. The origin maps to `(0, 0, 0)`.
    pub fn to_polar(&self) -> (f64, f64, f64) {
        let distance = self.length();
        if distance == 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let azimuth = self.y.atan2(self.x).to_degrees();
        let planar = (self.x * self.x + self.y * self.y).sqrt();
        let elevation = self.z.atan2(planar).to_degrees();
        (azimuth, elevation, distance)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    #[inline]
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    #[inline]
    pub fn distance(&self, other: &Position) -> f64 {
        (*self - *other).length()
    }

    /// Linear interpolation; `t` is not clamped.
    #[inline]
    pub fn lerp(&self, other: &Position, t: f64) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Position {
        Position::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position::new(-self.x, -self.y, -self.z)
    }
}

impl From<[f64; 3]> for Position {
    fn from(v: [f64; 3]) -> Self {
        Position::new(v[0], v[1], v[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn polar_round_trip_on_axes() {
        let p = Position::new(0.0, 2.0, 0.0);
        let (a, e, d) = p.to_polar();
        assert_abs_diff_eq!(a, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(e, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d, 2.0, epsilon = 1e-9);

        let back = Position::from_polar(a, e, d);
        assert_abs_diff_eq!(back.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn origin_has_zero_polar() {
        assert_eq!(Position::ORIGIN.to_polar(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn lerp_endpoints() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(2.0, -4.0, 1.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), Position::new(1.0, -2.0, 0.5));
    }

    #[test]
    fn non_finite_detected() {
        assert!(!Position::new(f64::NAN, 0.0, 0.0).is_finite());
        assert!(!Position::new(0.0, f64::INFINITY, 0.0).is_finite());
        assert!(Position::new(1.0, 2.0, 3.0).is_finite());
    }
}
