//! Integer Grid Vector
//!
//! 2D integer vector used for tile positions and movement directions.
//! Screen convention: +X is right, +Y is down.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use serde::{Serialize, Deserialize};

/// 2D vector with integer components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridVec2 {
    /// X component (column)
    pub x: i32,
    /// Y component (row)
    pub y: i32,
}

impl GridVec2 {
    /// Zero vector, also "no direction".
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// One row up
    pub const UP: Self = Self { x: 0, y: -1 };

    /// One row down
    pub const DOWN: Self = Self { x: 0, y: 1 };

    /// One column left
    pub const LEFT: Self = Self { x: -1, y: 0 };

    /// One column right
    pub const RIGHT: Self = Self { x: 1, y: 0 };

    /// The four movement directions.
    pub const DIRECTIONS: [Self; 4] = [Self::UP, Self::DOWN, Self::LEFT, Self::RIGHT];

    /// Create a new vector.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True for one of the four unit directions.
    #[inline]
    pub fn is_direction(self) -> bool {
        Self::DIRECTIONS.contains(&self)
    }

    /// Wrap into `[0, width) x [0, height)`.
    #[inline]
    pub fn wrap(self, width: i32, height: i32) -> Self {
        Self {
            x: self.x.rem_euclid(width),
            y: self.y.rem_euclid(height),
        }
    }
}

impl Add for GridVec2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x.wrapping_add(rhs.x), self.y.wrapping_add(rhs.y))
    }
}

impl Sub for GridVec2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x.wrapping_sub(rhs.x), self.y.wrapping_sub(rhs.y))
    }
}

impl Neg for GridVec2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Debug for GridVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GridVec2({}, {})", self.x, self.y)
    }
}

impl fmt::Display for GridVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_constants() {
        assert_eq!(GridVec2::UP + GridVec2::DOWN, GridVec2::ZERO);
        assert_eq!(-GridVec2::LEFT, GridVec2::RIGHT);
        assert!(GridVec2::RIGHT.is_direction());
        assert!(!GridVec2::ZERO.is_direction());
        assert!(!GridVec2::new(1, 1).is_direction());
    }

    #[test]
    fn test_vec2_wrap() {
        assert_eq!(GridVec2::new(-1, 0).wrap(48, 32), GridVec2::new(47, 0));
        assert_eq!(GridVec2::new(48, 32).wrap(48, 32), GridVec2::new(0, 0));
        assert_eq!(GridVec2::new(5, -33).wrap(48, 32), GridVec2::new(5, 31));
    }

    #[test]
    fn test_vec2_sub() {
        let a = GridVec2::new(3, 4);
        let b = GridVec2::new(1, 6);
        assert_eq!(a - b, GridVec2::new(2, -2));
    }
}
