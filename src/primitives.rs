use std::fmt;

use serde::{Deserialize, Serialize};

/// Rounds to the nearest integer with ties going to the even neighbour,
/// the convention all window geometry here is computed with.
#[inline]
pub fn cv_round(v: f64) -> i32 { v.round_ties_even() as i32 }

/// An integer width/height pair. Can be negative when it is the result
/// of a subtraction (e.g. a scan region that does not fit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}
impl Size {
    pub const fn new(width: i32, height: i32) -> Self { Self { width, height } }

    pub const fn square(side: i32) -> Self { Self::new(side, side) }

    /// Multiplies both sides by `f` and rounds
    pub fn scale(self, f: f64) -> Self {
        Self::new(
            cv_round(f64::from(self.width) * f),
            cv_round(f64::from(self.height) * f),
        )
    }

    /// Divides both sides by `f` and rounds
    pub fn shrink(self, f: f64) -> Self {
        Self::new(
            cv_round(f64::from(self.width) / f),
            cv_round(f64::from(self.height) / f),
        )
    }

    pub fn is_empty(self) -> bool { self.width <= 0 || self.height <= 0 }

    /// True if either side is larger than the matching side of `other`
    pub fn exceeds(self, other: Size) -> bool {
        self.width > other.width || self.height > other.height
    }

    /// True if either side is smaller than the matching side of `other`
    pub fn falls_short_of(self, other: Size) -> bool {
        self.width < other.width || self.height < other.height
    }
}
impl std::ops::Sub for Size {
    type Output = Size;

    fn sub(self, rhs: Size) -> Size {
        Size::new(self.width - rhs.width, self.height - rhs.height)
    }
}
impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}
impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub const fn from_size(x: i32, y: i32, size: Size) -> Self {
        Self::new(x, y, size.width, size.height)
    }

    pub const fn right(&self) -> i32 { self.x + self.width }

    pub const fn bottom(&self) -> i32 { self.y + self.height }

    pub const fn size(&self) -> Size { Size::new(self.width, self.height) }

    pub const fn area(&self) -> i64 { self.width as i64 * self.height as i64 }

    /// True if `self` lies inside `outer` grown by `dx`/`dy` on every side
    pub fn inside(&self, outer: &Rect, dx: i32, dy: i32) -> bool {
        self.x >= outer.x - dx
            && self.y >= outer.y - dy
            && self.right() <= outer.right() + dx
            && self.bottom() <= outer.bottom() + dy
    }
}
impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(cv_round(0.5), 0);
        assert_eq!(cv_round(1.5), 2);
        assert_eq!(cv_round(2.5), 2);
        assert_eq!(cv_round(-1.5), -2);
        assert_eq!(cv_round(38.4), 38);
    }

    #[test]
    fn scales_sizes() {
        assert_eq!(Size::square(32).scale(1.2), Size::square(38));
        assert_eq!(Size::new(64, 48).shrink(1.44), Size::new(44, 33));
    }

    #[test]
    fn containment_with_margin() {
        let outer = Rect::new(10, 10, 20, 20);
        assert!(Rect::new(12, 12, 5, 5).inside(&outer, 0, 0));
        assert!(!Rect::new(8, 12, 5, 5).inside(&outer, 0, 0));
        assert!(Rect::new(8, 12, 5, 5).inside(&outer, 2, 2));
    }
}
