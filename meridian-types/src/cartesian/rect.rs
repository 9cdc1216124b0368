use serde::{Deserialize, Serialize};

use crate::cartesian::Point2;
use crate::error::TypesError;

/// Axis-aligned rectangle, used as the extent of geometries, layers and maps.
///
/// A rectangle constructed with [`Rect::new`] is not checked. Use [`Rect::try_new`] or
/// [`Rect::from_slice`] for values that come from the outside.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Minimal x.
    pub x_min: f64,
    /// Minimal y.
    pub y_min: f64,
    /// Maximal x.
    pub x_max: f64,
    /// Maximal y.
    pub y_max: f64,
}

impl Rect {
    /// Creates a new rectangle without validation.
    pub const fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Creates a new rectangle, failing if it is not well-formed.
    pub fn try_new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, TypesError> {
        let rect = Self::new(x_min, y_min, x_max, y_max);
        if rect.is_valid() {
            Ok(rect)
        } else {
            Err(TypesError::InvalidExtent {
                x_min,
                y_min,
                x_max,
                y_max,
            })
        }
    }

    /// Creates a rectangle from `[x_min, y_min, x_max, y_max]`.
    pub fn from_slice(values: &[f64]) -> Result<Self, TypesError> {
        match values {
            [x_min, y_min, x_max, y_max] => Self::try_new(*x_min, *y_min, *x_max, *y_max),
            _ => Err(TypesError::InvalidCoordinates(format!(
                "a box needs 4 numbers, got {}",
                values.len()
            ))),
        }
    }

    /// Returns `[x_min, y_min, x_max, y_max]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }

    /// All values are finite and `min <= max` on both axes.
    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
            && self.x_min <= self.x_max
            && self.y_min <= self.y_max
    }

    /// Minimal x.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Maximal x.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Minimal y.
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    /// Maximal y.
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Center point.
    pub fn center(&self) -> Point2 {
        Point2::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Zero-sized rectangle at the given point.
    pub fn from_point(p: &Point2) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    /// Bounding rectangle of the points, `None` if the iterator is empty.
    pub fn from_points<'a>(mut points: impl Iterator<Item = &'a Point2>) -> Option<Self> {
        let first = points.next()?;
        let mut rect = Self::from_point(first);
        for p in points {
            rect.x_min = rect.x_min.min(p.x);
            rect.y_min = rect.y_min.min(p.y);
            rect.x_max = rect.x_max.max(p.x);
            rect.y_max = rect.y_max.max(p.y);
        }

        Some(rect)
    }

    /// Smallest rectangle containing both.
    pub fn merge(&self, other: Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Union of all rectangles of the iterator, `None` if it is empty.
    pub fn union_all(iter: impl IntoIterator<Item = Rect>) -> Option<Self> {
        iter.into_iter().reduce(|acc, rect| acc.merge(rect))
    }

    /// Returns true if the point is inside the rectangle or on its boundary.
    pub fn contains(&self, point: &Point2) -> bool {
        self.x_min <= point.x
            && self.x_max >= point.x
            && self.y_min <= point.y
            && self.y_max >= point.y
    }

    /// Returns true if the rectangles have at least one common point.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x_min <= other.x_max
            && self.x_max >= other.x_min
            && self.y_min <= other.y_max
            && self.y_max >= other.y_min
    }

    /// Common part of the two rectangles.
    pub fn intersection(&self, other: &Rect) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }

        Some(Self {
            x_min: self.x_min.max(other.x_min),
            y_min: self.y_min.max(other.y_min),
            x_max: self.x_max.min(other.x_max),
            y_max: self.y_max.min(other.y_max),
        })
    }

    /// Grows the rectangle by `dx` on the left and right and by `dy` on the top and bottom.
    pub fn expand(&self, dx: f64, dy: f64) -> Self {
        Self {
            x_min: self.x_min - dx,
            x_max: self.x_max + dx,
            y_min: self.y_min - dy,
            y_max: self.y_max + dy,
        }
    }

    /// Scales the rectangle around its center.
    pub fn magnify(&self, factor: f64) -> Self {
        let center = self.center();
        let half_width = self.width() / 2.0 * factor;
        let half_height = self.height() / 2.0 * factor;
        Self {
            x_min: center.x - half_width,
            x_max: center.x + half_width,
            y_min: center.y - half_height,
            y_max: center.y + half_height,
        }
    }

    /// Corners and edge midpoints, used to transform the rectangle into another coordinate system.
    pub fn boundary_samples(&self) -> [Point2; 8] {
        let center = self.center();
        [
            Point2::new(self.x_min, self.y_min),
            Point2::new(center.x, self.y_min),
            Point2::new(self.x_max, self.y_min),
            Point2::new(self.x_max, center.y),
            Point2::new(self.x_max, self.y_max),
            Point2::new(center.x, self.y_max),
            Point2::new(self.x_min, self.y_max),
            Point2::new(self.x_min, center.y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn validation() {
        assert!(Rect::try_new(0.0, 0.0, 1.0, 1.0).is_ok());
        assert!(Rect::try_new(1.0, 1.0, 1.0, 1.0).is_ok());
        assert_matches!(
            Rect::try_new(1.0, 0.0, 0.0, 1.0),
            Err(TypesError::InvalidExtent { .. })
        );
        assert_matches!(
            Rect::try_new(0.0, f64::NAN, 1.0, 1.0),
            Err(TypesError::InvalidExtent { .. })
        );
        assert_matches!(
            Rect::from_slice(&[0.0, 1.0]),
            Err(TypesError::InvalidCoordinates(_))
        );
    }

    #[test]
    fn merge_and_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, -5.0, 15.0, 5.0);
        assert_eq!(a.merge(b), Rect::new(0.0, -5.0, 15.0, 10.0));
        assert_eq!(a.intersection(&b), Some(Rect::new(5.0, 0.0, 10.0, 5.0)));

        let far = Rect::new(20.0, 20.0, 30.0, 30.0);
        assert!(!a.intersects(&far));
        assert_eq!(a.intersection(&far), None);

        assert_eq!(Rect::union_all([a, b, far]), Some(Rect::new(0.0, -5.0, 30.0, 30.0)));
        assert_eq!(Rect::union_all(std::iter::empty()), None);
    }

    #[test]
    fn expand() {
        let rect = Rect::new(-1.0, -1.0, 1.0, 1.0).expand(0.5, 1.0);
        assert_eq!(rect, Rect::new(-1.5, -2.0, 1.5, 2.0));
        assert_eq!(rect.center(), Point2::new(0.0, 0.0));
    }
}
