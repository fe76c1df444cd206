//! The closed set of shape kinds a [`crate::Geometry`] can hold.

use geo::{LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use strum_macros::{AsRefStr, Display};

use crate::GeometryError;

/// A planar shape in WGS84 longitude/latitude.
///
/// Only these variants can be stored in the catalog. Anything else the
/// math library can express (collections, bare lines) is rejected at the
/// conversion boundary, and rectangles/triangles are widened to polygons.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point<f64>),
    LineString(LineString<f64>),
    Polygon(Polygon<f64>),
    MultiPoint(MultiPoint<f64>),
    MultiLineString(MultiLineString<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

/// Discriminant of a [`Shape`], used in log lines and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum ShapeKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl Shape {
    /// Returns the kind of this shape.
    #[must_use]
    pub const fn kind(&self) -> ShapeKind {
        match self {
            Self::Point(_) => ShapeKind::Point,
            Self::LineString(_) => ShapeKind::LineString,
            Self::Polygon(_) => ShapeKind::Polygon,
            Self::MultiPoint(_) => ShapeKind::MultiPoint,
            Self::MultiLineString(_) => ShapeKind::MultiLineString,
            Self::MultiPolygon(_) => ShapeKind::MultiPolygon,
        }
    }

    /// Converts into the math library's geometry enum.
    #[must_use]
    pub fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            Self::Point(p) => geo::Geometry::Point(*p),
            Self::LineString(ls) => geo::Geometry::LineString(ls.clone()),
            Self::Polygon(p) => geo::Geometry::Polygon(p.clone()),
            Self::MultiPoint(mp) => geo::Geometry::MultiPoint(mp.clone()),
            Self::MultiLineString(mls) => geo::Geometry::MultiLineString(mls.clone()),
            Self::MultiPolygon(mp) => geo::Geometry::MultiPolygon(mp.clone()),
        }
    }

    /// Returns `true` if every coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        use geo::CoordsIter as _;

        self.to_geo()
            .coords_iter()
            .all(|c| c.x.is_finite() && c.y.is_finite())
    }
}

impl From<Point<f64>> for Shape {
    fn from(value: Point<f64>) -> Self {
        Self::Point(value)
    }
}

impl From<Polygon<f64>> for Shape {
    fn from(value: Polygon<f64>) -> Self {
        Self::Polygon(value)
    }
}

impl From<MultiPolygon<f64>> for Shape {
    fn from(value: MultiPolygon<f64>) -> Self {
        Self::MultiPolygon(value)
    }
}

impl From<LineString<f64>> for Shape {
    fn from(value: LineString<f64>) -> Self {
        Self::LineString(value)
    }
}

impl From<Shape> for geo::Geometry<f64> {
    fn from(value: Shape) -> Self {
        match value {
            Shape::Point(p) => Self::Point(p),
            Shape::LineString(ls) => Self::LineString(ls),
            Shape::Polygon(p) => Self::Polygon(p),
            Shape::MultiPoint(mp) => Self::MultiPoint(mp),
            Shape::MultiLineString(mls) => Self::MultiLineString(mls),
            Shape::MultiPolygon(mp) => Self::MultiPolygon(mp),
        }
    }
}

impl TryFrom<geo::Geometry<f64>> for Shape {
    type Error = GeometryError;

    fn try_from(value: geo::Geometry<f64>) -> Result<Self, Self::Error> {
        match value {
            geo::Geometry::Point(p) => Ok(Self::Point(p)),
            geo::Geometry::LineString(ls) => Ok(Self::LineString(ls)),
            geo::Geometry::Polygon(p) => Ok(Self::Polygon(p)),
            geo::Geometry::MultiPoint(mp) => Ok(Self::MultiPoint(mp)),
            geo::Geometry::MultiLineString(mls) => Ok(Self::MultiLineString(mls)),
            geo::Geometry::MultiPolygon(mp) => Ok(Self::MultiPolygon(mp)),
            geo::Geometry::Rect(r) => Ok(Self::Polygon(r.to_polygon())),
            geo::Geometry::Triangle(t) => Ok(Self::Polygon(t.to_polygon())),
            geo::Geometry::Line(_) => Err(GeometryError::Validation {
                message: "bare line segments are not supported".to_string(),
            }),
            geo::Geometry::GeometryCollection(_) => Err(GeometryError::Validation {
                message: "geometry collections are not supported".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::{Rect, coord, polygon};

    use super::*;

    #[test]
    fn rect_widens_to_polygon() {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let shape = Shape::try_from(geo::Geometry::Rect(rect)).unwrap();
        assert_eq!(shape.kind(), ShapeKind::Polygon);
    }

    #[test]
    fn collections_are_rejected() {
        let collection = geo::GeometryCollection::<f64>(vec![]);
        let err = Shape::try_from(geo::Geometry::GeometryCollection(collection)).unwrap_err();
        assert!(matches!(err, GeometryError::Validation { .. }));
    }

    #[test]
    fn non_finite_coordinates_detected() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 1.0), (x: 1.0, y: 0.0)];
        assert!(!Shape::Polygon(poly).is_finite());
        assert!(Shape::Point(Point::new(-81.7, 41.4)).is_finite());
    }

    #[test]
    fn kind_display() {
        assert_eq!(ShapeKind::MultiPolygon.to_string(), "MultiPolygon");
    }
}
