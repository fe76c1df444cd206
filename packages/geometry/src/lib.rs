#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry value with two lossless encodings.
//!
//! A [`Geometry`] wraps a [`Shape`] and can be written either as
//! well-known binary (what the catalog tables store) or as a `GeoJSON`
//! geometry object (what interchange files and APIs carry). Both encodings
//! round-trip exactly: WKB stores raw `f64` values and the JSON side parses
//! floats with full round-trip precision.
//!
//! An absent geometry is modelled as `Option<Geometry>` and stays absent
//! through every decode path; it is never turned into an empty shape.

mod shape;

pub use shape::{Shape, ShapeKind};

use geo::{Centroid as _, Point, Validation as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors produced while decoding or encoding a [`Geometry`].
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// Input bytes, hex or JSON are not a well-formed geometry encoding.
    #[error("Geometry decoding error: {message}")]
    Decoding {
        /// Description of what went wrong.
        message: String,
    },

    /// Input decoded but describes a shape the catalog cannot hold.
    #[error("Geometry validation error: {message}")]
    Validation {
        /// Description of what went wrong.
        message: String,
    },

    /// The shape could not be serialized.
    #[error("Geometry encoding error: {message}")]
    Encoding {
        /// Description of what went wrong.
        message: String,
    },
}

/// Encoded geometry input accepted by [`Geometry::decode`].
///
/// The variant is picked from the input type: byte slices are raw WKB,
/// strings are hex-encoded WKB, and `None` of either is an absent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedGeometry<'a> {
    Binary(&'a [u8]),
    Hex(&'a str),
    Absent,
}

impl<'a> From<&'a [u8]> for EncodedGeometry<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self::Binary(value)
    }
}

impl<'a> From<&'a Vec<u8>> for EncodedGeometry<'a> {
    fn from(value: &'a Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl<'a> From<&'a str> for EncodedGeometry<'a> {
    fn from(value: &'a str) -> Self {
        Self::Hex(value)
    }
}

impl<'a> From<&'a String> for EncodedGeometry<'a> {
    fn from(value: &'a String) -> Self {
        Self::Hex(value)
    }
}

impl<'a> From<Option<&'a [u8]>> for EncodedGeometry<'a> {
    fn from(value: Option<&'a [u8]>) -> Self {
        value.map_or(Self::Absent, Self::Binary)
    }
}

impl<'a> From<Option<&'a str>> for EncodedGeometry<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(Self::Absent, Self::Hex)
    }
}

/// An immutable spatial shape (point, line, polygon or their multi forms).
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    shape: Shape,
}

impl Geometry {
    /// Wraps a shape. Absent in, absent out; no validation is performed.
    #[must_use]
    pub fn from_shape(shape: Option<Shape>) -> Option<Self> {
        shape.map(|shape| Self { shape })
    }

    /// Builds a point geometry from longitude/latitude.
    #[must_use]
    pub fn point(lng: f64, lat: f64) -> Self {
        Self {
            shape: Shape::Point(Point::new(lng, lat)),
        }
    }

    /// Borrows the underlying shape.
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Consumes the geometry and returns the underlying shape.
    #[must_use]
    pub fn into_shape(self) -> Shape {
        self.shape
    }

    /// Returns the point if this geometry is a single point.
    #[must_use]
    pub const fn as_point(&self) -> Option<&Point<f64>> {
        match &self.shape {
            Shape::Point(p) => Some(p),
            _ => None,
        }
    }

    /// Decodes WKB bytes or hex-encoded WKB.
    ///
    /// Returns `Ok(None)` for [`EncodedGeometry::Absent`].
    ///
    /// # Errors
    ///
    /// * [`GeometryError::Decoding`] if the hex or WKB is malformed or has
    ///   trailing bytes.
    /// * [`GeometryError::Validation`] if the WKB describes an unsupported
    ///   shape kind or contains non-finite coordinates.
    pub fn decode<'a>(input: impl Into<EncodedGeometry<'a>>) -> Result<Option<Self>, GeometryError> {
        let bytes = match input.into() {
            EncodedGeometry::Absent => return Ok(None),
            EncodedGeometry::Binary(bytes) => std::borrow::Cow::Borrowed(bytes),
            EncodedGeometry::Hex(text) => {
                std::borrow::Cow::Owned(hex::decode(text.trim()).map_err(|e| {
                    GeometryError::Decoding {
                        message: format!("invalid hex: {e}"),
                    }
                })?)
            }
        };

        let mut reader: &[u8] = &bytes;
        let geometry = wkb::wkb_to_geom(&mut reader).map_err(|e| GeometryError::Decoding {
            message: format!("invalid WKB: {e:?}"),
        })?;

        if !reader.is_empty() {
            return Err(GeometryError::Decoding {
                message: format!("{} trailing bytes after WKB geometry", reader.len()),
            });
        }

        Self::from_geo(geometry).map(Some)
    }

    /// Like [`Self::decode`], but additionally requires the shape to be
    /// topologically valid (closed, non-self-intersecting rings, holes inside
    /// their shell, ...).
    ///
    /// # Errors
    ///
    /// Everything [`Self::decode`] returns, plus [`GeometryError::Validation`]
    /// for shapes that fail the validity check.
    pub fn decode_validated<'a>(
        input: impl Into<EncodedGeometry<'a>>,
    ) -> Result<Option<Self>, GeometryError> {
        let Some(geometry) = Self::decode(input)? else {
            return Ok(None);
        };

        geometry.validate()?;
        Ok(Some(geometry))
    }

    /// Checks topological validity of the shape.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Validation`] if the shape is not valid.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.shape.to_geo().is_valid() {
            Ok(())
        } else {
            Err(GeometryError::Validation {
                message: format!("{} is not topologically valid", self.shape.kind()),
            })
        }
    }

    /// Encodes the shape as little-endian 2D WKB.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Encoding`] if the WKB writer rejects the shape.
    pub fn encode(&self) -> Result<Vec<u8>, GeometryError> {
        wkb::geom_to_wkb(&self.shape.to_geo()).map_err(|e| GeometryError::Encoding {
            message: format!("cannot write {} as WKB: {e:?}", self.shape.kind()),
        })
    }

    /// Encodes the shape as lower-case hex WKB.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Encoding`] if the WKB writer rejects the shape.
    pub fn encode_hex(&self) -> Result<String, GeometryError> {
        self.encode().map(hex::encode)
    }

    /// Serializes the shape as a `GeoJSON` geometry object.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Encoding`] if serialization fails.
    pub fn to_json(&self) -> Result<String, GeometryError> {
        serde_json::to_string(&self.to_geojson()).map_err(|e| GeometryError::Encoding {
            message: format!("cannot write {} as GeoJSON: {e}", self.shape.kind()),
        })
    }

    /// Parses a `GeoJSON` geometry object.
    ///
    /// `None`, blank input and the JSON literal `null` all yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// * [`GeometryError::Decoding`] if the text is not a `GeoJSON` geometry.
    /// * [`GeometryError::Validation`] if the geometry kind is unsupported.
    pub fn from_json(input: Option<&str>) -> Result<Option<Self>, GeometryError> {
        let Some(text) = input.map(str::trim) else {
            return Ok(None);
        };

        if text.is_empty() || text == "null" {
            return Ok(None);
        }

        let parsed: geojson::GeoJson = text.parse().map_err(|e| GeometryError::Decoding {
            message: format!("invalid GeoJSON: {e}"),
        })?;

        match parsed {
            geojson::GeoJson::Geometry(geometry) => Self::from_geojson(geometry).map(Some),
            geojson::GeoJson::Feature(_) | geojson::GeoJson::FeatureCollection(_) => {
                Err(GeometryError::Decoding {
                    message: "expected a GeoJSON geometry object, found a feature".to_string(),
                })
            }
        }
    }

    /// Converts a parsed `GeoJSON` geometry into a [`Geometry`].
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Validation`] if the geometry kind is
    /// unsupported or has non-finite coordinates.
    pub fn from_geojson(geometry: geojson::Geometry) -> Result<Self, GeometryError> {
        let geo_geometry: geo::Geometry<f64> =
            geometry.try_into().map_err(|e: geojson::Error| GeometryError::Validation {
                message: format!("unsupported GeoJSON geometry: {e}"),
            })?;
        Self::from_geo(geo_geometry)
    }

    /// Converts the shape into a `GeoJSON` geometry object.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Geometry {
        geojson::Geometry::new(geojson::Value::from(&self.shape.to_geo()))
    }

    /// Computes the centroid of the shape.
    ///
    /// Returns `None` for empty shapes.
    #[must_use]
    pub fn centroid(&self) -> Option<Self> {
        self.shape.to_geo().centroid().map(|p| Self {
            shape: Shape::Point(p),
        })
    }

    fn from_geo(geometry: geo::Geometry<f64>) -> Result<Self, GeometryError> {
        let shape = Shape::try_from(geometry)?;
        if !shape.is_finite() {
            return Err(GeometryError::Validation {
                message: format!("{} contains non-finite coordinates", shape.kind()),
            });
        }
        Ok(Self { shape })
    }
}

impl Serialize for Geometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_geojson().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Geometry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let geometry = geojson::Geometry::deserialize(deserializer)?;
        Self::from_geojson(geometry).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, line_string, polygon};

    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> geo::Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]
    }

    fn samples() -> Vec<Geometry> {
        let holed = geo::Polygon::new(
            square(0.0, 0.0, 10.0).exterior().clone(),
            vec![square(2.0, 2.0, 1.0).exterior().clone()],
        );

        vec![
            Geometry::point(-81.694_360_1, 41.499_320_5),
            Geometry::from_shape(Some(Shape::LineString(line_string![
                (x: 0.1, y: 0.2),
                (x: 1.0 / 3.0, y: 2.0 / 3.0),
            ])))
            .unwrap(),
            Geometry::from_shape(Some(Shape::Polygon(holed))).unwrap(),
            Geometry::from_shape(Some(Shape::MultiPoint(
                vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)].into(),
            )))
            .unwrap(),
            Geometry::from_shape(Some(Shape::MultiLineString(geo::MultiLineString::new(
                vec![
                    LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
                    LineString::from(vec![(2.0, 2.0), (3.0, 5.0)]),
                ],
            ))))
            .unwrap(),
            Geometry::from_shape(Some(Shape::MultiPolygon(MultiPolygon::new(vec![
                square(-84.82, 38.40, 0.5),
                square(-80.5, 41.0, 0.25),
            ]))))
            .unwrap(),
        ]
    }

    #[test]
    fn wkb_roundtrip_is_exact_for_every_kind() {
        for geometry in samples() {
            let bytes = geometry.encode().unwrap();
            let decoded = Geometry::decode(bytes.as_slice()).unwrap();
            assert_eq!(decoded.as_ref(), Some(&geometry), "kind {}", geometry.shape().kind());
        }
    }

    #[test]
    fn hex_input_is_detected_from_str() {
        for geometry in samples() {
            let text = geometry.encode_hex().unwrap();
            assert_eq!(Geometry::decode(text.as_str()).unwrap(), Some(geometry.clone()));
            let upper = text.to_uppercase();
            assert_eq!(Geometry::decode(&upper).unwrap(), Some(geometry));
        }
    }

    #[test]
    fn geojson_roundtrip_is_exact_for_every_kind() {
        for geometry in samples() {
            let json = geometry.to_json().unwrap();
            let decoded = Geometry::from_json(Some(&json)).unwrap();
            assert_eq!(decoded.as_ref(), Some(&geometry), "json {json}");
        }
    }

    #[test]
    fn cross_encoding_roundtrip() {
        for geometry in samples() {
            let via_json = Geometry::from_json(Some(&geometry.to_json().unwrap()))
                .unwrap()
                .unwrap();
            let via_wkb = Geometry::decode(via_json.encode().unwrap().as_slice())
                .unwrap()
                .unwrap();
            assert_eq!(via_wkb, geometry);
        }
    }

    #[test]
    fn absent_stays_absent() {
        assert!(Geometry::from_shape(None).is_none());
        assert_eq!(Geometry::decode(None::<&[u8]>).unwrap(), None);
        assert_eq!(Geometry::decode(None::<&str>).unwrap(), None);
        assert_eq!(Geometry::from_json(None).unwrap(), None);
        assert_eq!(Geometry::from_json(Some("null")).unwrap(), None);
        assert_eq!(Geometry::from_json(Some("  ")).unwrap(), None);

        let parsed: Option<Geometry> = serde_json::from_str("null").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn malformed_wkb_is_a_decoding_error() {
        let err = Geometry::decode([0x01_u8, 0xff, 0x00].as_slice()).unwrap_err();
        assert!(matches!(err, GeometryError::Decoding { .. }), "{err}");

        let err = Geometry::decode("not hex at all").unwrap_err();
        assert!(matches!(err, GeometryError::Decoding { .. }), "{err}");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = Geometry::point(1.0, 2.0).encode().unwrap();
        bytes.push(0);
        let err = Geometry::decode(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, GeometryError::Decoding { .. }));
    }

    #[test]
    fn malformed_json_is_a_decoding_error() {
        let err = Geometry::from_json(Some("{\"type\": \"Polygon\"")).unwrap_err();
        assert!(matches!(err, GeometryError::Decoding { .. }), "{err}");

        let feature = r#"{"type":"Feature","properties":{},"geometry":null}"#;
        let err = Geometry::from_json(Some(feature)).unwrap_err();
        assert!(matches!(err, GeometryError::Decoding { .. }), "{err}");
    }

    #[test]
    fn self_intersecting_ring_fails_validated_decode() {
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ];
        let bytes = Geometry::from_shape(Some(Shape::Polygon(bowtie)))
            .unwrap()
            .encode()
            .unwrap();

        assert!(Geometry::decode(bytes.as_slice()).unwrap().is_some());
        let err = Geometry::decode_validated(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, GeometryError::Validation { .. }), "{err}");
    }

    #[test]
    fn centroid_of_square() {
        let geometry = Geometry::from_shape(Some(Shape::Polygon(square(0.0, 0.0, 2.0)))).unwrap();
        let center = geometry.centroid().unwrap();
        let point = center.as_point().unwrap();
        assert!((point.x() - 1.0).abs() < 1e-12);
        assert!((point.y() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn serde_uses_geojson_form() {
        let geometry = Geometry::point(-90.07, 29.95);
        let json = serde_json::to_value(&geometry).unwrap();
        assert_eq!(json["type"], "Point");
        let back: Geometry = serde_json::from_value(json).unwrap();
        assert_eq!(back, geometry);
    }
}
