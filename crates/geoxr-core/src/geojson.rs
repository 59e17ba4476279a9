//! Lenient GeoJSON decoding.
//!
//! Only the parts of GeoJSON the scene renders are decoded: `Polygon`,
//! `MultiPolygon`, `Point` and `LineString` geometries plus an optional
//! numeric `height` property. A document without `features` is an empty
//! collection. Each feature is decoded on its own, so a feature with a missing
//! or unrecognized geometry, or malformed coordinates, is skipped without
//! affecting the rest of the file.

use glam::DVec2;
use serde::Deserialize;
use serde_json::Value;

use crate::error::GeoJsonError;

/// A single `(x, y)` position. Extra elements (altitude) are ignored.
pub type Position = DVec2;

/// A closed or open sequence of positions.
pub type Ring = Vec<Position>;

/// Geometry of a renderable feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Outer ring followed by any holes.
    Polygon(Vec<Ring>),
    /// One ring list per polygon.
    MultiPolygon(Vec<Vec<Ring>>),
    Point(Position),
    LineString(Vec<Position>),
}

impl Geometry {
    /// The GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
        }
    }
}

/// Feature properties the scene reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    /// The `height` property, if it is a number.
    pub height: Option<f64>,
}

impl Properties {
    /// The height if it is usable (finite and non-zero), else `default`.
    ///
    /// Negative heights are kept: points sit below ground and polygons are
    /// extruded downwards.
    pub fn height_or(&self, default: f64) -> f64 {
        self.height
            .filter(|h| h.is_finite() && *h != 0.0)
            .unwrap_or(default)
    }
}

/// A decoded feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
}

/// The renderable features of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    /// Number of features that were dropped as malformed or unsupported.
    pub skipped: usize,
}

impl FeatureCollection {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    features: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

/// Parse a GeoJSON document.
///
/// Fails only when the text is not a JSON object. Features are decoded
/// individually; see [`decode_feature`].
pub fn parse_document(text: &str) -> Result<FeatureCollection, GeoJsonError> {
    let root: Value = serde_json::from_str(text)?;
    if !root.is_object() {
        return Err(GeoJsonError::ParseFailure {
            message: "document root is not an object".to_string(),
        });
    }

    // A non-array `features` is treated like a missing one.
    let raw = RawDocument::deserialize(&root).unwrap_or(RawDocument { features: None });

    let mut collection = FeatureCollection::default();
    for value in raw.features.unwrap_or_default() {
        match decode_feature(&value) {
            Some(feature) => collection.features.push(feature),
            None => collection.skipped += 1,
        }
    }

    if collection.skipped > 0 {
        tracing::debug!(
            kept = collection.features.len(),
            skipped = collection.skipped,
            "skipped unrenderable GeoJSON features"
        );
    }

    Ok(collection)
}

/// Decode one feature object, or `None` if it has nothing renderable.
pub fn decode_feature(value: &Value) -> Option<Feature> {
    let raw = RawFeature::deserialize(value).ok()?;
    let geometry = decode_geometry(raw.geometry?)?;
    let height = raw
        .properties
        .as_ref()
        .and_then(|props| props.get("height"))
        .and_then(Value::as_f64);

    Some(Feature {
        geometry,
        properties: Properties { height },
    })
}

fn decode_geometry(raw: RawGeometry) -> Option<Geometry> {
    let coordinates = &raw.coordinates;
    match raw.kind.as_str() {
        "Polygon" => decode_rings(coordinates).map(Geometry::Polygon),
        "MultiPolygon" => coordinates
            .as_array()?
            .iter()
            .map(decode_rings)
            .collect::<Option<Vec<_>>>()
            .map(Geometry::MultiPolygon),
        "Point" => decode_position(coordinates).map(Geometry::Point),
        "LineString" => decode_positions(coordinates).map(Geometry::LineString),
        other => {
            tracing::trace!(kind = other, "unsupported geometry type");
            None
        }
    }
}

fn decode_rings(value: &Value) -> Option<Vec<Ring>> {
    value.as_array()?.iter().map(decode_positions).collect()
}

fn decode_positions(value: &Value) -> Option<Vec<Position>> {
    value.as_array()?.iter().map(decode_position).collect()
}

fn decode_position(value: &Value) -> Option<Position> {
    match value.as_array()?.as_slice() {
        [x, y, ..] => {
            let position = DVec2::new(x.as_f64()?, y.as_f64()?);
            position.is_finite().then_some(position)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_polygon_with_height() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"height": 12.5, "name": "block"},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[4,4],[0,0]]]}
            }]
        }"#;

        let collection = parse_document(doc).unwrap();
        assert_eq!(collection.features.len(), 1);
        assert_eq!(collection.skipped, 0);

        let feature = &collection.features[0];
        assert_eq!(feature.properties.height, Some(12.5));
        let Geometry::Polygon(rings) = &feature.geometry else {
            panic!("expected polygon, got {:?}", feature.geometry);
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0][1], DVec2::new(4.0, 0.0));
    }

    #[test]
    fn test_missing_features_is_empty() {
        let collection = parse_document(r#"{"type": "FeatureCollection"}"#).unwrap();
        assert!(collection.is_empty());
        assert_eq!(collection.skipped, 0);

        let collection = parse_document(r#"{"features": []}"#).unwrap();
        assert!(collection.is_empty());

        let collection = parse_document(r#"{"features": 3}"#).unwrap();
        assert!(collection.is_empty());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(
            parse_document("not json"),
            Err(GeoJsonError::ParseFailure { .. })
        ));
        assert!(matches!(
            parse_document("[1, 2]"),
            Err(GeoJsonError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_bad_features_are_skipped() {
        let doc = r#"{"features": [
            {"properties": {}},
            {"geometry": null},
            {"geometry": {"type": "MultiLineString", "coordinates": [[[0,0],[1,1]]]}},
            {"geometry": {"type": "Point", "coordinates": ["a", 1]}},
            {"geometry": {"type": "Point"}},
            "not a feature",
            {"geometry": {"type": "LineString", "coordinates": [[0,0],[1,1,7]]}}
        ]}"#;

        let collection = parse_document(doc).unwrap();
        assert_eq!(collection.features.len(), 1);
        assert_eq!(collection.skipped, 6);
        assert_eq!(
            collection.features[0].geometry,
            Geometry::LineString(vec![DVec2::ZERO, DVec2::ONE])
        );
    }

    #[test]
    fn test_multipolygon() {
        let doc = r#"{"features": [{"geometry": {"type": "MultiPolygon", "coordinates": [
            [[[0,0],[1,0],[1,1],[0,0]]],
            [[[5,5],[6,5],[6,6],[5,5]], [[5.2,5.2],[5.4,5.2],[5.4,5.4],[5.2,5.2]]]
        ]}}]}"#;

        let collection = parse_document(doc).unwrap();
        let Geometry::MultiPolygon(polygons) = &collection.features[0].geometry else {
            panic!("expected multipolygon");
        };
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[1].len(), 2);
    }

    #[test]
    fn test_height_fallback() {
        let props = |height| Properties { height };
        assert_eq!(props(None).height_or(5.0), 5.0);
        assert_eq!(props(Some(0.0)).height_or(5.0), 5.0);
        assert_eq!(props(Some(-3.0)).height_or(5.0), -3.0);
        assert_eq!(props(Some(f64::NAN)).height_or(1.0), 1.0);
        assert_eq!(props(Some(f64::NEG_INFINITY)).height_or(1.0), 1.0);
        assert_eq!(props(Some(7.0)).height_or(5.0), 7.0);
    }

    #[test]
    fn test_non_numeric_height_is_ignored() {
        let value: Value = serde_json::from_str(
            r#"{"properties": {"height": "tall"}, "geometry": {"type": "Point", "coordinates": [1, 2]}}"#,
        )
        .unwrap();
        let feature = decode_feature(&value).unwrap();
        assert_eq!(feature.properties.height, None);
        assert_eq!(feature.geometry.type_name(), "Point");
    }
}
