//! GeoJSON feature conversion.

use crate::source::DataRecord;
use serde_json::{json, Map, Value};

/// Converts a record into a GeoJSON feature.
///
/// Located records get a Point geometry; unlocated ones a null geometry.
/// The record's attributes become the feature properties, with `id` and
/// `name` always present.
pub fn feature_for(record: &DataRecord) -> Value {
    let geometry = match record.location {
        Some(location) => json!({
            "type": "Point",
            "coordinates": [location.lon, location.lat],
        }),
        None => Value::Null,
    };

    let mut properties = match &record.attributes {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    properties.insert("id".to_string(), Value::String(record.id.clone()));
    properties.insert("name".to_string(), Value::String(record.name.clone()));

    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": Value::Object(properties),
    })
}

/// Serializes one batch of features into a text fragment.
///
/// `first` controls the leading comma: the very first feature of the
/// document must not be preceded by one, every later fragment is.
pub fn fragment(features: &[Value], first: bool) -> String {
    let mut out = String::new();
    for (i, feature) in features.iter().enumerate() {
        if !first || i > 0 {
            out.push(',');
        }
        out.push_str(&feature.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Location;
    use serde_json::json;

    fn located() -> DataRecord {
        DataRecord {
            id: "a".to_string(),
            name: "Well A".to_string(),
            attributes: json!({"depth_m": 120}),
            location: Some(Location { lon: -120.5, lat: 47.1 }),
        }
    }

    fn unlocated() -> DataRecord {
        DataRecord {
            id: "b".to_string(),
            name: "Well B".to_string(),
            attributes: json!({}),
            location: None,
        }
    }

    #[test]
    fn test_located_feature_has_point_geometry() {
        let feature = feature_for(&located());
        assert_eq!(feature["type"], "Feature");
        assert_eq!(feature["geometry"]["type"], "Point");
        assert_eq!(feature["geometry"]["coordinates"], json!([-120.5, 47.1]));
        assert_eq!(feature["properties"]["id"], "a");
        assert_eq!(feature["properties"]["depth_m"], 120);
    }

    #[test]
    fn test_unlocated_feature_has_null_geometry() {
        let feature = feature_for(&unlocated());
        assert!(feature["geometry"].is_null());
        assert_eq!(feature["properties"]["name"], "Well B");
    }

    #[test]
    fn test_fragment_comma_placement() {
        let features = vec![json!({"n": 1}), json!({"n": 2})];
        assert_eq!(fragment(&features, true), "{\"n\":1},{\"n\":2}");
        assert_eq!(fragment(&features, false), ",{\"n\":1},{\"n\":2}");
        assert_eq!(fragment(&[], true), "");
    }
}
