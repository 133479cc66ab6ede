use std::fs;

use assert_matches::assert_matches;
use serde_json::json;

use dyson::domain::Geometry;
use dyson::error::DysonError;
use dyson::features::{
    FeatureSource, load_collections, normalize_geometry, parse_feature_collection,
};

#[test]
fn three_dimensional_point_is_truncated() {
    let geometry = normalize_geometry(&json!({
        "type": "Point",
        "coordinates": [27.4826, -10.7145, 1320.0]
    }))
    .unwrap();
    assert_eq!(geometry, Geometry::Point([27.4826, -10.7145]));
}

#[test]
fn two_dimensional_point_is_unchanged() {
    let geometry = normalize_geometry(&json!({
        "type": "Point",
        "coordinates": [27.4826, -10.7145]
    }))
    .unwrap();
    assert_eq!(geometry, Geometry::Point([27.4826, -10.7145]));
}

#[test]
fn polygon_positions_are_truncated() {
    let geometry = normalize_geometry(&json!({
        "type": "Polygon",
        "coordinates": [[[0.0, 0.0, 5.0], [1.0, 0.0, 5.0], [1.0, 1.0, 5.0], [0.0, 0.0, 5.0]]]
    }))
    .unwrap();
    assert_eq!(
        geometry,
        Geometry::Polygon(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]])
    );
}

#[test]
fn one_dimensional_position_is_rejected() {
    let err = normalize_geometry(&json!({"type": "Point", "coordinates": [27.0]})).unwrap_err();
    assert_matches!(err, DysonError::InvalidGeometry(_));
}

#[test]
fn unsupported_geometry_is_rejected() {
    let err = normalize_geometry(&json!({
        "type": "GeometryCollection",
        "coordinates": []
    }))
    .unwrap_err();
    assert_matches!(err, DysonError::InvalidGeometry(message) if message.contains("GeometryCollection"));
}

#[test]
fn description_becomes_line_list() {
    let collection = parse_feature_collection(
        "mines",
        &json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [1.0, 2.0, 0.0]},
                    "properties": {"name": "Kasulo", "description": "artisanal\nactive since 2017\n"}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [3.0, 4.0]},
                    "properties": {"description": ["a", "b"]}
                },
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [5.0, 6.0]},
                    "properties": null
                }
            ]
        })
        .to_string(),
    )
    .unwrap();

    assert_eq!(collection.size().unwrap(), 3);
    let features = collection.slice(0, 3).unwrap();
    assert_eq!(
        features[0].properties.description,
        vec!["artisanal", "active since 2017"]
    );
    assert_eq!(features[0].properties.extra["name"], "Kasulo");
    assert_eq!(features[1].properties.description, vec!["a", "b"]);
    assert!(features[2].properties.description.is_empty());
}

#[test]
fn loads_each_geojson_file_as_a_category() {
    let temp = tempfile::tempdir().unwrap();
    let point = |lng: f64| {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [lng, -10.0, 0.0]},
                "properties": {"description": "site"}
            }]
        })
        .to_string()
    };
    fs::write(temp.path().join("Processing Plants.geojson"), point(1.0)).unwrap();
    fs::write(temp.path().join("Artisanal Mines.geojson"), point(2.0)).unwrap();
    fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

    let collections = load_collections(temp.path()).unwrap();
    let categories = collections
        .iter()
        .map(|collection| collection.category.as_str())
        .collect::<Vec<_>>();
    assert_eq!(categories, vec!["Artisanal_Mines", "Processing_Plants"]);
    assert_eq!(
        collections[0].features[0].geometry,
        Geometry::Point([2.0, -10.0])
    );
}

#[test]
fn malformed_file_names_its_path() {
    let temp = tempfile::tempdir().unwrap();
    fs::write(temp.path().join("broken.geojson"), "{\"features\": 3}").unwrap();
    let err = load_collections(temp.path()).unwrap_err();
    assert_matches!(err, DysonError::FeatureRead { path, .. } if path.ends_with("broken.geojson"));
}
