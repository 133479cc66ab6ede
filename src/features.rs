use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{Feature, Geometry, Position, Properties};
use crate::error::DysonError;

/// Size and paged list-slicing over an ordered feature collection.
pub trait FeatureSource {
    fn category(&self) -> &str;
    fn size(&self) -> Result<usize, DysonError>;
    /// Up to `count` features starting at `offset`; shorter at the tail.
    fn slice(&self, offset: usize, count: usize) -> Result<Vec<Feature>, DysonError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub category: String,
    pub features: Vec<Feature>,
}

impl FeatureSource for FeatureCollection {
    fn category(&self) -> &str {
        &self.category
    }

    fn size(&self) -> Result<usize, DysonError> {
        Ok(self.features.len())
    }

    fn slice(&self, offset: usize, count: usize) -> Result<Vec<Feature>, DysonError> {
        Ok(self
            .features
            .iter()
            .skip(offset)
            .take(count)
            .cloned()
            .collect())
    }
}

/// Loads every `*.geojson` file in `dir` as one category, sorted by name.
pub fn load_collections(dir: &Path) -> Result<Vec<FeatureCollection>, DysonError> {
    let entries = fs::read_dir(dir).map_err(|err| DysonError::FeatureRead {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut collections = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| DysonError::Filesystem(err.to_string()))?
            .path();
        let is_geojson = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("geojson"))
            .unwrap_or(false);
        if !path.is_file() || !is_geojson {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let category = category_name(file_name);
        let content = fs::read_to_string(&path).map_err(|err| DysonError::FeatureRead {
            path: path.clone(),
            message: err.to_string(),
        })?;
        let collection =
            parse_feature_collection(&category, &content).map_err(|err| match err {
                DysonError::InvalidGeometry(message) => DysonError::FeatureRead {
                    path: path.clone(),
                    message,
                },
                other => other,
            })?;
        debug!(
            category = %collection.category,
            features = collection.features.len(),
            "loaded feature collection"
        );
        collections.push(collection);
    }
    collections.sort_by(|a, b| a.category.cmp(&b.category));
    Ok(collections)
}

/// `"Cobalt Mines.geojson"` becomes `"Cobalt_Mines"`.
pub fn category_name(file_name: &str) -> String {
    let normalized = file_name.replace(' ', "_");
    normalized
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn parse_feature_collection(
    category: &str,
    content: &str,
) -> Result<FeatureCollection, DysonError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|err| DysonError::InvalidGeometry(format!("not valid JSON: {err}")))?;
    let raw_features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| DysonError::InvalidGeometry("missing features array".to_string()))?;

    let features = raw_features
        .iter()
        .map(|raw| {
            let geometry = raw
                .get("geometry")
                .ok_or_else(|| DysonError::InvalidGeometry("feature without geometry".to_string()))
                .and_then(normalize_geometry)?;
            let properties = normalize_properties(raw.get("properties"))?;
            Ok(Feature {
                geometry,
                properties,
            })
        })
        .collect::<Result<Vec<_>, DysonError>>()?;

    Ok(FeatureCollection {
        category: category.to_string(),
        features,
    })
}

/// Converts a GeoJSON geometry object, truncating every position to two
/// dimensions.
pub fn normalize_geometry(value: &Value) -> Result<Geometry, DysonError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DysonError::InvalidGeometry("geometry without type".to_string()))?;
    let coordinates = value
        .get("coordinates")
        .ok_or_else(|| DysonError::InvalidGeometry(format!("{kind} without coordinates")))?;

    match kind {
        "Point" => Ok(Geometry::Point(position(coordinates)?)),
        "LineString" => Ok(Geometry::LineString(positions(coordinates)?)),
        "Polygon" => {
            let rings = coordinates
                .as_array()
                .ok_or_else(|| DysonError::InvalidGeometry("polygon rings must be an array".to_string()))?
                .iter()
                .map(positions)
                .collect::<Result<Vec<_>, DysonError>>()?;
            if rings.is_empty() {
                return Err(DysonError::InvalidGeometry("polygon without rings".to_string()));
            }
            Ok(Geometry::Polygon(rings))
        }
        other => Err(DysonError::InvalidGeometry(format!(
            "unsupported geometry type {other}"
        ))),
    }
}

fn positions(value: &Value) -> Result<Vec<Position>, DysonError> {
    let items = value
        .as_array()
        .ok_or_else(|| DysonError::InvalidGeometry("expected an array of positions".to_string()))?;
    if items.is_empty() {
        return Err(DysonError::InvalidGeometry("empty position list".to_string()));
    }
    items.iter().map(position).collect()
}

fn position(value: &Value) -> Result<Position, DysonError> {
    let parts = value
        .as_array()
        .ok_or_else(|| DysonError::InvalidGeometry(format!("position is not an array: {value}")))?;
    let coordinate = |index: usize| {
        parts
            .get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| DysonError::InvalidGeometry(format!("position needs lng and lat: {value}")))
    };
    Ok([coordinate(0)?, coordinate(1)?])
}

fn normalize_properties(value: Option<&Value>) -> Result<Properties, DysonError> {
    let mut extra = match value {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(DysonError::InvalidGeometry(format!(
                "properties must be an object, got {other}"
            )));
        }
    };

    let description = match extra.remove("description") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect(),
        Some(other) => vec![other.to_string()],
    };

    Ok(Properties { description, extra })
}
