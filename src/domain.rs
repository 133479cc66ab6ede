use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DysonError;

static DOCID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"docid=([a-z0-9]+)").expect("docid pattern compiles"));

/// `[longitude, latitude]`. Elevation is dropped when features are loaded.
pub type Position = [f64; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
}

impl Geometry {
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) => "Polygon",
        }
    }

    /// The point a region window is centered on: the point itself, or the
    /// center of the bounding box of a line or a polygon's outer ring.
    pub fn representative_point(&self) -> Option<Position> {
        match self {
            Geometry::Point(point) => Some(*point),
            Geometry::LineString(line) => bbox_center(line),
            Geometry::Polygon(rings) => rings.first().and_then(|ring| bbox_center(ring)),
        }
    }
}

fn bbox_center(positions: &[Position]) -> Option<Position> {
    let first = positions.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first[0], first[1], first[0], first[1]);
    for [x, y] in positions.iter().skip(1) {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }
    Some([(min_x + max_x) / 2.0, (min_y + max_y) / 2.0])
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
}

/// Identifier the engine embeds in every download url. It names the archive's
/// band files, the record directory, the composite and the manifest key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn from_download_url(url: &str) -> Result<Self, DysonError> {
        DOCID_RE
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| DysonError::MissingDocumentId(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn image_name(&self) -> String {
        format!("{}.png", self.0)
    }

    pub fn band_file_name(&self, band: &str) -> String {
        format!("{}.vis-{band}.tif", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = DysonError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let is_valid = !value.is_empty()
            && value
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit());
        if !is_valid {
            return Err(DysonError::MissingDocumentId(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

/// Square window around a feature's representative point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RegionWindow {
    corners: [Position; 4],
}

impl RegionWindow {
    pub fn around(center: Position, radius: f64) -> Self {
        let [x, y] = center;
        Self {
            corners: [
                [x + radius, y + radius],
                [x + radius, y - radius],
                [x - radius, y - radius],
                [x - radius, y + radius],
            ],
        }
    }

    pub fn corners(&self) -> &[Position; 4] {
        &self.corners
    }
}
