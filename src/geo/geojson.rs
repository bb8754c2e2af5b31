use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimal GeoJSON model: enough to filter a line layer by attribute
/// and walk its vertices. Geometry coordinates stay opaque JSON so
/// every geometry type round-trips untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
}

impl FeatureCollection {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_slice(bytes)?;
        if collection.kind != "FeatureCollection" {
            return Err(EtlError::processing(format!(
                "Expected a FeatureCollection, got '{}'",
                collection.kind
            )));
        }
        Ok(collection)
    }

    pub fn to_vec_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

impl Feature {
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// All (lon, lat) vertices of the geometry, whatever its type.
    pub fn vertices(&self) -> Vec<(f64, f64)> {
        let mut out = Vec::new();
        if let Some(geometry) = &self.geometry {
            collect_positions(&geometry.coordinates, &mut out);
        }
        out
    }
}

/// GeoJSON nests positions at varying depth by geometry type; a
/// position is any array starting with two numbers.
fn collect_positions(value: &Value, out: &mut Vec<(f64, f64)>) {
    if let Value::Array(items) = value {
        if items.len() >= 2 && items[0].is_number() && items[1].is_number() {
            if let (Some(lon), Some(lat)) = (items[0].as_f64(), items[1].as_f64()) {
                out.push((lon, lat));
            }
        } else {
            for item in items {
                collect_positions(item, out);
            }
        }
    }
}

/// Axis-aligned box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// From a `[min_lon, min_lat, max_lon, max_lat]` config array.
    pub fn from_corners(corners: [f64; 4]) -> Self {
        Self {
            min_lon: corners[0],
            min_lat: corners[1],
            max_lon: corners[2],
            max_lat: corners[3],
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// A feature touches the box when any of its vertices falls inside.
    pub fn touches(&self, feature: &Feature) -> bool {
        feature
            .vertices()
            .iter()
            .any(|(lon, lat)| self.contains(*lon, *lat))
    }

    /// Smallest box enclosing the given positions.
    pub fn enclosing(positions: &[(f64, f64)]) -> Option<Self> {
        let first = positions.first()?;
        let mut bbox = Self {
            min_lon: first.0,
            min_lat: first.1,
            max_lon: first.0,
            max_lat: first.1,
        };
        for (lon, lat) in positions.iter().skip(1) {
            bbox.min_lon = bbox.min_lon.min(*lon);
            bbox.min_lat = bbox.min_lat.min(*lat);
            bbox.max_lon = bbox.max_lon.max(*lon);
            bbox.max_lat = bbox.max_lat.max(*lat);
        }
        Some(bbox)
    }

    pub fn as_corners(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}
