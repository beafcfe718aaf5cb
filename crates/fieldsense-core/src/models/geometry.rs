//! Canonical geometry types used across all fieldsense crates.
//!
//! `Geometry` maps one-to-one onto GeoJSON geometry objects. `AreaOfInterest`
//! wraps a validated polygonal geometry and is the spatial scope of every
//! raster operation.

use serde::{Deserialize, Serialize};

use crate::error::{FieldsenseError, Result};

/// Geometry type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GeometryType {
    #[default]
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

/// GeoJSON-compatible geometry representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: [f64; 2],
    },
    LineString {
        coordinates: Vec<[f64; 2]>,
    },
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPoint {
        coordinates: Vec<[f64; 2]>,
    },
    MultiLineString {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl Geometry {
    /// Create a Polygon geometry
    pub fn polygon(rings: Vec<Vec<[f64; 2]>>) -> Self {
        Geometry::Polygon { coordinates: rings }
    }

    /// Axis-aligned rectangle as a closed polygon
    pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Geometry::polygon(vec![vec![
            [min_lon, min_lat],
            [max_lon, min_lat],
            [max_lon, max_lat],
            [min_lon, max_lat],
            [min_lon, min_lat],
        ]])
    }

    /// Get the geometry type
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point { .. } => GeometryType::Point,
            Geometry::LineString { .. } => GeometryType::LineString,
            Geometry::Polygon { .. } => GeometryType::Polygon,
            Geometry::MultiPoint { .. } => GeometryType::MultiPoint,
            Geometry::MultiLineString { .. } => GeometryType::MultiLineString,
            Geometry::MultiPolygon { .. } => GeometryType::MultiPolygon,
        }
    }

    /// Parse a GeoJSON value. Accepts a bare geometry or a Feature carrying one.
    pub fn from_geojson(value: &serde_json::Value) -> Result<Self> {
        let parsed = geojson::GeoJson::from_json_value(value.clone())
            .map_err(|e| FieldsenseError::InvalidGeometry { reason: e.to_string() })?;

        let geometry = match parsed {
            geojson::GeoJson::Geometry(geometry) => geometry,
            geojson::GeoJson::Feature(feature) => {
                feature.geometry.ok_or_else(|| FieldsenseError::InvalidGeometry {
                    reason: "feature has no geometry".to_string(),
                })?
            }
            geojson::GeoJson::FeatureCollection(mut collection) => {
                if collection.features.len() != 1 {
                    return Err(FieldsenseError::InvalidGeometry {
                        reason: format!(
                            "expected exactly one feature, found {}",
                            collection.features.len()
                        ),
                    });
                }
                collection.features.remove(0).geometry.ok_or_else(|| {
                    FieldsenseError::InvalidGeometry {
                        reason: "feature has no geometry".to_string(),
                    }
                })?
            }
        };

        Self::try_from(geometry.value)
    }

    /// Convert to serde_json::Value (GeoJSON)
    pub fn to_geojson(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn rings(&self) -> Vec<&Vec<[f64; 2]>> {
        match self {
            Geometry::Polygon { coordinates } => coordinates.iter().collect(),
            Geometry::MultiPolygon { coordinates } => coordinates.iter().flatten().collect(),
            _ => Vec::new(),
        }
    }
}

fn position(pos: &[f64]) -> Result<[f64; 2]> {
    match pos {
        [x, y, ..] => Ok([*x, *y]),
        _ => Err(FieldsenseError::InvalidGeometry {
            reason: format!("position must have at least 2 values, found {}", pos.len()),
        }),
    }
}

fn ring(positions: &[Vec<f64>]) -> Result<Vec<[f64; 2]>> {
    positions.iter().map(|p| position(p)).collect()
}

impl TryFrom<geojson::Value> for Geometry {
    type Error = FieldsenseError;

    fn try_from(value: geojson::Value) -> Result<Self> {
        match value {
            geojson::Value::Point(p) => Ok(Geometry::Point { coordinates: position(&p)? }),
            geojson::Value::MultiPoint(points) => Ok(Geometry::MultiPoint {
                coordinates: points.iter().map(|p| position(p)).collect::<Result<_>>()?,
            }),
            geojson::Value::LineString(line) => {
                Ok(Geometry::LineString { coordinates: ring(&line)? })
            }
            geojson::Value::MultiLineString(lines) => Ok(Geometry::MultiLineString {
                coordinates: lines.iter().map(|l| ring(l)).collect::<Result<_>>()?,
            }),
            geojson::Value::Polygon(rings) => Ok(Geometry::Polygon {
                coordinates: rings.iter().map(|r| ring(r)).collect::<Result<_>>()?,
            }),
            geojson::Value::MultiPolygon(polygons) => Ok(Geometry::MultiPolygon {
                coordinates: polygons
                    .iter()
                    .map(|rings| rings.iter().map(|r| ring(r)).collect::<Result<Vec<_>>>())
                    .collect::<Result<_>>()?,
            }),
            geojson::Value::GeometryCollection(_) => Err(FieldsenseError::InvalidGeometry {
                reason: "geometry collections are not supported".to_string(),
            }),
        }
    }
}

/// Longitude/latitude bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }
}

/// The polygonal area a single analysis is scoped to.
///
/// Only Polygon and MultiPolygon geometries in WGS 84 are accepted. The
/// geometry is validated on construction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Geometry", into = "Geometry")]
pub struct AreaOfInterest {
    geometry: Geometry,
    bbox: BoundingBox,
}

impl AreaOfInterest {
    pub fn new(geometry: Geometry) -> Result<Self> {
        match geometry.geometry_type() {
            GeometryType::Polygon | GeometryType::MultiPolygon => {}
            other => {
                return Err(FieldsenseError::InvalidGeometry {
                    reason: format!("expected Polygon or MultiPolygon, found {:?}", other),
                })
            }
        }

        let rings = geometry.rings();
        if rings.is_empty() {
            return Err(FieldsenseError::InvalidGeometry {
                reason: "geometry has no rings".to_string(),
            });
        }

        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        };

        for (i, ring) in rings.iter().enumerate() {
            if ring.len() < 4 {
                return Err(FieldsenseError::InvalidGeometry {
                    reason: format!("ring {} must have at least 4 positions, found {}", i, ring.len()),
                });
            }
            if ring.first() != ring.last() {
                return Err(FieldsenseError::InvalidGeometry {
                    reason: format!("ring {} is not closed", i),
                });
            }
            for [lon, lat] in ring.iter() {
                if !lon.is_finite() || !lat.is_finite() {
                    return Err(FieldsenseError::InvalidGeometry {
                        reason: "coordinates must be finite".to_string(),
                    });
                }
                if !(-180.0..=180.0).contains(lon) || !(-90.0..=90.0).contains(lat) {
                    return Err(FieldsenseError::InvalidGeometry {
                        reason: format!("coordinate ({}, {}) is outside WGS 84 bounds", lon, lat),
                    });
                }
                bbox.min_lon = bbox.min_lon.min(*lon);
                bbox.min_lat = bbox.min_lat.min(*lat);
                bbox.max_lon = bbox.max_lon.max(*lon);
                bbox.max_lat = bbox.max_lat.max(*lat);
            }
        }

        Ok(Self { geometry, bbox })
    }

    /// Parse and validate a GeoJSON geometry or feature
    pub fn from_geojson(value: &serde_json::Value) -> Result<Self> {
        Self::new(Geometry::from_geojson(value)?)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
}

impl TryFrom<Geometry> for AreaOfInterest {
    type Error = FieldsenseError;

    fn try_from(geometry: Geometry) -> Result<Self> {
        Self::new(geometry)
    }
}

impl From<AreaOfInterest> for Geometry {
    fn from(aoi: AreaOfInterest) -> Self {
        aoi.geometry
    }
}
