//! Conversions from canonical geometries to `geo` types and the pixel
//! predicates built on them.

use fieldsense_core::models::{AreaOfInterest, BoundingBox, Geometry};
use geo::algorithm::contains::Contains;
use geo::algorithm::intersects::Intersects;
use geo::{Coord, LineString, MultiPolygon, Point, Polygon, Rect};

fn ring_to_line_string(ring: &[[f64; 2]]) -> LineString<f64> {
    LineString::new(ring.iter().map(|c| Coord { x: c[0], y: c[1] }).collect())
}

fn rings_to_polygon(rings: &[Vec<[f64; 2]>]) -> Polygon<f64> {
    match rings.split_first() {
        Some((exterior, interiors)) => Polygon::new(
            ring_to_line_string(exterior),
            interiors.iter().map(|r| ring_to_line_string(r)).collect(),
        ),
        None => Polygon::new(LineString::new(vec![]), vec![]),
    }
}

/// Convert an area of interest to a `geo::MultiPolygon`
pub fn to_multi_polygon(area: &AreaOfInterest) -> MultiPolygon<f64> {
    match area.geometry() {
        Geometry::Polygon { coordinates } => MultiPolygon::new(vec![rings_to_polygon(coordinates)]),
        Geometry::MultiPolygon { coordinates } => {
            MultiPolygon::new(coordinates.iter().map(|p| rings_to_polygon(p)).collect())
        }
        // AreaOfInterest only admits polygonal geometries
        _ => MultiPolygon::new(vec![]),
    }
}

/// Convert a bounding box to a `geo::Rect`
pub fn to_rect(bbox: &BoundingBox) -> Rect<f64> {
    Rect::new(
        Coord { x: bbox.min_lon, y: bbox.min_lat },
        Coord { x: bbox.max_lon, y: bbox.max_lat },
    )
}

/// Prepared area used for repeated point-in-polygon tests
pub struct AreaMask {
    shape: MultiPolygon<f64>,
    bbox: BoundingBox,
}

impl AreaMask {
    pub fn new(area: &AreaOfInterest) -> Self {
        Self { shape: to_multi_polygon(area), bbox: area.bounding_box() }
    }

    /// True when the point lies strictly inside the area
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lon < self.bbox.min_lon
            || lon > self.bbox.max_lon
            || lat < self.bbox.min_lat
            || lat > self.bbox.max_lat
        {
            return false;
        }
        self.shape.contains(&Point::new(lon, lat))
    }

    /// True when the area and the rectangle share any point
    pub fn intersects_rect(&self, rect: &BoundingBox) -> bool {
        self.bbox.intersects(rect) && self.shape.intersects(&to_rect(rect))
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
}
