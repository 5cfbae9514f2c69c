//! Warning-area geometry and distance computation
//!
//! Alert areas arrive on the wire as circles and polygons in WGS-84 degrees.
//! Polygon math happens in a local planar approximation: the vertex with the
//! smallest longitude becomes the plane origin, and every other point is
//! projected by its signed north/east great-circle distances to that origin.
//! The approximation holds for geographically small alert areas and degrades
//! for shapes spanning large latitude ranges. That is a documented property
//! of the warning-area encoding, not something to correct here.

use std::fmt;

/// Mean Earth radius, in meters
const EARTH_RADIUS_METERS: f64 = 6371.0 * 1000.0;

/// Squared segment length below which a polygon edge degenerates to a point
const SEGMENT_EPSILON: f64 = 1e-7;

/// A WGS-84 coordinate, in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// New coordinate from degrees latitude/longitude
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle (haversine) distance to `other`, in meters
    pub fn distance(&self, other: &LatLng) -> f64 {
        let dlat = (self.lat - other.lat).to_radians() / 2.0;
        let dlng = (self.lng - other.lng).to_radians() / 2.0;
        let a = dlat.sin() * dlat.sin()
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * dlng.sin()
                * dlng.sin();
        2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5},{:.5})", self.lat, self.lng)
    }
}

/// Circular alert area
#[derive(Clone, Debug, PartialEq)]
pub struct Circle {
    center: LatLng,
    radius_meters: f64,
}

impl Circle {
    /// New circle with the given center and radius in meters
    pub fn new(center: LatLng, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius_meters
    }

    /// Distance from `p` to the circle boundary, in meters
    ///
    /// Negative when `p` is inside the circle.
    pub fn distance(&self, p: &LatLng) -> f64 {
        self.center.distance(p) - self.radius_meters
    }

    pub fn contains(&self, p: &LatLng) -> bool {
        self.center.distance(p) <= self.radius_meters
    }
}

/// Polygonal alert area
///
/// Vertices are kept exactly as received: they are not deduplicated or
/// checked for self-intersection. Degenerate edges fall back to
/// point-distance rather than failing.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    vertices: Vec<LatLng>,
}

impl Polygon {
    /// New polygon from its vertices, in wire order
    pub fn new(vertices: Vec<LatLng>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    /// Minimum distance from `p` to any polygon edge, in meters
    pub fn distance(&self, p: &LatLng) -> f64 {
        if self.vertices.is_empty() {
            return f64::MAX;
        }
        let origin = self.origin();
        let projected: Vec<Point> = self
            .vertices
            .iter()
            .map(|v| project(v, &origin))
            .collect();
        let query = project(p, &origin);

        let mut best = f64::MAX;
        for i in 0..projected.len() {
            let a = &projected[i];
            let b = &projected[(i + 1) % projected.len()];
            best = f64::min(best, point_to_segment(&query, a, b));
        }
        best
    }

    /// Even-odd ray cast against the polygon edges in the local plane
    pub fn contains(&self, p: &LatLng) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        let origin = self.origin();
        let projected: Vec<Point> = self
            .vertices
            .iter()
            .map(|v| project(v, &origin))
            .collect();
        let q = project(p, &origin);

        let mut inside = false;
        let n = projected.len();
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (&projected[i], &projected[j]);
            if ((a.y > q.y) != (b.y > q.y))
                && q.x < (b.x - a.x) * (q.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    // reference vertex with minimum longitude, used as local-plane origin
    fn origin(&self) -> LatLng {
        let mut idx = 0;
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            if v.lng < self.vertices[idx].lng {
                idx = i;
            }
        }
        self.vertices[idx]
    }
}

/// An alert target area
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Circle(Circle),
    Polygon(Polygon),
}

impl Geometry {
    /// Is `p` inside the shape?
    pub fn contains(&self, p: &LatLng) -> bool {
        match self {
            Geometry::Circle(c) => c.contains(p),
            Geometry::Polygon(poly) => poly.contains(p),
        }
    }

    /// Shortest distance from `p` to the shape, in meters
    ///
    /// For circles the distance is to the boundary and is negative inside.
    /// For polygons the distance is to the nearest edge and is always
    /// non-negative; use [`contains`](Geometry::contains) to distinguish
    /// inside from outside.
    pub fn distance(&self, p: &LatLng) -> f64 {
        match self {
            Geometry::Circle(c) => c.distance(p),
            Geometry::Polygon(poly) => poly.distance(p),
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Geometry::Circle(c) => {
                write!(f, "circle {} r={:.1}m", c.center(), c.radius())
            }
            Geometry::Polygon(p) => write!(f, "polygon[{}]", p.vertices().len()),
        }
    }
}

// Local-plane coordinate, in meters from the projection origin
struct Point {
    x: f64,
    y: f64,
}

// Project into the local plane by independent signed axis distances
fn project(p: &LatLng, origin: &LatLng) -> Point {
    let north = LatLng::new(p.lat, origin.lng);
    let east = LatLng::new(origin.lat, p.lng);
    Point {
        x: (p.lng - origin.lng).signum() * origin.distance(&east),
        y: (p.lat - origin.lat).signum() * origin.distance(&north),
    }
}

// Distance from p to segment ab, with degenerate segments treated as points
fn point_to_segment(p: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_squared = dx * dx + dy * dy;
    if length_squared < SEGMENT_EPSILON {
        return ((p.x - a.x).powi(2) + (p.y - a.y).powi(2)).sqrt();
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_squared).clamp(0.0, 1.0);
    let proj_x = a.x + t * dx;
    let proj_y = a.y + t * dy;
    ((p.x - proj_x).powi(2) + (p.y - proj_y).powi(2)).sqrt()
}
