//! WGS84 geodetic ↔ ECEF conversion and ECEF → local ENU projection.
//!
//! All public angles are degrees; trigonometry runs in radians internally.
//! Altitudes are meters. Converting ADS-B feet to meters is the caller's job.

use std::f64::consts::FRAC_PI_4;

use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6378137.0;

/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = 6.69437999014e-3;

/// International foot in meters.
pub const FEET_TO_METERS: f64 = 0.3048;

/// Iteration cap for the inverse conversion.
const MAX_GEODETIC_ITER: usize = 16;

/// Latitude convergence threshold in radians (~6 µm on the ground).
const GEODETIC_EPSILON: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Coordinate types
// ---------------------------------------------------------------------------

/// Latitude/longitude in degrees, altitude in meters above the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeodeticPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
}

impl GeodeticPoint {
    pub fn new(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        GeodeticPoint {
            lat_deg,
            lon_deg,
            alt_m,
        }
    }
}

/// Earth-Centered-Earth-Fixed coordinates in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ecef {
    pub fn distance(&self, other: &Ecef) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// East-North-Up offsets in meters from a reference point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Enu {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl Enu {
    /// Straight-line distance to the reference point.
    pub fn range(&self) -> f64 {
        (self.east * self.east + self.north * self.north + self.up * self.up).sqrt()
    }

    /// Distance projected on the local tangent plane.
    pub fn horizontal_range(&self) -> f64 {
        self.east.hypot(self.north)
    }

    /// Bearing from the reference point, degrees clockwise from north in [0, 360).
    pub fn bearing_deg(&self) -> f64 {
        self.east.atan2(self.north).to_degrees().rem_euclid(360.0)
    }
}

// ---------------------------------------------------------------------------
// Geodetic ↔ ECEF
// ---------------------------------------------------------------------------

/// Prime vertical radius of curvature N at a latitude (radians).
pub fn prime_vertical_radius(lat_rad: f64) -> f64 {
    let sin_lat = lat_rad.sin();
    WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt()
}

/// Convert geodetic coordinates to ECEF.
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Ecef {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let n = prime_vertical_radius(lat);

    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    Ecef {
        x: (n + alt_m) * cos_lat * cos_lon,
        y: (n + alt_m) * cos_lat * sin_lon,
        z: (n * (1.0 - WGS84_E2) + alt_m) * sin_lat,
    }
}

/// Convert ECEF back to geodetic coordinates.
///
/// Fixed-point iteration on latitude; converges to well below a millimeter
/// in a handful of steps for any point off the polar axis.
pub fn ecef_to_geodetic(p: &Ecef) -> GeodeticPoint {
    let lon = p.y.atan2(p.x);
    let rho = p.x.hypot(p.y);

    let mut lat = p.z.atan2(rho * (1.0 - WGS84_E2));
    for _ in 0..MAX_GEODETIC_ITER {
        let n = prime_vertical_radius(lat);
        let alt = ellipsoid_height(rho, p.z, lat, n);
        let next = p.z.atan2(rho * (1.0 - WGS84_E2 * n / (n + alt)));
        let done = (next - lat).abs() < GEODETIC_EPSILON;
        lat = next;
        if done {
            break;
        }
    }

    let alt = ellipsoid_height(rho, p.z, lat, prime_vertical_radius(lat));
    GeodeticPoint::new(lat.to_degrees(), lon.to_degrees(), alt)
}

/// Height above the ellipsoid, using whichever form is well-conditioned at `lat`.
fn ellipsoid_height(rho: f64, z: f64, lat: f64, n: f64) -> f64 {
    if lat.abs() < FRAC_PI_4 {
        rho / lat.cos() - n
    } else {
        z / lat.sin() - n * (1.0 - WGS84_E2)
    }
}

// ---------------------------------------------------------------------------
// Local tangent plane
// ---------------------------------------------------------------------------

/// Fixed ENU anchor with its ECEF position and rotation terms precomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    origin: GeodeticPoint,
    origin_ecef: Ecef,
    sin_lat: f64,
    cos_lat: f64,
    sin_lon: f64,
    cos_lon: f64,
}

impl ReferenceFrame {
    pub fn new(origin: GeodeticPoint) -> Self {
        let origin_ecef = geodetic_to_ecef(origin.lat_deg, origin.lon_deg, origin.alt_m);
        let (sin_lat, cos_lat) = origin.lat_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = origin.lon_deg.to_radians().sin_cos();

        ReferenceFrame {
            origin,
            origin_ecef,
            sin_lat,
            cos_lat,
            sin_lon,
            cos_lon,
        }
    }

    pub fn origin(&self) -> &GeodeticPoint {
        &self.origin
    }

    pub fn origin_ecef(&self) -> &Ecef {
        &self.origin_ecef
    }

    /// Rotate an ECEF point into this frame's East-North-Up axes.
    pub fn ecef_to_enu(&self, p: &Ecef) -> Enu {
        let dx = p.x - self.origin_ecef.x;
        let dy = p.y - self.origin_ecef.y;
        let dz = p.z - self.origin_ecef.z;

        Enu {
            east: -self.sin_lon * dx + self.cos_lon * dy,
            north: -self.sin_lat * self.cos_lon * dx - self.sin_lat * self.sin_lon * dy
                + self.cos_lat * dz,
            up: self.cos_lat * self.cos_lon * dx
                + self.cos_lat * self.sin_lon * dy
                + self.sin_lat * dz,
        }
    }

    pub fn geodetic_to_enu(&self, lat_deg: f64, lon_deg: f64, alt_m: f64) -> Enu {
        self.ecef_to_enu(&geodetic_to_ecef(lat_deg, lon_deg, alt_m))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
