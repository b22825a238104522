//! Compact Position Reporting: global CPR decode for airborne positions.
//!
//! Global decode needs one even and one odd frame from the same aircraft. The
//! caller is responsible for pairing and expiry (see [`crate::resolver`]).
//!
//! Key constants:
//! - NZ = 15 (latitude zones per hemisphere for even frames)
//! - Nb = 17 (bits per coordinate)
//! - Dlat_even = 360 / (4 * NZ) = 6.0 degrees
//! - Dlat_odd = 360 / (4 * NZ - 1) ≈ 6.1017 degrees

use std::f64::consts::PI;

use crate::types::Parity;

/// Number of latitude zones per hemisphere.
const NZ: f64 = 15.0;

/// Bits per CPR coordinate.
const NB: u32 = 17;

/// Maximum CPR value (2^17 = 131072).
const CPR_MAX: f64 = (1u32 << NB) as f64;

/// Number of longitude zones at a given latitude (NL function).
///
/// Ranges from 1 near the poles to 59 at the equator.
pub fn nl(lat: f64) -> i32 {
    let abs_lat = lat.abs();
    if abs_lat >= 87.0 {
        return 1;
    }
    if abs_lat >= 86.5 {
        return 2;
    }

    let a = 1.0 - (PI / (2.0 * NZ)).cos();
    let b = abs_lat.to_radians().cos().powi(2);
    let d = (1.0 - a / b).clamp(-1.0, 1.0);
    let nl_val = (2.0 * PI / d.acos()).floor() as i32;
    nl_val.max(1)
}

/// Modulo that always returns a non-negative result.
fn modulo(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

/// Result of a successful global decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CprFix {
    pub lat: f64,
    pub lon: f64,
    /// Parity of the more recent frame, whose latitude was used.
    pub latest: Parity,
}

/// Global CPR decode from an even/odd frame pair.
///
/// `t_even`/`t_odd` pick the reference frame: the more recent one wins and
/// the even frame wins exact ties. Returns `None` when the two candidate
/// latitudes fall in different NL zones.
pub fn global_decode(
    lat_even: u32,
    lon_even: u32,
    lat_odd: u32,
    lon_odd: u32,
    t_even: f64,
    t_odd: f64,
) -> Option<CprFix> {
    let dlat_even = 360.0 / (4.0 * NZ); // 6.0
    let dlat_odd = 360.0 / (4.0 * NZ - 1.0); // ~6.1017

    let lat_even_cpr = lat_even as f64 / CPR_MAX;
    let lon_even_cpr = lon_even as f64 / CPR_MAX;
    let lat_odd_cpr = lat_odd as f64 / CPR_MAX;
    let lon_odd_cpr = lon_odd as f64 / CPR_MAX;

    // Compute latitude zone index j
    let j = (59.0 * lat_even_cpr - 60.0 * lat_odd_cpr + 0.5).floor();

    // Compute candidate latitudes
    let mut lat_e = dlat_even * (modulo(j, 60.0) + lat_even_cpr);
    let mut lat_o = dlat_odd * (modulo(j, 59.0) + lat_odd_cpr);

    // Southern hemisphere wraps into [-90, 270)
    if lat_e >= 270.0 {
        lat_e -= 360.0;
    }
    if lat_o >= 270.0 {
        lat_o -= 360.0;
    }

    // Both latitudes must give the same NL value
    let nl_val = nl(lat_e);
    if nl_val != nl(lat_o) {
        return None;
    }

    let m = (lon_even_cpr * (nl_val - 1) as f64 - lon_odd_cpr * nl_val as f64 + 0.5).floor();

    let (lat, lon, latest) = if t_even >= t_odd {
        let n_lon = nl_val.max(1) as f64;
        let lon = (360.0 / n_lon) * (modulo(m, n_lon) + lon_even_cpr);
        (lat_e, lon, Parity::Even)
    } else {
        let n_lon = (nl_val - 1).max(1) as f64;
        let lon = (360.0 / n_lon) * (modulo(m, n_lon) + lon_odd_cpr);
        (lat_o, lon, Parity::Odd)
    };

    Some(CprFix {
        lat,
        lon: normalize_lon(lon),
        latest,
    })
}

/// Fold a longitude into (-180, 180].
fn normalize_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon <= -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // Test vectors from "The 1090MHz Riddle"
    const LAT_EVEN: u32 = 93000;
    const LON_EVEN: u32 = 51372;
    const LAT_ODD: u32 = 74158;
    const LON_ODD: u32 = 50194;

    #[test]
    fn test_nl_equator() {
        assert_eq!(nl(0.0), 59);
    }

    #[test]
    fn test_nl_poles() {
        assert_eq!(nl(87.0), 1);
        assert_eq!(nl(-87.0), 1);
        assert_eq!(nl(90.0), 1);
    }

    #[test]
    fn test_nl_near_pole_band() {
        assert_eq!(nl(86.5), 2);
        assert_eq!(nl(-86.7), 2);
    }

    #[test]
    fn test_nl_mid_latitude() {
        assert_eq!(nl(52.0), 36);
        assert_eq!(nl(-30.0), 51);
        assert_eq!(nl(60.0), 29);
    }

    #[test]
    fn test_nl_symmetric() {
        for lat in [10.0, 33.3, 45.0, 70.1, 86.0] {
            assert_eq!(nl(lat), nl(-lat));
        }
    }

    #[test]
    fn test_global_decode_even_latest() {
        let fix = global_decode(LAT_EVEN, LON_EVEN, LAT_ODD, LON_ODD, 1.0, 0.0).unwrap();
        assert_eq!(fix.latest, Parity::Even);
        assert!((fix.lat - 52.2572021484375).abs() < 1e-4, "lat={}", fix.lat);
        assert!((fix.lon - 3.91937255859375).abs() < 1e-4, "lon={}", fix.lon);
    }

    #[test]
    fn test_global_decode_odd_latest() {
        let fix = global_decode(LAT_EVEN, LON_EVEN, LAT_ODD, LON_ODD, 0.0, 1.0).unwrap();
        assert_eq!(fix.latest, Parity::Odd);
        assert!((fix.lat - 52.26578017412606).abs() < 1e-4, "lat={}", fix.lat);
        assert!((fix.lon - 3.938912527901786).abs() < 1e-4, "lon={}", fix.lon);
    }

    #[test]
    fn test_global_decode_tie_goes_to_even() {
        let tie = global_decode(LAT_EVEN, LON_EVEN, LAT_ODD, LON_ODD, 5.0, 5.0).unwrap();
        let even = global_decode(LAT_EVEN, LON_EVEN, LAT_ODD, LON_ODD, 6.0, 5.0).unwrap();
        assert_eq!(tie.latest, Parity::Even);
        assert_eq!(tie.lat.to_bits(), even.lat.to_bits());
        assert_eq!(tie.lon.to_bits(), even.lon.to_bits());
    }

    #[test]
    fn test_global_decode_deterministic() {
        let a = global_decode(LAT_EVEN, LON_EVEN, LAT_ODD, LON_ODD, 3.0, 3.0).unwrap();
        for _ in 0..10 {
            let b = global_decode(LAT_EVEN, LON_EVEN, LAT_ODD, LON_ODD, 3.0, 3.0).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_global_decode_zone_mismatch() {
        // Candidate latitudes -84.0 (even) and ~-83.97 (odd) straddle an NL boundary
        assert!(global_decode(0, 0, 31403, 0, 1.0, 0.0).is_none());
        assert!(global_decode(0, 0, 31403, 0, 0.0, 1.0).is_none());
    }

    #[test]
    fn test_longitude_normalized() {
        for lon_even in (0..131072u32).step_by(8191) {
            if let Some(fix) = global_decode(LAT_EVEN, lon_even, LAT_ODD, LON_ODD, 1.0, 0.0) {
                assert!(fix.lon > -180.0 && fix.lon <= 180.0, "lon={}", fix.lon);
            }
        }
    }

    #[test]
    fn test_normalize_lon() {
        assert_eq!(normalize_lon(180.0), 180.0);
        assert_eq!(normalize_lon(190.0), -170.0);
        assert_eq!(normalize_lon(-180.0), 180.0);
        assert_eq!(normalize_lon(3.9), 3.9);
    }

    #[test]
    fn test_modulo_positive() {
        assert!((modulo(7.0, 3.0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_modulo_negative() {
        // modulo(-1, 60) should return 59
        assert!((modulo(-1.0, 60.0) - 59.0).abs() < 1e-10);
    }
}
