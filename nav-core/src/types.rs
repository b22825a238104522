//! Shared types, error enum, and decoded position records for nav-core.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// All errors produced by nav-core.
///
/// Frame rejection and unresolved CPR pairs are not errors; see
/// [`crate::frame::Rejection`] and [`crate::resolver::Resolution`].
#[derive(Debug, Error)]
pub enum NavError {
    #[error("malformed log record: {0}")]
    Record(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NavError>;

// ---------------------------------------------------------------------------
// ICAO address helpers
// ---------------------------------------------------------------------------

/// 3-byte ICAO address. Stored as raw bytes to avoid per-frame String allocation.
pub type Icao = [u8; 3];

/// Format ICAO address as 6-char uppercase hex string.
pub fn icao_to_string(icao: &Icao) -> String {
    format!("{:02X}{:02X}{:02X}", icao[0], icao[1], icao[2])
}

/// Parse a 6-char hex string into an ICAO address.
pub fn icao_from_hex(hex: &str) -> Option<Icao> {
    if hex.len() != 6 {
        return None;
    }
    let val = u32::from_str_radix(hex, 16).ok()?;
    Some(icao_from_u32(val))
}

/// Build ICAO from a 24-bit integer.
pub fn icao_from_u32(val: u32) -> Icao {
    [
        ((val >> 16) & 0xFF) as u8,
        ((val >> 8) & 0xFF) as u8,
        (val & 0xFF) as u8,
    ]
}

fn serialize_icao<S: Serializer>(icao: &Icao, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&icao_to_string(icao))
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if !hex.len().is_multiple_of(2) {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for chunk in hex.as_bytes().chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Decoded position types
// ---------------------------------------------------------------------------

/// CPR format flag: which half of the even/odd encoding a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    /// Map the F bit of an airborne position ME field (0 = even, 1 = odd).
    pub fn from_bit(bit: u64) -> Self {
        if bit & 1 == 1 {
            Parity::Odd
        } else {
            Parity::Even
        }
    }
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::Even => write!(f, "even"),
            Parity::Odd => write!(f, "odd"),
        }
    }
}

/// DF17 TC 9-18: one half of a CPR-encoded airborne position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedFields {
    #[serde(serialize_with = "serialize_icao")]
    pub icao: Icao,
    pub type_code: u8,
    pub parity: Parity,
    pub cpr_lat: u32,
    pub cpr_lon: u32,
    pub altitude_ft: i32,
}

/// A fully resolved, geo-referenced aircraft position.
///
/// ECEF coordinates are meters in the WGS84 earth-fixed frame; ENU
/// coordinates are meters relative to the tracker's reference point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPosition {
    #[serde(serialize_with = "serialize_icao")]
    pub icao: Icao,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_ft: i32,
    /// Unix timestamp (seconds) of the newer message of the pair.
    pub timestamp: f64,
    pub ecef_x: f64,
    pub ecef_y: f64,
    pub ecef_z: f64,
    pub enu_east: f64,
    pub enu_north: f64,
    pub enu_up: f64,
}

impl std::fmt::Display for ResolvedPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ICAO:{} pos:({:.6}, {:.6}) alt:{}ft ECEF:({:.1}, {:.1}, {:.1})m ENU:({:.1}, {:.1}, {:.1})m",
            icao_to_string(&self.icao),
            self.latitude_deg,
            self.longitude_deg,
            self.altitude_ft,
            self.ecef_x,
            self.ecef_y,
            self.ecef_z,
            self.enu_east,
            self.enu_north,
            self.enu_up,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icao_roundtrip() {
        let icao = icao_from_hex("40621D").unwrap();
        assert_eq!(icao, [0x40, 0x62, 0x1D]);
        assert_eq!(icao_to_string(&icao), "40621D");
    }

    #[test]
    fn test_icao_from_hex_rejects_bad_input() {
        assert_eq!(icao_from_hex("40621"), None);
        assert_eq!(icao_from_hex("40621Z"), None);
    }

    #[test]
    fn test_icao_from_u32() {
        assert_eq!(icao_from_u32(0x4840D6), [0x48, 0x40, 0xD6]);
    }

    #[test]
    fn test_hex_decode() {
        assert_eq!(hex_decode("4840d6"), Some(vec![0x48, 0x40, 0xD6]));
        assert_eq!(hex_decode("odd"), None); // odd length
        assert_eq!(hex_decode("ZZZZ"), None); // invalid chars
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x48, 0x40, 0xD6]), "4840D6");
    }

    #[test]
    fn test_parity_from_bit() {
        assert_eq!(Parity::from_bit(0), Parity::Even);
        assert_eq!(Parity::from_bit(1), Parity::Odd);
        assert_eq!(Parity::Odd.to_string(), "odd");
    }

    #[test]
    fn test_resolved_position_serializes_icao_as_hex() {
        let pos = ResolvedPosition {
            icao: [0x78, 0x0A, 0x3B],
            latitude_deg: 39.9,
            longitude_deg: 116.4,
            altitude_ft: 32000,
            timestamp: 0.0,
            ecef_x: 0.0,
            ecef_y: 0.0,
            ecef_z: 0.0,
            enu_east: 0.0,
            enu_north: 0.0,
            enu_up: 0.0,
        };
        let text = toml::to_string(&pos).unwrap();
        assert!(text.contains("icao = \"780A3B\""), "{text}");
    }
}
