//! Decode the ME field of DF17 airborne position messages (TC 9-18).
//!
//! ME layout (56 bits, MSB first):
//! - bits 0-4:   Type Code
//! - bits 8-19:  altitude code (Q-bit at field bit 7)
//! - bit 21:     CPR format (0 = even, 1 = odd)
//! - bits 22-38: CPR latitude
//! - bits 39-55: CPR longitude

use crate::frame::Rejection;
use crate::types::{DecodedFields, Icao, Parity};

/// Type Code range of airborne position messages with barometric altitude.
pub const TC_AIRBORNE_POSITION: std::ops::RangeInclusive<u8> = 9..=18;

/// ADS-B Type Code (first 5 bits of the ME field).
pub fn type_code(me: u64) -> u8 {
    ((me >> 51) & 0x1F) as u8
}

/// Decode the 12-bit altitude code of an airborne position message.
///
/// The Q-bit (LSB bit 4) selects the increment: 25 ft when set, 100 ft when
/// clear. The Q=0 branch applies the 100-ft scale to the same 11-bit value
/// without Gillham gray-code reordering, so it only yields true altitudes
/// for transponders reporting in 25-ft mode.
pub fn decode_altitude(alt_code: u32) -> i32 {
    let q_bit = (alt_code >> 4) & 1;

    // Remove Q-bit to get 11-bit code
    let n = (((alt_code >> 5) << 4) | (alt_code & 0x0F)) as i32;

    if q_bit == 1 {
        n * 25 - 1000
    } else {
        n * 100 - 1000
    }
}

/// Decode TC 9-18 airborne position fields.
pub fn decode_airborne_position(icao: Icao, me: u64) -> Result<DecodedFields, Rejection> {
    let tc = type_code(me);
    if !TC_AIRBORNE_POSITION.contains(&tc) {
        return Err(Rejection::TypeCode(tc));
    }

    let alt_code = ((me >> 36) & 0x0FFF) as u32;
    let parity = Parity::from_bit(me >> 34);
    let cpr_lat = ((me >> 17) & 0x1FFFF) as u32;
    let cpr_lon = (me & 0x1FFFF) as u32;

    Ok(DecodedFields {
        icao,
        type_code: tc,
        parity,
        cpr_lat,
        cpr_lon,
        altitude_ft: decode_altitude(alt_code),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Re-insert a Q-bit into an 11-bit altitude value.
    fn encode(n: u32, q: u32) -> u32 {
        ((n >> 4) << 5) | (q << 4) | (n & 0x0F)
    }

    #[test]
    fn test_decode_altitude_25ft_exact_value() {
        // 0xC38: Q=1, n = (0x61 << 4) | 0x8 = 1560, 1560 * 25 - 1000 = 38000
        assert_eq!(decode_altitude(0xC38), 38000);
    }

    #[test]
    fn test_decode_altitude_25ft_roundtrip() {
        for n in 0..2048u32 {
            let alt = decode_altitude(encode(n, 1));
            assert_eq!((alt + 1000) % 25, 0);
            assert_eq!(((alt + 1000) / 25) as u32, n, "n={n}");
        }
    }

    #[test]
    fn test_decode_altitude_100ft_no_gray_code() {
        assert_eq!(decode_altitude(encode(0, 0)), -1000);
        assert_eq!(decode_altitude(encode(1, 0)), -900);
        assert_eq!(decode_altitude(encode(100, 0)), 9000);
        // Zero code is not special-cased
        assert_eq!(decode_altitude(0), -1000);
    }

    #[test]
    fn test_type_code() {
        assert_eq!(type_code(0x58C382D690C8AC), 11);
        assert_eq!(type_code(0x202CC371C32CE0), 4);
    }

    #[test]
    fn test_decode_airborne_position_fields() {
        let fields = decode_airborne_position([0x40, 0x62, 0x1D], 0x58C386435CC412).unwrap();
        assert_eq!(fields.parity, Parity::Odd);
        assert_eq!(fields.cpr_lat, 74158);
        assert_eq!(fields.cpr_lon, 50194);
        assert_eq!(fields.altitude_ft, 38000);
    }

    #[test]
    fn test_decode_rejects_surface_position() {
        // TC 6 (surface position) is outside the airborne range
        let me = 6u64 << 51;
        assert_eq!(
            decode_airborne_position([0, 0, 1], me),
            Err(Rejection::TypeCode(6))
        );
    }

    #[test]
    fn test_cpr_fields_full_range() {
        let me = (11u64 << 51) | (0x1FFFFu64 << 17) | 0x1FFFF;
        let fields = decode_airborne_position([0, 0, 1], me).unwrap();
        assert_eq!(fields.cpr_lat, 131071);
        assert_eq!(fields.cpr_lon, 131071);
    }
}
