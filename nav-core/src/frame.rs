//! Parse raw hex strings into airborne-position fields.
//!
//! Responsibilities:
//! - Extract the frame payload from a `*`-prefixed receiver line
//! - Validate length (28 hex chars / 112 bits) and hex content
//! - Accept only Downlink Format 17 (ADS-B extended squitter)
//! - Extract ICAO address (bytes 1-3) and the 56-bit ME field (bytes 4-10)
//! - Hand the ME field to [`crate::decode`] for position decoding
//!
//! Rejection is the common case on a shared RF channel, so it is reported as a
//! [`Rejection`] value rather than an error.

use crate::decode;
use crate::types::{hex_decode, DecodedFields, Icao};

/// Length of an extended squitter frame in hex characters.
pub const FRAME_HEX_LEN: usize = 28;

/// Length of an extended squitter frame in bytes (112 bits).
pub const FRAME_BYTES: usize = 14;

/// Downlink Format of an ADS-B extended squitter.
pub const DF_EXTENDED_SQUITTER: u8 = 17;

/// One 112-bit Mode S extended squitter frame.
pub type RawFrame = [u8; FRAME_BYTES];

/// Why a frame is not an airborne position message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Payload is not exactly 28 hex characters.
    Length(usize),
    /// Payload contains non-hex characters.
    InvalidHex,
    /// Downlink Format other than 17.
    DownlinkFormat(u8),
    /// Type Code outside the airborne position range 9-18.
    TypeCode(u8),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Length(n) => write!(f, "length {n}, expected {FRAME_HEX_LEN} hex chars"),
            Rejection::InvalidHex => write!(f, "not hexadecimal"),
            Rejection::DownlinkFormat(df) => write!(f, "DF{df} is not an extended squitter"),
            Rejection::TypeCode(tc) => write!(f, "TC{tc} is not an airborne position"),
        }
    }
}

// ---------------------------------------------------------------------------
// Line framing
// ---------------------------------------------------------------------------

/// Extract the 28-char frame payload from a receiver line.
///
/// Lines look like `*8D40621D58C382D690C8AC2863A7;`. Anything after the first
/// 28 characters (terminator, timestamps) is ignored; lines that don't start
/// with `*` or are too short are not frames.
pub fn frame_hex(line: &str) -> Option<&str> {
    let body = line.trim().strip_prefix('*')?;
    body.get(..FRAME_HEX_LEN)
}

// ---------------------------------------------------------------------------
// Frame parsing
// ---------------------------------------------------------------------------

/// Parse a 28-char hex string into airborne-position fields.
///
/// The input must be exactly the frame payload; surrounding whitespace counts
/// toward the length. Use [`frame_hex`] to extract it from a receiver line.
pub fn parse_position(hex_str: &str) -> Result<DecodedFields, Rejection> {
    if hex_str.len() != FRAME_HEX_LEN {
        return Err(Rejection::Length(hex_str.len()));
    }

    let bytes = hex_decode(hex_str).ok_or(Rejection::InvalidHex)?;
    let raw: RawFrame = bytes.try_into().map_err(|_| Rejection::InvalidHex)?;
    decode_frame(&raw)
}

/// Like [`parse_position`], discarding the rejection reason.
pub fn parse_position_frame(hex_str: &str) -> Option<DecodedFields> {
    parse_position(hex_str).ok()
}

/// Decode an already-binary 112-bit frame.
pub fn decode_frame(raw: &RawFrame) -> Result<DecodedFields, Rejection> {
    let df = downlink_format(raw);
    if df != DF_EXTENDED_SQUITTER {
        return Err(Rejection::DownlinkFormat(df));
    }

    decode::decode_airborne_position(icao(raw), me_bits(raw))
}

/// Downlink Format: first 5 bits.
pub fn downlink_format(raw: &RawFrame) -> u8 {
    (raw[0] >> 3) & 0x1F
}

/// ICAO address: bits 8-31.
pub fn icao(raw: &RawFrame) -> Icao {
    [raw[1], raw[2], raw[3]]
}

/// Message Extended field (bits 32-87) right-aligned in a u64.
pub fn me_bits(raw: &RawFrame) -> u64 {
    let mut buf = [0u8; 8];
    buf[1..8].copy_from_slice(&raw[4..11]);
    u64::from_be_bytes(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
