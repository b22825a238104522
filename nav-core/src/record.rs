//! Decoded-log line format.
//!
//! Writer side produces the full 11-field line:
//! `timestamp,ICAO,lat,lon,altitude_ft,ecef_x,ecef_y,ecef_z,enu_e,enu_n,enu_u`.
//! Reader side also accepts the older 8-field (no ENU) and 5-field
//! (no ECEF/ENU) lines.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

use crate::geodesy::{Ecef, Enu, ReferenceFrame, FEET_TO_METERS};
use crate::types::{icao_from_hex, icao_to_string, Icao, NavError, ResolvedPosition, Result};

/// Timestamp column format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a resolved position as a log line, timestamp in local time.
pub fn format_record(pos: &ResolvedPosition) -> String {
    format_record_in(pos, &Local)
}

/// Format a resolved position as a log line, timestamp in `tz`.
pub fn format_record_in<Tz>(pos: &ResolvedPosition, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let ts = unix_to_datetime(pos.timestamp).with_timezone(tz);
    format!(
        "{},{},{:.6},{:.6},{},{:.1},{:.1},{:.1},{:.1},{:.1},{:.1}",
        ts.format(TIMESTAMP_FORMAT),
        icao_to_string(&pos.icao),
        pos.latitude_deg,
        pos.longitude_deg,
        pos.altitude_ft,
        pos.ecef_x,
        pos.ecef_y,
        pos.ecef_z,
        pos.enu_east,
        pos.enu_north,
        pos.enu_up,
    )
}

/// Unix seconds → UTC. Non-finite or out-of-range values map to the epoch.
fn unix_to_datetime(timestamp: f64) -> DateTime<Utc> {
    if !timestamp.is_finite() {
        return DateTime::UNIX_EPOCH;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999)).unwrap_or(DateTime::UNIX_EPOCH)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Which variant of the line a record was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// `timestamp,ICAO,lat,lon,alt`
    Basic,
    /// Basic + ECEF.
    Ecef,
    /// Basic + ECEF + ENU.
    Full,
}

/// One parsed decoded-log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: NaiveDateTime,
    pub icao: Icao,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_ft: i32,
    pub ecef: Option<Ecef>,
    pub enu: Option<Enu>,
}

impl LogRecord {
    /// Parse a log line. Extra trailing fields are ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        if fields.len() < 5 {
            return Err(NavError::Record(format!(
                "expected at least 5 fields, got {}",
                fields.len()
            )));
        }

        let timestamp = NaiveDateTime::parse_from_str(fields[0], TIMESTAMP_FORMAT)
            .map_err(|e| NavError::Record(format!("timestamp {:?}: {e}", fields[0])))?;
        let icao = icao_from_hex(fields[1])
            .ok_or_else(|| NavError::Record(format!("ICAO {:?}", fields[1])))?;

        let ecef = if fields.len() >= 8 {
            Some(Ecef {
                x: parse_f64(fields[5])?,
                y: parse_f64(fields[6])?,
                z: parse_f64(fields[7])?,
            })
        } else {
            None
        };
        let enu = if fields.len() >= 11 {
            Some(Enu {
                east: parse_f64(fields[8])?,
                north: parse_f64(fields[9])?,
                up: parse_f64(fields[10])?,
            })
        } else {
            None
        };

        Ok(LogRecord {
            timestamp,
            icao,
            latitude_deg: parse_f64(fields[2])?,
            longitude_deg: parse_f64(fields[3])?,
            altitude_ft: fields[4]
                .parse()
                .map_err(|_| NavError::Record(format!("altitude {:?}", fields[4])))?,
            ecef,
            enu,
        })
    }

    pub fn layout(&self) -> RecordLayout {
        match (self.ecef.is_some(), self.enu.is_some()) {
            (_, true) => RecordLayout::Full,
            (true, false) => RecordLayout::Ecef,
            (false, false) => RecordLayout::Basic,
        }
    }

    /// ENU offsets from the line, or projected into `frame` for older layouts.
    pub fn enu_in(&self, frame: &ReferenceFrame) -> Enu {
        self.enu.unwrap_or_else(|| {
            frame.geodetic_to_enu(
                self.latitude_deg,
                self.longitude_deg,
                self.altitude_ft as f64 * FEET_TO_METERS,
            )
        })
    }
}

impl FromStr for LogRecord {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        LogRecord::parse(s)
    }
}

fn parse_f64(field: &str) -> Result<f64> {
    field
        .parse()
        .map_err(|_| NavError::Record(format!("number {field:?}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::GeodeticPoint;

    fn position() -> ResolvedPosition {
        ResolvedPosition {
            icao: [0x40, 0x62, 0x1D],
            latitude_deg: 52.2572021484375,
            longitude_deg: 3.91937255859375,
            altitude_ft: 38000,
            // 2024-03-01 12:34:56.75 UTC
            timestamp: 1709296496.75,
            ecef_x: 3910292.110,
            ecef_y: 267905.276,
            ecef_z: 5029531.153,
            enu_east: -3621614.739,
            enu_north: 4840854.021,
            enu_up: -4302896.740,
        }
    }

    #[test]
    fn test_format_full_record() {
        let line = format_record_in(&position(), &Utc);
        assert_eq!(
            line,
            "2024-03-01 12:34:56,40621D,52.257202,3.919373,38000,\
             3910292.1,267905.3,5029531.2,-3621614.7,4840854.0,-4302896.7"
        );
        assert_eq!(line.split(',').count(), 11);
    }

    #[test]
    fn test_format_local_has_eleven_fields() {
        let line = format_record(&position());
        assert_eq!(line.split(',').count(), 11);
        assert_eq!(line.split(',').nth(1), Some("40621D"));
    }

    #[test]
    fn test_format_bad_timestamp_falls_back_to_epoch() {
        let mut pos = position();
        pos.timestamp = f64::NAN;
        assert!(format_record_in(&pos, &Utc).starts_with("1970-01-01 00:00:00,"));
    }

    #[test]
    fn test_parse_full_record() {
        let rec: LogRecord = format_record_in(&position(), &Utc).parse().unwrap();
        assert_eq!(rec.layout(), RecordLayout::Full);
        assert_eq!(icao_to_string(&rec.icao), "40621D");
        assert_eq!(rec.timestamp.to_string(), "2024-03-01 12:34:56");
        assert_eq!(rec.latitude_deg, 52.257202);
        assert_eq!(rec.altitude_ft, 38000);
        assert_eq!(rec.ecef.unwrap().x, 3910292.1);
        assert_eq!(rec.enu.unwrap().up, -4302896.7);
    }

    #[test]
    fn test_parse_legacy_layouts() {
        let ecef = LogRecord::parse(
            "2024-03-01 12:34:56,780A3B,39.912345,116.456789,32000,-2182051.1,4395713.5,4075888.2",
        )
        .unwrap();
        assert_eq!(ecef.layout(), RecordLayout::Ecef);
        assert!(ecef.enu.is_none());

        let basic = LogRecord::parse("2024-03-01 12:34:56,780A3B,39.912345,116.456789,32000").unwrap();
        assert_eq!(basic.layout(), RecordLayout::Basic);
        assert!(basic.ecef.is_none());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(LogRecord::parse("").is_err());
        assert!(LogRecord::parse("2024-03-01 12:34:56,780A3B,39.9,116.4").is_err());
        assert!(LogRecord::parse("yesterday,780A3B,39.9,116.4,32000").is_err());
        assert!(LogRecord::parse("2024-03-01 12:34:56,XYZ,39.9,116.4,32000").is_err());
        assert!(LogRecord::parse("2024-03-01 12:34:56,780A3B,north,116.4,32000").is_err());
        assert!(LogRecord::parse("2024-03-01 12:34:56,780A3B,39.9,116.4,high").is_err());
        assert!(matches!(
            LogRecord::parse("a,b"),
            Err(NavError::Record(_))
        ));
    }

    #[test]
    fn test_enu_filled_for_legacy_lines() {
        let frame = ReferenceFrame::new(GeodeticPoint::new(39.9, 116.4, 10000.0));

        // 10000 m / 0.3048 ≈ 32808 ft, close to the anchor altitude
        let rec = LogRecord::parse("2024-03-01 12:34:56,780A3B,39.9,116.4,32808").unwrap();
        let enu = rec.enu_in(&frame);
        assert!(enu.horizontal_range() < 1e-3, "{enu:?}");
        assert!(enu.up.abs() < 1.0, "{enu:?}");

        let full = LogRecord::parse(&format_record_in(&position(), &Utc)).unwrap();
        assert_eq!(full.enu_in(&frame).east, -3621614.7);
    }
}
