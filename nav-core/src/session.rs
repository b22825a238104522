//! Frame feed → parser → resolver pipeline.
//!
//! Pure state machine: call `process_line()` with receiver lines and a receive
//! timestamp, get back a [`FrameOutcome`]. The caller decides what to do with
//! resolved positions (print, log, forward).

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::Config;
use crate::frame::{self, Rejection};
use crate::resolver::{PositionResolver, Resolution};
use crate::types::{icao_to_string, ResolvedPosition};

/// What became of one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Line does not carry a `*`-prefixed long frame.
    NotAFrame,
    /// Frame is not a DF17 airborne position message.
    Rejected(Rejection),
    /// Position half cached, waiting for its complement.
    Pending,
    /// Pair cached but its latitudes straddle NL zones.
    ZoneMismatch,
    Resolved(ResolvedPosition),
}

impl FrameOutcome {
    pub fn into_position(self) -> Option<ResolvedPosition> {
        match self {
            FrameOutcome::Resolved(pos) => Some(pos),
            _ => None,
        }
    }
}

/// Running counters for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub lines: u64,
    pub frames: u64,
    pub rejected: u64,
    pub position_frames: u64,
    pub zone_mismatches: u64,
    pub resolved: u64,
}

/// Streams raw frames into a [`PositionResolver`].
#[derive(Debug, Clone)]
pub struct TrackSession {
    resolver: PositionResolver,
    stats: SessionStats,
}

impl TrackSession {
    pub fn new(resolver: PositionResolver) -> Self {
        TrackSession {
            resolver,
            stats: SessionStats::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        TrackSession::new(PositionResolver::new(
            config.reference_frame(),
            config.cpr.cache_timeout_secs,
        ))
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn resolver(&self) -> &PositionResolver {
        &self.resolver
    }

    /// Process one receiver line (`*<28 hex>;`) received at `now`.
    pub fn process_line(&mut self, line: &str, now: f64) -> FrameOutcome {
        self.stats.lines += 1;
        match frame::frame_hex(line) {
            Some(hex) => self.process_hex(hex, now),
            None => FrameOutcome::NotAFrame,
        }
    }

    /// Process one bare 28-char hex frame received at `now`.
    pub fn process_hex(&mut self, hex: &str, now: f64) -> FrameOutcome {
        self.stats.frames += 1;

        let fields = match frame::parse_position(hex) {
            Ok(f) => f,
            Err(reason) => {
                self.stats.rejected += 1;
                trace!(%hex, %reason, "frame rejected");
                return FrameOutcome::Rejected(reason);
            }
        };
        self.stats.position_frames += 1;

        match self.resolver.resolve(&fields, now) {
            Resolution::Pending => FrameOutcome::Pending,
            Resolution::ZoneMismatch => {
                self.stats.zone_mismatches += 1;
                FrameOutcome::ZoneMismatch
            }
            Resolution::Resolved(pos) => {
                self.stats.resolved += 1;
                debug!(
                    icao = %icao_to_string(&pos.icao),
                    lat = pos.latitude_deg,
                    lon = pos.longitude_deg,
                    alt_ft = pos.altitude_ft,
                    "position resolved"
                );
                FrameOutcome::Resolved(pos)
            }
        }
    }
}

impl Default for TrackSession {
    fn default() -> Self {
        TrackSession::from_config(&Config::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EVEN: &str = "*8D40621D58C382D690C8AC2863A7;";
    const ODD: &str = "*8D40621D58C386435CC412692AD6;";

    #[test]
    fn test_pair_resolves() {
        let mut session = TrackSession::default();
        assert_eq!(session.process_line(EVEN, 1.0), FrameOutcome::Pending);

        let pos = session.process_line(ODD, 2.0).into_position().unwrap();
        assert_eq!(icao_to_string(&pos.icao), "40621D");
        assert_eq!(pos.altitude_ft, 38000);
        assert!((pos.latitude_deg - 52.26578017412606).abs() < 1e-4);
        assert!((pos.longitude_deg - 3.938912527901786).abs() < 1e-4);
    }

    #[test]
    fn test_non_frame_lines() {
        let mut session = TrackSession::default();
        assert_eq!(session.process_line("", 0.0), FrameOutcome::NotAFrame);
        assert_eq!(session.process_line("# comment", 0.0), FrameOutcome::NotAFrame);
        assert_eq!(session.process_line("*5D4840D6;", 0.0), FrameOutcome::NotAFrame);
        assert_eq!(session.stats().lines, 3);
        assert_eq!(session.stats().frames, 0);
    }

    #[test]
    fn test_rejected_frames_counted() {
        let mut session = TrackSession::default();
        let outcome = session.process_line("*8D4840D6202CC371C32CE0576098;", 0.0);
        assert_eq!(outcome, FrameOutcome::Rejected(Rejection::TypeCode(4)));

        let outcome = session.process_line("*8D40621D58C382D690C8AC2863XY;", 0.0);
        assert_eq!(outcome, FrameOutcome::Rejected(Rejection::InvalidHex));

        assert_eq!(session.stats().frames, 2);
        assert_eq!(session.stats().rejected, 2);
        assert_eq!(session.stats().position_frames, 0);
    }

    #[test]
    fn test_stats_after_stream() {
        let mut session = TrackSession::default();
        let lines = [EVEN, ODD, "noise", EVEN, "*8D485020994409940838175B284F;"];
        let resolved: Vec<_> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, l)| session.process_line(l, i as f64).into_position())
            .collect();

        assert_eq!(resolved.len(), 2);
        let stats = session.stats();
        assert_eq!(stats.lines, 5);
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.position_frames, 3);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.resolved, 2);
    }

    #[test]
    fn test_stale_half_does_not_resolve() {
        let mut session = TrackSession::default();
        session.process_line(EVEN, 100.0);
        assert_eq!(session.process_line(ODD, 111.0), FrameOutcome::Pending);
    }

    #[test]
    fn test_custom_reference_frame() {
        let mut config = Config::default();
        config.reference.latitude = 52.2572021484375;
        config.reference.longitude = 3.91937255859375;
        config.reference.altitude_m = 38000.0 * 0.3048;

        let mut session = TrackSession::from_config(&config);
        session.process_line(ODD, 1.0);
        let pos = session.process_line(EVEN, 2.0).into_position().unwrap();

        // Even-latest fix lands exactly on the reference point
        assert!(pos.enu_east.abs() < 1e-6, "{pos:?}");
        assert!(pos.enu_north.abs() < 1e-6, "{pos:?}");
        assert!(pos.enu_up.abs() < 1e-6, "{pos:?}");
    }

    #[test]
    fn test_bare_hex_entry_point() {
        let mut session = TrackSession::default();
        session.process_hex("8D40621D58C382D690C8AC2863A7", 1.0);
        let outcome = session.process_hex("8d40621d58c386435cc412692ad6", 1.5);
        assert!(matches!(outcome, FrameOutcome::Resolved(_)));
        assert_eq!(session.stats().lines, 0);
    }
}
