//! Per-aircraft even/odd pairing and global position resolution.
//!
//! Pure logic: the caller supplies a timestamp with every frame. Each aircraft
//! holds at most one even and one odd half-message; a newer half of the same
//! parity replaces the older one. Halves older than the cache window are purged
//! before every insert, so a stale half never pairs with a fresh one.

use std::collections::HashMap;

use tracing::debug;

use crate::cpr;
use crate::geodesy::{geodetic_to_ecef, ReferenceFrame, FEET_TO_METERS};
use crate::types::{icao_to_string, DecodedFields, Icao, Parity, ResolvedPosition};

/// Default lifetime of a cached half-message (seconds).
pub const DEFAULT_CACHE_TIMEOUT: f64 = 10.0;

// ---------------------------------------------------------------------------
// Message cache
// ---------------------------------------------------------------------------

/// One cached CPR half-message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingMessage {
    pub cpr_lat: u32,
    pub cpr_lon: u32,
    pub altitude_ft: i32,
    pub received_at: f64,
}

impl PendingMessage {
    /// Age at `now`. Negative when the clock ran backwards.
    pub fn age(&self, now: f64) -> f64 {
        now - self.received_at
    }

    /// Expired when older than `timeout`. A negative or NaN age also counts
    /// as expired.
    pub fn is_expired(&self, now: f64, timeout: f64) -> bool {
        !(0.0..=timeout).contains(&self.age(now))
    }
}

/// Even and odd slots for a single aircraft.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheEntry {
    pub even: Option<PendingMessage>,
    pub odd: Option<PendingMessage>,
}

impl CacheEntry {
    pub fn slot(&self, parity: Parity) -> Option<&PendingMessage> {
        match parity {
            Parity::Even => self.even.as_ref(),
            Parity::Odd => self.odd.as_ref(),
        }
    }

    fn slot_mut(&mut self, parity: Parity) -> &mut Option<PendingMessage> {
        match parity {
            Parity::Even => &mut self.even,
            Parity::Odd => &mut self.odd,
        }
    }

    /// Both halves, if present.
    pub fn pair(&self) -> Option<(&PendingMessage, &PendingMessage)> {
        Some((self.even.as_ref()?, self.odd.as_ref()?))
    }

    pub fn is_empty(&self) -> bool {
        self.even.is_none() && self.odd.is_none()
    }
}

/// Short-lived per-aircraft store of CPR half-messages.
#[derive(Debug, Clone)]
pub struct MessageCache {
    timeout: f64,
    entries: HashMap<Icao, CacheEntry>,
}

impl MessageCache {
    pub fn new(timeout: f64) -> Self {
        MessageCache {
            timeout,
            entries: HashMap::new(),
        }
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    /// Drop expired slots and then any aircraft left with no slots.
    /// Returns the number of slots removed.
    pub fn purge_expired(&mut self, now: f64) -> usize {
        let timeout = self.timeout;
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            for parity in [Parity::Even, Parity::Odd] {
                let slot = entry.slot_mut(parity);
                if slot.as_ref().is_some_and(|msg| msg.is_expired(now, timeout)) {
                    *slot = None;
                    removed += 1;
                }
            }
            !entry.is_empty()
        });
        removed
    }

    /// Store a half-message, overwriting the slot of the same parity.
    pub fn insert(&mut self, fields: &DecodedFields, now: f64) -> &CacheEntry {
        let entry = self.entries.entry(fields.icao).or_default();
        *entry.slot_mut(fields.parity) = Some(PendingMessage {
            cpr_lat: fields.cpr_lat,
            cpr_lon: fields.cpr_lon,
            altitude_ft: fields.altitude_ft,
            received_at: now,
        });
        entry
    }

    pub fn get(&self, icao: &Icao) -> Option<&CacheEntry> {
        self.entries.get(icao)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MessageCache {
    fn default() -> Self {
        MessageCache::new(DEFAULT_CACHE_TIMEOUT)
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Outcome of feeding one position frame to the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Only one parity cached for this aircraft so far.
    Pending,
    /// Even/odd latitudes fell in different NL zones; wait for the next pair.
    ZoneMismatch,
    Resolved(ResolvedPosition),
}

impl Resolution {
    pub fn into_position(self) -> Option<ResolvedPosition> {
        match self {
            Resolution::Resolved(pos) => Some(pos),
            _ => None,
        }
    }
}

/// Pairs CPR halves per aircraft and projects resolved fixes.
#[derive(Debug, Clone)]
pub struct PositionResolver {
    cache: MessageCache,
    frame: ReferenceFrame,
}

impl PositionResolver {
    pub fn new(frame: ReferenceFrame, cache_timeout: f64) -> Self {
        PositionResolver::with_cache(MessageCache::new(cache_timeout), frame)
    }

    pub fn with_cache(cache: MessageCache, frame: ReferenceFrame) -> Self {
        PositionResolver { cache, frame }
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    pub fn reference(&self) -> &ReferenceFrame {
        &self.frame
    }

    /// Cache a decoded half-message received at `now` and try a global decode.
    pub fn resolve(&mut self, fields: &DecodedFields, now: f64) -> Resolution {
        let purged = self.cache.purge_expired(now);
        if purged > 0 {
            debug!(purged, remaining = self.cache.len(), "expired CPR halves");
        }

        let entry = self.cache.insert(fields, now);
        let Some((even, odd)) = entry.pair() else {
            return Resolution::Pending;
        };

        let resolution = resolve_pair(fields.icao, even, odd, &self.frame);
        if resolution == Resolution::ZoneMismatch {
            debug!(icao = %icao_to_string(&fields.icao), "CPR pair straddles NL zones");
        }
        resolution
    }
}

/// Global decode of one aircraft's even/odd pair.
///
/// Latitude and altitude come from the more recent half (even on ties); the
/// timestamp is the newer of the two.
pub fn resolve_pair(
    icao: Icao,
    even: &PendingMessage,
    odd: &PendingMessage,
    frame: &ReferenceFrame,
) -> Resolution {
    let Some(fix) = cpr::global_decode(
        even.cpr_lat,
        even.cpr_lon,
        odd.cpr_lat,
        odd.cpr_lon,
        even.received_at,
        odd.received_at,
    ) else {
        return Resolution::ZoneMismatch;
    };

    let latest = match fix.latest {
        Parity::Even => even,
        Parity::Odd => odd,
    };
    let timestamp = even.received_at.max(odd.received_at);

    Resolution::Resolved(project(
        icao,
        fix.lat,
        fix.lon,
        latest.altitude_ft,
        timestamp,
        frame,
    ))
}

/// Attach ECEF and ENU coordinates to a decoded fix.
pub fn project(
    icao: Icao,
    lat: f64,
    lon: f64,
    altitude_ft: i32,
    timestamp: f64,
    frame: &ReferenceFrame,
) -> ResolvedPosition {
    let ecef = geodetic_to_ecef(lat, lon, altitude_ft as f64 * FEET_TO_METERS);
    let enu = frame.ecef_to_enu(&ecef);

    ResolvedPosition {
        icao,
        latitude_deg: lat,
        longitude_deg: lon,
        altitude_ft,
        timestamp,
        ecef_x: ecef.x,
        ecef_y: ecef.y,
        ecef_z: ecef.z,
        enu_east: enu.east,
        enu_north: enu.north,
        enu_up: enu.up,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
