//! nav-core: ADS-B airborne position decoding and local-frame projection.
//!
//! No async, no I/O beyond the config file. Frames go in through
//! [`TrackSession`], resolved positions with ECEF and ENU coordinates come out.

pub mod config;
pub mod cpr;
pub mod decode;
pub mod frame;
pub mod geodesy;
pub mod record;
pub mod resolver;
pub mod session;
pub mod types;

// Re-export commonly used types at crate root
pub use config::Config;
pub use frame::{parse_position, Rejection};
pub use geodesy::{Ecef, Enu, GeodeticPoint, ReferenceFrame};
pub use record::{format_record, LogRecord};
pub use resolver::{MessageCache, PositionResolver, Resolution};
pub use session::{FrameOutcome, SessionStats, TrackSession};
pub use types::*;
