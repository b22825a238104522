//! adsb-nav: stream ADS-B frames into geo-referenced aircraft positions.

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nav_core::config::{self, Config};
use nav_core::frame;
use nav_core::geodesy::{Enu, ReferenceFrame};
use nav_core::record::RecordLayout;
use nav_core::types::*;
use nav_core::{FrameOutcome, LogRecord, SessionStats, TrackSession};

mod feed;
mod sink;

use feed::{FeedEnd, FEED_CHANNEL_CAPACITY, STDIN_SOURCE};
use sink::LogSink;

#[derive(Parser)]
#[command(
    name = "adsb-nav",
    version,
    about = "ADS-B airborne position decoder with ECEF/ENU projection"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    config: ConfigArgs,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Overrides applied on top of the config file.
#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Config file (default ~/.adsb-nav/config.toml)
    #[arg(long, global = true, env = "ADSB_NAV_CONFIG")]
    config: Option<PathBuf>,

    /// Reference latitude in degrees
    #[arg(long, global = true, allow_hyphen_values = true)]
    ref_lat: Option<f64>,

    /// Reference longitude in degrees
    #[arg(long, global = true, allow_hyphen_values = true)]
    ref_lon: Option<f64>,

    /// Reference altitude in meters
    #[arg(long, global = true, allow_hyphen_values = true)]
    ref_alt: Option<f64>,

    /// Seconds an unpaired even/odd frame stays usable
    #[arg(long, global = true)]
    cache_timeout: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve positions from receiver lines (`*<hex>;`) until input ends or Ctrl-C
    Track {
        /// Input sources, `-` for stdin
        #[arg(default_value = STDIN_SOURCE)]
        sources: Vec<String>,

        /// Print positions as JSON lines
        #[arg(long)]
        json: bool,

        /// Decoded position log (appended)
        #[arg(long, default_value_os_t = sink::default_decoded_log())]
        decoded_log: PathBuf,

        /// Also append every raw input line here
        #[arg(long)]
        raw_log: Option<PathBuf>,

        /// Don't write any log files
        #[arg(long)]
        no_log: bool,
    },

    /// Show what the frame parser makes of each line
    Decode {
        /// File of receiver lines or bare hex frames (stdin if omitted)
        file: Option<PathBuf>,

        /// Also list frames that are not airborne positions
        #[arg(short, long)]
        all: bool,
    },

    /// Summarize a decoded position log, newest fix per aircraft
    Summary {
        /// Path to the decoded log
        log: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Exit directly: a stdin reader blocked in a read would stall runtime shutdown
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = effective_config(&cli.config)?;

    match cli.command {
        Commands::Track {
            sources,
            json,
            decoded_log,
            raw_log,
            no_log,
        } => {
            let logs = (!no_log).then_some((decoded_log.as_path(), raw_log.as_deref()));
            cmd_track(&config, sources, json, logs).await
        }
        Commands::Decode { file, all } => cmd_decode(file.as_deref(), all),
        Commands::Summary { log } => cmd_summary(&config, &log),
        Commands::Config { init } => cmd_config(&config, &cli.config, init),
    }
}

/// Config file, then command-line overrides, then validation.
fn effective_config(args: &ConfigArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    if let Some(v) = args.ref_lat {
        config.reference.latitude = v;
    }
    if let Some(v) = args.ref_lon {
        config.reference.longitude = v;
    }
    if let Some(v) = args.ref_alt {
        config.reference.altitude_m = v;
    }
    if let Some(v) = args.cache_timeout {
        config.cpr.cache_timeout_secs = v;
    }

    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// track
// ---------------------------------------------------------------------------

async fn cmd_track(
    config: &Config,
    sources: Vec<String>,
    json: bool,
    logs: Option<(&Path, Option<&Path>)>,
) -> Result<()> {
    let (log_sink, sink_handle) = match logs {
        Some((decoded, raw)) => {
            let (s, h) = LogSink::spawn(decoded, raw).await?;
            (Some(s), Some(h))
        }
        None => (None, None),
    };

    let reference = config.reference_point();
    info!(
        sources = ?sources,
        ref_lat = reference.lat_deg,
        ref_lon = reference.lon_deg,
        ref_alt_m = reference.alt_m,
        cache_timeout_secs = config.cpr.cache_timeout_secs,
        "tracking"
    );

    let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
    for source in sources {
        feed::spawn_source(source, tx.clone());
    }
    drop(tx);

    let mut session = TrackSession::from_config(config);
    let mut latest: HashMap<Icao, ResolvedPosition> = HashMap::new();

    let end = feed::run_session(&mut session, rx, feed::ctrl_c(), |line, outcome| {
        if let Some(s) = &log_sink {
            s.record_raw(&line.line);
        }
        if let FrameOutcome::Resolved(pos) = outcome {
            if json {
                match serde_json::to_string(&pos) {
                    Ok(text) => println!("{text}"),
                    Err(e) => warn!(error = %e, "cannot serialize position"),
                }
            } else {
                println!("{pos}");
            }
            if let Some(s) = &log_sink {
                s.record_position(&pos);
            }
            latest.insert(pos.icao, pos);
        }
    })
    .await;

    // Closing the sink lets the writer drain and exit
    drop(log_sink);
    if let Some(handle) = sink_handle {
        match handle.await {
            Ok(Ok(report)) => info!(
                decoded_lines = report.decoded_lines,
                raw_lines = report.raw_lines,
                "logs written"
            ),
            Ok(Err(e)) => warn!(error = %e, "log sink failed"),
            Err(e) => warn!(error = %e, "log sink task panicked"),
        }
    }

    if end == FeedEnd::Interrupted {
        eprintln!();
    }
    print_track_summary(session.stats(), &latest, session.resolver().reference());
    Ok(())
}

fn print_track_summary(
    stats: &SessionStats,
    latest: &HashMap<Icao, ResolvedPosition>,
    reference: &ReferenceFrame,
) {
    let origin = reference.origin();
    eprintln!();
    eprintln!(
        "Lines: {} read, {} frames, {} position frames, {} rejected",
        stats.lines, stats.frames, stats.position_frames, stats.rejected
    );
    eprintln!(
        "Positions: {} resolved, {} zone mismatches, {} aircraft",
        stats.resolved,
        stats.zone_mismatches,
        latest.len()
    );
    eprintln!(
        "Reference: {:.4}, {:.4} at {:.0} m",
        origin.lat_deg, origin.lon_deg, origin.alt_m
    );

    if latest.is_empty() {
        return;
    }

    let mut sorted: Vec<_> = latest.values().collect();
    sorted.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));

    let rows = sorted.into_iter().map(|pos| {
        let enu = Enu {
            east: pos.enu_east,
            north: pos.enu_north,
            up: pos.enu_up,
        };
        (
            pos.icao,
            pos.latitude_deg,
            pos.longitude_deg,
            pos.altitude_ft,
            enu,
            None,
        )
    });
    eprintln!();
    eprintln!("{}", position_table(rows));
}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

fn cmd_decode(file: Option<&Path>, all: bool) -> Result<()> {
    let reader: Box<dyn BufRead> = match file {
        Some(path) if path != Path::new(STDIN_SOURCE) => {
            Box::new(io::BufReader::new(std::fs::File::open(path)?))
        }
        _ => Box::new(io::stdin().lock()),
    };

    let mut total = 0u64;
    let mut positions = 0u64;

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        // Accept both receiver lines and bare hex
        let hex = frame::frame_hex(trimmed).unwrap_or(trimmed);
        total += 1;

        match frame::parse_position(hex) {
            Ok(f) => {
                positions += 1;
                println!(
                    "{hex}  {} TC{:<2} {:<4} lat_cpr={:<6} lon_cpr={:<6} alt={}ft",
                    icao_to_string(&f.icao),
                    f.type_code,
                    f.parity,
                    f.cpr_lat,
                    f.cpr_lon,
                    f.altitude_ft
                );
            }
            Err(reason) if all => println!("{hex}  rejected: {reason}"),
            Err(_) => {}
        }
    }

    info!(frames = total, positions, "decode complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// summary
// ---------------------------------------------------------------------------

fn cmd_summary(config: &Config, log: &Path) -> Result<()> {
    let reader = io::BufReader::new(std::fs::File::open(log)?);
    let (newest, skipped) = newest_per_aircraft(reader.lines())?;

    if skipped > 0 {
        warn!(skipped, log = %log.display(), "skipped malformed lines");
    }

    let frame = config.reference_frame();
    let mut rows: Vec<(LogRecord, Enu)> = newest
        .into_values()
        .map(|rec| {
            let enu = rec.enu_in(&frame);
            (rec, enu)
        })
        .collect();
    rows.sort_by(|a, b| a.1.horizontal_range().total_cmp(&b.1.horizontal_range()));

    println!();
    println!("{}: {} aircraft", log.display(), rows.len());
    println!();
    if rows.is_empty() {
        return Ok(());
    }

    let table = position_table(rows.iter().map(|(rec, enu)| {
        (
            rec.icao,
            rec.latitude_deg,
            rec.longitude_deg,
            rec.altitude_ft,
            *enu,
            Some((rec.timestamp.to_string(), rec.layout())),
        )
    }));
    println!("{table}");
    Ok(())
}

/// Keep the newest record per aircraft. Later lines win timestamp ties.
fn newest_per_aircraft<I>(lines: I) -> Result<(HashMap<Icao, LogRecord>, u64)>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut newest: HashMap<Icao, LogRecord> = HashMap::new();
    let mut skipped = 0u64;

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec = match LogRecord::parse(&line) {
            Ok(r) => r,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        match newest.get(&rec.icao) {
            Some(prev) if prev.timestamp > rec.timestamp => {}
            _ => {
                newest.insert(rec.icao, rec);
            }
        }
    }

    Ok((newest, skipped))
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config(config: &Config, args: &ConfigArgs, init: bool) -> Result<()> {
    print!("{}", config::serialize_config(config)?);

    if init {
        let path = match &args.config {
            Some(p) => {
                config::save_config_to(config, p)?;
                p.clone()
            }
            None => config::save_config(config)?,
        };
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

type PositionRow = (Icao, f64, f64, i32, Enu, Option<(String, RecordLayout)>);

fn position_table(rows: impl IntoIterator<Item = PositionRow>) -> Table {
    let mut table = Table::new();
    let mut header = vec![
        "ICAO", "Lat", "Lon", "Alt (ft)", "East (km)", "North (km)", "Up (km)", "Range (km)",
        "Brg",
    ];
    let mut with_source = false;

    for (icao, lat, lon, alt, enu, source) in rows {
        let mut cells = vec![
            Cell::new(icao_to_string(&icao)),
            Cell::new(format!("{lat:.4}")),
            Cell::new(format!("{lon:.4}")),
            Cell::new(alt),
            Cell::new(format!("{:.1}", enu.east / 1000.0)),
            Cell::new(format!("{:.1}", enu.north / 1000.0)),
            Cell::new(format!("{:.1}", enu.up / 1000.0)),
            Cell::new(format!("{:.1}", enu.horizontal_range() / 1000.0)),
            Cell::new(format!("{:.0}", enu.bearing_deg())),
        ];
        if let Some((seen, layout)) = source {
            with_source = true;
            cells.push(Cell::new(seen));
            cells.push(Cell::new(match layout {
                RecordLayout::Full => "full",
                RecordLayout::Ecef => "ecef",
                RecordLayout::Basic => "basic",
            }));
        }
        table.add_row(cells);
    }

    if with_source {
        header.extend(["Last seen", "Fields"]);
    }
    table.set_header(header);
    table
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
