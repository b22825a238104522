//! Receiver feed loop.
//!
//! Every source (stdin or a file) gets its own reader task. Lines are stamped
//! with the wall-clock receive time and funnelled through one bounded channel
//! into a single session loop, so the resolver cache has exactly one owner no
//! matter how many receivers are attached.

use std::future::Future;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nav_core::{FrameOutcome, TrackSession};

/// Capacity of the source → session channel.
pub const FEED_CHANNEL_CAPACITY: usize = 1024;

/// Source name that reads standard input.
pub const STDIN_SOURCE: &str = "-";

/// One receiver line and the time it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedLine {
    pub line: String,
    /// Unix seconds.
    pub received_at: f64,
}

/// Why the session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// All sources reached end of input.
    Exhausted,
    /// Shutdown signal fired.
    Interrupted,
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Spawn a reader task for `source`. The task ends at end of input, on a read
/// error, or when the session side hangs up.
pub fn spawn_source(source: String, tx: mpsc::Sender<FeedLine>) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let result = if source == STDIN_SOURCE {
            read_lines(BufReader::new(tokio::io::stdin()), &tx).await
        } else {
            match tokio::fs::File::open(&source).await {
                Ok(file) => read_lines(BufReader::new(file), &tx).await,
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(count) => {
                debug!(%source, lines = count, "source finished");
                count
            }
            Err(e) => {
                warn!(%source, error = %e, "source unreadable");
                0
            }
        }
    })
}

/// Forward every line from `reader`, stamped on arrival. Returns lines sent.
pub async fn read_lines<R>(reader: R, tx: &mpsc::Sender<FeedLine>) -> io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut sent = 0u64;

    while let Some(line) = lines.next_line().await? {
        let msg = FeedLine {
            line,
            received_at: unix_now(),
        };
        if tx.send(msg).await.is_err() {
            break;
        }
        sent += 1;
    }

    Ok(sent)
}

/// Drive `session` until every sender is dropped or `shutdown` completes.
///
/// Sources stamp lines independently, so channel order and stamp order can
/// disagree. The session clock never steps backwards: a line stamped earlier
/// than one already processed is processed at the later instant. `on_line`
/// sees each line with its outcome, in arrival order.
pub async fn run_session<S, F>(
    session: &mut TrackSession,
    mut rx: mpsc::Receiver<FeedLine>,
    shutdown: S,
    mut on_line: F,
) -> FeedEnd
where
    S: Future<Output = ()>,
    F: FnMut(&FeedLine, FrameOutcome),
{
    tokio::pin!(shutdown);
    let mut clock = f64::NEG_INFINITY;

    let end = loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break FeedEnd::Interrupted,
            msg = rx.recv() => match msg {
                Some(feed) => {
                    clock = clock.max(feed.received_at);
                    let outcome = session.process_line(&feed.line, clock);
                    on_line(&feed, outcome);
                }
                None => break FeedEnd::Exhausted,
            },
        }
    };

    let stats = session.stats();
    info!(
        lines = stats.lines,
        frames = stats.frames,
        positions = stats.resolved,
        ?end,
        "feed stopped"
    );
    end
}

/// Resolves when Ctrl-C is received. If the handler cannot be installed the
/// feed runs until its sources are exhausted.
pub async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, stopping"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
