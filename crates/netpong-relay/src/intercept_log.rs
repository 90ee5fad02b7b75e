use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use netpong_core::time::epoch_ms;

/// Which way a frame was travelling through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "c->s")]
    ClientToServer,
    #[serde(rename = "s->c")]
    ServerToClient,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::ClientToServer => write!(f, "c->s"),
            Direction::ServerToClient => write!(f, "s->c"),
        }
    }
}

/// One line of the interception log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub dir: Direction,
    pub ts: u64,
    pub raw: String,
}

#[derive(Debug)]
pub enum LogError {
    Io(std::io::Error),
    Encode(serde_json::Error),
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "log I/O error: {e}"),
            Self::Encode(e) => write!(f, "log encode error: {e}"),
        }
    }
}

impl std::error::Error for LogError {}

impl From<std::io::Error> for LogError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for LogError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e)
    }
}

#[derive(Debug)]
enum LogOp {
    Record(LogRecord),
    Sync(oneshot::Sender<()>),
}

/// Handle to the append-only interception log. Recording never blocks the
/// caller; lines are written in order by a background task.
#[derive(Debug, Clone)]
pub struct InterceptLog {
    tx: mpsc::UnboundedSender<LogOp>,
    path: Arc<PathBuf>,
}

impl InterceptLog {
    /// Start the writer task for `path`. The file is opened lazily in append
    /// mode; open and write failures are logged and the line is dropped.
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = Arc::new(path.into());
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(Arc::clone(&path), rx));
        Self { tx, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one frame for the log, stamped with the current time.
    pub fn record(&self, dir: Direction, raw: &str) {
        let record = LogRecord {
            dir,
            ts: epoch_ms(),
            raw: raw.to_string(),
        };
        if self.tx.send(LogOp::Record(record)).is_err() {
            tracing::warn!(path = %self.path.display(), "Log writer stopped, frame not logged");
        }
    }

    /// Wait until every record queued before this call has been written.
    pub async fn sync(&self) {
        let (done, rx) = oneshot::channel();
        if self.tx.send(LogOp::Sync(done)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run_writer(path: Arc<PathBuf>, mut rx: mpsc::UnboundedReceiver<LogOp>) {
    let mut file: Option<File> = None;

    while let Some(op) = rx.recv().await {
        match op {
            LogOp::Record(record) => {
                if file.is_none() {
                    match open_append(&path).await {
                        Ok(f) => file = Some(f),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "Failed to open intercept log");
                            continue;
                        },
                    }
                }
                let Some(f) = file.as_mut() else {
                    continue;
                };
                if let Err(e) = write_record(f, &record).await {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to write intercept log");
                    // Reopen on the next record.
                    file = None;
                }
            },
            LogOp::Sync(done) => {
                let _ = done.send(());
            },
        }
    }
}

async fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
}

async fn write_record(file: &mut File, record: &LogRecord) -> Result<(), LogError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Parse log text, keeping only well-formed lines.
pub fn parse_records(text: &str) -> impl Iterator<Item = LogRecord> + '_ {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
}

/// Read the last `n` records in direction `dir`, oldest first. A missing
/// file is an empty log.
pub async fn read_tail(path: &Path, n: usize, dir: Direction) -> Result<Vec<LogRecord>, LogError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let matching: Vec<LogRecord> = parse_records(&text).filter(|r| r.dir == dir).collect();
    let skip = matching.len().saturating_sub(n);
    Ok(matching.into_iter().skip(skip).collect())
}
