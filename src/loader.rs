use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use flume::{Receiver, TryRecvError};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::record::RawUser;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("asset not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("reading {} failed: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("malformed user list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid source '{0}'")]
    InvalidSource(String),
    #[error("loader stopped before delivering a result")]
    Disconnected,
}

/// Where the user list is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

impl Source {
    /// Urls are kept verbatim, everything else is a path with `~` and `$VAR` expanded.
    pub fn parse(text: &str) -> Result<Self, FetchError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FetchError::InvalidSource(text.to_string()));
        }
        if text.starts_with("http://") || text.starts_with("https://") {
            return Ok(Source::Url(text.to_string()));
        }
        let expanded = shellexpand::full(text)
            .map_err(|e| FetchError::InvalidSource(format!("{text}: {e}")))?;
        Ok(Source::File(PathBuf::from(expanded.as_ref())))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Url(url) => write!(f, "{url}"),
        }
    }
}

pub type LoadResult = Result<Vec<RawUser>, FetchError>;

/// Fetch and parse the user list. Blocks until the whole document is read.
pub fn load(source: &Source) -> LoadResult {
    let start_time = Instant::now();
    info!("Loading users from {source} ...");

    let body = match source {
        Source::File(path) => read_file(path)?,
        Source::Url(url) => fetch_url(url)?,
    };
    debug!("Fetched {} bytes", body.len());

    let users: Vec<RawUser> = serde_json::from_slice(&body)?;

    let loading_duration = start_time.elapsed().as_millis();
    info!("Loaded {} users in {loading_duration}ms", users.len());
    Ok(users)
}

fn read_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FetchError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => FetchError::PermissionDenied(path.to_path_buf()),
        _ => FetchError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn fetch_url(url: &str) -> Result<Vec<u8>, FetchError> {
    let response = reqwest::blocking::get(url)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(response.bytes()?.to_vec())
}

/// A load running on a worker thread.
pub struct PendingLoad {
    receiver: Receiver<LoadResult>,
}

impl PendingLoad {
    /// Non blocking. Returns the result once, after the worker finished.
    pub fn poll(&self) -> Option<LoadResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(FetchError::Disconnected)),
        }
    }
}

/// Start the single load of this session. Dropping the handle discards the result.
pub fn spawn_load(source: Source) -> PendingLoad {
    let (sender, receiver) = flume::bounded(1);
    thread::spawn(move || {
        let result = load(&source);
        if let Err(e) = &result {
            error!("Loading {source} failed: {e}");
        }
        if sender.send(result).is_err() {
            debug!("Load result discarded, nobody is waiting for it");
        }
    });
    PendingLoad { receiver }
}
