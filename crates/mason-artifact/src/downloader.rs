//! Concurrent artifact downloads
//!
//! The [`Downloader`] fetches artifact files (binaries, manifests, checksum
//! siblings) into a destination location. Requests run concurrently up to a
//! bounded limit, and at most one fetch is ever performed per
//! (source, destination) pair: a second request for the same pair receives
//! the existing future instead of re-fetching.

use crate::repository::FileLocation;
use futures::future::{BoxFuture, FutureExt, Shared};
use md5::Md5;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;

const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("artifact not found at {0}")]
    NotFound(String),

    #[error("download of {url} timed out")]
    TimedOut { url: String },

    #[error("{algorithm} checksum mismatch for {destination}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        destination: PathBuf,
        algorithm: &'static str,
        expected: String,
        actual: String,
    },
}

impl DownloadError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Whether an existing destination file is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Always replace the destination file
    #[default]
    Overwrite,
    /// Short-circuit without contacting the repository when the destination
    /// already exists
    SkipIfPresent,
}

/// One requested file: a source location fetched to a destination path.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub source: FileLocation,
    pub destination: PathBuf,
    pub overwrite: OverwritePolicy,
}

impl DownloadRequest {
    pub fn new(source: FileLocation, destination: impl Into<PathBuf>) -> Self {
        Self {
            source,
            destination: destination.into(),
            overwrite: OverwritePolicy::Overwrite,
        }
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Final state of one download.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    /// The file was fetched and written
    Completed { destination: PathBuf, bytes: u64 },
    /// The destination already existed and the policy kept it
    Skipped { destination: PathBuf },
    /// The fetch failed; sibling downloads are unaffected
    Failed(Arc<DownloadError>),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed(_))
    }
}

type SharedOutcome = Shared<BoxFuture<'static, DownloadOutcome>>;
type DownloadKey = (String, PathBuf);

/// Completion future for one request.
#[derive(Clone)]
pub struct DownloadHandle {
    future: SharedOutcome,
    runtime: tokio::runtime::Handle,
}

impl DownloadHandle {
    /// Block until the download finishes and return its outcome.
    pub fn wait(self) -> DownloadOutcome {
        self.runtime.block_on(self.future)
    }
}

/// Concurrently fetches artifact files with per-pair de-duplication.
pub struct Downloader {
    runtime: Runtime,
    client: reqwest::Client,
    limiter: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashMap<DownloadKey, SharedOutcome>>>,
    fetches: Arc<AtomicU64>,
    timeout: Option<Duration>,
}

impl Downloader {
    pub fn new() -> std::io::Result<Self> {
        Self::with_concurrency(DEFAULT_CONCURRENCY)
    }

    pub fn with_concurrency(limit: usize) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(limit.max(1))
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            client: reqwest::Client::new(),
            limiter: Arc::new(Semaphore::new(limit.max(1))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            fetches: Arc::new(AtomicU64::new(0)),
            timeout: None,
        })
    }

    /// Bound each fetch by a timeout. The default is no timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of underlying fetches actually performed
    pub fn fetches_performed(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Start (or join) the download for `request`.
    ///
    /// Requests for a (source, destination) pair that is already in flight or
    /// already completed successfully share the original future. A failed
    /// entry is evicted on completion so callers may retry.
    pub fn download(&self, request: DownloadRequest) -> DownloadHandle {
        let key: DownloadKey = (request.source.to_string(), request.destination.clone());

        let mut in_flight = self.in_flight.lock().expect("in-flight map poisoned");
        if let Some(existing) = in_flight.get(&key) {
            tracing::debug!(source = %request.source, "joining in-flight download");
            return DownloadHandle {
                future: existing.clone(),
                runtime: self.runtime.handle().clone(),
            };
        }

        let shared = self.spawn_fetch(request, key.clone());
        in_flight.insert(key, shared.clone());
        drop(in_flight);

        DownloadHandle {
            future: shared,
            runtime: self.runtime.handle().clone(),
        }
    }

    fn spawn_fetch(&self, request: DownloadRequest, key: DownloadKey) -> SharedOutcome {
        let client = self.client.clone();
        let limiter = self.limiter.clone();
        let in_flight = self.in_flight.clone();
        let fetches = self.fetches.clone();
        let timeout = self.timeout;

        let shared = async move {
            let outcome = match perform(client, limiter, fetches, timeout, &request).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::warn!(source = %request.source, error = %error, "download failed");
                    DownloadOutcome::Failed(Arc::new(error))
                }
            };

            // Failed entries are evicted so a retry can re-fetch; successes
            // stay memoized for at-most-one-fetch semantics.
            if !outcome.is_success() {
                in_flight
                    .lock()
                    .expect("in-flight map poisoned")
                    .remove(&key);
            }

            outcome
        }
        .boxed()
        .shared();

        // Drive the future even if nobody waits on the handle yet
        self.runtime.spawn(shared.clone());
        shared
    }
}

async fn perform(
    client: reqwest::Client,
    limiter: Arc<Semaphore>,
    fetches: Arc<AtomicU64>,
    timeout: Option<Duration>,
    request: &DownloadRequest,
) -> Result<DownloadOutcome, DownloadError> {
    if request.overwrite == OverwritePolicy::SkipIfPresent && request.destination.exists() {
        tracing::debug!(destination = %request.destination.display(), "destination present, skipping");
        return Ok(DownloadOutcome::Skipped {
            destination: request.destination.clone(),
        });
    }

    let _permit = limiter.acquire().await.expect("semaphore closed");

    fetches.fetch_add(1, Ordering::Relaxed);
    let bytes = fetch(&client, &request.source, timeout).await?;
    let bytes = bytes.ok_or_else(|| DownloadError::NotFound(request.source.to_string()))?;

    write_destination(&request.destination, &bytes)?;

    // Checksum siblings guard the binary itself; checksum files and manifests
    // have no siblings of their own.
    if should_verify(&request.destination) {
        if let Err(error) = verify_checksums(&client, request, &bytes, timeout).await {
            let _ = fs::remove_file(&request.destination);
            return Err(error);
        }
    }

    tracing::info!(
        source = %request.source,
        destination = %request.destination.display(),
        bytes = bytes.len(),
        "download complete"
    );

    Ok(DownloadOutcome::Completed {
        destination: request.destination.clone(),
        bytes: bytes.len() as u64,
    })
}

/// Fetch the raw bytes at `source`; `None` when the source does not exist.
async fn fetch(
    client: &reqwest::Client,
    source: &FileLocation,
    timeout: Option<Duration>,
) -> Result<Option<Vec<u8>>, DownloadError> {
    match source {
        FileLocation::Local(path) => {
            if !path.exists() {
                return Ok(None);
            }
            fs::read(path)
                .map(Some)
                .map_err(|e| DownloadError::io(path, e))
        }
        FileLocation::Remote(url) => {
            let send = client.get(url.as_str()).send();
            let response = match timeout {
                Some(limit) => tokio::time::timeout(limit, send).await.map_err(|_| {
                    DownloadError::TimedOut { url: url.clone() }
                })?,
                None => send.await,
            }
            .map_err(|source| DownloadError::Http {
                url: url.clone(),
                source,
            })?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let response =
                response
                    .error_for_status()
                    .map_err(|source| DownloadError::Http {
                        url: url.clone(),
                        source,
                    })?;
            let body = response
                .bytes()
                .await
                .map_err(|source| DownloadError::Http {
                    url: url.clone(),
                    source,
                })?;
            Ok(Some(body.to_vec()))
        }
    }
}

fn write_destination(destination: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
    }

    // Temp file + rename; concurrent requests for the same destination are
    // already serialized by the in-flight map.
    let mut staging = destination.as_os_str().to_os_string();
    staging.push(".part");
    let staging = PathBuf::from(staging);
    fs::write(&staging, bytes).map_err(|e| DownloadError::io(&staging, e))?;
    fs::rename(&staging, destination).map_err(|e| DownloadError::io(destination, e))?;
    Ok(())
}

fn should_verify(destination: &Path) -> bool {
    !matches!(
        destination.extension().and_then(|ext| ext.to_str()),
        Some("md5") | Some("sha1") | Some("part")
    )
}

/// Fetch `.md5` / `.sha1` siblings of the source and verify the downloaded
/// bytes against whichever are present. A missing sibling is not an error.
async fn verify_checksums(
    client: &reqwest::Client,
    request: &DownloadRequest,
    bytes: &[u8],
    timeout: Option<Duration>,
) -> Result<(), DownloadError> {
    for algorithm in ["md5", "sha1"] {
        let sibling = checksum_sibling(&request.source, algorithm);
        let Some(content) = fetch(client, &sibling, timeout).await? else {
            continue;
        };
        let Some(expected) = first_token(&content) else {
            continue;
        };

        let actual = match algorithm {
            "md5" => hex_digest(Md5::new(), bytes),
            _ => hex_digest(Sha1::new(), bytes),
        };

        if !actual.eq_ignore_ascii_case(&expected) {
            return Err(DownloadError::ChecksumMismatch {
                destination: request.destination.clone(),
                algorithm: if algorithm == "md5" { "md5" } else { "sha1" },
                expected,
                actual,
            });
        }
    }

    Ok(())
}

fn checksum_sibling(source: &FileLocation, algorithm: &str) -> FileLocation {
    match source {
        FileLocation::Local(path) => {
            let mut name = path.as_os_str().to_os_string();
            name.push(format!(".{algorithm}"));
            FileLocation::Local(PathBuf::from(name))
        }
        FileLocation::Remote(url) => FileLocation::Remote(format!("{url}.{algorithm}")),
    }
}

fn hex_digest<D: Digest>(mut digest: D, bytes: &[u8]) -> String {
    digest.update(bytes);
    digest
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Checksum files carry the hex digest as their first whitespace token.
fn first_token(content: &[u8]) -> Option<String> {
    String::from_utf8_lossy(content)
        .split_whitespace()
        .next()
        .map(str::to_string)
}
