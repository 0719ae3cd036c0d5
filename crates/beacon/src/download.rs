use beacon_core::{HttpRequest, HttpTransport, TransportError, USER_AGENT};
use futures_util::StreamExt;
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context} ({path}): {source}")]
    Io {
        context: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: TransportError,
    },
    #[error("Download from {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

impl DownloadError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.display().to_string(),
            source,
        }
    }

    fn transport(context: &'static str, source: TransportError) -> Self {
        Self::Transport { context, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Downloads are disabled or there was nothing to download.
    Skipped,
    /// The artifact was already in place; nothing was fetched.
    Exists,
    Downloaded { bytes: u64 },
}

/// Fetches release artifacts into the update folder.
///
/// The body is streamed into a temporary file beside the destination and
/// only moved into place once complete (and verified, when a digest is
/// known), so a failed download never leaves a partial artifact behind.
#[derive(Clone)]
pub struct DownloadManager {
    transport: Arc<dyn HttpTransport>,
    enabled: bool,
}

impl DownloadManager {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, enabled: bool) -> Self {
        Self { transport, enabled }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Download `link` to `destination` unless it is already there.
    ///
    /// # Errors
    /// Returns an error when the request fails, the server answers anything
    /// but HTTP 200, the digest does not match, or the file cannot be
    /// written.
    pub async fn attempt_download(
        &self,
        link: Option<&str>,
        destination: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<DownloadOutcome, DownloadError> {
        if !self.enabled {
            return Ok(DownloadOutcome::Skipped);
        }
        let Some(link) = link.map(str::trim).filter(|link| !link.is_empty()) else {
            return Ok(DownloadOutcome::Skipped);
        };

        if tokio::fs::try_exists(destination).await.unwrap_or(false) {
            debug!("Artifact already present at {}", destination.display());
            return Ok(DownloadOutcome::Exists);
        }

        let dir = destination.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|error| DownloadError::io("failed to create update folder", dir, error))?;

        info!("Downloading update from {link}");
        let request = HttpRequest::get(link, DOWNLOAD_TIMEOUT).header("User-Agent", USER_AGENT);
        let response = self
            .transport
            .get(request)
            .await
            .map_err(|error| DownloadError::transport("download request failed", error))?;

        if response.status() != 200 {
            return Err(DownloadError::Status {
                url: link.to_string(),
                status: response.status(),
            });
        }

        let temp = tempfile::Builder::new()
            .prefix(".beacon-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|error| DownloadError::io("failed to create temporary download file", dir, error))?;
        let handle = temp
            .reopen()
            .map_err(|error| DownloadError::io("failed to open temporary download file", temp.path(), error))?;
        let mut file = tokio::fs::File::from_std(handle);

        let mut hasher = Sha256::new();
        let mut bytes: u64 = 0;
        let mut body = response.into_body();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|error| DownloadError::transport("download stream error", error))?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|error| DownloadError::io("failed to write download data", temp.path(), error))?;
            bytes += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|error| DownloadError::io("failed to flush download file", temp.path(), error))?;
        file.sync_all()
            .await
            .map_err(|error| DownloadError::io("failed to sync download file", temp.path(), error))?;
        drop(file);

        if let Some(expected) = expected_sha256 {
            let actual = format!("{:x}", hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(DownloadError::ChecksumMismatch {
                    url: link.to_string(),
                    expected: expected.to_ascii_lowercase(),
                    actual,
                });
            }
            debug!("Checksum verified for {link}");
        }

        match temp.persist_noclobber(destination) {
            Ok(_) => {}
            Err(error) if error.error.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(
                    "Artifact appeared at {} while downloading",
                    destination.display()
                );
                return Ok(DownloadOutcome::Exists);
            }
            Err(error) => {
                return Err(DownloadError::io(
                    "failed to move download into place",
                    destination,
                    error.error,
                ));
            }
        }

        if !tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return Err(DownloadError::io(
                "download vanished after being moved into place",
                destination,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        info!("Downloaded {bytes} bytes to {}", destination.display());
        Ok(DownloadOutcome::Downloaded { bytes })
    }
}
