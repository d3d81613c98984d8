//! Asset provisioning.
//!
//! An asset is a single file fetched over HTTP into the install directory.
//! Downloads stream into a temporary file next to the destination and are
//! renamed into place only once complete, so a failed or cancelled fetch
//! never leaves a file at the destination path.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::NamedTempFile;
use url::Url;

use crate::core::InstallError;
use crate::sources::http::HttpClient;
use crate::util::cancel::CancelToken;
use crate::util::fs::{ensure_dir, set_executable};
use crate::util::hash::check_sha256;

const CHUNK_SIZE: usize = 64 * 1024;

/// A file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub url: String,
    pub dest: PathBuf,
    /// Expected lowercase hex sha256 of the file, if known.
    pub sha256: Option<String>,
    pub executable: bool,
}

impl Asset {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Asset {
            url: url.into(),
            dest: dest.into(),
            sha256: None,
            executable: false,
        }
    }

    /// Mark the file executable once fetched.
    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }
}

/// What provisioning did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    AlreadyPresent,
    Downloaded { bytes: u64 },
}

/// Ensures assets exist locally.
pub struct AssetProvisioner<'a> {
    http: &'a dyn HttpClient,
    cancel: &'a CancelToken,
    show_progress: bool,
}

impl<'a> AssetProvisioner<'a> {
    pub fn new(http: &'a dyn HttpClient, cancel: &'a CancelToken) -> Self {
        AssetProvisioner {
            http,
            cancel,
            show_progress: false,
        }
    }

    /// Show a byte progress bar per download.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Fetch `asset` unless its destination already exists.
    pub fn provision(&self, asset: &Asset) -> Result<Provisioned, InstallError> {
        if asset.dest.exists() {
            tracing::debug!(path = %asset.dest.display(), "asset already present");
            return Ok(Provisioned::AlreadyPresent);
        }

        let url = Url::parse(&asset.url).map_err(|e| InstallError::transport(&asset.url, e))?;
        let dir = asset
            .dest
            .parent()
            .ok_or_else(|| anyhow!("asset path has no parent: {}", asset.dest.display()))?;
        ensure_dir(dir)?;

        tracing::info!(url = %url, "downloading {}", asset.dest.display());
        let response = self
            .http
            .get(url.as_str())
            .map_err(|e| InstallError::transport(&asset.url, format!("{:#}", e)))?;
        if !response.is_success() {
            return Err(InstallError::transport(
                &asset.url,
                format!("HTTP {}", response.status),
            ));
        }

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
        let pb = self.progress_bar(response.content_length, &asset.dest);
        let bytes = self.stream(response.body, &mut tmp, &asset.url, &pb);
        pb.finish_and_clear();
        let bytes = bytes?;

        tmp.flush().context("failed to flush download")?;

        if let Some(expected) = &asset.sha256 {
            if let Some(actual) = check_sha256(tmp.path(), expected)? {
                return Err(InstallError::transport(
                    &asset.url,
                    format!("checksum mismatch: expected {}, got {}", expected, actual),
                ));
            }
        }
        if asset.executable {
            set_executable(tmp.path())?;
        }

        tmp.persist(&asset.dest)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to move download into {}", asset.dest.display()))?;

        tracing::info!(bytes, "saved {}", asset.dest.display());
        Ok(Provisioned::Downloaded { bytes })
    }

    fn stream(
        &self,
        mut body: Box<dyn Read + Send>,
        out: &mut NamedTempFile,
        url: &str,
        pb: &ProgressBar,
    ) -> Result<u64, InstallError> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                return Err(InstallError::cancelled(format!("download of {}", url)));
            }
            let n = body
                .read(&mut buf)
                .map_err(|e| InstallError::transport(url, e))?;
            if n == 0 {
                return Ok(total);
            }
            out.write_all(&buf[..n])
                .context("failed to write download to disk")?;
            total += n as u64;
            pb.set_position(total);
        }
    }

    fn progress_bar(&self, len: Option<u64>, dest: &std::path::Path) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pb = match len {
            Some(len) => {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            }
        };
        pb.set_message(name);
        pb
    }
}
