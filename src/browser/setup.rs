//! Chromium executable resolution for local launches
//!
//! Lookup order: `BrowserSettings::executable`, well-known install locations,
//! the directories on `PATH`. When nothing is installed the launcher fetches a
//! managed build into the user cache directory.

use anyhow::{Context, Result};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use log::{debug, info};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Where a resolved executable came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableSource {
    Configured,
    InstallDir,
    SearchPath,
    Downloaded,
}

/// Why no local executable was resolved
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// An explicit path was configured but is not a file; no fallback.
    #[error("configured browser executable {} does not exist", .0.display())]
    ConfiguredMissing(PathBuf),
    /// Nothing installed; a managed download is the remaining option.
    #[error("no Chromium installation found")]
    NotInstalled,
}

const EXECUTABLE_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

fn install_dirs() -> Vec<PathBuf> {
    let fixed: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/google-chrome",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    let mut candidates: Vec<PathBuf> = fixed.iter().map(PathBuf::from).collect();
    if cfg!(target_os = "macos")
        && let Some(home) = dirs::home_dir()
    {
        candidates.push(home.join("Applications/Chromium.app/Contents/MacOS/Chromium"));
    }
    candidates
}

/// First `EXECUTABLE_NAMES` entry found in the directories of `path_var`.
fn search_path(path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var).find_map(|dir| {
        EXECUTABLE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Resolve an installed executable without downloading anything.
pub fn locate_installed(configured: Option<&Path>) -> Result<(PathBuf, ExecutableSource), LookupError> {
    if let Some(path) = configured {
        return if path.is_file() {
            Ok((path.to_path_buf(), ExecutableSource::Configured))
        } else {
            Err(LookupError::ConfiguredMissing(path.to_path_buf()))
        };
    }

    if let Some(path) = install_dirs().into_iter().find(|p| p.is_file()) {
        return Ok((path, ExecutableSource::InstallDir));
    }

    std::env::var_os("PATH")
        .and_then(|var| search_path(&var))
        .map(|path| (path, ExecutableSource::SearchPath))
        .ok_or(LookupError::NotInstalled)
}

/// Cache directory for managed Chromium builds.
fn managed_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("webdown")
        .join("chromium")
}

/// Fetch a managed Chromium (reused when already present) and return its
/// executable.
pub async fn fetch_managed() -> Result<PathBuf> {
    let dir = managed_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let options = BrowserFetcherOptions::builder()
        .with_path(&dir)
        .build()
        .context("Invalid browser fetcher options")?;
    debug!(target: "webdown::browser", "Fetching managed Chromium into {}", dir.display());
    let revision = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("Failed to fetch managed Chromium")?;

    info!(target: "webdown::browser", "Managed Chromium ready at {}", revision.executable_path.display());
    Ok(revision.executable_path)
}

/// Configured, installed, or downloaded executable, with its source.
pub async fn resolve_executable(configured: Option<&Path>) -> Result<(PathBuf, ExecutableSource)> {
    match locate_installed(configured) {
        Ok(found) => Ok(found),
        Err(LookupError::NotInstalled) => {
            info!(target: "webdown::browser", "No local Chromium installation; using a managed build");
            Ok((fetch_managed().await?, ExecutableSource::Downloaded))
        }
        Err(e) => Err(e.into()),
    }
}
