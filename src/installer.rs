// src/installer.rs

//! Transactional plan application
//!
//! Removals are staged (moved aside into a temporary directory, never
//! deleted) before any install hook runs, so a failure at any point can
//! put every file back where it was. Committing deletes the staged
//! copies; rolling back moves them home. Files land at their final
//! destination during the install phase, so nothing needs a second move
//! on commit.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::dist::CatalogRelease;
use crate::error::{Error, Result};
use crate::resolver::InstallationPlan;

/// Per-distribution install hook
///
/// `install` must be idempotent: plans may carry duplicate entries for
/// the same release.
pub trait InstallBackend {
    /// Install one release under `target`, returning the files written
    fn install(&mut self, release: &CatalogRelease, target: &Path) -> Result<Vec<PathBuf>>;

    /// Best-effort removal of a release installed earlier in this run
    fn uninstall(&mut self, release: &CatalogRelease) -> Result<()>;
}

/// Apply an installation plan as one all-or-nothing operation
///
/// A non-empty conflict list fails with `InstallationConflict` before the
/// filesystem is touched at all. Otherwise removals are staged, the
/// install hooks run against `install_path` (or a fresh temporary root
/// when none is given), and only a fully successful install phase commits
/// the staged removals. Any install failure uninstalls what this call
/// installed, restores the staged files, and re-raises the cause wrapped
/// in `Error::Install`. A failure while restoring staged files is the
/// fatal `Error::Rollback`.
pub fn apply_plan(
    plan: &InstallationPlan,
    backend: &mut dyn InstallBackend,
    install_path: Option<&Path>,
) -> Result<()> {
    if !plan.conflict.is_empty() {
        return Err(Error::InstallationConflict(plan.conflict.clone()));
    }

    // Phase 1: stage removals aside so rollback is a pure move-back
    let mut staging: Option<TempDir> = None;
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
    if !plan.remove.is_empty() {
        let dir = TempDir::new()?;
        if let Err(e) = stage_removals(plan, dir.path(), &mut staged) {
            let mut stage_dir = Some(dir);
            restore_staged(&staged, &mut stage_dir)?;
            return Err(e);
        }
        staging = Some(dir);
    }

    // Phase 2: run the install hooks
    if !plan.install.is_empty() {
        let target = match install_path {
            Some(path) => path.to_path_buf(),
            None => match TempDir::new() {
                Ok(dir) => {
                    let root = dir.into_path();
                    info!("no install path given, installing under {}", root.display());
                    root
                }
                Err(e) => {
                    restore_staged(&staged, &mut staging)?;
                    if let Some(dir) = staging {
                        close_staging(dir);
                    }
                    return Err(e.into());
                }
            },
        };

        let mut completed: Vec<&CatalogRelease> = Vec::new();
        for release in &plan.install {
            info!("installing {}", release);
            match backend.install(release, &target) {
                Ok(files) => {
                    debug!("installed {} files for {}", files.len(), release);
                    completed.push(release);
                }
                Err(e) => {
                    warn!("install of {} failed, rolling back", release);
                    // Best-effort cleanup of everything this phase
                    // installed; a failed cleanup is surfaced but must not
                    // stop the rest of the rollback
                    for done in completed.iter().rev() {
                        if let Err(cleanup_err) = backend.uninstall(done) {
                            warn!("cleanup of {} failed: {}", done, cleanup_err);
                        }
                    }
                    restore_staged(&staged, &mut staging)?;
                    if let Some(dir) = staging {
                        close_staging(dir);
                    }
                    return Err(Error::Install {
                        dist: release.to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    // Phase 3: commit; the staged copies are no longer needed
    if let Some(dir) = staging {
        close_staging(dir);
    }
    info!(
        "plan applied: {} installed, {} removed",
        plan.install.len(),
        plan.remove.len()
    );
    Ok(())
}

/// Move every file owned by the removal set under `stage_root`,
/// preserving relative structure and recording (original, staged) pairs
fn stage_removals(
    plan: &InstallationPlan,
    stage_root: &Path,
    staged: &mut Vec<(PathBuf, PathBuf)>,
) -> Result<()> {
    for dist in &plan.remove {
        debug!("staging removal of {}", dist);
        for file in &dist.installed_files {
            let parked = staged_path(stage_root, file);
            move_file(file, &parked)?;
            staged.push((file.clone(), parked));
        }
    }
    Ok(())
}

/// Move every staged file back to its original location
///
/// A failure here is fatal: the staging directory is disarmed (kept on
/// disk) so the not-yet-restored files survive for manual recovery.
fn restore_staged(staged: &[(PathBuf, PathBuf)], staging: &mut Option<TempDir>) -> Result<()> {
    for (original, parked) in staged {
        if !parked.exists() {
            continue;
        }
        if let Err(e) = move_file(parked, original) {
            let kept = staging
                .take()
                .map(|dir| dir.into_path())
                .map(|path| format!(" (staged files kept at {})", path.display()))
                .unwrap_or_default();
            return Err(Error::Rollback(format!(
                "could not restore {}: {}{}",
                original.display(),
                e,
                kept
            )));
        }
    }
    Ok(())
}

fn close_staging(dir: TempDir) {
    if let Err(e) = dir.close() {
        warn!("failed to clean staging directory: {}", e);
    }
}

/// Mirror an absolute path under the staging root
fn staged_path(stage_root: &Path, original: &Path) -> PathBuf {
    let mut relative = PathBuf::new();
    for component in original.components() {
        if let Component::Normal(part) = component {
            relative.push(part);
        }
    }
    stage_root.join(relative)
}

/// Move a file, falling back to copy+remove when rename crosses
/// filesystems
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// Default install hook: download a release through the catalog and
/// unpack its gzip tarball into the target root
///
/// Keeps the list of files it wrote per release so `uninstall` can remove
/// them again and callers can record them in the metadata store.
pub struct TarballBackend<'a> {
    catalog: &'a dyn Catalog,
    installed: HashMap<String, Vec<PathBuf>>,
}

impl<'a> TarballBackend<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            installed: HashMap::new(),
        }
    }

    /// Files written for a release during this run
    pub fn installed_files(&self, release: &CatalogRelease) -> Option<&[PathBuf]> {
        self.installed
            .get(&release.to_string())
            .map(Vec::as_slice)
    }
}

impl InstallBackend for TarballBackend<'_> {
    fn install(&mut self, release: &CatalogRelease, target: &Path) -> Result<Vec<PathBuf>> {
        let scratch = TempDir::new()?;
        let archive_path = self.catalog.download(release, scratch.path())?;

        debug!(
            "unpacking {} into {}",
            archive_path.display(),
            target.display()
        );
        fs::create_dir_all(target)?;

        let file = File::open(&archive_path)?;
        let mut archive = Archive::new(GzDecoder::new(file));
        let mut files = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.into_owned();
            let is_file = entry.header().entry_type().is_file();
            entry.unpack_in(target)?;
            if is_file {
                files.push(target.join(path));
            }
        }

        self.installed.insert(release.to_string(), files.clone());
        Ok(files)
    }

    fn uninstall(&mut self, release: &CatalogRelease) -> Result<()> {
        let Some(files) = self.installed.remove(&release.to_string()) else {
            return Ok(());
        };
        for file in files {
            if file.exists() {
                fs::remove_file(&file)?;
            }
        }
        Ok(())
    }
}
