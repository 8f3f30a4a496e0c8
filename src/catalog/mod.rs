// src/catalog/mod.rs

//! Catalog collaborators
//!
//! A catalog lists the releases of remote projects and hands out their
//! declared requirements and artifacts. Resolution takes the catalog as
//! an explicit trait object, so it runs against the in-memory fixture
//! below as easily as against a remote HTTP index.

pub mod http;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dist::CatalogRelease;
use crate::error::{Error, Result};
use crate::version::VersionPredicate;

/// Remote project catalog, consumed by the resolver and install backends
pub trait Catalog {
    /// All releases of the requirement's project that satisfy its
    /// predicate, in catalog order
    ///
    /// Fails with `ProjectNotFound` when the project is unknown; returns
    /// an empty list when the project exists but nothing matches.
    fn get_releases(&self, requirement: &str) -> Result<Vec<CatalogRelease>>;

    /// Declared requirement strings of a release
    fn fetch_requirements(&self, release: &CatalogRelease) -> Result<Vec<String>>;

    /// Fetch the release artifact into `dest_dir`, returning its path
    fn download(&self, release: &CatalogRelease, dest_dir: &Path) -> Result<PathBuf>;
}

/// In-memory catalog for tests and embedded use
///
/// Releases are stored per project in insertion order. Artifacts are
/// optional local files registered per release.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    projects: HashMap<String, Vec<CatalogRelease>>,
    artifacts: HashMap<String, PathBuf>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release under its project name
    pub fn add_release(&mut self, release: CatalogRelease) {
        self.projects
            .entry(release.name.to_ascii_lowercase())
            .or_default()
            .push(release);
    }

    /// Register a local artifact file for a release
    pub fn add_artifact(&mut self, release: &CatalogRelease, path: PathBuf) {
        self.artifacts.insert(release.to_string(), path);
    }

    fn stored_release(&self, release: &CatalogRelease) -> Option<&CatalogRelease> {
        self.projects
            .get(&release.name.to_ascii_lowercase())?
            .iter()
            .find(|r| r.version == release.version)
    }
}

impl Catalog for MemoryCatalog {
    fn get_releases(&self, requirement: &str) -> Result<Vec<CatalogRelease>> {
        let predicate = VersionPredicate::parse(requirement)?;
        let releases = self
            .projects
            .get(&predicate.name.to_ascii_lowercase())
            .ok_or_else(|| Error::ProjectNotFound(predicate.name.clone()))?;

        Ok(releases
            .iter()
            .filter(|r| predicate.matches(&r.version))
            .cloned()
            .collect())
    }

    fn fetch_requirements(&self, release: &CatalogRelease) -> Result<Vec<String>> {
        self.stored_release(release)
            .map(|r| r.requires.clone())
            .ok_or_else(|| Error::ReleaseNotFound(release.to_string()))
    }

    fn download(&self, release: &CatalogRelease, dest_dir: &Path) -> Result<PathBuf> {
        let source = self
            .artifacts
            .get(&release.to_string())
            .ok_or_else(|| Error::Download(format!("no artifact for {}", release)))?;

        fs::create_dir_all(dest_dir)?;
        let file_name = source
            .file_name()
            .ok_or_else(|| Error::Download(format!("bad artifact path for {}", release)))?;
        let dest = dest_dir.join(file_name);
        fs::copy(source, &dest)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(name: &str, version: &str, requires: &[&str]) -> CatalogRelease {
        let mut r = CatalogRelease::new(name, version).unwrap();
        r.requires = requires.iter().map(|s| s.to_string()).collect();
        r
    }

    #[test]
    fn test_get_releases_filters_by_predicate() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("bacon", "0.1", &[]));
        catalog.add_release(release("bacon", "0.2", &[]));
        catalog.add_release(release("bacon", "0.3", &[]));

        let matching = catalog.get_releases("bacon (>=0.2)").unwrap();
        assert_eq!(matching.len(), 2);
        assert_eq!(matching[0].version.as_str(), "0.2");
    }

    #[test]
    fn test_unknown_project_is_an_error() {
        let catalog = MemoryCatalog::new();
        let result = catalog.get_releases("ghost");
        assert!(matches!(result, Err(Error::ProjectNotFound(name)) if name == "ghost"));
    }

    #[test]
    fn test_known_project_no_match_is_empty() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("bacon", "0.1", &[]));
        let matching = catalog.get_releases("bacon (>=9.0)").unwrap();
        assert!(matching.is_empty());
    }

    #[test]
    fn test_fetch_requirements_round_trip() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("choxie", "2.0.0.9", &["towel-stuff (0.1)"]));

        let found = catalog.get_releases("choxie").unwrap();
        let requires = catalog.fetch_requirements(&found[0]).unwrap();
        assert_eq!(requires, vec!["towel-stuff (0.1)".to_string()]);
    }

    #[test]
    fn test_download_without_artifact_fails() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("bacon", "0.1", &[]));
        let found = catalog.get_releases("bacon").unwrap();

        let temp = tempfile::tempdir().unwrap();
        assert!(catalog.download(&found[0], temp.path()).is_err());
    }
}
