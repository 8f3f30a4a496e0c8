// src/catalog/http.rs

//! HTTP catalog client
//!
//! Fetches a JSON index (`catalog.json`) describing projects and their
//! releases, with retry support, and downloads release artifacts with
//! checksum verification. The index is fetched once when the catalog is
//! opened, so one `HttpCatalog` value corresponds to one resolution
//! session over one consistent snapshot.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Catalog;
use crate::dist::CatalogRelease;
use crate::error::{Error, Result};
use crate::version::{Version, VersionPredicate};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Index age beyond which a warning is logged (seconds)
const INDEX_STALE_SECS: i64 = 7 * 24 * 3600;

/// Catalog index format (simple JSON document at `<base>/catalog.json`)
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogIndex {
    pub name: String,
    /// RFC 3339 timestamp of index generation
    pub generated_at: Option<String>,
    pub projects: Vec<ProjectEntry>,
}

/// One project in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub releases: Vec<ReleaseEntry>,
}

/// One release of a project in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub version: String,

    /// Declared requirement strings
    #[serde(default)]
    pub requires: Vec<String>,

    /// Full URL to download the release artifact
    pub download_url: Option<String>,

    /// SHA-256 checksum of the artifact
    pub checksum: Option<String>,

    /// Artifact size in bytes
    pub size: Option<u64>,
}

/// Blocking catalog client over a remote JSON index
pub struct HttpCatalog {
    client: Client,
    index: CatalogIndex,
    max_retries: u32,
}

impl HttpCatalog {
    /// Fetch the index from `base_url` and open a catalog session
    pub fn fetch(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;

        let index = fetch_index(&client, base_url, MAX_RETRIES)?;
        log_index_age(&index);

        Ok(Self {
            client,
            index,
            max_retries: MAX_RETRIES,
        })
    }

    /// Build a catalog session over an already-parsed index
    pub fn from_index(index: CatalogIndex) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            index,
            max_retries: MAX_RETRIES,
        })
    }

    fn project(&self, name: &str) -> Option<&ProjectEntry> {
        self.index
            .projects
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn release_entry(&self, release: &CatalogRelease) -> Option<&ReleaseEntry> {
        self.project(&release.name)?
            .releases
            .iter()
            .find(|e| {
                Version::parse(&e.version)
                    .map(|v| v == release.version)
                    .unwrap_or(false)
            })
    }
}

impl Catalog for HttpCatalog {
    fn get_releases(&self, requirement: &str) -> Result<Vec<CatalogRelease>> {
        let predicate = VersionPredicate::parse(requirement)?;
        let project = self
            .project(&predicate.name)
            .ok_or_else(|| Error::ProjectNotFound(predicate.name.clone()))?;

        let mut releases = Vec::new();
        for entry in &project.releases {
            let version = match Version::parse(&entry.version) {
                Ok(v) => v,
                Err(_) => {
                    warn!(
                        "skipping unparseable version '{}' of project '{}'",
                        entry.version, project.name
                    );
                    continue;
                }
            };
            if !predicate.matches(&version) {
                continue;
            }
            releases.push(CatalogRelease {
                name: project.name.clone(),
                version,
                provides: Vec::new(),
                requires: entry.requires.clone(),
                download_url: entry.download_url.clone(),
                checksum: entry.checksum.clone(),
                size: entry.size,
            });
        }
        Ok(releases)
    }

    fn fetch_requirements(&self, release: &CatalogRelease) -> Result<Vec<String>> {
        self.release_entry(release)
            .map(|e| e.requires.clone())
            .ok_or_else(|| Error::ReleaseNotFound(release.to_string()))
    }

    fn download(&self, release: &CatalogRelease, dest_dir: &Path) -> Result<PathBuf> {
        let url = release.download_url.as_ref().ok_or_else(|| {
            Error::Download(format!("no download URL for {}", release))
        })?;

        fs::create_dir_all(dest_dir)?;
        let default_name = format!("{}-{}.tar.gz", release.name, release.version);
        let file_name = url
            .split('/')
            .next_back()
            .filter(|s| !s.is_empty())
            .unwrap_or(&default_name);
        let dest_path = dest_dir.join(file_name);

        download_file(&self.client, url, &dest_path, self.max_retries)?;

        if let Some(expected) = &release.checksum {
            verify_checksum(&dest_path, expected)?;
        }

        Ok(dest_path)
    }
}

/// Fetch and parse the catalog index with retry support
fn fetch_index(client: &Client, base_url: &str, max_retries: u32) -> Result<CatalogIndex> {
    let index_url = if base_url.ends_with('/') {
        format!("{}catalog.json", base_url)
    } else {
        format!("{}/catalog.json", base_url)
    };

    info!("Fetching catalog index from {}", index_url);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.get(&index_url).send() {
            Ok(response) => {
                if !response.status().is_success() {
                    return Err(Error::Download(format!(
                        "HTTP {} from {}",
                        response.status(),
                        index_url
                    )));
                }

                let index: CatalogIndex = response.json().map_err(|e| {
                    Error::Download(format!("Failed to parse catalog index JSON: {}", e))
                })?;

                info!(
                    "Fetched catalog '{}' with {} projects",
                    index.name,
                    index.projects.len()
                );
                return Ok(index);
            }
            Err(e) => {
                if attempt >= max_retries {
                    return Err(Error::Download(format!(
                        "Failed to fetch catalog index after {} attempts: {}",
                        attempt, e
                    )));
                }
                warn!("Index fetch attempt {} failed: {}, retrying...", attempt, e);
                std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
            }
        }
    }
}

/// Download a file to the specified path with retry support
///
/// Writes to a `.tmp` sibling first, then renames into place so partial
/// downloads never shadow a good artifact.
fn download_file(client: &Client, url: &str, dest_path: &Path, max_retries: u32) -> Result<()> {
    info!("Downloading {} to {}", url, dest_path.display());

    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.get(url).send() {
            Ok(mut response) => {
                if !response.status().is_success() {
                    return Err(Error::Download(format!(
                        "HTTP {} from {}",
                        response.status(),
                        url
                    )));
                }

                let temp_path = dest_path.with_extension("tmp");
                let mut file = File::create(&temp_path)?;
                io::copy(&mut response, &mut file)
                    .map_err(|e| Error::Download(format!("Failed to write artifact: {}", e)))?;
                fs::rename(&temp_path, dest_path)?;

                debug!("Downloaded to {}", dest_path.display());
                return Ok(());
            }
            Err(e) => {
                if attempt >= max_retries {
                    return Err(Error::Download(format!(
                        "Failed to download after {} attempts: {}",
                        attempt, e
                    )));
                }
                warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
            }
        }
    }
}

/// Verify a file's SHA-256 checksum matches the expected value
fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    use sha2::{Digest, Sha256};

    debug!("Verifying checksum for {}", path.display());

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    let actual = format!("{:x}", hasher.finalize());

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    debug!("Checksum verified: {}", expected);
    Ok(())
}

fn log_index_age(index: &CatalogIndex) {
    let Some(generated_at) = &index.generated_at else {
        return;
    };
    match chrono::DateTime::parse_from_rfc3339(generated_at) {
        Ok(generated) => {
            let age = chrono::Utc::now().signed_duration_since(generated);
            if age.num_seconds() > INDEX_STALE_SECS {
                warn!(
                    "Catalog index is {} days old, consider regenerating it",
                    age.num_days()
                );
            } else {
                debug!("Catalog index generated at {}", generated_at);
            }
        }
        Err(e) => warn!("Catalog index has invalid generated_at timestamp: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> CatalogIndex {
        serde_json::from_str(
            r#"{
                "name": "test-catalog",
                "generated_at": "2026-01-15T00:00:00Z",
                "projects": [
                    {
                        "name": "bacon",
                        "releases": [
                            {"version": "0.1"},
                            {"version": "0.2", "requires": ["grease (>=1.0)"],
                             "download_url": "https://example.com/bacon-0.2.tar.gz",
                             "checksum": "deadbeef", "size": 1024}
                        ]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_index_round_trips_through_json() {
        let index = sample_index();
        assert_eq!(index.name, "test-catalog");
        assert_eq!(index.projects.len(), 1);
        assert_eq!(index.projects[0].releases[1].requires.len(), 1);
        assert_eq!(index.projects[0].releases[0].requires.len(), 0);

        let text = serde_json::to_string(&index).unwrap();
        let back: CatalogIndex = serde_json::from_str(&text).unwrap();
        assert_eq!(back.projects[0].name, "bacon");
    }

    #[test]
    fn test_get_releases_from_index() {
        let catalog = HttpCatalog::from_index(sample_index()).unwrap();
        let releases = catalog.get_releases("bacon (>=0.2)").unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].version.as_str(), "0.2");
        assert_eq!(
            releases[0].download_url.as_deref(),
            Some("https://example.com/bacon-0.2.tar.gz")
        );
    }

    #[test]
    fn test_unknown_project_from_index() {
        let catalog = HttpCatalog::from_index(sample_index()).unwrap();
        assert!(matches!(
            catalog.get_releases("ghost"),
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_fetch_requirements_from_index() {
        let catalog = HttpCatalog::from_index(sample_index()).unwrap();
        let releases = catalog.get_releases("bacon (==0.2)").unwrap();
        let requires = catalog.fetch_requirements(&releases[0]).unwrap();
        assert_eq!(requires, vec!["grease (>=1.0)".to_string()]);
    }

    #[test]
    fn test_verify_checksum_detects_corruption() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), b"hello world").unwrap();

        // sha256 of "hello world"
        let good = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert!(verify_checksum(temp.path(), good).is_ok());
        assert!(matches!(
            verify_checksum(temp.path(), "0000"),
            Err(Error::ChecksumMismatch { .. })
        ));
    }
}
