// src/dist.rs

//! Distribution model
//!
//! Two kinds of distributions flow through resolution: those already
//! installed on the system and candidate releases from a catalog. Both
//! expose the same name/version/provides/requires surface to the graph
//! builder, wrapped in the `Distribution` enum.
//!
//! Identity is (name, version) with case-insensitive names; two
//! distributions with equal identity are duplicates and get merged when
//! added to a graph. Every distribution implicitly provides itself at its
//! own version; the `provides` list holds declared extras only.

use std::fmt;
use std::path::PathBuf;

use crate::error::Result;
use crate::version::Version;

/// A declared provide: capability name plus optional version
///
/// A provide without a version satisfies only clause-free predicates.
#[derive(Debug, Clone)]
pub struct Provide {
    pub name: String,
    pub version: Option<Version>,
}

impl Provide {
    pub fn new(name: &str, version: Option<&str>) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            version: version.map(Version::parse).transpose()?,
        })
    }
}

/// A distribution already present on the system
#[derive(Debug, Clone)]
pub struct InstalledDistribution {
    pub name: String,
    pub version: Version,
    /// Declared extra provides beyond the implicit self-provide
    pub provides: Vec<Provide>,
    /// Declared requirement strings
    pub requires: Vec<String>,
    /// Absolute paths of the files this distribution owns
    pub installed_files: Vec<PathBuf>,
}

impl InstalledDistribution {
    pub fn new(name: &str, version: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            version: Version::parse(version)?,
            provides: Vec::new(),
            requires: Vec::new(),
            installed_files: Vec::new(),
        })
    }
}

impl fmt::Display for InstalledDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// A release known to a catalog, candidate for installation
#[derive(Debug, Clone)]
pub struct CatalogRelease {
    pub name: String,
    pub version: Version,
    /// Declared extra provides beyond the implicit self-provide
    pub provides: Vec<Provide>,
    /// Declared requirement strings, filled in once fetched from the catalog
    pub requires: Vec<String>,
    pub download_url: Option<String>,
    pub checksum: Option<String>,
    pub size: Option<u64>,
}

impl CatalogRelease {
    pub fn new(name: &str, version: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            version: Version::parse(version)?,
            provides: Vec::new(),
            requires: Vec::new(),
            download_url: None,
            checksum: None,
            size: None,
        })
    }
}

impl fmt::Display for CatalogRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Either kind of distribution, as consumed by the graph builder
#[derive(Debug, Clone)]
pub enum Distribution {
    Installed(InstalledDistribution),
    Release(CatalogRelease),
}

impl Distribution {
    pub fn name(&self) -> &str {
        match self {
            Distribution::Installed(d) => &d.name,
            Distribution::Release(r) => &r.name,
        }
    }

    pub fn version(&self) -> &Version {
        match self {
            Distribution::Installed(d) => &d.version,
            Distribution::Release(r) => &r.version,
        }
    }

    /// Declared extra provides; the implicit self-provide is not listed
    pub fn provides(&self) -> &[Provide] {
        match self {
            Distribution::Installed(d) => &d.provides,
            Distribution::Release(r) => &r.provides,
        }
    }

    pub fn requires(&self) -> &[String] {
        match self {
            Distribution::Installed(d) => &d.requires,
            Distribution::Release(r) => &r.requires,
        }
    }

    /// Graph identity: lowercased name plus the version as written
    pub fn key(&self) -> (String, String) {
        (
            self.name().to_ascii_lowercase(),
            self.version().as_str().to_string(),
        )
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Installed(d) => d.fmt(f),
            Distribution::Release(r) => r.fmt(f),
        }
    }
}
