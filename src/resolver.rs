// src/resolver.rs

//! Requirement resolution
//!
//! Turns a single requirement string into an installation plan: which
//! releases to install, which installed distributions must be removed to
//! make way for them, and which installed distributions would be broken
//! by those removals. Installed distributions are consulted first, so a
//! satisfied requirement never costs a catalog round-trip.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::depgraph::{dependent_dists, generate_graph};
use crate::dist::{CatalogRelease, Distribution, InstalledDistribution};
use crate::error::{Error, Result};
use crate::version::VersionPredicate;

/// The `{install, remove, conflict}` triple produced by resolution
///
/// All three are lists, not sets: recursive resolution merges by
/// concatenation and duplicates are tolerated downstream.
#[derive(Debug, Clone, Default)]
pub struct InstallationPlan {
    /// Releases to fetch and install; not topologically sorted
    pub install: Vec<CatalogRelease>,
    /// Installed distributions being replaced by a different version
    pub remove: Vec<InstalledDistribution>,
    /// Installed distributions that depend on something in `remove`
    pub conflict: Vec<InstalledDistribution>,
}

impl InstallationPlan {
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.remove.is_empty() && self.conflict.is_empty()
    }

    /// Concatenate another plan into this one, keeping duplicates
    pub fn merge(&mut self, other: InstallationPlan) {
        self.install.extend(other.install);
        self.remove.extend(other.remove);
        self.conflict.extend(other.conflict);
    }
}

/// Resolution session: the catalog collaborator plus selection policy
///
/// One value per resolution call; no global registry state.
pub struct Resolver<'a> {
    catalog: &'a dyn Catalog,
    prefer_final: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            prefer_final: true,
        }
    }

    /// Whether non-final releases are deprioritized during selection
    pub fn prefer_final(mut self, prefer_final: bool) -> Self {
        self.prefer_final = prefer_final;
        self
    }

    /// Resolve one requirement against the installed set
    pub fn resolve(
        &self,
        requirement: &str,
        installed: &[InstalledDistribution],
    ) -> Result<InstallationPlan> {
        let mut in_flight = HashSet::new();
        self.resolve_requirement(requirement, installed, &mut in_flight)
    }

    fn resolve_requirement(
        &self,
        requirement: &str,
        installed: &[InstalledDistribution],
        in_flight: &mut HashSet<String>,
    ) -> Result<InstallationPlan> {
        let predicate = VersionPredicate::parse(requirement)?;

        // Already satisfied: terminal success, no catalog traffic
        for dist in installed {
            if predicate.name_matches(&dist.name) && predicate.matches(&dist.version) {
                debug!("requirement '{}' already satisfied by {}", requirement, dist);
                return Ok(InstallationPlan::default());
            }
        }

        // A project already being resolved higher up this call stack means
        // the catalog declares a dependency cycle; its plan entries are
        // already on the way
        let key = predicate.name.to_ascii_lowercase();
        if !in_flight.insert(key.clone()) {
            debug!("skipping cyclic requirement '{}'", requirement);
            return Ok(InstallationPlan::default());
        }
        let result = self.resolve_from_catalog(requirement, installed, in_flight);
        in_flight.remove(&key);
        result
    }

    fn resolve_from_catalog(
        &self,
        requirement: &str,
        installed: &[InstalledDistribution],
        in_flight: &mut HashSet<String>,
    ) -> Result<InstallationPlan> {
        // ProjectNotFound propagates from the catalog client
        let releases = self.catalog.get_releases(requirement)?;
        let mut release = select_release(releases, self.prefer_final)
            .ok_or_else(|| Error::ReleaseNotFound(requirement.to_string()))?;
        info!("selected {} for requirement '{}'", release, requirement);

        release.requires = self.catalog.fetch_requirements(&release)?;

        // Graph over installed distributions plus the selected release,
        // installed first so they win requirement matching
        let selected = Distribution::Release(release.clone());
        let mut pool: Vec<Distribution> = installed
            .iter()
            .cloned()
            .map(Distribution::Installed)
            .collect();
        pool.push(selected.clone());
        let graph = generate_graph(&pool);

        let mut plan = InstallationPlan::default();
        for missing in graph.missing_of(&selected) {
            let sub = self.resolve_requirement(missing, installed, in_flight)?;
            plan.merge(sub);
        }

        // Replacing an installed version: it must go, and everything that
        // depends on it is reported as a conflict. Dependents are not
        // re-validated against the incoming version; the caller decides
        // whether to proceed.
        let installed_pool: Vec<Distribution> = installed
            .iter()
            .cloned()
            .map(Distribution::Installed)
            .collect();
        for dist in installed {
            if !dist.name.eq_ignore_ascii_case(&release.name) {
                continue;
            }
            debug!("{} will be replaced by {}", dist, release);
            for dependent in
                dependent_dists(&installed_pool, &Distribution::Installed(dist.clone()))
            {
                if let Distribution::Installed(d) = dependent {
                    plan.conflict.push(d);
                }
            }
            plan.remove.push(dist.clone());
        }

        plan.install.push(release);
        Ok(plan)
    }
}

/// Resolve with the default policy of preferring final releases
pub fn resolve(
    requirement: &str,
    catalog: &dyn Catalog,
    installed: &[InstalledDistribution],
) -> Result<InstallationPlan> {
    Resolver::new(catalog).resolve(requirement, installed)
}

/// Pick the winning release: final releases beat non-final ones when
/// `prefer_final` is set, highest version wins within the same class
fn select_release(releases: Vec<CatalogRelease>, prefer_final: bool) -> Option<CatalogRelease> {
    let mut best: Option<CatalogRelease> = None;
    for candidate in releases {
        let better = match &best {
            None => true,
            Some(current) => {
                if prefer_final && candidate.version.is_final() != current.version.is_final() {
                    candidate.version.is_final()
                } else {
                    candidate.version > current.version
                }
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;

    fn installed(name: &str, version: &str, requires: &[&str]) -> InstalledDistribution {
        let mut d = InstalledDistribution::new(name, version).unwrap();
        d.requires = requires.iter().map(|s| s.to_string()).collect();
        d
    }

    fn release(name: &str, version: &str, requires: &[&str]) -> CatalogRelease {
        let mut r = CatalogRelease::new(name, version).unwrap();
        r.requires = requires.iter().map(|s| s.to_string()).collect();
        r
    }

    /// Catalog wrapper that counts release lookups
    struct CountingCatalog {
        inner: MemoryCatalog,
        lookups: std::cell::Cell<usize>,
    }

    impl CountingCatalog {
        fn new(inner: MemoryCatalog) -> Self {
            Self {
                inner,
                lookups: std::cell::Cell::new(0),
            }
        }
    }

    impl Catalog for CountingCatalog {
        fn get_releases(&self, requirement: &str) -> Result<Vec<CatalogRelease>> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.get_releases(requirement)
        }

        fn fetch_requirements(&self, release: &CatalogRelease) -> Result<Vec<String>> {
            self.inner.fetch_requirements(release)
        }

        fn download(
            &self,
            release: &CatalogRelease,
            dest_dir: &std::path::Path,
        ) -> Result<std::path::PathBuf> {
            self.inner.download(release, dest_dir)
        }
    }

    #[test]
    fn test_satisfied_requirement_makes_no_catalog_call() {
        let catalog = CountingCatalog::new(MemoryCatalog::new());
        let pool = [installed("bacon", "0.1", &[])];

        let plan = resolve("bacon (<=0.2)", &catalog, &pool).unwrap();
        assert!(plan.is_empty());
        assert_eq!(catalog.lookups.get(), 0);
    }

    #[test]
    fn test_unknown_project_fails() {
        let catalog = MemoryCatalog::new();
        let result = resolve("ghost", &catalog, &[]);
        assert!(matches!(result, Err(Error::ProjectNotFound(_))));
    }

    #[test]
    fn test_no_matching_release_fails() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("bacon", "0.1", &[]));
        let result = resolve("bacon (>=2.0)", &catalog, &[]);
        assert!(matches!(result, Err(Error::ReleaseNotFound(_))));
    }

    #[test]
    fn test_simple_install() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("bacon", "0.2", &[]));

        let plan = resolve("bacon", &catalog, &[]).unwrap();
        assert_eq!(plan.install.len(), 1);
        assert_eq!(plan.install[0].to_string(), "bacon-0.2");
        assert!(plan.remove.is_empty());
        assert!(plan.conflict.is_empty());
    }

    #[test]
    fn test_chained_requirements_resolve_recursively() {
        // choxie needs towel-stuff, towel-stuff needs bacon; bacon@0.1 is
        // already installed and satisfies its constraint
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("choxie", "2.0.0.9", &["towel-stuff (0.1)"]));
        catalog.add_release(release("towel-stuff", "0.1", &["bacon (<=0.2)"]));
        let pool = [installed("bacon", "0.1", &[])];

        let plan = resolve("choxie (==2.0.0.9)", &catalog, &pool).unwrap();

        let names: Vec<String> = plan.install.iter().map(|r| r.to_string()).collect();
        assert!(names.contains(&"choxie-2.0.0.9".to_string()));
        assert!(names.contains(&"towel-stuff-0.1".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("bacon")));
        assert!(plan.remove.is_empty());
        assert!(plan.conflict.is_empty());
    }

    #[test]
    fn test_upgrade_removes_old_version() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("chicken", "1.1", &["bacon (>=0.2)"]));
        catalog.add_release(release("bacon", "0.2", &[]));
        let pool = [installed("bacon", "0.1", &[])];

        let plan = resolve("chicken", &catalog, &pool).unwrap();

        let names: Vec<String> = plan.install.iter().map(|r| r.to_string()).collect();
        assert!(names.contains(&"chicken-1.1".to_string()));
        assert!(names.contains(&"bacon-0.2".to_string()));
        assert_eq!(plan.remove.len(), 1);
        assert_eq!(plan.remove[0].to_string(), "bacon-0.1");
        assert!(plan.conflict.is_empty());
    }

    #[test]
    fn test_upgrade_with_dependents_reports_conflict() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("bacon", "0.2", &[]));
        let pool = [
            installed("bacon", "0.1", &[]),
            installed("eggs", "1.0", &["bacon (<=0.1)"]),
        ];

        let plan = resolve("bacon (>=0.2)", &catalog, &pool).unwrap();

        assert_eq!(plan.remove.len(), 1);
        assert_eq!(plan.conflict.len(), 1);
        assert_eq!(plan.conflict[0].to_string(), "eggs-1.0");
    }

    #[test]
    fn test_conflict_includes_transitive_dependents() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("base", "2.0", &[]));
        let pool = [
            installed("base", "1.0", &[]),
            installed("middle", "1.0", &["base (==1.0)"]),
            installed("top", "1.0", &["middle"]),
        ];

        let plan = resolve("base (==2.0)", &catalog, &pool).unwrap();

        let mut conflicts: Vec<String> =
            plan.conflict.iter().map(|d| d.name.clone()).collect();
        conflicts.sort();
        assert_eq!(conflicts, vec!["middle", "top"]);
    }

    #[test]
    fn test_prefer_final_skips_prereleases() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("bacon", "0.2", &[]));
        catalog.add_release(release("bacon", "0.3rc1", &[]));

        let plan = resolve("bacon", &catalog, &[]).unwrap();
        assert_eq!(plan.install[0].version.as_str(), "0.2");

        let plan = Resolver::new(&catalog)
            .prefer_final(false)
            .resolve("bacon", &[])
            .unwrap();
        assert_eq!(plan.install[0].version.as_str(), "0.3rc1");
    }

    #[test]
    fn test_highest_version_wins() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("bacon", "0.1", &[]));
        catalog.add_release(release("bacon", "0.3", &[]));
        catalog.add_release(release("bacon", "0.2", &[]));

        let plan = resolve("bacon", &catalog, &[]).unwrap();
        assert_eq!(plan.install[0].version.as_str(), "0.3");
    }

    #[test]
    fn test_cyclic_catalog_requirements_terminate() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("ping", "1.0", &["pong"]));
        catalog.add_release(release("pong", "1.0", &["ping"]));

        let plan = resolve("ping", &catalog, &[]).unwrap();
        let mut names: Vec<&str> = plan.install.iter().map(|r| r.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["ping", "pong"]);
    }

    #[test]
    fn test_diamond_produces_duplicate_entries() {
        // app needs left and right, both need base: base is resolved twice
        // and the plan keeps both entries
        let mut catalog = MemoryCatalog::new();
        catalog.add_release(release("app", "1.0", &["left", "right"]));
        catalog.add_release(release("left", "1.0", &["base"]));
        catalog.add_release(release("right", "1.0", &["base"]));
        catalog.add_release(release("base", "1.0", &[]));

        let plan = resolve("app", &catalog, &[]).unwrap();
        let base_count = plan
            .install
            .iter()
            .filter(|r| r.name == "base")
            .count();
        assert_eq!(base_count, 2);
    }

    #[test]
    fn test_malformed_top_level_requirement_is_fatal() {
        let catalog = MemoryCatalog::new();
        assert!(matches!(
            resolve("(>=1.0)", &catalog, &[]),
            Err(Error::MalformedRequirement(_))
        ));
    }
}
