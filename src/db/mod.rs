// src/db/mod.rs

//! Database layer for Stevedore
//!
//! This module handles all SQLite operations including:
//! - Database initialization and schema creation
//! - Connection management
//! - Transaction handling
//! - CRUD operations for distributions, changesets, and files
//!
//! It is also the installed-distribution enumerator: `list_installed`
//! materializes the pool the resolver matches against. Updating these
//! records after a successful `apply_plan` is the caller's job; the
//! installer itself only moves the files it is told about.

pub mod models;
pub mod schema;

use crate::dist::{CatalogRelease, InstalledDistribution, Provide};
use crate::error::{Error, Result};
use crate::version::Version;
use models::{DistRecord, FileEntry, ProvideEntry, RequireEntry};
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Initialize a new Stevedore database at the specified path
///
/// Creates the database file, sets pragmas, and migrates the schema.
/// This is idempotent - calling it on an existing database is safe.
pub fn init(db_path: &str) -> Result<()> {
    debug!("Initializing database at: {}", db_path);

    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::InitError(format!("Failed to create database directory: {}", e)))?;
    }

    // Open/create the database
    let conn = Connection::open(db_path)?;

    // Set pragmas for better performance and reliability
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    info!("Database initialized successfully");
    Ok(())
}

/// Open an existing Stevedore database
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::DatabaseNotFound(db_path.to_string()));
    }

    let conn = Connection::open(db_path)?;

    // Set pragmas
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(conn)
}

/// Run `f` inside a database transaction, committing on success and
/// rolling back on error
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let result = f(&tx)?;
    tx.commit()?;
    Ok(result)
}

/// Enumerate the installed-distribution pool
///
/// Rows with unparseable stored versions are skipped with a warning so
/// one bad record cannot abort a resolution.
pub fn list_installed(conn: &Connection) -> Result<Vec<InstalledDistribution>> {
    let mut dists = Vec::new();
    for record in DistRecord::list_all(conn)? {
        let Some(id) = record.id else { continue };
        let version = match Version::parse(&record.version) {
            Ok(v) => v,
            Err(_) => {
                warn!(
                    "skipping installed distribution {} with unparseable version '{}'",
                    record.name, record.version
                );
                continue;
            }
        };

        let mut provides = Vec::new();
        for entry in ProvideEntry::find_by_distribution(conn, id)? {
            let provide_version = match entry.version.as_deref().map(Version::parse).transpose() {
                Ok(v) => v,
                Err(_) => {
                    warn!(
                        "skipping provide '{}' of {} with unparseable version",
                        entry.name, record.name
                    );
                    continue;
                }
            };
            provides.push(Provide {
                name: entry.name,
                version: provide_version,
            });
        }

        let requires = RequireEntry::find_by_distribution(conn, id)?
            .into_iter()
            .map(|entry| entry.requirement)
            .collect();

        let installed_files = FileEntry::find_by_distribution(conn, id)?
            .into_iter()
            .map(|entry| PathBuf::from(entry.path))
            .collect();

        dists.push(InstalledDistribution {
            name: record.name,
            version,
            provides,
            requires,
            installed_files,
        });
    }
    Ok(dists)
}

/// Record a freshly installed release and the files it owns
///
/// Idempotent: a record with the same (name, version) already present is
/// left alone and its ID returned, so plans carrying duplicate entries
/// record cleanly.
pub fn record_install(
    conn: &Connection,
    release: &CatalogRelease,
    files: &[PathBuf],
    changeset_id: i64,
) -> Result<i64> {
    if let Some(existing) =
        DistRecord::find_by_name_version(conn, &release.name, release.version.as_str())?
    {
        if let Some(id) = existing.id {
            debug!("{} already recorded", release);
            return Ok(id);
        }
    }

    let mut record = DistRecord::new(release.name.clone(), release.version.as_str().to_string());
    record.installed_by_changeset_id = Some(changeset_id);
    let dist_id = record.insert(conn)?;

    for provide in &release.provides {
        ProvideEntry::new(
            dist_id,
            provide.name.clone(),
            provide.version.as_ref().map(|v| v.as_str().to_string()),
        )
        .insert(conn)?;
    }
    for requirement in &release.requires {
        RequireEntry::new(dist_id, requirement.clone()).insert(conn)?;
    }
    for file in files {
        FileEntry::new(dist_id, file.to_string_lossy().into_owned()).insert(conn)?;
    }

    Ok(dist_id)
}

/// Drop the record of a removed distribution; dependent rows cascade
///
/// Returns true when a record was found and deleted.
pub fn remove_distribution(conn: &Connection, name: &str, version: &str) -> Result<bool> {
    match DistRecord::find_by_name_version(conn, name, version)? {
        Some(record) => {
            if let Some(id) = record.id {
                DistRecord::delete(conn, id)?;
            }
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_init_creates_database() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();

        // Remove the temp file so init can create it
        drop(temp_file);

        let result = init(&db_path);
        assert!(result.is_ok());
        assert!(Path::new(&db_path).exists());
    }

    #[test]
    fn test_open_existing_database() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();

        // Initialize first
        init(db_path).unwrap();

        // Then open
        let result = open(db_path);
        assert!(result.is_ok());
    }

    #[test]
    fn test_open_nonexistent_database() {
        let result = open("/nonexistent/path/db.sqlite");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::DatabaseNotFound(_)));
    }

    fn fresh_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        init(&db_path).unwrap();
        let conn = open(&db_path).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_record_and_list_installed() {
        let (_temp, conn) = fresh_db();

        let mut release = CatalogRelease::new("choxie", "2.0.0.9").unwrap();
        release.requires = vec!["towel-stuff (0.1)".to_string()];
        release.provides = vec![Provide::new("truffles", Some("1.0")).unwrap()];

        let files = vec![PathBuf::from("/usr/lib/choxie/core.py")];
        record_install(&conn, &release, &files, 1).unwrap();

        let installed = list_installed(&conn).unwrap();
        assert_eq!(installed.len(), 1);
        let dist = &installed[0];
        assert_eq!(dist.name, "choxie");
        assert_eq!(dist.version.as_str(), "2.0.0.9");
        assert_eq!(dist.requires, vec!["towel-stuff (0.1)".to_string()]);
        assert_eq!(dist.provides.len(), 1);
        assert_eq!(dist.provides[0].name, "truffles");
        assert_eq!(dist.installed_files, files);
    }

    #[test]
    fn test_record_install_is_idempotent() {
        let (_temp, conn) = fresh_db();

        let release = CatalogRelease::new("bacon", "0.2").unwrap();
        let first = record_install(&conn, &release, &[], 1).unwrap();
        let second = record_install(&conn, &release, &[], 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(list_installed(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_distribution_cascades() {
        let (_temp, conn) = fresh_db();

        let mut release = CatalogRelease::new("bacon", "0.2").unwrap();
        release.requires = vec!["grease".to_string()];
        record_install(&conn, &release, &[PathBuf::from("/usr/bin/bacon")], 1).unwrap();

        assert!(remove_distribution(&conn, "bacon", "0.2").unwrap());
        assert!(list_installed(&conn).unwrap().is_empty());

        let orphans: i32 = conn
            .query_row("SELECT COUNT(*) FROM requires", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);

        // Removing again reports nothing found
        assert!(!remove_distribution(&conn, "bacon", "0.2").unwrap());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let (_temp, mut conn) = fresh_db();

        let result: Result<()> = transaction(&mut conn, |tx| {
            let mut record = DistRecord::new("bacon".to_string(), "0.1".to_string());
            record.insert(tx)?;

            // Duplicate insert violates UNIQUE(name, version)
            let mut duplicate = DistRecord::new("bacon".to_string(), "0.1".to_string());
            duplicate.insert(tx)?;
            Ok(())
        });

        assert!(result.is_err());
        assert!(list_installed(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_bad_stored_version_is_skipped() {
        let (_temp, conn) = fresh_db();

        conn.execute(
            "INSERT INTO distributions (name, version) VALUES ('broken', 'not.a.version')",
            [],
        )
        .unwrap();
        let release = CatalogRelease::new("fine", "1.0").unwrap();
        record_install(&conn, &release, &[], 1).unwrap();

        let installed = list_installed(&conn).unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].name, "fine");
    }
}
