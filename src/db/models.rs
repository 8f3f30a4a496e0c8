// src/db/models.rs

//! Data models for Stevedore database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting
//! records.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// An installed distribution as stored in the database
#[derive(Debug, Clone)]
pub struct DistRecord {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub installed_at: Option<String>,
    pub installed_by_changeset_id: Option<i64>,
}

impl DistRecord {
    /// Create a new record, not yet inserted
    pub fn new(name: String, version: String) -> Self {
        Self {
            id: None,
            name,
            version,
            installed_at: None,
            installed_by_changeset_id: None,
        }
    }

    /// Insert this record into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO distributions (name, version, installed_by_changeset_id)
             VALUES (?1, ?2, ?3)",
            params![&self.name, &self.version, &self.installed_by_changeset_id],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find records by name (case-insensitive)
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, installed_at, installed_by_changeset_id
             FROM distributions WHERE name = ?1 COLLATE NOCASE",
        )?;

        let records = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Find one record by exact (name, version)
    pub fn find_by_name_version(
        conn: &Connection,
        name: &str,
        version: &str,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, installed_at, installed_by_changeset_id
             FROM distributions WHERE name = ?1 COLLATE NOCASE AND version = ?2",
        )?;

        let record = stmt
            .query_row(params![name, version], Self::from_row)
            .optional()?;

        Ok(record)
    }

    /// List all installed distributions, ordered by name then version
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, installed_at, installed_by_changeset_id
             FROM distributions ORDER BY name, version",
        )?;

        let records = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Delete a record by ID
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM distributions WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            installed_at: row.get(3)?,
            installed_by_changeset_id: row.get(4)?,
        })
    }
}

/// A declared provide stored for an installed distribution
#[derive(Debug, Clone)]
pub struct ProvideEntry {
    pub id: Option<i64>,
    pub distribution_id: i64,
    pub name: String,
    pub version: Option<String>,
}

impl ProvideEntry {
    pub fn new(distribution_id: i64, name: String, version: Option<String>) -> Self {
        Self {
            id: None,
            distribution_id,
            name,
            version,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO provides (distribution_id, name, version) VALUES (?1, ?2, ?3)",
            params![self.distribution_id, &self.name, &self.version],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_distribution(conn: &Connection, distribution_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, distribution_id, name, version FROM provides
             WHERE distribution_id = ?1 ORDER BY id",
        )?;

        let entries = stmt
            .query_map([distribution_id], |row| {
                Ok(Self {
                    id: Some(row.get(0)?),
                    distribution_id: row.get(1)?,
                    name: row.get(2)?,
                    version: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

/// A declared requirement string stored for an installed distribution
#[derive(Debug, Clone)]
pub struct RequireEntry {
    pub id: Option<i64>,
    pub distribution_id: i64,
    pub requirement: String,
}

impl RequireEntry {
    pub fn new(distribution_id: i64, requirement: String) -> Self {
        Self {
            id: None,
            distribution_id,
            requirement,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO requires (distribution_id, requirement) VALUES (?1, ?2)",
            params![self.distribution_id, &self.requirement],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_distribution(conn: &Connection, distribution_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, distribution_id, requirement FROM requires
             WHERE distribution_id = ?1 ORDER BY id",
        )?;

        let entries = stmt
            .query_map([distribution_id], |row| {
                Ok(Self {
                    id: Some(row.get(0)?),
                    distribution_id: row.get(1)?,
                    requirement: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

/// A file owned by an installed distribution
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub id: Option<i64>,
    pub distribution_id: i64,
    pub path: String,
    pub sha256_hash: Option<String>,
    pub size: Option<i64>,
}

impl FileEntry {
    pub fn new(distribution_id: i64, path: String) -> Self {
        Self {
            id: None,
            distribution_id,
            path,
            sha256_hash: None,
            size: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO files (distribution_id, path, sha256_hash, size)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.distribution_id,
                &self.path,
                &self.sha256_hash,
                &self.size
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_distribution(conn: &Connection, distribution_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, distribution_id, path, sha256_hash, size FROM files
             WHERE distribution_id = ?1 ORDER BY id",
        )?;

        let entries = stmt
            .query_map([distribution_id], |row| {
                Ok(Self {
                    id: Some(row.get(0)?),
                    distribution_id: row.get(1)?,
                    path: row.get(2)?,
                    sha256_hash: row.get(3)?,
                    size: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

/// Changeset status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesetStatus {
    Pending,
    Applied,
    RolledBack,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ChangesetStatus::Pending => "pending",
            ChangesetStatus::Applied => "applied",
            ChangesetStatus::RolledBack => "rolled_back",
        }
    }
}

impl FromStr for ChangesetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangesetStatus::Pending),
            "applied" => Ok(ChangesetStatus::Applied),
            "rolled_back" => Ok(ChangesetStatus::RolledBack),
            _ => Err(format!("Invalid changeset status: {}", s)),
        }
    }
}

/// A Changeset records one install/remove operation
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub description: String,
    pub status: ChangesetStatus,
    pub created_at: Option<String>,
    pub applied_at: Option<String>,
    pub rolled_back_at: Option<String>,
    pub reversed_by_changeset_id: Option<i64>,
}

impl Changeset {
    /// Create a new pending changeset
    pub fn new(description: String) -> Self {
        Self {
            id: None,
            description,
            status: ChangesetStatus::Pending,
            created_at: None,
            applied_at: None,
            rolled_back_at: None,
            reversed_by_changeset_id: None,
        }
    }

    /// Insert this changeset into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changesets (description, status) VALUES (?1, ?2)",
            params![&self.description, self.status.as_str()],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a changeset by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at, applied_at, rolled_back_at,
                    reversed_by_changeset_id
             FROM changesets WHERE id = ?1",
        )?;

        let changeset = stmt.query_row([id], Self::from_row).optional()?;

        Ok(changeset)
    }

    /// List all changesets, most recent first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at, applied_at, rolled_back_at,
                    reversed_by_changeset_id
             FROM changesets ORDER BY id DESC",
        )?;

        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changesets)
    }

    /// Update changeset status, stamping the matching timestamp column
    pub fn update_status(&mut self, conn: &Connection, new_status: ChangesetStatus) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            crate::error::Error::InitError("Cannot update changeset without ID".to_string())
        })?;

        match new_status {
            ChangesetStatus::Applied => conn.execute(
                "UPDATE changesets SET status = ?1, applied_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![new_status.as_str(), id],
            )?,
            ChangesetStatus::RolledBack => conn.execute(
                "UPDATE changesets SET status = ?1, rolled_back_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![new_status.as_str(), id],
            )?,
            ChangesetStatus::Pending => conn.execute(
                "UPDATE changesets SET status = ?1 WHERE id = ?2",
                params![new_status.as_str(), id],
            )?,
        };

        self.status = new_status;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(2)?;
        let status = status_str.parse::<ChangesetStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            status,
            created_at: row.get(3)?,
            applied_at: row.get(4)?,
            rolled_back_at: row.get(5)?,
            reversed_by_changeset_id: row.get(6)?,
        })
    }
}
