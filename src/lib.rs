// src/lib.rs

//! Stevedore Package Installer
//!
//! Resolves version-constrained requirements against the installed pool
//! and a remote catalog, then applies the resulting plan as a single
//! all-or-nothing filesystem transaction.
//!
//! # Architecture
//!
//! - Resolution is matching over a snapshot: installed distributions plus
//!   one candidate release at a time, first match wins by input order
//! - Plans are applied all-or-nothing: removed files are staged aside,
//!   never deleted, until every install hook has succeeded
//! - Installed-pool state lives in SQLite; every install/remove is a
//!   recorded changeset
//! - Collaborators (catalog, install hook) are explicit trait objects,
//!   injected per call; there is no global registry state

pub mod catalog;
pub mod db;
pub mod depgraph;
pub mod dist;
mod error;
pub mod installer;
pub mod resolver;
pub mod version;

pub use error::{Error, Result};
