// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use stevedore::catalog::http::HttpCatalog;
use stevedore::db::models::{Changeset, ChangesetStatus};
use stevedore::depgraph;
use stevedore::dist::Distribution;
use stevedore::installer::{self, TarballBackend};
use stevedore::resolver::{InstallationPlan, Resolver};
use tracing::info;

const DEFAULT_DB_PATH: &str = "/var/lib/stevedore/stevedore.db";

#[derive(Parser)]
#[command(name = "stevedore")]
#[command(author, version, about = "Dependency resolver and transactional installer with staged rollback", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the Stevedore database
    Init {
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },
    /// Resolve a requirement and print the plan without touching anything
    Resolve {
        /// Requirement string, e.g. "choxie (>=2.0,<3.0)"
        requirement: String,
        /// Catalog base URL (index at <url>/catalog.json)
        #[arg(short, long)]
        catalog_url: String,
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
        /// Consider pre-releases as install candidates
        #[arg(long)]
        pre: bool,
    },
    /// Resolve a requirement and apply the plan
    Install {
        /// Requirement string, e.g. "choxie (>=2.0,<3.0)"
        requirement: String,
        /// Catalog base URL (index at <url>/catalog.json)
        #[arg(short, long)]
        catalog_url: String,
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
        /// Install root directory (a temporary root when omitted)
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Consider pre-releases as install candidates
        #[arg(long)]
        pre: bool,
    },
    /// Remove an installed distribution
    Remove {
        /// Distribution name to remove
        name: String,
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },
    /// List installed distributions
    List {
        /// Name pattern (optional, shows all if omitted)
        pattern: Option<String>,
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },
    /// Show changeset history
    History {
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Backend for remove-only plans; the install phase never runs
struct NoInstallBackend;

impl installer::InstallBackend for NoInstallBackend {
    fn install(
        &mut self,
        release: &stevedore::dist::CatalogRelease,
        _target: &Path,
    ) -> stevedore::Result<Vec<PathBuf>> {
        Err(stevedore::Error::Backend(format!(
            "no install hook available for {}",
            release
        )))
    }

    fn uninstall(&mut self, _release: &stevedore::dist::CatalogRelease) -> stevedore::Result<()> {
        Ok(())
    }
}

fn print_plan(plan: &InstallationPlan) {
    if plan.is_empty() {
        println!("Nothing to do.");
        return;
    }
    if !plan.install.is_empty() {
        println!("To install:");
        for release in &plan.install {
            println!("  + {}", release);
        }
    }
    if !plan.remove.is_empty() {
        println!("To remove:");
        for dist in &plan.remove {
            println!("  - {}", dist);
        }
    }
    if !plan.conflict.is_empty() {
        println!("Conflicts (these depend on a distribution being removed):");
        for dist in &plan.conflict {
            println!("  ! {}", dist);
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { db_path }) => {
            info!("Initializing Stevedore database at: {}", db_path);
            stevedore::db::init(&db_path)?;
            println!("Database initialized successfully at: {}", db_path);
            Ok(())
        }
        Some(Commands::Resolve {
            requirement,
            catalog_url,
            db_path,
            pre,
        }) => {
            let conn = stevedore::db::open(&db_path)?;
            let installed = stevedore::db::list_installed(&conn)?;

            let catalog = HttpCatalog::fetch(&catalog_url)?;
            let plan = Resolver::new(&catalog)
                .prefer_final(!pre)
                .resolve(&requirement, &installed)?;

            print_plan(&plan);
            Ok(())
        }
        Some(Commands::Install {
            requirement,
            catalog_url,
            db_path,
            root,
            pre,
        }) => {
            info!("Installing requirement: {}", requirement);

            let mut conn = stevedore::db::open(&db_path)?;
            let installed = stevedore::db::list_installed(&conn)?;

            let catalog = HttpCatalog::fetch(&catalog_url)?;
            let plan = Resolver::new(&catalog)
                .prefer_final(!pre)
                .resolve(&requirement, &installed)?;

            if plan.is_empty() {
                println!("Requirement '{}' is already satisfied", requirement);
                return Ok(());
            }
            print_plan(&plan);

            // Apply the filesystem transaction, then record the outcome
            let mut backend = TarballBackend::new(&catalog);
            installer::apply_plan(&plan, &mut backend, root.as_deref())?;

            stevedore::db::transaction(&mut conn, |tx| {
                let mut changeset = Changeset::new(format!("Install {}", requirement));
                let changeset_id = changeset.insert(tx)?;

                for dist in &plan.remove {
                    stevedore::db::remove_distribution(tx, &dist.name, dist.version.as_str())?;
                }
                for release in &plan.install {
                    let files = backend.installed_files(release).unwrap_or(&[]);
                    stevedore::db::record_install(tx, release, files, changeset_id)?;
                }

                changeset.update_status(tx, ChangesetStatus::Applied)?;
                Ok(())
            })?;

            println!(
                "Installed {} distribution(s), removed {}",
                plan.install.len(),
                plan.remove.len()
            );
            Ok(())
        }
        Some(Commands::Remove { name, db_path }) => {
            info!("Removing distribution: {}", name);

            let mut conn = stevedore::db::open(&db_path)?;
            let installed = stevedore::db::list_installed(&conn)?;

            let target = installed
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(&name))
                .ok_or_else(|| anyhow::anyhow!("Distribution '{}' is not installed", name))?;

            // Refuse to break the installed pool
            let pool: Vec<Distribution> = installed
                .iter()
                .cloned()
                .map(Distribution::Installed)
                .collect();
            let dependents =
                depgraph::dependent_dists(&pool, &Distribution::Installed(target.clone()));
            if !dependents.is_empty() {
                let names: Vec<String> = dependents.iter().map(|d| d.to_string()).collect();
                return Err(anyhow::anyhow!(
                    "Cannot remove {}: required by {}",
                    target,
                    names.join(", ")
                ));
            }

            let plan = InstallationPlan {
                install: vec![],
                remove: vec![target.clone()],
                conflict: vec![],
            };
            let file_count = target.installed_files.len();
            let description = format!("Remove {}", target);
            let (name, version) = (target.name.clone(), target.version.as_str().to_string());

            installer::apply_plan(&plan, &mut NoInstallBackend, None)?;

            stevedore::db::transaction(&mut conn, |tx| {
                let mut changeset = Changeset::new(description.clone());
                changeset.insert(tx)?;
                stevedore::db::remove_distribution(tx, &name, &version)?;
                changeset.update_status(tx, ChangesetStatus::Applied)?;
                Ok(())
            })?;

            println!("Removed distribution: {} {}", name, version);
            println!("  Files removed: {}", file_count);
            Ok(())
        }
        Some(Commands::List { pattern, db_path }) => {
            let conn = stevedore::db::open(&db_path)?;
            let installed = stevedore::db::list_installed(&conn)?;

            let matching: Vec<_> = match &pattern {
                Some(pattern) => installed
                    .iter()
                    .filter(|d| d.name.to_lowercase().contains(&pattern.to_lowercase()))
                    .collect(),
                None => installed.iter().collect(),
            };

            if matching.is_empty() {
                println!("No distributions found.");
            } else {
                println!("Installed distributions:");
                for dist in &matching {
                    print!("  {} {}", dist.name, dist.version);
                    if !dist.requires.is_empty() {
                        print!(" (requires: {})", dist.requires.join(", "));
                    }
                    println!();
                }
                println!("\nTotal: {} distribution(s)", matching.len());
            }

            Ok(())
        }
        Some(Commands::History { db_path }) => {
            let conn = stevedore::db::open(&db_path)?;

            let changesets = Changeset::list_all(&conn)?;

            if changesets.is_empty() {
                println!("No changeset history.");
            } else {
                println!("Changeset history:");
                for changeset in &changesets {
                    let timestamp = changeset
                        .applied_at
                        .as_ref()
                        .or(changeset.rolled_back_at.as_ref())
                        .or(changeset.created_at.as_ref())
                        .map(|s| s.as_str())
                        .unwrap_or("pending");

                    println!(
                        "  [{}] {} - {} ({:?})",
                        changeset.id.unwrap_or(0),
                        timestamp,
                        changeset.description,
                        changeset.status
                    );
                }
                println!("\nTotal: {} changeset(s)", changesets.len());
            }

            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("Stevedore Package Installer v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'stevedore --help' for usage information");
            Ok(())
        }
    }
}
