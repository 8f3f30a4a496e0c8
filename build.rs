// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "/var/lib/stevedore/stevedore.db";

fn build_cli() -> Command {
    Command::new("stevedore")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Stevedore Contributors")
        .about("Dependency resolver and transactional installer with staged rollback")
        .subcommand_required(false)
        .subcommand(
            Command::new("init")
                .about("Initialize the Stevedore database")
                .arg(
                    Arg::new("db_path")
                        .short('d')
                        .long("db-path")
                        .value_name("PATH")
                        .default_value(DEFAULT_DB_PATH)
                        .help("Database path"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a requirement and print the plan without touching anything")
                .arg(
                    Arg::new("requirement")
                        .required(true)
                        .help("Requirement string, e.g. \"choxie (>=2.0,<3.0)\""),
                )
                .arg(
                    Arg::new("catalog_url")
                        .short('c')
                        .long("catalog-url")
                        .required(true)
                        .help("Catalog base URL (index at <url>/catalog.json)"),
                )
                .arg(
                    Arg::new("db_path")
                        .short('d')
                        .long("db-path")
                        .default_value(DEFAULT_DB_PATH),
                )
                .arg(
                    Arg::new("pre")
                        .long("pre")
                        .action(clap::ArgAction::SetTrue)
                        .help("Consider pre-releases as install candidates"),
                ),
        )
        .subcommand(
            Command::new("install")
                .about("Resolve a requirement and apply the plan")
                .arg(
                    Arg::new("requirement")
                        .required(true)
                        .help("Requirement string, e.g. \"choxie (>=2.0,<3.0)\""),
                )
                .arg(
                    Arg::new("catalog_url")
                        .short('c')
                        .long("catalog-url")
                        .required(true)
                        .help("Catalog base URL (index at <url>/catalog.json)"),
                )
                .arg(
                    Arg::new("db_path")
                        .short('d')
                        .long("db-path")
                        .default_value(DEFAULT_DB_PATH),
                )
                .arg(
                    Arg::new("root")
                        .short('r')
                        .long("root")
                        .help("Install root directory (a temporary root when omitted)"),
                )
                .arg(
                    Arg::new("pre")
                        .long("pre")
                        .action(clap::ArgAction::SetTrue)
                        .help("Consider pre-releases as install candidates"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed distribution")
                .arg(
                    Arg::new("name")
                        .required(true)
                        .help("Distribution name to remove"),
                )
                .arg(
                    Arg::new("db_path")
                        .short('d')
                        .long("db-path")
                        .default_value(DEFAULT_DB_PATH),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List installed distributions")
                .arg(Arg::new("pattern").help("Name pattern (optional, shows all if omitted)"))
                .arg(
                    Arg::new("db_path")
                        .short('d')
                        .long("db-path")
                        .default_value(DEFAULT_DB_PATH),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("Show changeset history")
                .arg(
                    Arg::new("db_path")
                        .short('d')
                        .long("db-path")
                        .default_value(DEFAULT_DB_PATH),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("stevedore.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
