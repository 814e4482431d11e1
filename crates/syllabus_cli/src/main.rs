//! Operator CLI for the Syllabus content store.
//!
//! # Responsibility
//! - Bootstrap databases, register actors and inspect hierarchy levels.
//! - Keep output deterministic and tab-separated for scripting.
//!
//! # Invariants
//! - Logging is initialized before any command touches a database.
//! - Relative `--log-dir` values resolve against the working directory.

use clap::{Parser, Subcommand};
use log::info;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use syllabus_core::db::migrations::latest_version;
use syllabus_core::db::open_db;
use syllabus_core::{
    core_version, default_log_level, derive_slug, init_logging, ping, Actor, HierarchyLevel, HierarchyService, NodeDraft, NodeId,
    Role, SqliteActorDirectory, SqliteHierarchyRepository,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "syllabus")]
#[command(about = "Operator tool for the Syllabus content hierarchy")]
#[command(version)]
struct Cli {
    /// Directory for rolling log files [default: ./logs]
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check core linkage and print the core version
    Ping,

    /// Print the slug derived from a display name
    Slug {
        name: String,
    },

    /// Create or migrate a database file
    InitDb {
        #[arg(long, default_value = "syllabus.sqlite3")]
        db: PathBuf,
    },

    /// Register an actor profile and open a session for it
    AddActor {
        #[arg(long, default_value = "syllabus.sqlite3")]
        db: PathBuf,

        /// superadmin, admin, teacher or any other role name
        #[arg(long)]
        role: String,
    },

    /// Create one node as a superadmin operator
    Add {
        /// exams, subjects, chapters, topics or formula_cards
        level: String,

        name: String,

        #[arg(long, default_value = "syllabus.sqlite3")]
        db: PathBuf,

        #[arg(long)]
        parent: Option<NodeId>,

        /// Derived from the name when omitted
        #[arg(long)]
        slug: Option<String>,
    },

    /// List siblings of one level in display order
    List {
        level: String,

        #[arg(long, default_value = "syllabus.sqlite3")]
        db: PathBuf,

        #[arg(long)]
        parent: Option<NodeId>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = start_logging(&cli) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn start_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let cwd = std::env::current_dir()?;
    let log_dir = resolve_log_dir(cli.log_dir.as_deref(), &cwd);
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, &log_dir.to_string_lossy())?;
    Ok(())
}

fn resolve_log_dir(flag: Option<&Path>, cwd: &Path) -> PathBuf {
    match flag {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd.join("logs"),
    }
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    info!(
        "event=cli_command module=cli status=start command={}",
        command.name()
    );
    match command {
        Commands::Ping => {
            println!("syllabus_core ping={}", ping());
            println!("syllabus_core version={}", core_version());
        }
        Commands::Slug { name } => println!("{}", derive_slug(&name)),
        Commands::InitDb { db } => {
            open_db(&db)?;
            println!("{}\tschema_version={}", db.display(), latest_version());
        }
        Commands::AddActor { db, role } => {
            let conn = open_db(&db)?;
            let directory = SqliteActorDirectory::try_new(&conn)?;
            let actor = directory.register_actor(&Role::parse(&role))?;
            let token = directory.open_session(actor.id)?;
            println!("{}\t{}\t{}", actor.id, actor.role, token);
        }
        Commands::Add {
            level,
            name,
            db,
            parent,
            slug,
        } => {
            let level = parse_level(&level)?;
            let conn = open_db(&db)?;
            let service = HierarchyService::new(SqliteHierarchyRepository::try_new(&conn)?);
            let operator = Actor::new(Uuid::nil(), Role::Superadmin);
            let node = service.create_node(
                &operator,
                level,
                NodeDraft {
                    parent_id: parent,
                    name,
                    slug,
                },
            )?;
            println!("{}\t{}\t{}", node.id, node.position, node.slug);
        }
        Commands::List { level, db, parent } => {
            let level = parse_level(&level)?;
            let conn = open_db(&db)?;
            let service = HierarchyService::new(SqliteHierarchyRepository::try_new(&conn)?);
            for node in service.list_children(level, parent)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    node.position, node.slug, node.name, node.id
                );
            }
        }
    }
    Ok(())
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Slug { .. } => "slug",
            Self::InitDb { .. } => "init-db",
            Self::AddActor { .. } => "add-actor",
            Self::Add { .. } => "add",
            Self::List { .. } => "list",
        }
    }
}

fn parse_level(value: &str) -> Result<HierarchyLevel, String> {
    HierarchyLevel::from_table(value).ok_or_else(|| {
        let known: Vec<&str> = HierarchyLevel::ALL.iter().map(|level| level.table()).collect();
        format!("unknown level `{value}`; expected one of {}", known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::{resolve_log_dir, Cli, Commands};
    use clap::Parser;
    use std::path::{Path, PathBuf};

    #[test]
    fn log_dir_defaults_under_working_directory() {
        let cwd = Path::new("/srv/syllabus");
        assert_eq!(resolve_log_dir(None, cwd), PathBuf::from("/srv/syllabus/logs"));
        assert_eq!(
            resolve_log_dir(Some(Path::new("var/log")), cwd),
            PathBuf::from("/srv/syllabus/var/log")
        );
        assert_eq!(
            resolve_log_dir(Some(Path::new("/var/log/syllabus")), cwd),
            PathBuf::from("/var/log/syllabus")
        );
    }

    #[test]
    fn logging_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "syllabus",
            "list",
            "exams",
            "--log-dir",
            "/tmp/syllabus-logs",
            "--log-level",
            "warn",
        ])
        .unwrap();
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/syllabus-logs")));
        assert_eq!(cli.log_level.as_deref(), Some("warn"));
        assert!(matches!(cli.command, Commands::List { .. }));
        assert_eq!(cli.command.name(), "list");
    }

    #[test]
    fn logging_flags_are_optional() {
        let cli = Cli::try_parse_from(["syllabus", "ping"]).unwrap();
        assert!(cli.log_dir.is_none());
        assert!(cli.log_level.is_none());
    }
}
