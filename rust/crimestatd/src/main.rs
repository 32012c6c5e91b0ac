mod backup;
mod config;
mod db;
mod import;
mod ipc;
mod listing;
mod model;
mod repo;
mod spreadsheet;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Crime statistics store and state data importer.
#[derive(Parser, Debug)]
#[command(name = "crimestatd", version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Defaults to serving JSON requests on stdin/stdout.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve line-delimited JSON requests on stdin/stdout
    Serve,

    /// Import state crime exports into a workspace
    Import {
        /// Workspace directory holding the database
        #[arg(long)]
        workspace: PathBuf,

        /// Directory containing the state export files (ACT.xml, ...)
        #[arg(long)]
        data_dir: PathBuf,

        /// Restrict to these states; repeatable
        #[arg(long = "state")]
        states: Vec<String>,

        /// Records per transaction (overrides the workspace setting)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Write SQL scripts to this file instead of committing
        #[arg(long)]
        script_out: Option<PathBuf>,
    },

    /// Insert the Australian states and territories if missing
    SeedStates {
        #[arg(long)]
        workspace: PathBuf,
    },
}

/// Logs go to stderr; stdout carries IPC responses.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("CRIMESTATD_LOG", level)
            .write_style("CRIMESTATD_LOG_STYLE"),
    )
    .format_timestamp_secs()
    .target(env_logger::Target::Stderr)
    .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(),
        Command::Import {
            workspace,
            data_dir,
            states,
            batch_size,
            script_out,
        } => {
            let conn = db::open_db(&workspace)?;
            let opts = import::ImportOptions {
                data_source_directory: data_dir,
                states: states.iter().map(|s| s.trim().to_uppercase()).collect(),
                batch_size: config::resolve_batch_size(&conn, batch_size)?,
                script_out,
            };
            log::info!(
                "importing from {} (batch size {})",
                opts.data_source_directory.display(),
                opts.batch_size
            );
            let outcomes = import::run_import(&conn, &opts)?;
            let total = repo::count_crimes(&conn)?;
            let out = serde_json::json!({ "states": outcomes, "totalCrimes": total });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Command::SeedStates { workspace } => {
            let conn = db::open_db(&workspace)?;
            let added = repo::seed_default_states(&conn)
                .context("failed to seed default states")?;
            log::info!("seeded {added} states into {}", workspace.display());
            Ok(())
        }
    }
}

fn serve() -> anyhow::Result<()> {
    let mut state = ipc::AppState::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    log::debug!("serving requests on stdin");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                log::warn!("stdin closed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                let _ = writeln!(stdout, "{}", ipc::bad_json(e.to_string()));
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    Ok(())
}
