//! `nack-admin`: operator scripts run against the data directory
//!
//! Stop the server before `restore`; it keeps its own copy in memory.

use chrono::Utc;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

use nack::admin;
use nack::error::Result;
use nack::saving::{load_backup, save_backup};
use nack::store::Store;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the collections
    #[arg(long, env = "NACK_DATA_DIR", default_value = "database")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grant subscription days to an establishment (id or owner email)
    ExtendSubscription {
        key: String,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// Give platform administration rights to an account
    PromoteAdmin { email: String },
    /// Bring documents written by older versions up to date
    Backfill {
        #[arg(long)]
        dry_run: bool,
    },
    /// Store the expired plan where time ran out
    ExpirePlans,
    /// List establishments with their plan
    List,
    /// Write a compressed backup of every collection
    Backup { path: PathBuf },
    /// Replace every collection with a backup
    Restore { path: PathBuf },
}

fn run(args: Args) -> Result<()> {
    let store = Store::open(&args.data_dir)?;
    let now = Utc::now();

    match args.command {
        Command::ExtendSubscription { key, days } => {
            let status = admin::extend_subscription(&store, &key, days, now)?;
            println!(
                "{}: {} ({} days remaining)",
                key, status.plan, status.days_remaining
            );
        }
        Command::PromoteAdmin { email } => {
            let promoted = admin::promote_admin(&store, &email, "nack-admin", now)?;
            println!("{} is an administrator", promoted.email);
        }
        Command::Backfill { dry_run } => {
            let report = admin::backfill(&store, dry_run, now)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::ExpirePlans => {
            let expired = admin::expire_plans(&store, now)?;
            println!("{} establishment(s) expired", expired.len());
            for id in expired {
                println!("  {}", id);
            }
        }
        Command::List => {
            for e in admin::list_establishments(&store, now) {
                println!(
                    "{}\t{}\t{}\t{}\t{}j\t{} FCFA",
                    e.id, e.establishment_name, e.email, e.plan, e.days_remaining, e.revenue
                );
            }
        }
        Command::Backup { path } => {
            save_backup(&store.snapshot(), &path)?;
            println!("Backup written to {}", path.display());
        }
        Command::Restore { path } => {
            let db = load_backup(&path)?;
            store.restore(db)?;
            println!("Restored from {}", path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("nack-admin: {}", e);
            ExitCode::FAILURE
        }
    }
}
