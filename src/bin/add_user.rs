//! Register a moderator account.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use dotmoe::auth::hash_password;
use dotmoe::db::{self, Database};

#[derive(Debug, Parser)]
#[command(name = "dotmoe-add-user", about = "Register a moderator account")]
struct Cli {
    /// Login email
    email: String,

    /// Login password
    password: String,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "./data/dotmoe.sqlite")]
    database: PathBuf,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if !cli.email.contains('@') {
        eprintln!("Email is invalid!");
        eprintln!("{}", Cli::command().render_usage());
        std::process::exit(2);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(parent) = cli.database.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&cli.database)
        .await
        .context("Failed to initialize database")?;
    let hash = hash_password(&cli.password)?;

    if db::add_user(db.pool(), &cli.email, &hash).await? {
        println!("User {} added.", cli.email);
    } else {
        println!("User {} already exists.", cli.email);
    }

    Ok(())
}
