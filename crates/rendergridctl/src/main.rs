//! rendergridctl — operator CLI for a RenderGrid deployment.
//!
//! Assembles the RenderGrid crates against the local redb backend:
//! - Deployment profile scaffolding and validation
//! - Rendering capacity and headroom reports
//! - Pool status
//! - Action batch dispatch to the orchestration relay
//! - Job and pool teardown
//!
//! # Usage
//!
//! ```text
//! rendergridctl validate --config rendergrid.toml
//! rendergridctl capacity --config rendergrid.toml --clients 42
//! rendergridctl dispatch --config rendergrid.toml --file batch.json
//! rendergridctl teardown --job j1 --pool r1
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "rendergridctl",
    about = "RenderGrid — cloud render farm controller",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter rendergrid.toml.
    Init {
        /// Where to write the profile.
        #[arg(short, long, default_value = "rendergrid.toml")]
        path: PathBuf,
        /// Batch account name.
        #[arg(long)]
        account: String,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Check a deployment profile and print the first violation, if any.
    Validate {
        #[arg(short, long, default_value = "rendergrid.toml")]
        config: PathBuf,
    },
    /// Report rendering slot capacity and whether clients are approaching it.
    Capacity {
        #[arg(short, long, default_value = "rendergrid.toml")]
        config: PathBuf,
        /// Data directory of the local backend.
        #[arg(long, default_value = ".rendergrid")]
        data_dir: PathBuf,
        /// Currently connected clients.
        #[arg(long, default_value = "0")]
        clients: u64,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// List pools and their nodes.
    Status {
        #[arg(long, default_value = ".rendergrid")]
        data_dir: PathBuf,
    },
    /// Send an action batch file to the orchestration relay.
    Dispatch {
        /// JSON array of {"action","turnServerId","vmIds"} items.
        #[arg(short, long)]
        file: PathBuf,
        /// Profile providing [dispatch].endpoint.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Relay endpoint; overrides the profile.
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// Delete a job and then its pool. Missing resources are skipped.
    Teardown {
        #[arg(short, long, default_value = "rendergrid.toml")]
        config: PathBuf,
        #[arg(long, default_value = ".rendergrid")]
        data_dir: PathBuf,
        #[arg(long)]
        job: String,
        #[arg(long)]
        pool: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,rendergrid=debug"))?,
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init { path, account, force } => commands::init::init(&path, &account, force),
        Command::Validate { config } => commands::validate::validate(&config),
        Command::Capacity {
            config,
            data_dir,
            clients,
            format,
        } => commands::capacity::capacity(&config, &data_dir, clients, &format).await,
        Command::Status { data_dir } => commands::status::status(&data_dir).await,
        Command::Dispatch {
            file,
            config,
            endpoint,
        } => commands::dispatch::dispatch(&file, config.as_deref(), endpoint.as_deref()).await,
        Command::Teardown {
            config,
            data_dir,
            job,
            pool,
        } => commands::teardown::teardown(&config, &data_dir, &job, &pool).await,
    }
}
