//! The homedav command line: runs the server and manages its accounts.

mod start;
mod users;

use clap::{Parser, Subcommand};
use slog::Drain;
use std::{error::Error, path::PathBuf};

#[derive(Parser)]
#[command(name = "homedav", version)]
#[command(about = "Serves every user their own home folder over WebDAV", long_about = None)]
struct Cli {
    /// Folder holding the user database and the users' files
    #[arg(long, env = "HOMEDAV_DATA", default_value = "./data", global = true)]
    data: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Starts the WebDAV server
    Start(start::StartArgs),
    /// Manages user accounts
    Users {
        #[command(subcommand)]
        cmd: users::UsersCommand,
    },
}

fn logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, slog::o!("version" => env!("CARGO_PKG_VERSION")))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Start(args) => start::run(&cli.data, args, logger()).await,
        Command::Users { cmd } => users::run(&cli.data, cmd).await,
    }
}
