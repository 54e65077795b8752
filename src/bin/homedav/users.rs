use clap::Subcommand;
use homedav::accounts;
use homedav_auth_jsonfile::JsonFileUserStore;
use homedav_core::auth::UserStore;
use homedav_sbe_fs::Filesystem;
use std::{error::Error, path::Path};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Subcommand)]
pub enum UsersCommand {
    /// Creates an account and its home folder
    Add {
        name: String,
        /// The password, read from stdin when not given
        #[arg(long, env = "HOMEDAV_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sets a new password
    Update {
        name: String,
        /// The password, read from stdin when not given
        #[arg(long, env = "HOMEDAV_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Deletes an account and everything in its home folder
    Delete {
        name: String,
        /// Don't ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Lists all accounts
    List,
}

pub async fn run(data: &Path, cmd: UsersCommand) -> Result<(), Box<dyn Error>> {
    let store = JsonFileUserStore::open(data.join("users.json"))?;
    match cmd {
        UsersCommand::Add { name, password } => {
            let storage = Filesystem::new(data)?;
            let password = password_or_prompt(password).await?;
            accounts::add_user(&store, &storage, &name, &password).await?;
            println!("Added {name}");
        }
        UsersCommand::Update { name, password } => {
            if !store.exists(&name).await? {
                return Err(format!("unknown user {name:?}").into());
            }
            let password = password_or_prompt(password).await?;
            accounts::update_password(&store, &name, &password).await?;
            println!("Updated {name}");
        }
        UsersCommand::Delete { name, yes } => {
            if !store.exists(&name).await? {
                return Err(format!("unknown user {name:?}").into());
            }
            if !yes && !confirm(&format!("Delete {name} and all of their files? Are you sure? [y/N] ")).await? {
                println!("Nothing deleted");
                return Ok(());
            }
            let storage = Filesystem::new(data)?;
            accounts::delete_user(&store, &storage, &name).await?;
            println!("Deleted {name}");
        }
        UsersCommand::List => {
            let names = store.list().await?;
            println!("{} users:", names.len());
            for name in names {
                println!("- {name}");
            }
        }
    }
    Ok(())
}

async fn read_line(prompt: &str) -> std::io::Result<String> {
    eprint!("{prompt}");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn password_or_prompt(password: Option<String>) -> std::io::Result<String> {
    match password {
        Some(password) => Ok(password),
        None => read_line("Password: ").await,
    }
}

async fn confirm(prompt: &str) -> std::io::Result<bool> {
    let answer = read_line(prompt).await?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
