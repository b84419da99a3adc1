//! CLI entry and dispatch.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use taskdesk_core::api::ApiClient;
use taskdesk_core::auth::FileTokenStore;
use taskdesk_core::config::{self, Config};
use taskdesk_core::logging;
use taskdesk_core::session::SessionManager;
use taskdesk_types::TaskStatus;

mod commands;

#[derive(Parser)]
#[command(name = "taskdesk")]
#[command(version = "0.1")]
#[command(about = "Manage your taskdesk tasks from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in with email and password
    Signin {
        #[arg(long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Signout,

    /// Show the signed-in user
    Whoami,

    /// Manage tasks on the dashboard
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum TaskCommands {
    /// Lists tasks, optionally for one status tab
    List {
        /// pending, in-progress or completed
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Shows a single task
    Show {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Creates a task
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,
    },
    /// Changes the title or description of a task
    Edit {
        #[arg(value_name = "TASK_ID")]
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
    /// Moves a task to another status
    Status {
        #[arg(value_name = "TASK_ID")]
        id: String,

        /// pending, in-progress or completed
        #[arg(value_name = "STATUS")]
        status: TaskStatus,
    },
    /// Deletes a task
    Delete {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    // Config commands must work even when the file is broken.
    if let Commands::Config { command } = &cli.command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        };
    }

    let config = Config::load().context("load config")?;
    let _log_guard = logging::init(&config.log).context("init logging")?;
    tracing::debug!(home = %config::paths::taskdesk_home().display(), "Starting");

    let session = connect(&config)?;

    match cli.command {
        Commands::Signin { email, password } => {
            commands::auth::signin(&session, email, password).await
        }
        Commands::Signup {
            name,
            email,
            password,
        } => commands::auth::signup(&session, name, email, password).await,
        Commands::Signout => commands::auth::signout(&session).await,
        Commands::Whoami => commands::auth::whoami(&session).await,

        Commands::Tasks { command } => {
            let mut store = commands::tasks::open_dashboard(&session).await?;
            match command {
                TaskCommands::List { status } => commands::tasks::list(&mut store, status).await,
                TaskCommands::Show { id } => commands::tasks::show(&store, &id).await,
                TaskCommands::Add { title, description } => {
                    commands::tasks::add(&mut store, title, description).await
                }
                TaskCommands::Edit {
                    id,
                    title,
                    description,
                } => commands::tasks::edit(&mut store, &id, title, description).await,
                TaskCommands::Status { id, status } => {
                    commands::tasks::set_status(&mut store, &id, status).await
                }
                TaskCommands::Delete { id } => commands::tasks::delete(&mut store, &id).await,
            }
        }

        // handled before loading config
        Commands::Config { .. } => Ok(()),
    }
}

fn connect(config: &Config) -> Result<SessionManager> {
    let tokens = Arc::new(FileTokenStore::new());
    let client = ApiClient::from_config(config, tokens).context("create API client")?;
    Ok(SessionManager::new(client))
}
