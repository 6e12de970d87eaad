use std::io::{self, BufRead, Write};
use std::sync::Arc;

use bluelog::config::Config;
use bluelog::fakes::{self, ForgeCounts};
use bluelog::mail::{LogMailer, mailer_from_config};
use bluelog::{AppResult, AppState, commands, db};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server.
    Serve,
    /// Create the database tables.
    Initdb {
        /// Drop every table first.
        #[arg(long)]
        drop: bool,
        /// Do not ask before dropping.
        #[arg(long)]
        yes: bool,
    },
    /// Create or update the administrator account.
    Init {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Rebuild the database with generated content.
    Forge {
        #[arg(long, default_value_t = 10)]
        category: usize,
        #[arg(long, default_value_t = 50)]
        post: usize,
        #[arg(long, default_value_t = 500)]
        comment: usize,
    },
}

fn confirm(question: &str) -> io::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing::debug!(profile = %config.profile, "configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let mailer = mailer_from_config(&config)?;
            let state = AppState::new(config, mailer).await?;
            db::migrate(&state.db).await?;
            bluelog::serve(state).await?;
        }
        Command::Initdb { drop, yes } => {
            if drop && !yes && !confirm("This operation will delete the database, do you want to continue?")? {
                println!("Aborted.");
                return Ok(());
            }
            let pool = db::connect(&config).await?;
            commands::initdb(&pool, drop).await?;
            println!("Initialized database.");
        }
        Command::Init { username, password } => {
            let pool = db::connect(&config).await?;
            commands::init(&pool, &username, &password).await?;
            println!("Done.");
        }
        Command::Forge { category, post, comment } => {
            let state = AppState::new(config, Arc::new(LogMailer)).await?;
            let counts = ForgeCounts { category, post, comment };
            fakes::forge(&state.db, &state.config, counts).await?;
            println!("Done.");
        }
    }
    Ok(())
}
