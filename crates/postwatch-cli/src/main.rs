mod account;
mod poll;

use clap::{Parser, Subcommand};
use postwatch_core::Environment;
use postwatch_weibo::Category;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "postwatch-cli")]
#[command(about = "Watch Weibo accounts and print new posts as JSON lines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll one or more accounts and print new posts
    Poll {
        /// Weibo user id to watch (repeat for several accounts)
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
        /// Stop after this many rounds, the baseline round included
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        rounds: Option<u32>,
        /// Seconds between rounds (defaults to `POSTWATCH_POLL_INTERVAL_SECS`)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: Option<u64>,
        /// Only deliver these kinds of post (repost, video, text, unpin)
        #[arg(long = "category")]
        categories: Vec<Category>,
    },
    /// Print the display name of an account
    Account {
        /// Weibo user id
        #[arg(long)]
        target: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = postwatch_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi(&config.env))
        .init();
    tracing::debug!(env = %config.env, "configuration loaded");

    let cli = Cli::parse();
    match cli.command {
        Commands::Poll {
            targets,
            rounds,
            interval_secs,
            categories,
        } => {
            let targets: Vec<_> = targets
                .into_iter()
                .map(postwatch_core::Target::new)
                .collect();
            let options = poll::PollOptions {
                rounds,
                interval_secs: interval_secs.unwrap_or(config.poll_interval_secs),
                categories,
            };
            poll::run_poll(&config, &targets, &options).await?;
        }
        Commands::Account { target } => {
            account::run_account(&config, &postwatch_core::Target::new(target)).await?;
        }
    }

    Ok(())
}

/// Plain log lines in production, colored elsewhere.
fn use_ansi(env: &Environment) -> bool {
    !matches!(env, Environment::Production)
}
