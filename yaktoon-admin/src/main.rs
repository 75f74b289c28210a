//! yaktoon-admin - maintenance CLI
//!
//! **Usage:**
//! ```bash
//! yaktoon-admin [--redis-url <url>] seed
//! yaktoon-admin clear --yes
//! yaktoon-admin create-admin --user-id admin --password <pw> --name Administrator
//! yaktoon-admin cleanup-sessions --max-age-hours 24
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use yaktoon_admin::accounts::{self, AccountOutcome};
use yaktoon_admin::{seed, sessions};
use yaktoon_common::config::{load_toml_config, AppConfig, CliOverrides};
use yaktoon_common::{time, RedisStore, Store};

/// Maintenance commands for the Yaktoon Redis database
#[derive(Parser, Debug)]
#[command(name = "yaktoon-admin")]
#[command(about = "Seed, inspect and maintain the Yaktoon database")]
#[command(version)]
struct Args {
    /// Redis connection URL (defaults to the API server's configuration)
    #[arg(long, global = true)]
    redis_url: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flush the database and load the demo catalog
    Seed,
    /// Print catalog counts and a sample influencer
    Verify,
    /// Flush the whole database
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Remove only the keys written by `seed`
    Rollback,
    /// Create an admin login (no-op if the login id is taken)
    CreateAdmin {
        #[arg(long, default_value = "admin")]
        user_id: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Administrator")]
        name: String,
    },
    /// Create an influencer dashboard login
    CreateInfluencer {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete persisted analysis sessions older than the cutoff
    CleanupSessions {
        #[arg(long, default_value = "24")]
        max_age_hours: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Starting yaktoon-admin v{}", env!("CARGO_PKG_VERSION"));

    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load config")?;
    let config = AppConfig::resolve(
        &CliOverrides {
            port: None,
            redis_url: args.redis_url.clone(),
        },
        &toml_config,
    );
    let store = RedisStore::connect(&config.redis_url)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;

    run(&store, args.command).await
}

async fn run(store: &dyn Store, command: Command) -> Result<()> {
    match command {
        Command::Seed => {
            let summary = seed::seed(store).await?;
            println!("✅ Database seeding completed");
            println!("   - {} influencers", summary.influencers);
            println!("   - {} products", summary.products);
            println!("   - {} posts", summary.posts);
        }
        Command::Verify => {
            let report = seed::verify(store).await?;
            println!("Influencers: {}", report.influencers);
            println!("Products:    {}", report.products);
            println!("Posts:       {}", report.posts);
            match report.sample {
                Some((name, followers)) => println!("Sample: {} ({} followers)", name, followers),
                None => println!("Sample: none"),
            }
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("Refusing to flush the database without --yes");
            }
            store.flushdb().await?;
            println!("✅ Database cleared");
        }
        Command::Rollback => {
            let removed = seed::rollback(store).await?;
            println!("✅ Removed {} seed keys", removed);
        }
        Command::CreateAdmin {
            user_id,
            password,
            name,
        } => {
            match accounts::create_admin(store, &user_id, &password, &name).await? {
                AccountOutcome::Created { id } => {
                    println!("✅ Admin created: login {} (internal id {})", user_id, id)
                }
                AccountOutcome::AlreadyExists { id } => {
                    println!("Admin login {} already exists (internal id {})", user_id, id)
                }
            }
        }
        Command::CreateInfluencer {
            slug,
            password,
            name,
            email,
        } => {
            match accounts::create_influencer(store, &slug, &password, &name, email.as_deref())
                .await?
            {
                AccountOutcome::Created { .. } => println!("✅ Influencer login created: {}", slug),
                AccountOutcome::AlreadyExists { id } => {
                    println!("Login {} already exists (internal id {})", slug, id)
                }
            }
        }
        Command::CleanupSessions { max_age_hours } => {
            let removed = sessions::cleanup_sessions(store, max_age_hours, time::now()).await?;
            println!("✅ Removed {} stale analysis sessions", removed);
        }
    }
    Ok(())
}
