mod seed;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::seed::SeedCommands;

#[derive(Debug, Parser)]
#[command(name = "wbnt-cli")]
#[command(about = "Walang Basagan ng Thrift maintenance commands")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Load initial data
    Seed {
        #[command(subcommand)]
        command: SeedCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database answers
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("wbnt-cli: run with --help to list commands");
        return Ok(());
    };

    let config = wbnt_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = wbnt_db::PoolConfig::from_app_config(&config);
    let pool = wbnt_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            wbnt_db::ping(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = wbnt_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Seed { command } => {
            wbnt_db::run_migrations(&pool).await?;
            seed::run(&pool, &config, command).await?;
        }
    }

    pool.close().await;
    Ok(())
}
