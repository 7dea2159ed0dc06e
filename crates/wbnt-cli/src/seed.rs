//! First-run data: the admin account, the product catalog, and homepage
//! sections. Every command is safe to re-run.

use std::path::PathBuf;

use clap::Subcommand;
use sqlx::SqlitePool;
use wbnt_core::{AppConfig, Role};

const DEFAULT_ADMIN_EMAIL: &str = "admin@wbnt.com";
const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Sub-commands available under `seed`.
#[derive(Debug, Subcommand)]
pub enum SeedCommands {
    /// Create the admin account if none exists yet
    Admin {
        #[arg(long, env = "WBNT_ADMIN_EMAIL", default_value = DEFAULT_ADMIN_EMAIL)]
        email: String,
        #[arg(long, env = "WBNT_ADMIN_USERNAME", default_value = DEFAULT_ADMIN_USERNAME)]
        username: String,
        #[arg(long, env = "WBNT_ADMIN_PASSWORD", default_value = DEFAULT_ADMIN_PASSWORD)]
        password: String,
    },
    /// Import the catalog file into an empty products table
    Catalog {
        /// Seed file (JSON or YAML); defaults to the configured catalog path
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Write default homepage sections into an empty table
    Homepage,
}

pub(crate) async fn run(
    pool: &SqlitePool,
    config: &AppConfig,
    command: SeedCommands,
) -> anyhow::Result<()> {
    match command {
        SeedCommands::Admin {
            email,
            username,
            password,
        } => seed_admin(pool, &email, &username, &password).await,
        SeedCommands::Catalog { path } => {
            let path = path.unwrap_or_else(|| config.catalog_path.clone());
            seed_catalog(pool, &path).await
        }
        SeedCommands::Homepage => {
            let written = wbnt_db::seed_homepage_defaults(pool).await?;
            if written == 0 {
                println!("homepage content already present; nothing to do");
            } else {
                println!("seeded {written} homepage section(s)");
            }
            Ok(())
        }
    }
}

async fn seed_admin(
    pool: &SqlitePool,
    email: &str,
    username: &str,
    password: &str,
) -> anyhow::Result<()> {
    if let Some(id) = wbnt_db::first_admin_id(pool).await? {
        println!("admin account already exists (id {id}); nothing to do");
        return Ok(());
    }

    let hash = wbnt_core::hash_password(password)?;
    let user = wbnt_db::create_user(pool, email, username, &hash, Role::Admin.as_str()).await?;
    tracing::info!(user_id = user.id, "created admin account");
    println!("created admin {} <{}>", user.username, user.email);
    Ok(())
}

async fn seed_catalog(pool: &SqlitePool, path: &std::path::Path) -> anyhow::Result<()> {
    let products = wbnt_core::catalog::load_catalog(path)?;
    let inserted = wbnt_db::seed_catalog_if_empty(pool, &products).await?;
    if inserted == 0 {
        println!("products table not empty; skipped {}", path.display());
    } else {
        println!("seeded {inserted} product(s) from {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod live {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn seed_admin_runs_once(pool: SqlitePool) {
        seed_admin(&pool, "boss@wbnt.test", "boss", "pw")
            .await
            .expect("first seed");
        seed_admin(&pool, "other@wbnt.test", "other", "pw")
            .await
            .expect("second seed is a no-op");

        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(admins, 1);

        let creds = wbnt_db::get_credentials_by_email(&pool, "boss@wbnt.test")
            .await
            .expect("query")
            .expect("admin exists");
        assert!(wbnt_core::verify_password("pw", &creds.password_hash).expect("verify"));
    }
}
