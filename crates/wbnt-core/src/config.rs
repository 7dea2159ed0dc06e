use crate::app_config::{AppConfig, CorsOrigin, Environment};
use crate::ConfigError;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/walang-basagan.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3002";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_MAX_UPLOAD_BYTES: &str = "5242880";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing is decoupled from the process environment so it can be tested with
/// a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = or_default("DATABASE_URL", DEFAULT_DATABASE_URL);
    if !database_url.starts_with("sqlite:") {
        return Err(invalid(
            "DATABASE_URL",
            "only sqlite: URLs are supported".to_string(),
        ));
    }

    let env = parse_environment(&or_default("WBNT_ENV", "development"))?;

    // WBNT_BIND_ADDR wins; a bare PORT binds on all interfaces.
    let bind_addr = match lookup("WBNT_BIND_ADDR") {
        Ok(raw) => raw
            .parse::<SocketAddr>()
            .map_err(|e| invalid("WBNT_BIND_ADDR", e.to_string()))?,
        Err(_) => match lookup("PORT") {
            Ok(port) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| invalid("PORT", e.to_string()))?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            Err(_) => DEFAULT_BIND_ADDR
                .parse::<SocketAddr>()
                .map_err(|e| invalid("WBNT_BIND_ADDR", e.to_string()))?,
        },
    };

    let log_level = or_default("WBNT_LOG_LEVEL", "info");
    let cors_origin = parse_cors_origin(&or_default("WBNT_CORS_ORIGIN", DEFAULT_CORS_ORIGIN));
    let uploads_dir = PathBuf::from(or_default("WBNT_UPLOADS_DIR", "./uploads"));
    let catalog_path = PathBuf::from(or_default("WBNT_CATALOG_PATH", "./data/products.json"));

    let max_upload_bytes = parse_usize("WBNT_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
    if max_upload_bytes == 0 {
        return Err(invalid(
            "WBNT_MAX_UPLOAD_BYTES",
            "must be greater than zero".to_string(),
        ));
    }

    let db_max_connections = parse_u32("WBNT_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("WBNT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("WBNT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let auth_rate_limit = parse_usize("WBNT_AUTH_RATE_LIMIT", "30")?;
    let auth_rate_window_secs = parse_u64("WBNT_AUTH_RATE_WINDOW_SECS", "60")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        cors_origin,
        uploads_dir,
        catalog_path,
        max_upload_bytes,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        auth_rate_limit,
        auth_rate_window_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "WBNT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_cors_origin(s: &str) -> CorsOrigin {
    match s.trim() {
        "*" => CorsOrigin::Any,
        other => CorsOrigin::Exact(other.to_string()),
    }
}
