pub mod app_config;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod homepage;
pub mod password;
pub mod roles;
pub mod support;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use password::{hash_password, verify_password, PasswordError};
pub use roles::{OrderStatus, ProductStatus, Role, UserStatus};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read catalog file {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog file: {0}")]
    CatalogFileParse(String),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("invalid user status: {0}")]
    InvalidUserStatus(String),
    #[error("invalid product status: {0}")]
    InvalidProductStatus(String),
    #[error("invalid order status: {0}")]
    InvalidOrderStatus(String),
}
