use thiserror::Error;
use tollgate_core::registry::RegistryError;
use tollgate_core::upstream::ResolverError;
use tollgate_core::vault::VaultError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO::{:?}: {}", .0, .0)]
    Io(#[from] std::io::Error),

    #[error("FlexiLogger::{:?}: {}", .0, .0)]
    FlexiLogger(#[from] flexi_logger::FlexiLoggerError),

    #[error("Database: {}", .0)]
    Db(#[from] sqlx::Error),

    #[error("Migration: {}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{}", .0)]
    Registry(#[from] RegistryError),

    #[error("{}", .0)]
    Upstream(#[from] ResolverError),

    #[error("ENC_KEY_BASE64: {}", .0)]
    Vault(#[from] VaultError),
}
