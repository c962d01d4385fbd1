//! Error types for cms-server

use cms_core::{CmsError, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to parse CMS config: {0}")]
    ConfigParse(String),

    #[error("Invalid function registry: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Cms(#[from] CmsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, Error>;
