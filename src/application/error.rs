use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{origin::OriginError, resolver::ResolveError},
    cache::CacheError,
    infra::error::InfraError,
};

/// Flattened view of an error chain for logging.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Origin(#[from] OriginError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code reported by the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Resolve(ResolveError::TenantNotFound(_)) => 3,
            AppError::Infra(InfraError::Configuration { .. }) => 2,
            _ => 1,
        }
    }
}
