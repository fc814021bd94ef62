// src/services/error.rs
use std::fmt;

/// The only two failures that propagate to callers as user-visible errors.
/// Source/cache trouble never shows up here; it collapses to "no data"
/// inside the adapters and resolver.
#[derive(Debug, Clone)]
pub enum ServiceError {
    NotFound(String),
    InvalidInput(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServiceError::NotFound(msg) => write!(f, "{}", msg),
            ServiceError::InvalidInput(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}
