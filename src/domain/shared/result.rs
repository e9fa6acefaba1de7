//! Domain result type

use super::error::CtiError;

/// Standard result type for domain operations
pub type Result<T> = std::result::Result<T, CtiError>;
