//! Shared kernel - common types and utilities used across the domain

pub mod error;
pub mod result;

pub use error::CtiError;
pub use result::Result;
