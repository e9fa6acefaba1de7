//! Extension identity
//!
//! The stable `(number, context)` identity of an endpoint, used as the
//! key for endpoint status and call lookup. It survives channel churn.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable extension identity.
///
/// Two extensions are equal iff number, context and the internal flag
/// all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extension {
    pub number: String,
    pub context: String,
    pub internal: bool,
}

impl Extension {
    pub fn new(number: &str, context: &str, internal: bool) -> Self {
        Self {
            number: number.to_string(),
            context: context.to_string(),
            internal,
        }
    }

    /// Placeholder identity for a call leg that has no resolved
    /// destination yet.
    pub fn empty() -> Self {
        Self::new("", "", true)
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.number, self.context)
    }
}
