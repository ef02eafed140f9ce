//! Training session identity

use serde::{Deserialize, Serialize};

use crate::domain::constants::{DEFAULT_EQUATION_TYPE, DEFAULT_PURPOSE};
use crate::domain::errors::SessionError;

/// Purpose + equation-type pair that identifies one training session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// Purpose key, e.g. `forward_problems`
    pub purpose: String,
    /// Equation type within the purpose, e.g. `heat`
    pub equation_type: String,
}

impl SessionKey {
    pub fn new(purpose: impl Into<String>, equation_type: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            equation_type: equation_type.into(),
        }
    }

    /// Both parts must be non-blank
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.purpose.trim().is_empty() {
            return Err(SessionError::EmptyField { field: "purpose" });
        }
        if self.equation_type.trim().is_empty() {
            return Err(SessionError::EmptyField {
                field: "equation_type",
            });
        }
        Ok(())
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new(DEFAULT_PURPOSE, DEFAULT_EQUATION_TYPE)
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.purpose, self.equation_type)
    }
}
