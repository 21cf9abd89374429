//! Error types for scope resolution.

use thiserror::Error;

/// Programmer or configuration errors raised by the scope resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("Invalid claim type: expected a string or an array of strings, found {found}")]
    InvalidClaimType { found: String },

    #[error("Invalid required scopes type: expected a string or an array of strings, found {found}")]
    InvalidRequirementType { found: String },

    #[error("Role '{role}' includes unknown role '{include}'")]
    UnknownRole { role: String, include: String },
}

impl ScopeError {
    pub fn invalid_claim_type(found: impl Into<String>) -> Self {
        Self::InvalidClaimType { found: found.into() }
    }

    pub fn invalid_requirement_type(found: impl Into<String>) -> Self {
        Self::InvalidRequirementType { found: found.into() }
    }

    pub fn unknown_role(role: impl Into<String>, include: impl Into<String>) -> Self {
        Self::UnknownRole {
            role: role.into(),
            include: include.into(),
        }
    }
}

impl From<ScopeError> for mblock_types::ServiceError {
    fn from(error: ScopeError) -> Self {
        mblock_types::ServiceError::new(500, "ScopeError").with_message(error.to_string())
    }
}
