//! Scope requirements and claims.

use serde::{Deserialize, Serialize};

/// One scope or a list of scopes.
///
/// Used both for the scopes a method block requires and for the claims a
/// caller presents. The distinction matters: a single claim can never satisfy
/// a multi-scope requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scopes {
    Single(String),
    Many(Vec<String>),
}

impl Scopes {
    /// Returns `true` for an empty string or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            Scopes::Single(scope) => scope.is_empty(),
            Scopes::Many(scopes) => scopes.is_empty(),
        }
    }

    /// Iterates the scope strings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Scopes::Single(scope) => std::slice::from_ref(scope),
            Scopes::Many(scopes) => scopes,
        };
        slice.iter().map(String::as_str)
    }

    /// Coerces into a list.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Scopes::Single(scope) => vec![scope],
            Scopes::Many(scopes) => scopes,
        }
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.iter().any(|candidate| candidate == scope)
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Scopes::Many(Vec::new())
    }
}

impl From<&str> for Scopes {
    fn from(scope: &str) -> Self {
        Scopes::Single(scope.to_string())
    }
}

impl From<String> for Scopes {
    fn from(scope: String) -> Self {
        Scopes::Single(scope)
    }
}

impl From<Vec<String>> for Scopes {
    fn from(scopes: Vec<String>) -> Self {
        Scopes::Many(scopes)
    }
}

impl From<Vec<&str>> for Scopes {
    fn from(scopes: Vec<&str>) -> Self {
        Scopes::Many(scopes.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Scopes {
    fn from(scopes: [&str; N]) -> Self {
        Scopes::Many(scopes.iter().map(|scope| scope.to_string()).collect())
    }
}
