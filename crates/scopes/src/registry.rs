//! Role and path scope registry.

use indexmap::{IndexMap, IndexSet};
use mblock_types::Scopes;
use tracing::debug;

use crate::ScopeError;

/// Registry of role grants and of the scopes each method path requires.
///
/// Role grants are flattened when granted: including a role copies the scopes
/// it holds at that moment. Granting more scopes to an included role later
/// does not reach roles that already included it.
#[derive(Debug, Default, Clone)]
pub struct ScopeRegistry {
    roles: IndexMap<String, IndexSet<String>>,
    paths: IndexMap<String, Vec<String>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `role` with `scopes`, replacing any previous grant.
    pub fn grant_role(&mut self, role: impl Into<String>, scopes: impl Into<Scopes>) {
        let role = role.into();
        let granted: IndexSet<String> = scopes.into().into_vec().into_iter().collect();
        debug!(role = %role, scope_count = granted.len(), "granted role");
        self.roles.insert(role, granted);
    }

    /// Registers `role` with `scopes` followed by the current scopes of every
    /// role in `include`. Own scopes come first and duplicates are dropped.
    ///
    /// Fails without modifying the registry when an included role is unknown.
    pub fn grant_role_including<I, S>(&mut self, role: impl Into<String>, scopes: impl Into<Scopes>, include: I) -> Result<(), ScopeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let role = role.into();
        let mut granted: IndexSet<String> = scopes.into().into_vec().into_iter().collect();
        for included in include {
            let included = included.as_ref();
            let inherited = self
                .roles
                .get(included)
                .ok_or_else(|| ScopeError::unknown_role(&role, included))?;
            granted.extend(inherited.iter().cloned());
        }

        debug!(role = %role, scope_count = granted.len(), "granted role with includes");
        self.roles.insert(role, granted);
        Ok(())
    }

    /// Union of the scopes held by `roles`, in first-seen order. Unknown roles are ignored.
    pub fn scopes_by_role<I, S>(&self, roles: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scopes: IndexSet<String> = IndexSet::new();
        for role in roles {
            if let Some(granted) = self.roles.get(role.as_ref()) {
                scopes.extend(granted.iter().cloned());
            }
        }
        scopes.into_iter().collect()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    /// Role names in grant order.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// Appends `scopes` to the scopes recorded for `path`.
    pub fn register(&mut self, path: impl Into<String>, scopes: impl Into<Scopes>) {
        let path = path.into();
        let scopes = scopes.into().into_vec();
        debug!(path = %path, scope_count = scopes.len(), "registered path scopes");
        self.paths.entry(path).or_default().extend(scopes);
    }

    /// Scopes recorded for a single path.
    pub fn scopes_for_path(&self, path: &str) -> Option<&[String]> {
        self.paths.get(path).map(Vec::as_slice)
    }

    /// Scopes for `path`, or the de-duplicated union across all paths when `path` is `None`.
    pub fn get(&self, path: Option<&str>) -> Vec<String> {
        match path {
            Some(path) => self.scopes_for_path(path).map(<[String]>::to_vec).unwrap_or_default(),
            None => {
                let all: IndexSet<&String> = self.paths.values().flatten().collect();
                all.into_iter().cloned().collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn included_role_scopes_follow_own_scopes() {
        let mut registry = ScopeRegistry::new();
        registry.grant_role("user", ["read"]);
        registry
            .grant_role_including("admin", ["write"], ["user"])
            .expect("user is registered");

        assert_eq!(registry.scopes_by_role(["admin"]), ["write", "read"]);
    }

    #[test]
    fn grants_are_deduplicated_and_coerced() {
        let mut registry = ScopeRegistry::new();
        registry.grant_role("solo", "read");
        registry.grant_role("user", ["read", "read", "profile"]);
        registry
            .grant_role_including("editor", ["read", "edit"], ["user", "solo"])
            .expect("includes are registered");

        assert_eq!(registry.scopes_by_role(["solo"]), ["read"]);
        assert_eq!(registry.scopes_by_role(["editor"]), ["read", "edit", "profile"]);
    }

    #[test]
    fn flattening_happens_at_grant_time() {
        let mut registry = ScopeRegistry::new();
        registry.grant_role("user", ["read"]);
        registry
            .grant_role_including("admin", ["write"], ["user"])
            .expect("user is registered");
        registry.grant_role("user", ["read", "comment"]);

        assert_eq!(registry.scopes_by_role(["admin"]), ["write", "read"]);
    }

    #[test]
    fn unknown_include_is_rejected() {
        let mut registry = ScopeRegistry::new();
        let error = registry
            .grant_role_including("admin", ["write"], ["ghost"])
            .expect_err("ghost is not registered");

        assert_eq!(error, ScopeError::unknown_role("admin", "ghost"));
        assert!(!registry.has_role("admin"));
    }

    #[test]
    fn scopes_by_role_unions_and_ignores_unknown_roles() {
        let mut registry = ScopeRegistry::new();
        registry.grant_role("a", ["x", "y"]);
        registry.grant_role("b", ["y", "z"]);

        assert_eq!(registry.scopes_by_role(["b", "nobody", "a"]), ["y", "z", "x"]);
        assert!(registry.scopes_by_role(["nobody"]).is_empty());
    }

    #[test]
    fn path_registry_accumulates_and_flattens() {
        let mut registry = ScopeRegistry::new();
        registry.register("users.read", "users:read");
        registry.register("users.update", ["users:write", "users:read"]);
        registry.register("users.read", ["audit"]);

        assert_eq!(registry.get(Some("users.read")), ["users:read", "audit"]);
        assert_eq!(registry.get(Some("missing")), Vec::<String>::new());
        assert_eq!(registry.get(None), ["users:read", "audit", "users:write"]);
    }
}
