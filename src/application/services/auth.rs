//! Privilege map - who holds which named privilege.
//!
//! A privilege is held directly by a set of masks. A holder may also be the
//! name of another privilege, which delegates: anyone holding that privilege
//! holds this one too.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::domain::mask::mask_matches;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthMap {
    memberships: BTreeMap<String, BTreeSet<String>>,
}

impl AuthMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(memberships: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { memberships }
    }

    /// Grant `privilege` to `mask`. Returns false if it was already held.
    pub fn grant(&mut self, mask: &str, privilege: &str) -> bool {
        self.memberships
            .entry(privilege.to_string())
            .or_default()
            .insert(mask.to_string())
    }

    /// Revoke `privilege` from `mask`. Returns false if it was not held.
    pub fn revoke(&mut self, mask: &str, privilege: &str) -> bool {
        let Some(holders) = self.memberships.get_mut(privilege) else {
            return false;
        };
        let removed = holders.remove(mask);
        if holders.is_empty() {
            self.memberships.remove(privilege);
        }
        removed
    }

    /// Masks holding `privilege` directly
    pub fn holders(&self, privilege: &str) -> BTreeSet<String> {
        self.memberships.get(privilege).cloned().unwrap_or_default()
    }

    pub fn privileges(&self) -> impl Iterator<Item = &str> {
        self.memberships.keys().map(String::as_str)
    }

    /// Does `principal` hold `privilege`, directly or through delegation?
    pub fn principal_has(&self, principal: &str, privilege: &str) -> bool {
        let mut expanded = HashSet::new();
        self.resolve(principal, privilege, &mut expanded)
    }

    /// Like [`principal_has`](Self::principal_has), also accepting the
    /// channel-scoped form `<channel>:<privilege>`.
    pub fn principal_has_in_channel(&self, channel: &str, principal: &str, privilege: &str) -> bool {
        self.principal_has(principal, privilege)
            || self.principal_has(principal, &format!("{}:{}", channel, privilege))
    }

    fn resolve<'a>(&'a self, principal: &str, privilege: &'a str, expanded: &mut HashSet<&'a str>) -> bool {
        // each privilege is expanded at most once, cycles end here
        if !expanded.insert(privilege) {
            return false;
        }
        let Some(holders) = self.memberships.get(privilege) else {
            return false;
        };

        if holders.iter().any(|mask| mask_matches(mask, principal)) {
            return true;
        }
        holders
            .iter()
            .filter(|holder| self.memberships.contains_key(holder.as_str()))
            .any(|holder| self.resolve(principal, holder, expanded))
    }

    pub fn to_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.memberships.clone()
    }

    /// Replace everything with `memberships`
    pub fn load(&mut self, memberships: BTreeMap<String, BTreeSet<String>>) {
        self.memberships = memberships;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_grant() {
        let mut auth = AuthMap::new();
        assert!(auth.grant("boss!*@*", "admin"));
        assert!(!auth.grant("boss!*@*", "admin"));

        assert!(auth.principal_has("boss!x@y", "admin"));
        assert!(!auth.principal_has("other!x@y", "admin"));
        assert!(!auth.principal_has("boss!x@y", "ops"));
    }

    #[test]
    fn test_holders_is_not_recursive() {
        let mut auth = AuthMap::new();
        auth.grant("boss!*@*", "admin");
        auth.grant("admin", "ops");

        let holders = auth.holders("ops");
        assert_eq!(holders.len(), 1);
        assert!(holders.contains("admin"));
        assert!(auth.holders("nothing").is_empty());
    }

    #[test]
    fn test_delegation_is_transitive() {
        let mut auth = AuthMap::new();
        auth.grant("boss!*@*", "admin");
        auth.grant("admin", "ops");
        auth.grant("ops", "voice");

        assert!(auth.principal_has("boss!x@y", "ops"));
        assert!(auth.principal_has("boss!x@y", "voice"));
        assert!(!auth.principal_has("peon!x@y", "voice"));
    }

    #[test]
    fn test_cyclic_delegation_terminates() {
        let mut auth = AuthMap::new();
        auth.grant("B", "A");
        auth.grant("A", "B");
        auth.grant("self", "self");

        assert!(!auth.principal_has("someone!x@y", "A"));
        assert!(!auth.principal_has("someone!x@y", "self"));

        auth.grant("someone!*@*", "B");
        assert!(auth.principal_has("someone!x@y", "A"));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let mut auth = AuthMap::new();
        auth.grant("boss!*@*", "admin");
        assert!(auth.revoke("boss!*@*", "admin"));
        assert!(!auth.revoke("boss!*@*", "admin"));
        assert!(!auth.revoke("boss!*@*", "never-granted"));
        assert!(!auth.principal_has("boss!x@y", "admin"));
        assert_eq!(auth.privileges().count(), 0);
    }

    #[test]
    fn test_channel_scoped_privilege() {
        let mut auth = AuthMap::new();
        auth.grant("mod!*@*", "#cassandra:log_blacklist_admin");

        assert!(auth.principal_has_in_channel("#cassandra", "mod!a@b", "log_blacklist_admin"));
        assert!(!auth.principal_has_in_channel("#other", "mod!a@b", "log_blacklist_admin"));
    }
}
