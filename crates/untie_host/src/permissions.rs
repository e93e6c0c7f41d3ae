//! Permission and group bookkeeping for the headless host.
//!
//! Every actor is implicitly a member of [`DEFAULT_GROUP`]. Each mutation
//! returns the [`LifecycleEvent`] the registry needs to hear about.

use std::collections::{HashMap, HashSet};

use untie_core::{ActorId, LifecycleEvent, Permissions};

/// Group every actor belongs to.
pub const DEFAULT_GROUP: &str = "default";

/// User grants, group grants and group membership.
#[derive(Debug, Default)]
pub struct GrantTable {
    users: HashMap<ActorId, HashSet<String>>,
    groups: HashMap<String, HashSet<String>>,
    membership: HashMap<ActorId, HashSet<String>>,
}

impl GrantTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `permission` to `actor` directly.
    pub fn grant_user(&mut self, actor: ActorId, permission: &str) -> LifecycleEvent {
        self.users
            .entry(actor)
            .or_default()
            .insert(permission.to_string());
        LifecycleEvent::UserPermissionGranted {
            actor,
            permission: permission.to_string(),
        }
    }

    /// Revoke a direct grant from `actor`.
    pub fn revoke_user(&mut self, actor: ActorId, permission: &str) -> LifecycleEvent {
        if let Some(perms) = self.users.get_mut(&actor) {
            perms.remove(permission);
        }
        LifecycleEvent::UserPermissionRevoked {
            actor,
            permission: permission.to_string(),
        }
    }

    /// Put `actor` in `group`.
    pub fn add_to_group(&mut self, actor: ActorId, group: &str) -> LifecycleEvent {
        self.membership
            .entry(actor)
            .or_default()
            .insert(group.to_string());
        LifecycleEvent::UserGroupAdded {
            actor,
            group: group.to_string(),
        }
    }

    /// Take `actor` out of `group`.
    pub fn remove_from_group(&mut self, actor: ActorId, group: &str) -> LifecycleEvent {
        if let Some(groups) = self.membership.get_mut(&actor) {
            groups.remove(group);
        }
        LifecycleEvent::UserGroupRemoved {
            actor,
            group: group.to_string(),
        }
    }

    /// Grant `permission` to every member of `group`.
    pub fn grant_group(&mut self, group: &str, permission: &str) -> LifecycleEvent {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(permission.to_string());
        LifecycleEvent::GroupPermissionGranted {
            group: group.to_string(),
            permission: permission.to_string(),
        }
    }

    /// Revoke a group grant.
    pub fn revoke_group(&mut self, group: &str, permission: &str) -> LifecycleEvent {
        if let Some(perms) = self.groups.get_mut(group) {
            perms.remove(permission);
        }
        LifecycleEvent::GroupPermissionRevoked {
            group: group.to_string(),
            permission: permission.to_string(),
        }
    }

    fn group_has(&self, group: &str, permission: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|perms| perms.contains(permission))
    }
}

impl Permissions for GrantTable {
    fn has_permission(&self, actor: ActorId, permission: &str) -> bool {
        if self
            .users
            .get(&actor)
            .is_some_and(|perms| perms.contains(permission))
        {
            return true;
        }
        if self.group_has(DEFAULT_GROUP, permission) {
            return true;
        }
        self.membership
            .get(&actor)
            .is_some_and(|groups| groups.iter().any(|g| self.group_has(g, permission)))
    }
}
