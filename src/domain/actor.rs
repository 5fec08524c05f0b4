//! Actors, permissions and the authorization gate.
//!
//! The workflow never decides on its own whether an actor holds a permission. It
//! asks an [`AuthorizationGate`] at call time and treats the answer as authoritative.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::domain::request::UserId;
use crate::error::{Result, TravelflowError};

/// A named permission understood by the travel workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    /// Submit travel requests.
    #[serde(rename = "travel.create")]
    TravelCreate,
    /// Approve, cancel and administer everyone's travel requests.
    #[serde(rename = "travel.manage")]
    TravelManage,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::TravelCreate => "travel.create",
            Permission::TravelManage => "travel.manage",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = TravelflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "travel.create" => Ok(Permission::TravelCreate),
            "travel.manage" => Ok(Permission::TravelManage),
            _ => Err(TravelflowError::Validation(format!(
                "Invalid permission: {}",
                s
            ))),
        }
    }
}

/// Canonical roles and the permissions they grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Travel managers: may submit and decide on requests.
    Administrator,
    /// Regular employees: may only submit requests.
    Employee,
}

impl Role {
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Administrator => &[Permission::TravelCreate, Permission::TravelManage],
            Role::Employee => &[Permission::TravelCreate],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Employee => "employee",
        }
    }
}

/// The identity attempting an operation, supplied per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub name: String,
    permissions: BTreeSet<Permission>,
}

impl Actor {
    /// An actor with no permissions.
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            permissions: BTreeSet::new(),
        }
    }

    /// An actor holding every permission `role` grants.
    pub fn with_role(id: UserId, name: impl Into<String>, role: Role) -> Self {
        Self::new(id, name).with_permissions(role.permissions().iter().copied())
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// Permissions carried on the actor itself.
    pub fn permissions(&self) -> impl Iterator<Item = Permission> + '_ {
        self.permissions.iter().copied()
    }

    pub fn holds(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Source of permission facts about actors.
///
/// Implementations must fail closed: when in doubt, answer `false`.
pub trait AuthorizationGate: Send + Sync {
    fn has_permission(&self, actor: &Actor, permission: Permission) -> bool;
}

impl<G: AuthorizationGate + ?Sized> AuthorizationGate for Arc<G> {
    fn has_permission(&self, actor: &Actor, permission: Permission) -> bool {
        (**self).has_permission(actor, permission)
    }
}

/// Gate that trusts the permission set carried on the [`Actor`].
///
/// Suitable when the caller already resolved permissions, e.g. from token claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionGate;

impl AuthorizationGate for PermissionGate {
    fn has_permission(&self, actor: &Actor, permission: Permission) -> bool {
        actor.holds(permission)
    }
}

/// Gate backed by a role table keyed by user id.
///
/// Ignores the permissions carried on the actor: only roles assigned here count.
/// Unknown users hold nothing.
#[derive(Debug, Clone, Default)]
pub struct RoleGate {
    roles: Arc<DashMap<UserId, BTreeSet<Role>>>,
}

impl RoleGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign_role(&self, user: UserId, role: Role) {
        self.roles.entry(user).or_default().insert(role);
    }

    /// Replace every role of `user`.
    pub fn sync_roles(&self, user: UserId, roles: impl IntoIterator<Item = Role>) {
        self.roles.insert(user, roles.into_iter().collect());
    }

    pub fn revoke_roles(&self, user: UserId) {
        self.roles.remove(&user);
    }

    pub fn roles_of(&self, user: UserId) -> Vec<Role> {
        self.roles
            .get(&user)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl AuthorizationGate for RoleGate {
    fn has_permission(&self, actor: &Actor, permission: Permission) -> bool {
        self.roles
            .get(&actor.id)
            .is_some_and(|roles| roles.iter().any(|r| r.permissions().contains(&permission)))
    }
}
