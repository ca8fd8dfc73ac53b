// Role-based access control for market administration

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

use crate::error::{MarketError, Result};

/// Roles recognized by the market engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dispute corrections, override finalization, parameter and role changes
    Admin,
    /// Approves, rejects and activates proposed markets
    Operator,
    /// Proposes outcomes once the resolution deadline has passed
    Resolver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role_str = match self {
            Role::Admin => "ADMIN_ROLE",
            Role::Operator => "OPERATOR_ROLE",
            Role::Resolver => "RESOLVER_ROLE",
        };
        write!(f, "{}", role_str)
    }
}

/// Role lookup consumed by the market engine
pub trait RoleChecker {
    fn has_role(&self, role: Role, identity: &str) -> bool;

    /// `Unauthorized` unless `identity` holds `role`
    fn require_role(&self, role: Role, identity: &str) -> Result<()> {
        if self.has_role(role, identity) {
            Ok(())
        } else {
            Err(MarketError::Unauthorized {
                role: role.to_string(),
                caller: identity.to_string(),
            })
        }
    }
}

/// In-memory role registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControl {
    members: BTreeMap<Role, BTreeSet<String>>,
}

impl AccessControl {
    /// Registry with a single bootstrap admin
    pub fn new(admin: &str) -> Self {
        let mut access = Self::default();
        access.insert(Role::Admin, admin);
        access
    }

    /// Registry seeded with one identity per role
    pub fn with_roles(admin: &str, operator: &str, resolver: &str) -> Self {
        let mut access = Self::new(admin);
        access.insert(Role::Operator, operator);
        access.insert(Role::Resolver, resolver);
        access
    }

    fn insert(&mut self, role: Role, identity: &str) -> bool {
        self.members
            .entry(role)
            .or_default()
            .insert(identity.to_string())
    }

    /// Grant `role` to `identity`; only admins may grant
    pub fn grant_role(&mut self, caller: &str, role: Role, identity: &str) -> Result<()> {
        self.require_role(Role::Admin, caller)?;
        if self.insert(role, identity) {
            info!("🔑 {} granted {} to {}", caller, role, identity);
        }
        Ok(())
    }

    /// Revoke `role` from `identity`; only admins may revoke
    pub fn revoke_role(&mut self, caller: &str, role: Role, identity: &str) -> Result<()> {
        self.require_role(Role::Admin, caller)?;
        let removed = self
            .members
            .get_mut(&role)
            .map(|set| set.remove(identity))
            .unwrap_or(false);
        if removed {
            info!("🔒 {} revoked {} from {}", caller, role, identity);
        }
        Ok(())
    }

    /// Everyone holding `role`
    pub fn members(&self, role: Role) -> Vec<String> {
        self.members
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl RoleChecker for AccessControl {
    fn has_role(&self, role: Role, identity: &str) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(identity))
            .unwrap_or(false)
    }
}
