//! Principals and authentication checks
//!
//! The host resolves the current principal once at engine construction;
//! auth directives test it at render time. All-empty principal parts
//! mean "nobody is signed in".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::expr::ast::Expr;

/// The authenticated subject, as supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub role: String,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, S>(name: impl Into<String>, role: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            role: role.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Map host-supplied principal parts to an optional principal.
///
/// Empty name, empty role, and an empty permission set together denote
/// "no principal".
pub fn resolve_principal<I, S>(name: &str, role: &str, permissions: I) -> Option<Principal>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let permissions: BTreeSet<String> = permissions.into_iter().map(Into::into).collect();
    if name.is_empty() && role.is_empty() && permissions.is_empty() {
        return None;
    }
    Some(Principal {
        name: name.to_string(),
        role: role.to_string(),
        permissions,
    })
}

/// A compiled authentication test. Role and permission expressions are
/// evaluated at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthCheck {
    /// `@auth` / `@auth(role)`: principal present, optionally with a
    /// matching role.
    Authenticated { role: Option<Expr> },
    /// `@guest` / `@guest(role)`: negation of the matching
    /// `Authenticated` form.
    Guest { role: Option<Expr> },
    /// `@can(permission)`: principal present and holding the permission.
    Can { permission: Expr },
}

/// `@auth` predicate over an evaluated role.
pub fn check_authenticated(principal: Option<&Principal>, role: Option<&str>) -> bool {
    match (principal, role) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(p), Some(r)) => p.role == r,
    }
}

/// `@guest` predicate over an evaluated role.
pub fn check_guest(principal: Option<&Principal>, role: Option<&str>) -> bool {
    !check_authenticated(principal, role)
}

/// `@can` predicate over an evaluated permission.
pub fn check_can(principal: Option<&Principal>, permission: &str) -> bool {
    principal
        .map(|p| p.has_permission(permission))
        .unwrap_or(false)
}
