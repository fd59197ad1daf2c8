//! Moderator role hierarchy
//!
//! Decides whether one member may discipline another based on role names
//! alone. Admin roles are ranked by their position in the list (later is
//! higher), as are moderator roles. Any admin outranks every moderator.

use serde::{Deserialize, Serialize};

/// Ordered admin and moderator role names, lowest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleHierarchy {
    /// Admin roles, lowest first
    #[serde(default)]
    pub admin_roles: Vec<String>,
    /// Moderator roles, lowest first
    #[serde(default)]
    pub moderator_roles: Vec<String>,
}

fn highest_rank<S: AsRef<str>>(ranks: &[String], roles: &[S]) -> Option<usize> {
    ranks
        .iter()
        .enumerate()
        .filter(|(_, rank)| roles.iter().any(|r| r.as_ref() == rank.as_str()))
        .map(|(i, _)| i)
        .max()
}

impl RoleHierarchy {
    /// Create a hierarchy
    #[must_use]
    pub fn new(admin_roles: Vec<String>, moderator_roles: Vec<String>) -> Self {
        Self {
            admin_roles,
            moderator_roles,
        }
    }

    /// Whether the roles include any admin role
    #[must_use]
    pub fn is_admin<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        highest_rank(&self.admin_roles, roles).is_some()
    }

    /// Whether the roles include any admin or moderator role
    #[must_use]
    pub fn is_staff<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.is_admin(roles) || highest_rank(&self.moderator_roles, roles).is_some()
    }

    /// Whether an author holding `author_roles` may discipline a target
    /// holding `target_roles`.
    ///
    /// - Admin targets: only a strictly higher admin may act
    /// - Otherwise any admin may act
    /// - Moderator targets: only a strictly higher moderator may act
    /// - Plain targets: any moderator may act
    /// - Members without staff roles may never act
    #[must_use]
    pub fn may_discipline<A: AsRef<str>, T: AsRef<str>>(
        &self,
        author_roles: &[A],
        target_roles: &[T],
    ) -> bool {
        let author_admin = highest_rank(&self.admin_roles, author_roles);
        let target_admin = highest_rank(&self.admin_roles, target_roles);

        if let Some(target) = target_admin {
            return author_admin.is_some_and(|author| author > target);
        }
        if author_admin.is_some() {
            return true;
        }

        let author_mod = highest_rank(&self.moderator_roles, author_roles);
        let target_mod = highest_rank(&self.moderator_roles, target_roles);

        match (author_mod, target_mod) {
            (Some(author), Some(target)) => author > target,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}
