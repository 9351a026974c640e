use crate::types::UserId;

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The caller may proceed.
    Allow,
    /// The caller is denied.
    Deny,
}

impl Decision {
    /// Returns true for [`Decision::Allow`].
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Authenticated caller identity, built from verified token claims.
///
/// The administrator flag is carried in the claims and is deliberately not
/// re-fetched from storage when deciding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    /// Creates an actor from verified claim data.
    pub fn new(user_id: UserId, is_admin: bool) -> Self {
        Self { user_id, is_admin }
    }

    /// Decides whether this caller may mutate a resource owned by `owner`.
    ///
    /// Administrators may act on anything; everyone else only on their own
    /// resources. Pure and side-effect-free.
    pub fn may_modify(&self, owner: &UserId) -> Decision {
        if self.is_admin || self.user_id == *owner {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }

    /// Decides whether this caller holds the administrator role.
    pub fn require_admin(&self) -> Decision {
        if self.is_admin {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}
