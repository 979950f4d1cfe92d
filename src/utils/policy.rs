// src/utils/policy.rs

use crate::utils::jwt::{CurrentUser, ROLE_ADMIN};

/// Ownership-or-admin rule, checked before any update or delete of an
/// owned resource (posts, comments, user accounts).
///
/// Reads are never gated by this policy.
pub fn can_mutate(identity: &CurrentUser, resource_owner_id: i64) -> bool {
    identity.role == ROLE_ADMIN || identity.id == resource_owner_id
}
