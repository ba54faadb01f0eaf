//! Region-scoped permission checks.
//!
//! A `region` of `None` is the "no region" probe: it only ever succeeds
//! through the `superadmin` override.

use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Identity, Permission};

/// Does `identity` hold `required` in `region`?
///
/// `superadmin` in any group wins regardless of the arguments. Otherwise a
/// single group must both be scoped to exactly `region` and carry `required`;
/// global groups never match a concrete region.
pub fn check_scope(identity: &Identity, region: Option<Uuid>, required: &Permission) -> bool {
    if identity
        .groups
        .iter()
        .any(|group| group.grants(&Permission::Superadmin))
    {
        return true;
    }

    let Some(region) = region else {
        return false;
    };

    identity
        .groups
        .iter()
        .any(|group| group.region_id == Some(region) && group.grants(required))
}

/// Multi-region variant: `superadmin`, or `admin` in any of `regions`.
///
/// NOTE: the per-region branch always requires `admin`; `required` does not
/// participate.
pub fn check_scopes(identity: &Identity, regions: &[Uuid], required: &Permission) -> bool {
    if check_scope(identity, None, &Permission::Superadmin) {
        return true;
    }

    if *required != Permission::Admin {
        tracing::debug!(
            user_id = %identity.user_id,
            requested = %required,
            "Multi-region scope check evaluates admin, not the requested permission"
        );
    }

    regions
        .iter()
        .any(|region| check_scope(identity, Some(*region), &Permission::Admin))
}

/// Handler-side guard turning a failed scope check into 403.
pub fn require_scope(
    identity: &Identity,
    region: Option<Uuid>,
    required: &Permission,
) -> Result<(), AppError> {
    if check_scope(identity, region, required) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %identity.user_id,
        region = ?region,
        required = %required,
        "Insufficient scope"
    );
    Err(AppError::Forbidden(anyhow::anyhow!(
        "Insufficient scope. Required: {}",
        required
    )))
}
