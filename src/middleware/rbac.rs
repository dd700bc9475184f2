// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    models::auth::{User, UserRole},
};

/// A permission is a slug plus the roles that hold it.
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
    fn granted_to(role: UserRole) -> bool;
}

/// Rejects the request with 403 unless the caller's role holds `T`.
/// Must run behind `auth_guard`.
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<User>()
            .ok_or(AppError::InvalidToken)?;

        if !T::granted_to(user.role) {
            tracing::warn!(
                user = %user.uuid,
                role = user.role.as_str(),
                permission = T::slug(),
                "Permission denied"
            );
            return Err(AppError::Forbidden(T::slug()));
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// PERMISSIONS
// ---

/// Route work: pickups, bag scans, scheduling.
pub struct PermFieldOps;
impl PermissionDef for PermFieldOps {
    fn slug() -> &'static str {
        "ops:field"
    }
    fn granted_to(role: UserRole) -> bool {
        matches!(role, UserRole::Driver | UserRole::Staff | UserRole::Admin)
    }
}

pub struct PermBilling;
impl PermissionDef for PermBilling {
    fn slug() -> &'static str {
        "billing:write"
    }
    fn granted_to(role: UserRole) -> bool {
        matches!(role, UserRole::Staff | UserRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customers_hold_no_staff_permissions() {
        assert!(!PermFieldOps::granted_to(UserRole::Customer));
        assert!(!PermBilling::granted_to(UserRole::Customer));
    }

    #[test]
    fn drivers_work_routes_but_not_billing() {
        assert!(PermFieldOps::granted_to(UserRole::Driver));
        assert!(!PermBilling::granted_to(UserRole::Driver));
        assert!(PermBilling::granted_to(UserRole::Staff));
        assert!(PermBilling::granted_to(UserRole::Admin));
    }
}
