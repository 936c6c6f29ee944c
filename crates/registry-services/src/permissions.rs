//! Who may do what to whose content.
//!
//! Deletion is requested and approved inside the depositing institution, by
//! its admins. System admins can restore anything and are the only ones who
//! may requeue work or run batch deletions.

use registry_core::models::User;
use registry_core::{AppError, AppResult};

fn deny(user: &User, what: &str) -> AppError {
    tracing::warn!(user_id = user.id, role = %user.role, action = what, "Permission denied");
    AppError::PermissionDenied(format!("You are not allowed to {}", what))
}

pub fn ensure_can_request_deletion(user: &User, institution_id: i64) -> AppResult<()> {
    if user.is_admin_of(institution_id) {
        Ok(())
    } else {
        Err(deny(user, "request deletion of this item"))
    }
}

pub fn ensure_can_review_deletion(user: &User, institution_id: i64) -> AppResult<()> {
    if user.is_admin_of(institution_id) {
        Ok(())
    } else {
        Err(deny(user, "review this deletion request"))
    }
}

pub fn ensure_can_request_restoration(user: &User, institution_id: i64) -> AppResult<()> {
    if user.is_sys_admin() || user.belongs_to(institution_id) {
        Ok(())
    } else {
        Err(deny(user, "restore this item"))
    }
}

pub fn ensure_sys_admin(user: &User, what: &str) -> AppResult<()> {
    if user.is_sys_admin() {
        Ok(())
    } else {
        Err(deny(user, what))
    }
}
