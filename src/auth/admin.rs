use crate::{config::Settings, errors::AppError};

/// Admins are the user ids listed in `ADMIN_IDS`.
pub fn is_admin(settings: &Settings, user_id: i64) -> bool {
    settings.admin_ids.contains(&user_id)
}

pub fn require_admin(settings: &Settings, user_id: i64) -> Result<(), AppError> {
    if !is_admin(settings, user_id) {
        tracing::warn!("user {} tried an admin command", user_id);
        return Err(AppError::InsufficientPermissions);
    }
    Ok(())
}
