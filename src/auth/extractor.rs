use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{config::Settings, errors::AppError};

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Proof that a webhook call carries the configured secret token. Without a
/// configured secret every call is accepted.
#[derive(Clone, Copy, Debug)]
pub struct VerifiedWebhook;

impl<S> FromRequestParts<S> for VerifiedWebhook
where
    Arc<Settings>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let settings = Arc::<Settings>::from_ref(state);
        let Some(expected) = settings.webhook_secret.as_deref() else {
            return Ok(VerifiedWebhook);
        };

        let provided = parts
            .headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::InvalidWebhookSecret)?;

        if provided != expected {
            return Err(AppError::InvalidWebhookSecret);
        }

        Ok(VerifiedWebhook)
    }
}
