use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    AppState,
    auth::extractor::VerifiedWebhook,
    payloads::Update,
    responses::{AppResponse, Json, SuccessResponse},
    transport::telegram::TelegramClient,
};

use super::Bot;

async fn health() -> impl IntoResponse {
    AppResponse::Success {
        payload: SuccessResponse::Health {
            service: env!("CARGO_PKG_NAME"),
        },
    }
    .into_response()
}

/// Acknowledges the update at once and queues it behind the sender's earlier updates.
async fn receive_update(
    State(bot): State<Arc<Bot<TelegramClient>>>,
    _: VerifiedWebhook,
    Json(update): Json<Update>,
) -> impl IntoResponse {
    let update_id = update.update_id;
    bot.enqueue(update);
    AppResponse::Success {
        payload: SuccessResponse::UpdateAccepted { update_id },
    }
    .into_response()
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/telegram/webhook", post(receive_update))
        .with_state(state)
}
