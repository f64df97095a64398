use std::{process, sync::Arc, time::Duration};

use axum::{Router, extract::FromRef};
use reqwest::Client;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Settings, errors::AppError, handlers::Bot, sessions::SessionStore,
    transport::telegram::TelegramClient,
};

mod auth;
mod config;
mod errors;
mod handlers;
mod messages;
mod models;
mod payloads;
mod repositories;
mod responses;
mod services;
mod sessions;
mod transport;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct AppState {
    bot: Arc<Bot<TelegramClient>>,
    settings: Arc<Settings>,
}

impl FromRef<AppState> for Arc<Bot<TelegramClient>> {
    fn from_ref(input: &AppState) -> Self {
        input.bot.clone()
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(input: &AppState) -> Self {
        input.settings.clone()
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courtmate=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("courtmate stopped ({}): {}", e.code(), e);
        process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let settings = Arc::new(Settings::from_env()?);
    if settings.admin_ids.is_empty() {
        tracing::warn!("ADMIN_IDS is empty, nobody can create games");
    }

    let pool = SqlitePoolOptions::new()
        .connect(&settings.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    let telegram = TelegramClient::new(Client::new(), &settings.bot_token);
    let me = telegram.get_me().await?;
    tracing::info!("authorized as @{}", me.username.as_deref().unwrap_or("?"));

    let sessions = Arc::new(SessionStore::new(settings.session_idle_timeout));
    sessions.clone().spawn_sweeper(SESSION_SWEEP_INTERVAL);

    let bot = Arc::new(Bot::new(
        pool,
        telegram.clone(),
        sessions,
        settings.clone(),
        me.username,
    ));
    bot.spawn_queue_sweeper(SESSION_SWEEP_INTERVAL);

    match settings.webhook_url.as_deref() {
        Some(url) => {
            telegram
                .set_webhook(url, settings.webhook_secret.as_deref())
                .await?;
            tracing::info!("webhook registered at {}", url);
        }
        None => {
            telegram.delete_webhook().await?;
            let poller = bot.clone();
            tokio::spawn(async move {
                tracing::info!("no WEBHOOK_URL set, polling for updates");
                telegram
                    .poll(|update| poller.enqueue(update))
                    .await;
            });
        }
    }

    let state = AppState {
        bot,
        settings: settings.clone(),
    };
    let listener = TcpListener::bind(settings.listen_addr).await?;
    tracing::info!("listening on {}", settings.listen_addr);
    let app = Router::new()
        .merge(handlers::webhook::routes(state))
        .layer(TraceLayer::new_for_http());
    axum::serve(listener, app).await?;
    Ok(())
}
