//! Runtime configuration, read once from the environment at startup.

use std::{collections::HashSet, env, net::SocketAddr, time::Duration};

use chrono::FixedOffset;

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub database_url: String,
    /// Static allow-list of user ids that get the admin commands.
    pub admin_ids: HashSet<i64>,
    /// Where game announcements are published.
    pub broadcast_chat_id: Option<i64>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub listen_addr: SocketAddr,
    /// Offset of the wall clock admins type dates in.
    pub utc_offset: FixedOffset,
    pub session_idle_timeout: Duration,
    pub community_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = var("BOT_TOKEN").ok_or(AppError::MissingConfig("BOT_TOKEN"))?;
        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite://courtmate.db?mode=rwc".to_string());

        let admin_ids = match var("ADMIN_IDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<i64>().map_err(|_| AppError::InvalidConfig {
                        key: "ADMIN_IDS",
                        value: id.to_string(),
                    })
                })
                .collect::<Result<HashSet<i64>, AppError>>()?,
            None => HashSet::new(),
        };

        let broadcast_chat_id = match var("BROADCAST_CHAT_ID") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| AppError::InvalidConfig {
                key: "BROADCAST_CHAT_ID",
                value: raw,
            })?),
            None => None,
        };

        let listen_addr = match var("LISTEN_ADDR") {
            Some(raw) => raw.parse::<SocketAddr>().map_err(|_| AppError::InvalidConfig {
                key: "LISTEN_ADDR",
                value: raw,
            })?,
            None => SocketAddr::from(([127, 0, 0, 1], 3001)),
        };

        let offset_hours = match var("UTC_OFFSET_HOURS") {
            Some(raw) => raw.parse::<i32>().map_err(|_| AppError::InvalidConfig {
                key: "UTC_OFFSET_HOURS",
                value: raw,
            })?,
            None => 3,
        };
        let utc_offset =
            FixedOffset::east_opt(offset_hours * 3600).ok_or(AppError::InvalidConfig {
                key: "UTC_OFFSET_HOURS",
                value: offset_hours.to_string(),
            })?;

        let idle_minutes = match var("SESSION_IDLE_MINUTES") {
            Some(raw) => raw.parse::<u64>().map_err(|_| AppError::InvalidConfig {
                key: "SESSION_IDLE_MINUTES",
                value: raw,
            })?,
            None => 24 * 60,
        };

        Ok(Settings {
            bot_token,
            database_url,
            admin_ids,
            broadcast_chat_id,
            webhook_url: var("WEBHOOK_URL"),
            webhook_secret: var("WEBHOOK_SECRET"),
            listen_addr,
            utc_offset,
            session_idle_timeout: Duration::from_secs(idle_minutes * 60),
            community_url: var("COMMUNITY_URL"),
        })
    }
}

#[cfg(test)]
pub fn test_settings() -> Settings {
    Settings {
        bot_token: "test-token".to_string(),
        database_url: "sqlite::memory:".to_string(),
        admin_ids: HashSet::from([100]),
        broadcast_chat_id: Some(-1001),
        webhook_url: None,
        webhook_secret: None,
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        utc_offset: FixedOffset::east_opt(3 * 3600).unwrap(),
        session_idle_timeout: Duration::from_secs(3600),
        community_url: None,
    }
}
