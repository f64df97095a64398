use std::fmt::Display;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::repositories::game_repo::DbGame;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum SignupStatus {
    #[default]
    Joined,
    Cancelled,
}

impl SignupStatus {
    pub fn from_str<S: AsRef<str>>(str: S) -> Self {
        match str.as_ref().trim() {
            "cancelled" => Self::Cancelled,
            _ => Self::Joined,
        }
    }
}

impl Display for SignupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignupStatus::Joined => write!(f, "joined"),
            SignupStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinRejection {
    GameUnavailable,
    NoSeatsLeft,
    AlreadyJoined,
}

impl Display for JoinRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinRejection::GameUnavailable => write!(f, "Game unavailable"),
            JoinRejection::NoSeatsLeft => write!(f, "No seats left"),
            JoinRejection::AlreadyJoined => write!(f, "You have already joined"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Rejected(JoinRejection),
}

impl JoinOutcome {
    pub fn joined(&self) -> bool {
        matches!(self, JoinOutcome::Joined)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    NotJoined,
}

impl LeaveOutcome {
    pub fn left(&self) -> bool {
        matches!(self, LeaveOutcome::Left)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
}

/// Where a published announcement lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishedMessage {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub id: i64,
    pub creator_id: i64,
    pub starts_at: DateTime<Utc>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub photo_file_id: Option<String>,
    pub max_players: Option<u32>,
    pub level_hint: Option<String>,
    pub is_cancelled: bool,
    pub published: Option<PublishedMessage>,
}

impl Game {
    pub fn local_start(&self, offset: &FixedOffset) -> NaiveDateTime {
        self.starts_at.with_timezone(offset).naive_local()
    }
}

impl From<DbGame> for Game {
    fn from(value: DbGame) -> Self {
        let published = match (value.channel_chat_id, value.channel_message_id) {
            (Some(chat_id), Some(message_id)) => Some(PublishedMessage {
                chat_id,
                message_id,
            }),
            _ => None,
        };
        Self {
            id: value.id,
            creator_id: value.creator_id,
            starts_at: DateTime::from_timestamp(value.starts_at, 0).unwrap_or_default(),
            title: value.title,
            description: value.description,
            location: value.location,
            photo_file_id: value.photo_file_id,
            max_players: value.max_players.map(|n| n as u32),
            level_hint: value.level_hint,
            is_cancelled: value.is_cancelled,
            published,
        }
    }
}

/// The fields collected by the game-creation wizard before the game row exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameDraft {
    pub starts_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub max_players: Option<u32>,
    pub level_hint: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub photo_file_id: Option<String>,
}
