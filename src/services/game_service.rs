use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::{
    auth::admin::is_admin,
    config::Settings,
    errors::AppError,
    messages,
    models::{
        game::{CancelOutcome, Game, GameDraft, PublishedMessage},
        wizard::{GameStep, Session},
    },
    repositories::{game_repo, signup_repo},
    responses::MessageRef,
    sessions::SessionStore,
    transport::ChatTransport,
};

#[derive(Debug)]
pub enum WizardProgress {
    Ignored,
    Retry(AppError),
    Next(GameStep),
    Finished(GameDraft),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { game_id: i64, message: MessageRef },
    /// The game was stored but there is no broadcast destination to announce it in.
    NotConfigured { game_id: i64 },
}

/// `-` or `skip` leaves an optional field empty.
pub fn is_skip(text: &str) -> bool {
    let text = text.trim();
    text == "-" || text.eq_ignore_ascii_case("skip")
}

fn number(s: &str, max_len: usize) -> Option<u32> {
    if s.is_empty() || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parses `DD.MM HH:MM` or `DD.MM.YYYY HH:MM` as a wall-clock time. A missing
/// year is `current_year`; impossible calendar dates are rejected.
pub fn parse_game_date(input: &str, current_year: i32) -> Result<NaiveDateTime, AppError> {
    let invalid = || AppError::InvalidDate(input.trim().to_string());
    let mut parts = input.split_whitespace();
    let (Some(date), Some(time), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };

    let date_parts: Vec<&str> = date.split('.').collect();
    let (day, month, year) = match date_parts.as_slice() {
        [day, month] => (number(day, 2), number(month, 2), Some(current_year)),
        [day, month, year] if year.len() == 4 => (
            number(day, 2),
            number(month, 2),
            number(year, 4).map(|y| y as i32),
        ),
        _ => return Err(invalid()),
    };
    let (hour, minute) = match time.split_once(':') {
        Some((hour, minute)) if minute.len() == 2 => (number(hour, 2), number(minute, 2)),
        _ => return Err(invalid()),
    };

    let (Some(day), Some(month), Some(year), Some(hour), Some(minute)) =
        (day, month, year, hour, minute)
    else {
        return Err(invalid());
    };
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(invalid)
}

/// `-` (or `skip`) for no limit, otherwise a strictly positive number of players.
pub fn parse_capacity(input: &str) -> Result<Option<u32>, AppError> {
    if is_skip(input) {
        return Ok(None);
    }
    match input.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(AppError::InvalidCapacity(input.trim().to_string())),
    }
}

fn optional(text: &str) -> Option<String> {
    (!is_skip(text)).then(|| text.trim().to_string())
}

fn apply_answer(
    step: GameStep,
    draft: &mut GameDraft,
    text: &str,
    offset: &FixedOffset,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::EmptyAnswer);
    }
    match step {
        GameStep::DateTime => {
            let current_year = now.with_timezone(offset).year();
            let local = parse_game_date(text, current_year)?;
            let starts_at = local
                .and_local_timezone(*offset)
                .single()
                .ok_or_else(|| AppError::InvalidDate(text.trim().to_string()))?;
            draft.starts_at = Some(starts_at.with_timezone(&Utc));
        }
        GameStep::Location => draft.location = optional(text),
        GameStep::Capacity => draft.max_players = parse_capacity(text)?,
        GameStep::LevelHint => draft.level_hint = optional(text),
        GameStep::Title => draft.title = optional(text),
        GameStep::Description => draft.description = optional(text),
    }
    Ok(())
}

pub fn start_game_wizard(sessions: &SessionStore, user_id: i64) {
    sessions.start(
        user_id,
        Session::NewGame {
            step: GameStep::DateTime,
            draft: GameDraft::default(),
        },
    );
}

/// Feeds one typed answer into the game wizard. Invalid answers keep the step.
pub fn answer_game_wizard(
    sessions: &SessionStore,
    user_id: i64,
    text: &str,
    offset: &FixedOffset,
    now: DateTime<Utc>,
) -> WizardProgress {
    let progress = sessions.update(user_id, |session| {
        let Session::NewGame { step, draft } = session else {
            return WizardProgress::Ignored;
        };
        if let Err(e) = apply_answer(*step, draft, text, offset, now) {
            return WizardProgress::Retry(e);
        }
        match step.next() {
            Some(next) => {
                *step = next;
                WizardProgress::Next(next)
            }
            None => WizardProgress::Finished(draft.clone()),
        }
    });
    match progress {
        Some(WizardProgress::Finished(draft)) => {
            let last = Session::NewGame {
                step: GameStep::Description,
                draft: draft.clone(),
            };
            if sessions.transition(user_id, &last, None) {
                WizardProgress::Finished(draft)
            } else {
                WizardProgress::Ignored
            }
        }
        Some(progress) => progress,
        None => WizardProgress::Ignored,
    }
}

/// Stores a photo on the draft of a running game wizard.
pub fn attach_photo(sessions: &SessionStore, user_id: i64, file_id: &str) -> bool {
    sessions
        .update(user_id, |session| match session {
            Session::NewGame { draft, .. } => {
                draft.photo_file_id = Some(file_id.to_string());
                true
            }
            _ => false,
        })
        .unwrap_or(false)
}

pub async fn get_game(pool: &sqlx::SqlitePool, id: i64) -> Result<Game, AppError> {
    game_repo::get_game(pool, id)
        .await?
        .map(Game::from)
        .ok_or(AppError::GameNotFound(id))
}

/// Stores the finished draft and announces it in the broadcast chat.
pub async fn publish_game<T: ChatTransport>(
    pool: &sqlx::SqlitePool,
    transport: &T,
    settings: &Settings,
    creator_id: i64,
    draft: &GameDraft,
) -> Result<PublishOutcome, AppError> {
    let starts_at = draft
        .starts_at
        .ok_or_else(|| AppError::InvalidDate(String::new()))?;
    let game_id = game_repo::create_game(pool, creator_id, starts_at.timestamp(), draft).await?;
    tracing::info!("game {} created by {}", game_id, creator_id);

    let Some(chat_id) = settings.broadcast_chat_id else {
        tracing::warn!("game {} not announced, no broadcast chat configured", game_id);
        return Ok(PublishOutcome::NotConfigured { game_id });
    };
    let game = get_game(pool, game_id).await?;
    let text = messages::game_announcement(&game, 0, &settings.utc_offset);
    let keyboard = messages::game_keyboard(game_id);
    let message = match &game.photo_file_id {
        Some(file_id) => {
            transport
                .send_photo(chat_id, file_id, &text, Some(&keyboard))
                .await?
        }
        None => transport.send_text(chat_id, &text, Some(&keyboard)).await?,
    };
    game_repo::set_publish_info(
        pool,
        game_id,
        PublishedMessage {
            chat_id: message.chat_id,
            message_id: message.message_id,
        },
    )
    .await?;
    tracing::info!("game {} published as message {}", game_id, message.message_id);
    Ok(PublishOutcome::Published { game_id, message })
}

/// Re-renders the published announcement with the current signup count.
/// Cancelled games lose their buttons.
pub async fn refresh_announcement<T: ChatTransport>(
    pool: &sqlx::SqlitePool,
    transport: &T,
    offset: &FixedOffset,
    game_id: i64,
) -> Result<(), AppError> {
    let game = get_game(pool, game_id).await?;
    let Some(published) = game.published else {
        return Ok(());
    };
    let joined = signup_repo::count_joined(pool, game_id).await?;
    let text = messages::game_announcement(&game, joined, offset);
    let keyboard = (!game.is_cancelled).then(|| messages::game_keyboard(game_id));
    let message = MessageRef {
        chat_id: published.chat_id,
        message_id: published.message_id,
    };
    if game.photo_file_id.is_some() {
        transport
            .edit_caption(message, &text, keyboard.as_ref())
            .await
    } else {
        transport.edit_text(message, &text, keyboard.as_ref()).await
    }
}

/// Cancels a game on behalf of its creator or an admin.
pub async fn cancel_game<T: ChatTransport>(
    pool: &sqlx::SqlitePool,
    transport: &T,
    settings: &Settings,
    requester_id: i64,
    game_id: i64,
) -> Result<CancelOutcome, AppError> {
    let game = get_game(pool, game_id).await?;
    if game.creator_id != requester_id && !is_admin(settings, requester_id) {
        return Err(AppError::InsufficientPermissions);
    }
    let outcome = game_repo::cancel_game(pool, game_id).await?;
    if outcome == CancelOutcome::Cancelled {
        tracing::info!("game {} cancelled by {}", game_id, requester_id);
        if let Err(e) = refresh_announcement(pool, transport, &settings.utc_offset, game_id).await {
            tracing::warn!("could not mark game {} as cancelled: {}", game_id, e);
        }
    }
    Ok(outcome)
}

/// Upcoming games with their joined counts, soonest first.
pub async fn active_games(
    pool: &sqlx::SqlitePool,
    now: DateTime<Utc>,
) -> Result<Vec<(Game, i64)>, AppError> {
    let games = game_repo::list_active_games(pool, now.timestamp()).await?;
    let mut result = Vec::with_capacity(games.len());
    for game in games {
        let joined = signup_repo::count_joined(pool, game.id).await?;
        result.push((Game::from(game), joined));
    }
    Ok(result)
}
