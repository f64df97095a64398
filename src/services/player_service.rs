use itertools::Itertools;

use crate::{
    errors::AppError,
    models::{
        player::{Player, ntrp_to_points, parse_ntrp},
        wizard::{Session, SurveyStep},
    },
    payloads::User,
    repositories::player_repo,
    services::survey_service,
    sessions::SessionStore,
};

/// The raw shape of a survey answer: a tapped option or a typed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyAnswer {
    Choice(usize),
    Text(String),
}

#[derive(Debug)]
pub enum SurveyProgress {
    /// Stale button, wrong answer shape or no survey running. Nothing was written.
    Ignored,
    Retry(AppError),
    Next(SurveyStep),
    Completed,
}

/// Creates the player on first contact and returns the stored record either way.
pub async fn register_player(pool: &sqlx::SqlitePool, user: &User) -> Result<Player, AppError> {
    if player_repo::create_player(pool, user).await? {
        tracing::info!("registered player {} ({})", user.id, user.first_name);
    }
    player_repo::get_player(pool, user.id)
        .await?
        .map(Player::from)
        .ok_or(AppError::PlayerNotFound(user.id))
}

pub async fn get_player(pool: &sqlx::SqlitePool, id: i64) -> Result<Option<Player>, AppError> {
    Ok(player_repo::get_player(pool, id).await?.map(Player::from))
}

pub fn start_survey(sessions: &SessionStore, user_id: i64) {
    sessions.start(user_id, Session::Survey(SurveyStep::Level));
}

pub fn start_manual_rating(sessions: &SessionStore, user_id: i64) {
    sessions.start(user_id, Session::ManualRating);
}

/// Applies one answer to the survey step it was given for.
///
/// The answer is only accepted while the user's session sits on `step`. The step
/// is claimed before anything is written and released after the session moved
/// on, so of two answers racing for one step only the first is stored.
pub async fn answer_survey(
    pool: &sqlx::SqlitePool,
    sessions: &SessionStore,
    user_id: i64,
    step: SurveyStep,
    answer: SurveyAnswer,
) -> Result<SurveyProgress, AppError> {
    let _claim = sessions.claim(user_id).await;
    let current = Session::Survey(step);
    if sessions.get(user_id).as_ref() != Some(&current) {
        return Ok(SurveyProgress::Ignored);
    }

    match (step, answer) {
        (SurveyStep::Level, SurveyAnswer::Choice(i)) => {
            let Some(level) = survey_service::level_for(i) else {
                return Ok(SurveyProgress::Ignored);
            };
            player_repo::update_skill_level(pool, user_id, level).await?;
        }
        (SurveyStep::Experience, SurveyAnswer::Choice(i)) => {
            let Some(years) = survey_service::experience_for(i) else {
                return Ok(SurveyProgress::Ignored);
            };
            player_repo::update_experience(pool, user_id, years).await?;
        }
        (SurveyStep::Rating, SurveyAnswer::Choice(i)) => {
            let Some(rating) = survey_service::rating_for(i) else {
                return Ok(SurveyProgress::Ignored);
            };
            player_repo::update_rating(pool, user_id, rating).await?;
        }
        (SurveyStep::CourtType, SurveyAnswer::Choice(i)) => {
            let Some(court) = survey_service::court_for(i) else {
                return Ok(SurveyProgress::Ignored);
            };
            player_repo::update_court_types(pool, user_id, &[court]).await?;
        }
        (SurveyStep::District, SurveyAnswer::Text(text)) => {
            let district = text.trim();
            if district.is_empty() {
                return Ok(SurveyProgress::Retry(AppError::EmptyAnswer));
            }
            player_repo::update_district(pool, user_id, district).await?;
        }
        (SurveyStep::Availability, SurveyAnswer::Text(text)) => {
            let availability = survey_service::parse_availability(&text);
            if availability.is_empty() {
                return Ok(SurveyProgress::Retry(AppError::EmptyAnswer));
            }
            player_repo::update_availability(pool, user_id, &availability).await?;
        }
        (_, _) => return Ok(SurveyProgress::Ignored),
    }

    let next = step.next();
    if !sessions.transition(user_id, &current, next.map(Session::Survey)) {
        tracing::warn!("survey step {} for {} was answered twice", step, user_id);
        return Ok(SurveyProgress::Ignored);
    }
    Ok(match next {
        Some(next) => SurveyProgress::Next(next),
        None => {
            tracing::info!("player {} completed the survey", user_id);
            SurveyProgress::Completed
        }
    })
}

/// Stores a typed NTRP value. A player without a district continues the survey
/// at the court preference step, everyone else is done.
pub async fn submit_manual_rating(
    pool: &sqlx::SqlitePool,
    sessions: &SessionStore,
    user_id: i64,
    text: &str,
) -> Result<SurveyProgress, AppError> {
    let _claim = sessions.claim(user_id).await;
    if sessions.get(user_id) != Some(Session::ManualRating) {
        return Ok(SurveyProgress::Ignored);
    }
    let ntrp = match parse_ntrp(text) {
        Ok(ntrp) => ntrp,
        Err(e) => return Ok(SurveyProgress::Retry(e)),
    };
    player_repo::update_rating(pool, user_id, ntrp_to_points(ntrp)).await?;

    let has_district = get_player(pool, user_id)
        .await?
        .is_some_and(|p| p.district.is_some());
    let next = (!has_district).then_some(SurveyStep::CourtType);
    if !sessions.transition(user_id, &Session::ManualRating, next.map(Session::Survey)) {
        return Ok(SurveyProgress::Ignored);
    }
    tracing::info!("player {} set NTRP {} manually", user_id, ntrp);
    Ok(match next {
        Some(step) => SurveyProgress::Next(step),
        None => SurveyProgress::Completed,
    })
}

/// Players grouped by district, highest rating first within a group. Players
/// without a district come last under `None`.
pub async fn players_by_district(
    pool: &sqlx::SqlitePool,
) -> Result<Vec<(Option<String>, Vec<Player>)>, AppError> {
    let players = player_repo::list_players_by_district(pool).await?;
    Ok(players
        .into_iter()
        .map(Player::from)
        .chunk_by(|p| p.district.clone())
        .into_iter()
        .map(|(district, group)| (district, group.collect()))
        .collect())
}
