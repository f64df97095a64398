use crate::{
    errors::AppError,
    models::game::{JoinOutcome, LeaveOutcome},
    repositories::signup_repo::{self, DbSignupPlayer},
    services::player_service,
    sessions::SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAttempt {
    Completed(JoinOutcome),
    /// The player has no confirmed rating or district yet. The intent was stored.
    NeedsOnboarding,
}

/// Joins a game if the player may play; otherwise remembers the intent.
pub async fn request_join(
    pool: &sqlx::SqlitePool,
    sessions: &SessionStore,
    player_id: i64,
    game_id: i64,
) -> Result<JoinAttempt, AppError> {
    let onboarded = player_service::get_player(pool, player_id)
        .await?
        .is_some_and(|p| p.is_onboarded());
    if !onboarded {
        sessions.set_pending_join(player_id, game_id);
        tracing::info!("player {} must finish onboarding before joining game {}", player_id, game_id);
        return Ok(JoinAttempt::NeedsOnboarding);
    }
    let outcome = signup_repo::join_game(pool, game_id, player_id).await?;
    match outcome {
        JoinOutcome::Joined => tracing::info!("player {} joined game {}", player_id, game_id),
        JoinOutcome::Rejected(reason) => {
            tracing::debug!("player {} not joined to game {}: {}", player_id, game_id, reason)
        }
    }
    Ok(JoinAttempt::Completed(outcome))
}

pub async fn leave(
    pool: &sqlx::SqlitePool,
    player_id: i64,
    game_id: i64,
) -> Result<LeaveOutcome, AppError> {
    let outcome = signup_repo::leave_game(pool, game_id, player_id).await?;
    if outcome.left() {
        tracing::info!("player {} left game {}", player_id, game_id);
    }
    Ok(outcome)
}

/// Retries the join a player asked for before onboarding, once. Returns the game
/// and the outcome, or `None` when nothing was pending.
pub async fn resume_pending_join(
    pool: &sqlx::SqlitePool,
    sessions: &SessionStore,
    player_id: i64,
) -> Result<Option<(i64, JoinAttempt)>, AppError> {
    let Some(game_id) = sessions.take_pending_join(player_id) else {
        return Ok(None);
    };
    let attempt = request_join(pool, sessions, player_id, game_id).await?;
    Ok(Some((game_id, attempt)))
}

pub async fn joined_players(
    pool: &sqlx::SqlitePool,
    game_id: i64,
) -> Result<Vec<DbSignupPlayer>, AppError> {
    Ok(signup_repo::list_joined(pool, game_id).await?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        models::game::JoinRejection,
        repositories::player_repo,
    };

    fn sessions() -> SessionStore {
        SessionStore::new(Duration::from_secs(3600))
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_join_requires_onboarding(pool: sqlx::SqlitePool) {
        let sessions = sessions();
        let attempt = request_join(&pool, &sessions, 205, 1).await.unwrap();
        assert_eq!(attempt, JoinAttempt::NeedsOnboarding);
        assert_eq!(sessions.pending_join(205), Some(1));
        assert_eq!(signup_repo::count_joined(&pool, 1).await.unwrap(), 0);

        let attempt = request_join(&pool, &sessions, 205, 2).await.unwrap();
        assert_eq!(attempt, JoinAttempt::NeedsOnboarding);
        assert_eq!(sessions.pending_join(205), Some(2));

        let unknown = request_join(&pool, &sessions, 999, 1).await.unwrap();
        assert_eq!(unknown, JoinAttempt::NeedsOnboarding);
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_resume_pending_join_once(pool: sqlx::SqlitePool) {
        let sessions = sessions();
        assert_eq!(resume_pending_join(&pool, &sessions, 205).await.unwrap(), None);

        request_join(&pool, &sessions, 205, 1).await.unwrap();
        player_repo::update_rating(&pool, 205, 1300).await.unwrap();
        player_repo::update_district(&pool, 205, "SAO").await.unwrap();

        let resumed = resume_pending_join(&pool, &sessions, 205).await.unwrap();
        assert_eq!(
            resumed,
            Some((1, JoinAttempt::Completed(JoinOutcome::Joined)))
        );
        assert_eq!(resume_pending_join(&pool, &sessions, 205).await.unwrap(), None);
        assert_eq!(
            request_join(&pool, &sessions, 205, 1).await.unwrap(),
            JoinAttempt::Completed(JoinOutcome::Rejected(JoinRejection::AlreadyJoined))
        );
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_leave_and_list(pool: sqlx::SqlitePool) {
        let sessions = sessions();
        for player_id in [201, 202] {
            let attempt = request_join(&pool, &sessions, player_id, 1).await.unwrap();
            assert_eq!(attempt, JoinAttempt::Completed(JoinOutcome::Joined));
        }
        assert_eq!(leave(&pool, 201, 1).await.unwrap(), LeaveOutcome::Left);
        assert_eq!(leave(&pool, 201, 1).await.unwrap(), LeaveOutcome::NotJoined);
        let names: Vec<String> = joined_players(&pool, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.first_name)
            .collect();
        assert_eq!(names, vec!["Boris".to_string()]);
    }
}
