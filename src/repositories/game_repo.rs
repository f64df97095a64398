use chrono::Utc;
use sqlx::prelude::FromRow;

use crate::models::game::{CancelOutcome, GameDraft, PublishedMessage};

#[derive(Debug, Clone, FromRow)]
pub struct DbGame {
    pub id: i64,
    pub creator_id: i64,
    pub starts_at: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub photo_file_id: Option<String>,
    pub max_players: Option<i64>,
    pub level_hint: Option<String>,
    pub is_cancelled: bool,
    pub channel_chat_id: Option<i64>,
    pub channel_message_id: Option<i64>,
    pub created_at: i64,
}

/// Inserts a game from a finished draft. The caller guarantees the start time is set.
pub async fn create_game(
    pool: &sqlx::SqlitePool,
    creator_id: i64,
    starts_at: i64,
    draft: &GameDraft,
) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "insert into games
            (creator_id, starts_at, title, description, location, photo_file_id, max_players, level_hint, created_at)
            values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(creator_id)
    .bind(starts_at)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.location)
    .bind(&draft.photo_file_id)
    .bind(draft.max_players)
    .bind(&draft.level_hint)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_game(pool: &sqlx::SqlitePool, id: i64) -> sqlx::Result<Option<DbGame>> {
    sqlx::query_as("select * from games where id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn set_publish_info(
    pool: &sqlx::SqlitePool,
    id: i64,
    published: PublishedMessage,
) -> sqlx::Result<()> {
    sqlx::query(
        "update games set channel_chat_id = ?1, channel_message_id = ?2
        where id = ?3 and is_cancelled = 0",
    )
    .bind(published.chat_id)
    .bind(published.message_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Sets the cancellation flag. A cancelled game is never modified again.
pub async fn cancel_game(pool: &sqlx::SqlitePool, id: i64) -> sqlx::Result<CancelOutcome> {
    let result = sqlx::query("update games set is_cancelled = 1 where id = ?1 and is_cancelled = 0")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 1 {
        Ok(CancelOutcome::Cancelled)
    } else {
        Ok(CancelOutcome::AlreadyCancelled)
    }
}

/// Upcoming games that have not been cancelled, soonest first.
pub async fn list_active_games(pool: &sqlx::SqlitePool, now: i64) -> sqlx::Result<Vec<DbGame>> {
    sqlx::query_as(
        "select * from games
        where is_cancelled = 0 and starts_at >= ?1
        order by starts_at asc",
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players")))]
    async fn test_create_game(pool: sqlx::SqlitePool) {
        let draft = GameDraft {
            location: Some("Luzhniki".to_string()),
            max_players: Some(4),
            ..Default::default()
        };
        let id = create_game(&pool, 100, 4102444800, &draft)
            .await
            .expect("Failed to create game");
        let game = get_game(&pool, id).await.unwrap().expect("game exists");
        assert_eq!(game.creator_id, 100);
        assert_eq!(game.max_players, Some(4));
        assert_eq!(game.location.as_deref(), Some("Luzhniki"));
        assert!(!game.is_cancelled);
        assert_eq!(game.channel_message_id, None);
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players")))]
    async fn test_zero_capacity_is_refused_by_schema(pool: sqlx::SqlitePool) {
        let draft = GameDraft {
            max_players: Some(0),
            ..Default::default()
        };
        assert!(create_game(&pool, 100, 4102444800, &draft).await.is_err());
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_cancel_game_once(pool: sqlx::SqlitePool) {
        assert_eq!(
            cancel_game(&pool, 2).await.unwrap(),
            CancelOutcome::Cancelled
        );
        assert_eq!(
            cancel_game(&pool, 2).await.unwrap(),
            CancelOutcome::AlreadyCancelled
        );
        let published = PublishedMessage {
            chat_id: -1001,
            message_id: 99,
        };
        set_publish_info(&pool, 2, published).await.unwrap();
        let game = get_game(&pool, 2).await.unwrap().unwrap();
        assert!(game.is_cancelled);
        assert_eq!(game.channel_message_id, None);
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_list_active_games(pool: sqlx::SqlitePool) {
        let games = list_active_games(&pool, 1760000000)
            .await
            .expect("failed to list games");
        let ids: Vec<i64> = games.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
