use chrono::Utc;
use sqlx::prelude::FromRow;

use crate::{
    models::player::{CourtType, SkillLevel},
    payloads::User,
};

#[derive(Debug, Clone, FromRow)]
pub struct DbPlayer {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub skill_level: String,
    pub experience_years: i64,
    pub rating: i64,
    pub rating_set_at: Option<i64>,
    pub district: Option<String>,
    pub court_types: String,
    pub availability: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Inserts the player if this id has never been seen. Existing rows are left untouched.
pub async fn create_player(pool: &sqlx::SqlitePool, user: &User) -> sqlx::Result<bool> {
    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "insert or ignore into players
            (id, first_name, last_name, username, created_at, updated_at)
            values (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.username)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn get_player(pool: &sqlx::SqlitePool, id: i64) -> sqlx::Result<Option<DbPlayer>> {
    sqlx::query_as("select * from players where id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_skill_level(
    pool: &sqlx::SqlitePool,
    id: i64,
    level: SkillLevel,
) -> sqlx::Result<()> {
    sqlx::query("update players set skill_level = ?1, updated_at = ?2 where id = ?3")
        .bind(level.to_string())
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_experience(pool: &sqlx::SqlitePool, id: i64, years: i64) -> sqlx::Result<()> {
    sqlx::query("update players set experience_years = ?1, updated_at = ?2 where id = ?3")
        .bind(years)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Stores a confirmed rating on the points scale.
pub async fn update_rating(pool: &sqlx::SqlitePool, id: i64, rating: i64) -> sqlx::Result<()> {
    let now = Utc::now().timestamp();
    sqlx::query("update players set rating = ?1, rating_set_at = ?2, updated_at = ?2 where id = ?3")
        .bind(rating)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_court_types(
    pool: &sqlx::SqlitePool,
    id: i64,
    court_types: &[CourtType],
) -> sqlx::Result<()> {
    let encoded: Vec<String> = court_types.iter().map(|c| c.to_string()).collect();
    sqlx::query("update players set court_types = ?1, updated_at = ?2 where id = ?3")
        .bind(serde_json::to_string(&encoded).unwrap_or_else(|_| "[]".to_string()))
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_district(pool: &sqlx::SqlitePool, id: i64, district: &str) -> sqlx::Result<()> {
    sqlx::query("update players set district = ?1, updated_at = ?2 where id = ?3")
        .bind(district)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_availability(
    pool: &sqlx::SqlitePool,
    id: i64,
    availability: &[String],
) -> sqlx::Result<()> {
    sqlx::query("update players set availability = ?1, updated_at = ?2 where id = ?3")
        .bind(serde_json::to_string(availability).unwrap_or_else(|_| "[]".to_string()))
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All players, grouped by district (players without one last) and by rating within a district.
pub async fn list_players_by_district(pool: &sqlx::SqlitePool) -> sqlx::Result<Vec<DbPlayer>> {
    sqlx::query_as(
        "select * from players
        order by district is null, district, rating desc, id",
    )
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, first_name: &str) -> User {
        User {
            id,
            is_bot: false,
            first_name: first_name.to_string(),
            last_name: None,
            username: Some(format!("{}_tg", first_name.to_lowercase())),
            language_code: None,
        }
    }

    #[sqlx::test]
    async fn test_create_player_is_idempotent(pool: sqlx::SqlitePool) {
        let created = create_player(&pool, &user(7, "Olga"))
            .await
            .expect("Player inserted");
        assert!(created);
        update_rating(&pool, 7, 1500).await.expect("rating updated");
        let created = create_player(&pool, &user(7, "Renamed"))
            .await
            .expect("Second insert ignored");
        assert!(!created);
        let player = get_player(&pool, 7)
            .await
            .expect("failed to read player")
            .expect("player exists");
        assert_eq!(player.first_name, "Olga");
        assert_eq!(player.rating, 1500);
        assert!(player.rating_set_at.is_some());
    }

    #[sqlx::test]
    async fn test_new_player_defaults(pool: sqlx::SqlitePool) {
        create_player(&pool, &user(8, "Ivan"))
            .await
            .expect("Player inserted");
        let player = get_player(&pool, 8).await.unwrap().unwrap();
        assert_eq!(player.skill_level, "beginner");
        assert_eq!(player.experience_years, 0);
        assert_eq!(player.rating, 1000);
        assert_eq!(player.rating_set_at, None);
        assert_eq!(player.district, None);
        assert_eq!(player.court_types, "[]");
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players")))]
    async fn test_list_players_by_district(pool: sqlx::SqlitePool) {
        let players = list_players_by_district(&pool)
            .await
            .expect("failed to list players");
        let order: Vec<i64> = players.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![100, 203, 202, 201, 204, 205]);
    }
}
