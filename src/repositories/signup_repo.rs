use chrono::Utc;
use sqlx::{SqliteConnection, prelude::FromRow};

use crate::models::game::{JoinOutcome, JoinRejection, LeaveOutcome, SignupStatus};

#[derive(Debug, FromRow)]
struct GameSeats {
    max_players: Option<i64>,
    is_cancelled: bool,
}

#[derive(Debug, FromRow)]
pub struct DbSignup {
    pub id: i64,
    pub game_id: i64,
    pub player_id: i64,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A joined signup with the player fields needed to list it.
#[derive(Debug, FromRow)]
pub struct DbSignupPlayer {
    pub player_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// Joins a player to a game.
///
/// The checks and the write run inside one `BEGIN IMMEDIATE` transaction, so the
/// write lock is held from the seat count until commit and two joins racing for
/// the last seat are serialized by SQLite. A failed join is rolled back when the
/// transaction is dropped.
pub async fn join_game(
    pool: &sqlx::SqlitePool,
    game_id: i64,
    player_id: i64,
) -> sqlx::Result<JoinOutcome> {
    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;
    let outcome = join_locked(&mut *tx, game_id, player_id).await?;
    tx.commit().await?;
    Ok(outcome)
}

async fn join_locked(
    conn: &mut SqliteConnection,
    game_id: i64,
    player_id: i64,
) -> sqlx::Result<JoinOutcome> {
    let game: Option<GameSeats> =
        sqlx::query_as("select max_players, is_cancelled from games where id = ?1")
            .bind(game_id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(game) = game.filter(|g| !g.is_cancelled) else {
        return Ok(JoinOutcome::Rejected(JoinRejection::GameUnavailable));
    };

    if let Some(capacity) = game.max_players {
        let joined: i64 =
            sqlx::query_scalar("select count(*) from signups where game_id = ?1 and status = ?2")
                .bind(game_id)
                .bind(SignupStatus::Joined.to_string())
                .fetch_one(&mut *conn)
                .await?;
        if joined >= capacity {
            return Ok(JoinOutcome::Rejected(JoinRejection::NoSeatsLeft));
        }
    }

    let existing: Option<DbSignup> =
        sqlx::query_as("select * from signups where game_id = ?1 and player_id = ?2")
            .bind(game_id)
            .bind(player_id)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(signup) = &existing {
        if SignupStatus::from_str(&signup.status) == SignupStatus::Joined {
            return Ok(JoinOutcome::Rejected(JoinRejection::AlreadyJoined));
        }
    }

    let now = Utc::now().timestamp();
    sqlx::query(
        "insert into signups (game_id, player_id, status, created_at, updated_at)
            values (?1, ?2, ?3, ?4, ?4)
            on conflict (game_id, player_id) do update set status = excluded.status, updated_at = excluded.updated_at",
    )
    .bind(game_id)
    .bind(player_id)
    .bind(SignupStatus::Joined.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(JoinOutcome::Joined)
}

pub async fn leave_game(
    pool: &sqlx::SqlitePool,
    game_id: i64,
    player_id: i64,
) -> sqlx::Result<LeaveOutcome> {
    let result = sqlx::query(
        "update signups set status = ?1, updated_at = ?2
        where game_id = ?3 and player_id = ?4 and status = ?5",
    )
    .bind(SignupStatus::Cancelled.to_string())
    .bind(Utc::now().timestamp())
    .bind(game_id)
    .bind(player_id)
    .bind(SignupStatus::Joined.to_string())
    .execute(pool)
    .await?;
    if result.rows_affected() == 1 {
        Ok(LeaveOutcome::Left)
    } else {
        Ok(LeaveOutcome::NotJoined)
    }
}

pub async fn count_joined(pool: &sqlx::SqlitePool, game_id: i64) -> sqlx::Result<i64> {
    sqlx::query_scalar("select count(*) from signups where game_id = ?1 and status = ?2")
        .bind(game_id)
        .bind(SignupStatus::Joined.to_string())
        .fetch_one(pool)
        .await
}

/// Joined players in the order they first signed up.
pub async fn list_joined(
    pool: &sqlx::SqlitePool,
    game_id: i64,
) -> sqlx::Result<Vec<DbSignupPlayer>> {
    sqlx::query_as(
        "select
            s.player_id,
            p.first_name,
            p.last_name,
            p.username
        from signups s
        inner join players p on s.player_id = p.id
        where s.game_id = ?1 and s.status = ?2
        order by s.created_at, s.id",
    )
    .bind(game_id)
    .bind(SignupStatus::Joined.to_string())
    .fetch_all(pool)
    .await
}
