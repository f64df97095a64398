use chrono::Utc;

use crate::{
    auth::admin::{is_admin, require_admin},
    errors::AppError,
    messages,
    models::{game::CancelOutcome, wizard::GameStep},
    payloads::{Command, User},
    services::{game_service, player_service},
    transport::ChatTransport,
};

use super::Bot;

/// `join_<id>` from a `/start` deep link.
fn join_target(argument: Option<&str>) -> Option<i64> {
    argument?.strip_prefix("join_")?.parse().ok()
}

impl<T: ChatTransport> Bot<T> {
    pub(super) async fn on_command(
        &self,
        from: &User,
        chat_id: i64,
        command: Command,
    ) -> Result<(), AppError> {
        tracing::debug!("{:?} from {}", command, from.id);
        match command {
            Command::Start(argument) => self.start(from, chat_id, argument.as_deref()).await,
            Command::Help => {
                self.reply(chat_id, &messages::help(is_admin(&self.settings, from.id)))
                    .await
            }
            Command::Profile => {
                let player = player_service::register_player(&self.pool, from).await?;
                self.reply(chat_id, &messages::profile(&player)).await
            }
            Command::Ping => self.reply(chat_id, messages::PONG).await,
            Command::Games => self.list_games(chat_id).await,
            Command::Ntrp => {
                player_service::register_player(&self.pool, from).await?;
                player_service::start_manual_rating(&self.sessions, from.id);
                self.reply_with(
                    chat_id,
                    &messages::manual_rating_prompt(),
                    Some(&messages::cancel_keyboard()),
                )
                .await
            }
            Command::Cancel => {
                let text = match self.sessions.end(from.id) {
                    Some(_) => messages::WIZARD_CANCELLED,
                    None => messages::NOTHING_TO_CANCEL,
                };
                self.reply(chat_id, text).await
            }
            Command::NewGame => {
                if require_admin(&self.settings, from.id).is_err() {
                    return self.reply(chat_id, messages::ADMIN_ONLY).await;
                }
                // Games reference their creator.
                player_service::register_player(&self.pool, from).await?;
                game_service::start_game_wizard(&self.sessions, from.id);
                self.reply_with(
                    chat_id,
                    &messages::game_wizard_prompt(GameStep::DateTime),
                    Some(&messages::cancel_keyboard()),
                )
                .await
            }
            Command::Players => {
                if require_admin(&self.settings, from.id).is_err() {
                    return self.reply(chat_id, messages::ADMIN_ONLY).await;
                }
                let groups = player_service::players_by_district(&self.pool).await?;
                self.reply(chat_id, &messages::players_by_district(&groups))
                    .await
            }
            Command::CancelGame(None) => self.reply(chat_id, messages::CANCEL_GAME_USAGE).await,
            Command::CancelGame(Some(game_id)) => self.cancel_game(from, chat_id, game_id).await,
            Command::Unknown(_) => self.reply(chat_id, messages::UNKNOWN_INPUT).await,
        }
    }

    async fn start(
        &self,
        from: &User,
        chat_id: i64,
        argument: Option<&str>,
    ) -> Result<(), AppError> {
        let player = player_service::register_player(&self.pool, from).await?;
        if let Some(game_id) = join_target(argument) {
            self.sessions.set_pending_join(from.id, game_id);
        }

        if player.is_onboarded() {
            let (text, keyboard) =
                messages::main_menu(&player, self.settings.community_url.as_deref());
            self.reply_with(chat_id, &text, keyboard.as_ref()).await?;
            return self.resume_pending_join(from.id, chat_id).await;
        }

        player_service::start_survey(&self.sessions, from.id);
        let (text, keyboard) =
            messages::welcome(&from.first_name, self.settings.community_url.as_deref());
        self.reply_with(chat_id, &text, Some(&keyboard)).await
    }

    async fn list_games(&self, chat_id: i64) -> Result<(), AppError> {
        let games = game_service::active_games(&self.pool, Utc::now()).await?;
        if games.is_empty() {
            return self.reply(chat_id, messages::NO_ACTIVE_GAMES).await;
        }
        for (game, joined) in games {
            let text = messages::game_list_entry(&game, joined, &self.settings.utc_offset);
            let keyboard = messages::game_keyboard(game.id);
            match &game.photo_file_id {
                Some(file_id) => {
                    self.transport
                        .send_photo(chat_id, file_id, &text, Some(&keyboard))
                        .await?;
                }
                None => self.reply_with(chat_id, &text, Some(&keyboard)).await?,
            }
        }
        Ok(())
    }

    async fn cancel_game(&self, from: &User, chat_id: i64, game_id: i64) -> Result<(), AppError> {
        let outcome = game_service::cancel_game(
            &self.pool,
            &self.transport,
            &self.settings,
            from.id,
            game_id,
        )
        .await;
        let text = match outcome {
            Ok(CancelOutcome::Cancelled) => messages::game_cancelled(game_id),
            Ok(CancelOutcome::AlreadyCancelled) => messages::game_already_cancelled(game_id),
            Err(AppError::InsufficientPermissions) => {
                messages::CANCEL_GAME_FORBIDDEN.to_string()
            }
            Err(e @ AppError::GameNotFound(_)) => messages::retry(&e),
            Err(e) => return Err(e),
        };
        self.reply(chat_id, &text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_target() {
        assert_eq!(join_target(Some("join_12")), Some(12));
        assert_eq!(join_target(Some("join_")), None);
        assert_eq!(join_target(Some("promo")), None);
        assert_eq!(join_target(None), None);
    }
}
