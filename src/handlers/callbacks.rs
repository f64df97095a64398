use crate::{
    errors::AppError,
    messages,
    payloads::{Action, User},
    responses::{InlineButton, InlineKeyboard, MessageRef},
    services::{
        player_service::{self, SurveyAnswer},
        signup_service::{self, JoinAttempt},
    },
    transport::ChatTransport,
};

use super::Bot;

impl<T: ChatTransport> Bot<T> {
    /// Every callback query is answered exactly once, also when the button is stale
    /// or unknown, so the client stops showing its spinner.
    pub(super) async fn on_callback(
        &self,
        callback_id: &str,
        from: &User,
        message: Option<(i64, i64)>,
        action: Option<Action>,
    ) -> Result<(), AppError> {
        let message = message.map(|(chat_id, message_id)| MessageRef {
            chat_id,
            message_id,
        });
        let Some(action) = action else {
            tracing::debug!("unknown callback data from {}", from.id);
            return self.answer(callback_id, None, false).await;
        };
        tracing::debug!("callback {} from {}", action, from.id);

        match action {
            Action::SurveyAnswer { step, index } => {
                let progress = player_service::answer_survey(
                    &self.pool,
                    &self.sessions,
                    from.id,
                    step,
                    SurveyAnswer::Choice(index),
                )
                .await?;
                self.answer(callback_id, None, false).await?;
                let chat_id = message.map(|m| m.chat_id).unwrap_or(from.id);
                self.after_survey(from, chat_id, progress, message).await
            }
            Action::ManualRating => {
                player_service::register_player(&self.pool, from).await?;
                player_service::start_manual_rating(&self.sessions, from.id);
                self.answer(callback_id, None, false).await?;
                self.reply_with(
                    from.id,
                    &messages::manual_rating_prompt(),
                    Some(&messages::cancel_keyboard()),
                )
                .await
            }
            Action::CancelWizard => {
                let text = match self.sessions.end(from.id) {
                    Some(_) => messages::WIZARD_CANCELLED,
                    None => messages::NOTHING_TO_CANCEL,
                };
                self.answer(callback_id, Some(text), false).await
            }
            Action::JoinGame(game_id) => self.join(callback_id, from, game_id).await,
            Action::LeaveGame(game_id) => {
                let outcome = signup_service::leave(&self.pool, from.id, game_id).await?;
                self.answer(callback_id, Some(messages::leave_reply(outcome)), false)
                    .await?;
                if outcome.left() {
                    self.refresh_announcement(game_id).await;
                }
                Ok(())
            }
            Action::ListPlayers(game_id) => {
                let players = signup_service::joined_players(&self.pool, game_id).await?;
                self.answer(callback_id, Some(messages::signup_alert(&players).as_str()), true)
                    .await
            }
        }
    }

    async fn join(&self, callback_id: &str, from: &User, game_id: i64) -> Result<(), AppError> {
        let attempt =
            signup_service::request_join(&self.pool, &self.sessions, from.id, game_id).await?;
        match attempt {
            JoinAttempt::Completed(outcome) => {
                self.answer(
                    callback_id,
                    Some(messages::join_reply(outcome).as_str()),
                    !outcome.joined(),
                )
                .await?;
                if outcome.joined() {
                    self.refresh_announcement(game_id).await;
                }
                Ok(())
            }
            JoinAttempt::NeedsOnboarding => {
                let keyboard = self.bot_username.as_deref().map(|bot| {
                    InlineKeyboard::row(vec![InlineButton::link(
                        "🎾 Finish my profile",
                        messages::deep_link(bot, game_id),
                    )])
                });
                let alert = match self
                    .transport
                    .send_text(from.id, messages::JOIN_AFTER_ONBOARDING, keyboard.as_ref())
                    .await
                {
                    Ok(_) => messages::ONBOARDING_REQUIRED_ALERT,
                    Err(e) => {
                        tracing::info!("could not message {} privately: {}", from.id, e);
                        messages::OPEN_BOT_ALERT
                    }
                };
                self.answer(callback_id, Some(alert), true).await
            }
        }
    }

    async fn answer(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), AppError> {
        self.transport
            .answer_callback(callback_id, text, show_alert)
            .await
    }
}
