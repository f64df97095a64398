use chrono::Utc;

use crate::{
    errors::AppError,
    messages,
    models::wizard::Session,
    payloads::User,
    responses::MessageRef,
    services::{
        game_service::{self, PublishOutcome, WizardProgress},
        player_service::{self, SurveyAnswer, SurveyProgress},
    },
    transport::ChatTransport,
};

use super::Bot;

impl<T: ChatTransport> Bot<T> {
    /// Plain text goes to whatever dialogue the user is in.
    pub(super) async fn on_text(
        &self,
        from: &User,
        chat_id: i64,
        text: &str,
    ) -> Result<(), AppError> {
        match self.sessions.get(from.id) {
            Some(Session::Survey(step)) if step.takes_choice() => {
                tracing::debug!(
                    "ignoring text from {} while survey step {} waits for a button",
                    from.id,
                    step
                );
                Ok(())
            }
            Some(Session::Survey(step)) => {
                let progress = player_service::answer_survey(
                    &self.pool,
                    &self.sessions,
                    from.id,
                    step,
                    SurveyAnswer::Text(text.to_string()),
                )
                .await?;
                self.after_survey(from, chat_id, progress, None).await
            }
            Some(Session::ManualRating) => {
                let progress =
                    player_service::submit_manual_rating(&self.pool, &self.sessions, from.id, text)
                        .await?;
                self.after_survey(from, chat_id, progress, None).await
            }
            Some(Session::NewGame { .. }) => self.on_wizard_answer(from, chat_id, text).await,
            None if text.trim().eq_ignore_ascii_case("ping") => {
                self.reply(chat_id, messages::PONG).await
            }
            // Group chatter is not addressed to the bot.
            None if chat_id != from.id => Ok(()),
            None => self.reply(chat_id, messages::UNKNOWN_INPUT).await,
        }
    }

    pub(super) async fn on_photo(
        &self,
        from: &User,
        chat_id: i64,
        file_id: &str,
    ) -> Result<(), AppError> {
        if game_service::attach_photo(&self.sessions, from.id, file_id) {
            return self.reply(chat_id, messages::PHOTO_SAVED).await;
        }
        if chat_id == from.id {
            self.reply(chat_id, messages::UNKNOWN_INPUT).await?;
        }
        Ok(())
    }

    /// Shows the next survey question, either in place of the tapped message or
    /// as a new one, and wraps up onboarding when the survey is done.
    pub(super) async fn after_survey(
        &self,
        from: &User,
        chat_id: i64,
        progress: SurveyProgress,
        edit: Option<MessageRef>,
    ) -> Result<(), AppError> {
        match progress {
            SurveyProgress::Ignored => Ok(()),
            SurveyProgress::Retry(e) => self.reply(chat_id, &messages::retry(&e)).await,
            SurveyProgress::Next(step) => {
                let (text, keyboard) = messages::survey_prompt(step);
                match edit {
                    Some(message) => {
                        self.transport
                            .edit_text(message, &text, keyboard.as_ref())
                            .await
                    }
                    None => self.reply_with(chat_id, &text, keyboard.as_ref()).await,
                }
            }
            SurveyProgress::Completed => {
                let player = player_service::get_player(&self.pool, from.id)
                    .await?
                    .ok_or(AppError::PlayerNotFound(from.id))?;
                self.reply(chat_id, &messages::survey_completed(&player))
                    .await?;
                self.resume_pending_join(from.id, chat_id).await
            }
        }
    }

    async fn on_wizard_answer(&self, from: &User, chat_id: i64, text: &str) -> Result<(), AppError> {
        let progress = game_service::answer_game_wizard(
            &self.sessions,
            from.id,
            text,
            &self.settings.utc_offset,
            Utc::now(),
        );
        match progress {
            WizardProgress::Ignored => Ok(()),
            WizardProgress::Retry(e) => self.reply(chat_id, &messages::retry(&e)).await,
            WizardProgress::Next(step) => {
                self.reply_with(
                    chat_id,
                    &messages::game_wizard_prompt(step),
                    Some(&messages::cancel_keyboard()),
                )
                .await
            }
            WizardProgress::Finished(draft) => {
                let outcome = game_service::publish_game(
                    &self.pool,
                    &self.transport,
                    &self.settings,
                    from.id,
                    &draft,
                )
                .await?;
                let text = match outcome {
                    PublishOutcome::Published { game_id, .. } => messages::game_published(game_id),
                    PublishOutcome::NotConfigured { game_id } => format!(
                        "{}\n\n{}",
                        messages::game_published(game_id),
                        messages::BROADCAST_NOT_CONFIGURED
                    ),
                };
                self.reply(chat_id, &text).await
            }
        }
    }
}
