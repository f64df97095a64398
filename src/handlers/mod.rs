use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    config::Settings,
    errors::AppError,
    messages,
    payloads::{Event, Update},
    responses::InlineKeyboard,
    services::{game_service, signup_service},
    sessions::SessionStore,
    transport::ChatTransport,
};

mod callbacks;
mod commands;
mod conversation;
pub mod webhook;

/// Routes decoded events to the services and talks back through the transport.
pub struct Bot<T> {
    pool: SqlitePool,
    transport: T,
    sessions: Arc<SessionStore>,
    settings: Arc<Settings>,
    bot_username: Option<String>,
    queues: DashMap<i64, UserQueue>,
}

/// Feeds one user's updates to a worker task that handles them one at a time.
struct UserQueue {
    sender: mpsc::UnboundedSender<Update>,
    last_update: Instant,
}

/// Where a generic failure notice goes when an event could not be handled.
enum ReplyTarget {
    Chat(i64),
    Callback(String),
}

impl<T: ChatTransport> Bot<T> {
    pub fn new(
        pool: SqlitePool,
        transport: T,
        sessions: Arc<SessionStore>,
        settings: Arc<Settings>,
        bot_username: Option<String>,
    ) -> Self {
        Self {
            pool,
            transport,
            sessions,
            settings,
            bot_username,
            queues: DashMap::new(),
        }
    }

    /// Schedules an update in the background. Updates from the same user are
    /// handled in arrival order, different users proceed in parallel.
    pub fn enqueue(self: &Arc<Self>, update: Update) {
        let Some(user_id) = update.sender_id() else {
            let bot = Arc::clone(self);
            tokio::spawn(async move { bot.handle_update(update).await });
            return;
        };
        let mut queue = self.queues.entry(user_id).or_insert_with(|| UserQueue {
            sender: self.spawn_worker(),
            last_update: Instant::now(),
        });
        queue.last_update = Instant::now();
        if let Err(mpsc::error::SendError(update)) = queue.sender.send(update) {
            tracing::warn!("worker for {} is gone, starting a new one", user_id);
            queue.sender = self.spawn_worker();
            if queue.sender.send(update).is_err() {
                tracing::error!("could not queue update for {}", user_id);
            }
        }
    }

    fn spawn_worker(self: &Arc<Self>) -> mpsc::UnboundedSender<Update> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let bot = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(update) = receiver.recv().await {
                bot.handle_update(update).await;
            }
        });
        sender
    }

    /// Stops the workers of users who have been quiet for longer than `idle`.
    /// A worker finishes what is already queued before it exits.
    pub fn close_idle_queues(&self, idle: Duration) -> usize {
        let mut closed = 0;
        self.queues.retain(|_, q| {
            let active = q.last_update.elapsed() < idle;
            closed += usize::from(!active);
            active
        });
        closed
    }

    pub fn spawn_queue_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let bot = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let closed = bot.close_idle_queues(bot.settings.session_idle_timeout);
                if closed > 0 {
                    tracing::debug!("closed {} idle update queues", closed);
                }
            }
        })
    }

    /// Handles one update to completion. Failures stay inside this update: they are
    /// logged and the user is told to try again later.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        let Some(event) = Event::from_update(update) else {
            tracing::debug!("update {} carries nothing to handle", update_id);
            return;
        };
        let target = match &event {
            Event::Command { chat_id, .. }
            | Event::Text { chat_id, .. }
            | Event::Photo { chat_id, .. } => ReplyTarget::Chat(*chat_id),
            Event::Callback { id, .. } => ReplyTarget::Callback(id.clone()),
        };

        let Err(e) = self.dispatch(event).await else {
            return;
        };
        let notice = if e.is_validation() {
            tracing::debug!("update {} rejected: {}", update_id, e);
            messages::retry(&e)
        } else {
            tracing::error!("update {} failed ({}): {}", update_id, e.code(), e);
            messages::TRY_AGAIN_LATER.to_string()
        };
        let notified = match target {
            ReplyTarget::Chat(chat_id) => self.reply(chat_id, &notice).await,
            ReplyTarget::Callback(id) => {
                self.transport
                    .answer_callback(&id, Some(notice.as_str()), true)
                    .await
            }
        };
        if let Err(e) = notified {
            tracing::warn!("could not report failure of update {}: {}", update_id, e);
        }
    }

    async fn dispatch(&self, event: Event) -> Result<(), AppError> {
        match event {
            Event::Command {
                from,
                chat_id,
                command,
            } => self.on_command(&from, chat_id, command).await,
            Event::Text {
                from,
                chat_id,
                text,
            } => self.on_text(&from, chat_id, &text).await,
            Event::Photo {
                from,
                chat_id,
                file_id,
            } => self.on_photo(&from, chat_id, &file_id).await,
            Event::Callback {
                id,
                from,
                message,
                action,
            } => self.on_callback(&id, &from, message, action).await,
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<(), AppError> {
        self.transport.send_text(chat_id, text, None).await?;
        Ok(())
    }

    async fn reply_with(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError> {
        self.transport.send_text(chat_id, text, keyboard).await?;
        Ok(())
    }

    /// Keeps the published announcement in step with the signups. Never fails the caller.
    async fn refresh_announcement(&self, game_id: i64) {
        if let Err(e) = game_service::refresh_announcement(
            &self.pool,
            &self.transport,
            &self.settings.utc_offset,
            game_id,
        )
        .await
        {
            tracing::warn!("could not refresh announcement of game {}: {}", game_id, e);
        }
    }

    /// Retries a join the user asked for before finishing onboarding.
    async fn resume_pending_join(&self, user_id: i64, chat_id: i64) -> Result<(), AppError> {
        let resumed =
            signup_service::resume_pending_join(&self.pool, &self.sessions, user_id).await?;
        if let Some((game_id, signup_service::JoinAttempt::Completed(outcome))) = resumed {
            self.reply(chat_id, &messages::resumed_join(game_id, outcome))
                .await?;
            if outcome.joined() {
                self.refresh_announcement(game_id).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        config::test_settings,
        models::{player::SkillLevel, wizard::Session},
        repositories::{game_repo, player_repo, signup_repo},
        responses::MessageRef,
        transport::recording::{RecordingTransport, Sent},
    };

    const BROADCAST: i64 = -1001;

    fn bot(pool: SqlitePool) -> Bot<RecordingTransport> {
        Bot::new(
            pool,
            RecordingTransport::new(),
            Arc::new(SessionStore::new(Duration::from_secs(3600))),
            Arc::new(test_settings()),
            Some("courtmate_bot".to_string()),
        )
    }

    fn user(id: i64, first_name: &str) -> serde_json::Value {
        json!({"id": id, "is_bot": false, "first_name": first_name})
    }

    fn text_update(from: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "from": user(from, "Player"),
                "chat": {"id": from, "type": "private"},
                "date": 0,
                "text": text
            }
        }))
        .unwrap()
    }

    fn photo_update(from: i64, file_id: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 2,
            "message": {
                "message_id": 11,
                "from": user(from, "Player"),
                "chat": {"id": from, "type": "private"},
                "date": 0,
                "photo": [{"file_id": file_id, "width": 800, "height": 600}]
            }
        }))
        .unwrap()
    }

    fn callback_update(from: i64, data: &str, message: MessageRef) -> Update {
        serde_json::from_value(json!({
            "update_id": 3,
            "callback_query": {
                "id": format!("cb-{from}-{data}"),
                "from": user(from, "Player"),
                "message": {
                    "message_id": message.message_id,
                    "chat": {"id": message.chat_id},
                    "date": 0
                },
                "data": data
            }
        }))
        .unwrap()
    }

    #[sqlx::test]
    async fn test_new_player_completes_survey(pool: SqlitePool) {
        let bot = bot(pool.clone());
        bot.handle_update(text_update(7, "/start")).await;

        let player = player_repo::get_player(&pool, 7).await.unwrap().unwrap();
        assert_eq!(player.skill_level, "beginner");
        assert_eq!(player.experience_years, 0);
        assert_eq!(player.rating, 1000);
        let welcome = bot.transport.last_keyboard_to(7).unwrap();
        assert_eq!(welcome.actions()[0], "survey_level_0");

        let survey_message = bot.transport.last_message_to(7).unwrap();
        for data in [
            "survey_level_0",
            "survey_experience_0",
            "survey_rating_0",
            "survey_court_0",
        ] {
            bot.handle_update(callback_update(7, data, survey_message))
                .await;
        }
        assert_eq!(
            bot.sessions.get(7),
            Some(Session::Survey(crate::models::wizard::SurveyStep::District))
        );
        bot.handle_update(text_update(7, "Khamovniki")).await;
        bot.handle_update(text_update(7, "weekends")).await;

        assert_eq!(bot.sessions.get(7), None);
        let player = crate::models::player::Player::from(
            player_repo::get_player(&pool, 7).await.unwrap().unwrap(),
        );
        assert_eq!(player.skill_level, SkillLevel::Beginner);
        assert_eq!(player.experience_years, 0);
        assert_eq!(player.rating, 1100);
        assert!(!player.court_types.is_empty());
        assert_eq!(player.district.as_deref(), Some("Khamovniki"));
        assert_eq!(player.availability, vec!["weekends".to_string()]);
        assert!(
            bot.transport
                .last_text_to(7)
                .unwrap()
                .contains("Your profile is ready")
        );
        assert_eq!(bot.transport.callback_answers().len(), 4);
    }

    #[sqlx::test]
    async fn test_stale_survey_button_is_ignored(pool: SqlitePool) {
        let bot = bot(pool.clone());
        bot.handle_update(text_update(7, "/start")).await;
        let message = bot.transport.last_message_to(7).unwrap();
        bot.handle_update(callback_update(7, "survey_level_2", message))
            .await;
        bot.transport.clear();

        bot.handle_update(callback_update(7, "survey_level_0", message))
            .await;
        bot.handle_update(text_update(7, "Typed while buttons are shown"))
            .await;
        assert_eq!(bot.transport.callback_answers(), vec![(None, false)]);
        assert!(bot.transport.texts_to(7).is_empty());
        let player = player_repo::get_player(&pool, 7).await.unwrap().unwrap();
        assert_eq!(player.skill_level, "advanced");
        assert_eq!(
            bot.sessions.get(7),
            Some(Session::Survey(
                crate::models::wizard::SurveyStep::Experience
            ))
        );
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players")))]
    async fn test_admin_creates_game_and_seats_fill_up(pool: SqlitePool) {
        let bot = bot(pool.clone());
        for answer in ["/newgame", "25.12.2099 19:30", "Luzhniki", "2", "-", "-", "-"] {
            bot.handle_update(text_update(100, answer)).await;
        }
        assert!(bot.transport.last_text_to(100).unwrap().starts_with("Game published"));
        assert_eq!(bot.sessions.get(100), None);

        let announcement = bot.transport.last_message_to(BROADCAST).unwrap();
        let keyboard = bot.transport.last_keyboard_to(BROADCAST).unwrap();
        let join = keyboard.actions()[0].to_string();
        assert!(join.starts_with("game_join_"));
        let game_id: i64 = join.trim_start_matches("game_join_").parse().unwrap();
        let game = game_repo::get_game(&pool, game_id).await.unwrap().unwrap();
        assert_eq!(game.max_players, Some(2));
        assert_eq!(game.level_hint, None);
        assert_eq!(game.channel_chat_id, Some(BROADCAST));

        for player in [201, 202, 203] {
            bot.handle_update(callback_update(player, &join, announcement))
                .await;
        }
        let answers: Vec<Option<String>> = bot
            .transport
            .callback_answers()
            .into_iter()
            .map(|(text, _)| text)
            .collect();
        assert_eq!(
            answers,
            vec![
                Some("You are signed up".to_string()),
                Some("You are signed up".to_string()),
                Some("No seats left".to_string()),
            ]
        );
        assert_eq!(signup_repo::count_joined(&pool, game_id).await.unwrap(), 2);
        assert!(bot.transport.last_text_to(BROADCAST).unwrap().contains("👥 2/2"));
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players")))]
    async fn test_queued_updates_keep_their_order(pool: SqlitePool) {
        let bot = Arc::new(bot(pool.clone()));
        for answer in ["/newgame", "25.12.2099 19:30", "Luzhniki", "2", "-", "-", "-"] {
            bot.enqueue(text_update(100, answer));
            bot.enqueue(text_update(201, "/ping"));
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while !bot
                .transport
                .last_text_to(100)
                .is_some_and(|t| t.starts_with("Game published"))
                || bot.transport.texts_to(201).len() < 7
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(bot.transport.texts_to(201).iter().all(|t| t == messages::PONG));
        let game = game_repo::get_game(&pool, 1).await.unwrap().unwrap();
        assert_eq!(game.location.as_deref(), Some("Luzhniki"));
        assert_eq!(game.max_players, Some(2));

        assert_eq!(bot.close_idle_queues(Duration::ZERO), 2);
        assert!(bot.queues.is_empty());
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players")))]
    async fn test_game_wizard_retries_and_photo(pool: SqlitePool) {
        let bot = bot(pool.clone());
        bot.handle_update(text_update(100, "/newgame")).await;
        bot.handle_update(text_update(100, "31.02 10:00")).await;
        assert!(bot.transport.last_text_to(100).unwrap().contains("Could not read the date"));
        bot.handle_update(text_update(100, "01.06.2099 10:00")).await;
        bot.handle_update(text_update(100, "Sokolniki")).await;
        bot.handle_update(text_update(100, "zero")).await;
        assert!(bot.transport.last_text_to(100).unwrap().contains("Capacity"));
        bot.handle_update(photo_update(100, "court-photo")).await;
        assert_eq!(bot.transport.last_text_to(100).unwrap(), messages::PHOTO_SAVED);
        for answer in ["-", "NTRP 3.0", "Morning hit", "Bring water"] {
            bot.handle_update(text_update(100, answer)).await;
        }
        assert!(matches!(
            bot.transport.sent().iter().find(|s| matches!(s, Sent::Photo { .. })),
            Some(Sent::Photo { chat_id: BROADCAST, file_id, caption, .. })
                if file_id == "court-photo" && caption.contains("Morning hit")
        ));
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_join_before_onboarding_is_resumed(pool: SqlitePool) {
        let bot = bot(pool.clone());
        let announcement = MessageRef {
            chat_id: BROADCAST,
            message_id: 55,
        };
        bot.handle_update(callback_update(205, "game_join_1", announcement))
            .await;
        assert_eq!(bot.sessions.pending_join(205), Some(1));
        assert_eq!(
            bot.transport.callback_answers(),
            vec![(Some(messages::ONBOARDING_REQUIRED_ALERT.to_string()), true)]
        );
        let link = bot.transport.last_keyboard_to(205).unwrap();
        assert_eq!(
            link.inline_keyboard[0][0].url.as_deref(),
            Some("https://t.me/courtmate_bot?start=join_1")
        );

        bot.handle_update(text_update(205, "/start join_1")).await;
        bot.handle_update(text_update(205, "/ntrp")).await;
        bot.handle_update(text_update(205, "3.5")).await;
        let survey_message = bot.transport.last_message_to(205).unwrap();
        bot.handle_update(callback_update(205, "survey_court_1", survey_message))
            .await;
        bot.handle_update(text_update(205, "SAO")).await;
        assert_eq!(signup_repo::count_joined(&pool, 1).await.unwrap(), 0);
        bot.handle_update(text_update(205, "evenings")).await;

        assert_eq!(signup_repo::count_joined(&pool, 1).await.unwrap(), 1);
        assert_eq!(bot.sessions.pending_join(205), None);
        assert!(
            bot.transport
                .last_text_to(205)
                .unwrap()
                .contains("signed up for game #1")
        );
        assert!(bot.transport.last_text_to(BROADCAST).unwrap().contains("👥 1/2"));
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_unreachable_player_gets_open_bot_alert(pool: SqlitePool) {
        let bot = bot(pool.clone());
        bot.transport.make_unreachable(205);
        let announcement = MessageRef {
            chat_id: BROADCAST,
            message_id: 55,
        };
        bot.handle_update(callback_update(205, "game_join_1", announcement))
            .await;
        assert_eq!(
            bot.transport.callback_answers(),
            vec![(Some(messages::OPEN_BOT_ALERT.to_string()), true)]
        );
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_leave_and_list_callbacks(pool: SqlitePool) {
        let bot = bot(pool.clone());
        let announcement = MessageRef {
            chat_id: BROADCAST,
            message_id: 55,
        };
        bot.handle_update(callback_update(201, "game_join_1", announcement))
            .await;
        bot.handle_update(callback_update(204, "game_join_1", announcement))
            .await;
        bot.handle_update(callback_update(202, "game_list_1", announcement))
            .await;
        bot.handle_update(callback_update(201, "game_leave_1", announcement))
            .await;
        bot.handle_update(callback_update(201, "game_leave_1", announcement))
            .await;
        bot.handle_update(callback_update(201, "district_CAO", announcement))
            .await;

        let answers = bot.transport.callback_answers();
        assert_eq!(
            answers[2],
            (Some("1. Anna Petrova (@anna_p)\n2. Gleb (@gleb)".to_string()), true)
        );
        assert_eq!(answers[3], (Some("Your signup is cancelled".to_string()), false));
        assert_eq!(answers[4], (Some("You were not signed up".to_string()), false));
        assert_eq!(answers[5], (None, false));
        assert!(bot.transport.last_text_to(BROADCAST).unwrap().contains("👥 1/2"));
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_admin_commands_are_refused_to_players(pool: SqlitePool) {
        let bot = bot(pool.clone());
        for command in ["/newgame", "/players", "/cancelgame 1"] {
            bot.handle_update(text_update(201, command)).await;
        }
        let texts = bot.transport.texts_to(201);
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0], messages::ADMIN_ONLY);
        assert_eq!(texts[1], messages::ADMIN_ONLY);
        assert_eq!(texts[2], messages::CANCEL_GAME_FORBIDDEN);
        assert_eq!(bot.sessions.get(201), None);

        bot.handle_update(text_update(100, "/players")).await;
        let listing = bot.transport.last_text_to(100).unwrap();
        assert!(listing.find("CAO").unwrap() < listing.find("SAO").unwrap());
        assert!(listing.contains("No district"));

        bot.handle_update(text_update(100, "/cancelgame 1")).await;
        assert_eq!(bot.transport.last_text_to(100).unwrap(), messages::game_cancelled(1));
        assert!(bot.transport.last_text_to(BROADCAST).unwrap().contains("Cancelled"));
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("create_players", "create_games")))]
    async fn test_simple_commands(pool: SqlitePool) {
        let bot = bot(pool.clone());
        bot.handle_update(text_update(201, "ping")).await;
        assert_eq!(bot.transport.last_text_to(201).unwrap(), messages::PONG);
        bot.handle_update(text_update(201, "/ping@courtmate_bot")).await;
        assert_eq!(bot.transport.last_text_to(201).unwrap(), messages::PONG);
        bot.handle_update(text_update(201, "/cancel")).await;
        assert_eq!(bot.transport.last_text_to(201).unwrap(), messages::NOTHING_TO_CANCEL);
        bot.handle_update(text_update(201, "/profile")).await;
        assert!(bot.transport.last_text_to(201).unwrap().contains("Anna Petrova"));

        bot.transport.clear();
        bot.handle_update(text_update(201, "/games")).await;
        let texts = bot.transport.texts_to(201);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("Game ID: 1"));
        assert!(texts[1].contains("Game ID: 2"));
    }

    #[sqlx::test]
    async fn test_infrastructure_failure_is_reported(pool: SqlitePool) {
        let bot = bot(pool.clone());
        pool.close().await;
        bot.handle_update(text_update(7, "/start")).await;
        assert_eq!(
            bot.transport.last_text_to(7).unwrap(),
            messages::TRY_AGAIN_LATER
        );
    }
}
