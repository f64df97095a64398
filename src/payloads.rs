use std::{fmt::Display, str::FromStr};

use serde::Deserialize;

use crate::models::wizard::SurveyStep;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// The user who caused the update, when there is one.
    pub fn sender_id(&self) -> Option<i64> {
        match (&self.callback_query, &self.message) {
            (Some(query), _) => Some(query.from.id),
            (None, Some(message)) => message.from.as_ref().map(|u| u.id),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

/// Slash commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(Option<String>),
    Help,
    Profile,
    Ping,
    Games,
    Ntrp,
    Cancel,
    NewGame,
    Players,
    CancelGame(Option<i64>),
    Unknown(String),
}

impl Command {
    /// Parses `/name@bot args`. Returns `None` when the text is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let (head, args) = match body.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let args = (!args.is_empty()).then(|| args.to_string());
        let command = match name.as_str() {
            "start" => Self::Start(args),
            "help" => Self::Help,
            "profile" => Self::Profile,
            "ping" => Self::Ping,
            "games" => Self::Games,
            "ntrp" => Self::Ntrp,
            "cancel" => Self::Cancel,
            "newgame" => Self::NewGame,
            "players" => Self::Players,
            "cancelgame" => Self::CancelGame(args.and_then(|a| a.parse::<i64>().ok())),
            _ => Self::Unknown(name),
        };
        Some(command)
    }
}

/// Button payloads, encoded as `<action>_<param>...` in the callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SurveyAnswer { step: SurveyStep, index: usize },
    ManualRating,
    CancelWizard,
    JoinGame(i64),
    LeaveGame(i64),
    ListPlayers(i64),
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        match parts.as_slice() {
            ["survey", step, index] => {
                let step = SurveyStep::from_str(step).ok_or(())?;
                let index = index.parse::<usize>().map_err(|_| ())?;
                Ok(Self::SurveyAnswer { step, index })
            }
            ["ntrp", "manual"] => Ok(Self::ManualRating),
            ["wizard", "cancel"] => Ok(Self::CancelWizard),
            ["game", action, id] => {
                let id = id.parse::<i64>().map_err(|_| ())?;
                match *action {
                    "join" => Ok(Self::JoinGame(id)),
                    "leave" => Ok(Self::LeaveGame(id)),
                    "list" => Ok(Self::ListPlayers(id)),
                    _ => Err(()),
                }
            }
            _ => Err(()),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::SurveyAnswer { step, index } => write!(f, "survey_{step}_{index}"),
            Action::ManualRating => write!(f, "ntrp_manual"),
            Action::CancelWizard => write!(f, "wizard_cancel"),
            Action::JoinGame(id) => write!(f, "game_join_{id}"),
            Action::LeaveGame(id) => write!(f, "game_leave_{id}"),
            Action::ListPlayers(id) => write!(f, "game_list_{id}"),
        }
    }
}

/// The parts of an update the bot reacts to, decoded once at the transport boundary.
#[derive(Debug, Clone)]
pub enum Event {
    Command {
        from: User,
        chat_id: i64,
        command: Command,
    },
    Text {
        from: User,
        chat_id: i64,
        text: String,
    },
    Photo {
        from: User,
        chat_id: i64,
        file_id: String,
    },
    Callback {
        id: String,
        from: User,
        message: Option<(i64, i64)>,
        action: Option<Action>,
    },
}

impl Event {
    pub fn from_update(update: Update) -> Option<Self> {
        if let Some(query) = update.callback_query {
            let message = query.message.map(|m| (m.chat.id, m.message_id));
            let action = query.data.as_deref().and_then(|d| d.parse::<Action>().ok());
            return Some(Event::Callback {
                id: query.id,
                from: query.from,
                message,
                action,
            });
        }
        let message = update.message?;
        let from = message.from?;
        let chat_id = message.chat.id;
        if let Some(text) = message.text {
            return match Command::parse(&text) {
                Some(command) => Some(Event::Command {
                    from,
                    chat_id,
                    command,
                }),
                None => Some(Event::Text {
                    from,
                    chat_id,
                    text,
                }),
            };
        }
        // The largest size comes last.
        let photo = message
            .photo
            .and_then(|sizes| sizes.into_iter().max_by_key(|p| p.width * p.height))?;
        Some(Event::Photo {
            from,
            chat_id,
            file_id: photo.file_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start(None)));
        assert_eq!(
            Command::parse("/start join_12"),
            Some(Command::Start(Some("join_12".to_string())))
        );
        assert_eq!(Command::parse("/NewGame@CourtMateBot"), Some(Command::NewGame));
        assert_eq!(
            Command::parse("/cancelgame 7"),
            Some(Command::CancelGame(Some(7)))
        );
        assert_eq!(
            Command::parse("/cancelgame seven"),
            Some(Command::CancelGame(None))
        );
        assert_eq!(
            Command::parse("/dance"),
            Some(Command::Unknown("dance".to_string()))
        );
        assert_eq!(Command::parse("25.12 19:30"), None);
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(
            "survey_rating_3".parse::<Action>(),
            Ok(Action::SurveyAnswer {
                step: SurveyStep::Rating,
                index: 3
            })
        );
        assert_eq!("game_join_42".parse::<Action>(), Ok(Action::JoinGame(42)));
        assert_eq!("game_leave_42".parse::<Action>(), Ok(Action::LeaveGame(42)));
        assert_eq!("game_list_42".parse::<Action>(), Ok(Action::ListPlayers(42)));
        assert_eq!("ntrp_manual".parse::<Action>(), Ok(Action::ManualRating));
        assert!("game_join_abc".parse::<Action>().is_err());
        assert!("survey_mood_1".parse::<Action>().is_err());
        assert!("district_CAO".parse::<Action>().is_err());
        let encoded = Action::SurveyAnswer {
            step: SurveyStep::CourtType,
            index: 2,
        }
        .to_string();
        assert_eq!(encoded, "survey_court_2");
    }

    #[test]
    fn test_event_from_callback_update() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 1,
                "callback_query": {
                    "id": "cb1",
                    "from": {"id": 201, "is_bot": false, "first_name": "Anna"},
                    "message": {"message_id": 55, "chat": {"id": -1001}, "date": 0},
                    "data": "game_join_1"
                }
            }"#,
        )
        .unwrap();
        match Event::from_update(update) {
            Some(Event::Callback {
                id,
                from,
                message,
                action,
            }) => {
                assert_eq!(id, "cb1");
                assert_eq!(from.id, 201);
                assert_eq!(message, Some((-1001, 55)));
                assert_eq!(action, Some(Action::JoinGame(1)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_event_from_photo_update() {
        let update: Update = serde_json::from_str(
            r#"{
                "update_id": 2,
                "message": {
                    "message_id": 9,
                    "from": {"id": 100, "first_name": "Admin"},
                    "chat": {"id": 100, "type": "private"},
                    "photo": [
                        {"file_id": "small", "width": 90, "height": 90},
                        {"file_id": "large", "width": 1280, "height": 960}
                    ]
                }
            }"#,
        )
        .unwrap();
        match Event::from_update(update) {
            Some(Event::Photo { file_id, .. }) => assert_eq!(file_id, "large"),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
