use std::time::Duration;

use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    errors::AppError,
    payloads::{Message, Update, User},
    responses::{InlineKeyboard, MessageRef, TelegramResponse},
    transport::ChatTransport,
};

const API_BASE: &str = "https://api.telegram.org";
const PARSE_MODE: &str = "HTML";
const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct SendPhoto<'a> {
    chat_id: i64,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct EditMessageCaption<'a> {
    chat_id: i64,
    message_id: i64,
    caption: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    show_alert: bool,
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct SetWebhook<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct NoParams {}

const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

/// Bot API client over HTTPS.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(client: Client, token: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/bot{}", API_BASE, token),
        }
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, AppError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response: TelegramResponse<R> = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(params)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    /// Edits answer with the edited message or `true`; neither is needed.
    async fn call_edit<P: Serialize>(&self, method: &str, params: &P) -> Result<(), AppError> {
        match self.call::<P, serde_json::Value>(method, params).await {
            Ok(_) => Ok(()),
            Err(AppError::Telegram(description))
                if description.contains("message is not modified") =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_me(&self) -> Result<User, AppError> {
        self.call("getMe", &NoParams {}).await
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, AppError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: POLL_TIMEOUT_SECS,
                allowed_updates: ALLOWED_UPDATES,
            },
        )
        .await
    }

    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<bool, AppError> {
        self.call(
            "setWebhook",
            &SetWebhook {
                url,
                secret_token,
                allowed_updates: ALLOWED_UPDATES,
            },
        )
        .await
    }

    pub async fn delete_webhook(&self) -> Result<bool, AppError> {
        self.call("deleteWebhook", &NoParams {}).await
    }

    /// Long-polls for updates forever, handing each one to `on_update` in arrival order.
    pub async fn poll<F>(&self, mut on_update: F)
    where
        F: FnMut(Update),
    {
        let mut offset: Option<i64> = None;
        loop {
            match self.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        on_update(update);
                    }
                }
                Err(e) => {
                    tracing::warn!("getUpdates failed ({}): {}", e.code(), e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }
}

impl ChatTransport for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageRef, AppError> {
        let message: Message = self
            .call(
                "sendMessage",
                &SendMessage {
                    chat_id,
                    text,
                    parse_mode: PARSE_MODE,
                    reply_markup: keyboard,
                },
            )
            .await?;
        Ok(MessageRef {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageRef, AppError> {
        let message: Message = self
            .call(
                "sendPhoto",
                &SendPhoto {
                    chat_id,
                    photo: file_id,
                    caption,
                    parse_mode: PARSE_MODE,
                    reply_markup: keyboard,
                },
            )
            .await?;
        Ok(MessageRef {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }

    async fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError> {
        self.call_edit(
            "editMessageText",
            &EditMessageText {
                chat_id: message.chat_id,
                message_id: message.message_id,
                text,
                parse_mode: PARSE_MODE,
                reply_markup: keyboard,
            },
        )
        .await
    }

    async fn edit_caption(
        &self,
        message: MessageRef,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), AppError> {
        self.call_edit(
            "editMessageCaption",
            &EditMessageCaption {
                chat_id: message.chat_id,
                message_id: message.message_id,
                caption,
                parse_mode: PARSE_MODE,
                reply_markup: keyboard,
            },
        )
        .await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), AppError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackQuery {
                    callback_query_id: callback_id,
                    text,
                    show_alert,
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{payloads::Action, responses::InlineButton};

    #[test]
    fn test_send_message_body() {
        let keyboard = InlineKeyboard::row(vec![InlineButton::action("Join", Action::JoinGame(1))]);
        let body = serde_json::to_value(SendMessage {
            chat_id: -1001,
            text: "<b>Doubles night</b>",
            parse_mode: PARSE_MODE,
            reply_markup: Some(&keyboard),
        })
        .unwrap();
        assert_eq!(body["parse_mode"], "HTML");
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "game_join_1"
        );

        let body = serde_json::to_value(SendMessage {
            chat_id: 1,
            text: "pong",
            parse_mode: PARSE_MODE,
            reply_markup: None,
        })
        .unwrap();
        assert!(body.get("reply_markup").is_none());
    }

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new(Client::new(), "123:abc");
        assert_eq!(client.base_url, "https://api.telegram.org/bot123:abc");
    }
}
