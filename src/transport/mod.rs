//! Outbound side of the chat transport.

use std::future::Future;

use crate::{
    errors::AppError,
    responses::{InlineKeyboard, MessageRef},
};

pub mod telegram;

/// Everything the bot needs to say something back. Texts are HTML formatted.
pub trait ChatTransport: Send + Sync + 'static {
    fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> impl Future<Output = Result<MessageRef, AppError>> + Send;

    fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> impl Future<Output = Result<MessageRef, AppError>> + Send;

    fn edit_text(
        &self,
        message: MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn edit_caption(
        &self,
        message: MessageRef,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
