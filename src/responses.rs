use axum::{
    Json as AxumJson,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{errors::AppError, payloads::Action};

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
#[serde(rename_all = "camelCase")]
pub enum AppResponse {
    Error { error: ErrorResponse },
    Success { payload: SuccessResponse },
}

pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    AxumJson<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match AxumJson::<T>::from_request(req, state).await {
            Ok(json) => Ok(Json(json.0)),
            Err(rej) => match rej {
                JsonRejection::JsonDataError(_) => Err(AppError::JsonDataError),
                JsonRejection::JsonSyntaxError(e) => Err(AppError::JsonSyntaxError(e.to_string())),
                JsonRejection::MissingJsonContentType(_) => Err(AppError::MissingContentType),
                _ => Err(AppError::JsonUnknownError),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing)]
    pub status_code: StatusCode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[serde(rename_all_fields = "camelCase")]
#[serde(tag = "type")]
pub enum SuccessResponse {
    Health { service: &'static str },
    UpdateAccepted { update_id: i64 },
}

impl IntoResponse for AppResponse {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppResponse::Error { error: e } => (e.status_code, AxumJson(e)).into_response(),
            AppResponse::Success { payload: _ } => (StatusCode::OK, AxumJson(self)).into_response(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match &self {
            AppError::InvalidWebhookSecret => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::MissingContentType => StatusCode::BAD_REQUEST,
            AppError::JsonSyntaxError(_) => StatusCode::BAD_REQUEST,
            AppError::JsonDataError => StatusCode::BAD_REQUEST,
            AppError::JsonUnknownError => StatusCode::BAD_REQUEST,
            AppError::InvalidDate(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCapacity(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidNtrpRating(_) => StatusCode::BAD_REQUEST,
            AppError::EmptyAnswer => StatusCode::BAD_REQUEST,
            AppError::GameNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Telegram(_) => StatusCode::BAD_GATEWAY,
            AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::MissingConfig(_)
            | AppError::InvalidConfig { .. }
            | AppError::Json(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Io(_)
            | AppError::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = AppResponse::Error {
            error: ErrorResponse {
                code: self.code(),
                message: format!("{}", self),
                status_code,
            },
        };
        (status_code, AxumJson(body)).into_response()
    }
}

/// One button of an inline keyboard. Exactly one of `callback_data` and `url` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineButton {
    pub fn action<S: Into<String>>(text: S, action: Action) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(action.to_string()),
            url: None,
        }
    }

    pub fn link<S: Into<String>>(text: S, url: String) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn column(buttons: Vec<InlineButton>) -> Self {
        Self {
            inline_keyboard: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn row(buttons: Vec<InlineButton>) -> Self {
        Self {
            inline_keyboard: vec![buttons],
        }
    }

    /// All callback payloads in reading order.
    pub fn actions(&self) -> Vec<&str> {
        self.inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| b.callback_data.as_deref())
            .collect()
    }
}

/// Address of a message the bot has sent, used for later edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// The envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

impl<T> TelegramResponse<T> {
    pub fn into_result(self) -> Result<T, AppError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(AppError::Telegram(
                self.description
                    .unwrap_or_else(|| "request was not successful".to_string()),
            )),
        }
    }
}
