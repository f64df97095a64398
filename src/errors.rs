use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing required configuration: `{0}`")]
    MissingConfig(&'static str),
    #[error("Invalid configuration value for `{key}`: `{value}`")]
    InvalidConfig { key: &'static str, value: String },
    #[error("The webhook secret token is missing or invalid")]
    InvalidWebhookSecret,
    #[error("Insufficient permissions to perform this action")]
    InsufficientPermissions,
    #[error("Could not read the date `{0}`, expected DD.MM HH:MM or DD.MM.YYYY HH:MM")]
    InvalidDate(String),
    #[error("Capacity `{0}` is not valid, expected a positive number or `-`")]
    InvalidCapacity(String),
    #[error("NTRP rating `{0}` is not valid, must be between 1.0 and 7.0 in steps of 0.5")]
    InvalidNtrpRating(String),
    #[error("An answer is required for this step")]
    EmptyAnswer,
    #[error("No game found with id `{0}`")]
    GameNotFound(i64),
    #[error("No player found with id `{0}`")]
    PlayerNotFound(i64),
    #[error("Telegram API error: {0}")]
    Telegram(String),
    #[error("Telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing content type header")]
    MissingContentType,
    #[error("Could not parse the request body: {0}")]
    JsonSyntaxError(String),
    #[error("The request body does not describe a Telegram update")]
    JsonDataError,
    #[error("Unknown error while reading the request body")]
    JsonUnknownError,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unknown error")]
    Unknown,
}

impl AppError {
    pub fn code(&self) -> String {
        match self {
            AppError::MissingConfig(_) => String::from("MissingConfig"),
            AppError::InvalidConfig { key: _, value: _ } => String::from("InvalidConfig"),
            AppError::InvalidWebhookSecret => String::from("InvalidWebhookSecret"),
            AppError::InsufficientPermissions => String::from("InsufficientPermissions"),
            AppError::InvalidDate(_) => String::from("InvalidDate"),
            AppError::InvalidCapacity(_) => String::from("InvalidCapacity"),
            AppError::InvalidNtrpRating(_) => String::from("InvalidNtrpRating"),
            AppError::EmptyAnswer => String::from("EmptyAnswer"),
            AppError::GameNotFound(_) => String::from("GameNotFound"),
            AppError::PlayerNotFound(_) => String::from("PlayerNotFound"),
            AppError::Telegram(_) => String::from("TelegramError"),
            AppError::Http(_) => String::from("HttpError"),
            AppError::Json(_) => String::from("JsonError"),
            AppError::MissingContentType => String::from("MissingContentType"),
            AppError::JsonSyntaxError(_) => String::from("JsonSyntaxError"),
            AppError::JsonDataError => String::from("JsonDataError"),
            AppError::JsonUnknownError => String::from("JsonUnknownError"),
            AppError::Database(_) => String::from("DatabaseError"),
            AppError::Migration(_) => String::from("MigrationError"),
            AppError::Io(_) => String::from("IoError"),
            AppError::Unknown => String::from("Unknown"),
        }
    }

    /// Validation failures are answered with a re-prompt, never logged as faults.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidDate(_)
                | AppError::InvalidCapacity(_)
                | AppError::InvalidNtrpRating(_)
                | AppError::EmptyAnswer
        )
    }
}
