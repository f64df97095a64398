pub mod game_service;
pub mod player_service;
pub mod signup_service;
pub mod survey_service;
