pub mod game_repo;
pub mod player_repo;
pub mod signup_repo;
