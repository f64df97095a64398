pub mod game;
pub mod player;
pub mod wizard;
