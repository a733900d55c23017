mod self_play;

pub use self_play::{PlayedGame, play_game};
