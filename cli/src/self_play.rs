use std::io::Write;
use std::sync::{Arc, atomic::AtomicBool};

use anyhow::Result;
use engine::{
    GameResult, GenerateMoves, PgnRecorder, PgnTags, Position, SearchError, SearchParams, Side,
    search,
};
use tracing::{debug, info};

/// Outcome of one self-play game.
#[derive(Debug)]
pub struct PlayedGame {
    pub pgn: String,
    pub result: Option<GameResult>,
    pub final_position: Position,
}

/// Plays the engine against itself from `position`, writing each move to
/// `out` as it is chosen. Stops when the game ends, or after `max_moves`
/// half moves with the game left unfinished.
pub fn play_game(
    mut position: Position,
    search_params: &SearchParams,
    max_moves: u32,
    tags: PgnTags,
    move_gen: impl GenerateMoves + Copy,
    out: &mut impl Write,
) -> Result<PlayedGame> {
    let mut recorder = PgnRecorder::with_tags(tags);

    let mut result = None;
    for _ in 0..max_moves {
        let search_res = search(
            &position,
            search_params,
            move_gen,
            Arc::new(AtomicBool::new(false)),
        );
        let best_move = match search_res {
            Ok((best_move, info)) => {
                debug!(
                    "{} positions in {:?}",
                    info.positions_processed, info.time_elapsed
                );
                best_move
            }
            Err(SearchError::NoLegalMoves(game_result)) => {
                result = Some(game_result);
                break;
            }
        };

        let move_number = position.state.full_move_counter;
        let dots = if position.state.to_move == Side::White {
            "."
        } else {
            "..."
        };
        let notation = recorder.record(&position, best_move, move_gen)?;
        writeln!(out, "{}{} {}", move_number, dots, notation)?;
        position.make_move(best_move);
    }

    match result {
        Some(result) => info!("game over: {}", result),
        None => info!("game stopped after {} half moves", max_moves),
    }

    Ok(PlayedGame {
        pgn: recorder.finish(result),
        result,
        final_position: position,
    })
}
