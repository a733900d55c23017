use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::prelude::IndexedRandom;
use tracing::{debug, debug_span, info};

use crate::move_gen::GenerateMoves;
use crate::moves::{Move, SerializedMove};
use crate::position::{Position, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWon,
    BlackWon,
    Draw,
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            GameResult::WhiteWon => "1-0",
            GameResult::BlackWon => "0-1",
            GameResult::Draw => "1/2-1/2",
        };
        write!(f, "{}", token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub max_depth: u32,
    pub max_time: Option<Duration>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_time: None,
        }
    }
}

#[derive(Debug)]
pub struct SearchResultInfo {
    pub positions_processed: u64,
    pub time_elapsed: Duration,
    pub move_evals: HashMap<Move, i32>,
}

#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("no legal moves, game over: {0}")]
    NoLegalMoves(GameResult),
}

// Nodes keep the packed move form, trees run to millions of nodes at
// modest depths.
struct Node {
    mve: SerializedMove,
    children: Vec<Node>,
}

impl Node {
    fn new(mve: Move) -> Node {
        Node {
            mve: mve.into(),
            children: Vec::new(),
        }
    }

    fn decoded(&self) -> Move {
        self.mve.into()
    }
}

/// Searches for the move that forces checkmate soonest, or failing that
/// steers towards a draw and away from getting mated.
///
/// The tree is built breadth-first, one ply per pass, so that flipping
/// `terminate` (or hitting `max_time`, which flips it from a timer thread)
/// stops expansion cleanly and the finished plies still get evaluated.
/// Callers must hand in a fresh `terminate` flag for every search.
///
/// Evaluations in [`SearchResultInfo::move_evals`] are signed ply counts:
/// +n means the searching side mates in n plies, -n that it gets mated,
/// 0 neither (draw, or nothing found within the horizon). Ties for the
/// best move are broken uniformly at random.
pub fn search(
    position: &Position,
    params: &SearchParams,
    move_gen: impl GenerateMoves + std::marker::Copy,
    terminate: Arc<AtomicBool>,
) -> Result<(Move, SearchResultInfo), SearchError> {
    let _span = debug_span!("search", position = position.to_fen(), params = ?params).entered();
    assert!(params.max_depth > 0, "search depth must be positive");

    let start = Instant::now();
    let searcher = position.state.to_move;

    let root_moves = move_gen.gen_moves(position);
    if root_moves.is_empty() {
        let result = if position.king_in_check(searcher) {
            match searcher {
                Side::White => GameResult::BlackWon,
                Side::Black => GameResult::WhiteWon,
            }
        } else {
            GameResult::Draw
        };
        debug!("no legal moves: {}", result);
        return Err(SearchError::NoLegalMoves(result));
    }

    if let Some(max_time) = params.max_time {
        let deadline_flag = Arc::clone(&terminate);
        thread::spawn(move || {
            thread::sleep(max_time);
            deadline_flag.store(true, Ordering::Relaxed);
        });
    }

    let mut positions_processed = root_moves.len() as u64;
    let mut roots: Vec<Node> = root_moves.into_iter().map(Node::new).collect();

    // The root move list is already ply 1
    for depth in 1..params.max_depth {
        if terminate.load(Ordering::Relaxed) {
            debug!("terminated before expanding ply {}", depth + 1);
            break;
        }
        debug!("expanding ply {}/{}", depth + 1, params.max_depth);
        for node in roots.iter_mut() {
            let mut node_position = position.clone();
            node_position.make_move(node.decoded());
            expand(
                node,
                &node_position,
                move_gen,
                &mut positions_processed,
                &terminate,
            );
        }
    }

    let mut move_evals = HashMap::with_capacity(roots.len());
    let mut root_evals = Vec::with_capacity(roots.len());
    for node in &roots {
        let mut node_position = position.clone();
        node_position.make_move(node.decoded());
        let eval = evaluate(node, &node_position, searcher, move_gen);
        move_evals.insert(node.decoded(), eval);
        root_evals.push(eval);
    }

    let target = combine_evals(&root_evals, true);
    let candidates: Vec<Move> = roots
        .iter()
        .zip(&root_evals)
        .filter(|&(_, eval)| *eval == target)
        .map(|(node, _)| node.decoded())
        .collect();
    let best_move = *candidates
        .choose(&mut rand::rng())
        .expect("combined eval always matches at least one root move");

    let search_info = SearchResultInfo {
        positions_processed,
        time_elapsed: start.elapsed(),
        move_evals,
    };
    info!(
        "best move {} (eval {}), {} positions in {:?}",
        best_move, target, search_info.positions_processed, search_info.time_elapsed
    );

    Ok((best_move, search_info))
}

/// Adds one ply below `node`. `position` is the position with `node`'s move
/// already applied. Nodes whose expansion found no moves stay leaves.
fn expand(
    node: &mut Node,
    position: &Position,
    move_gen: impl GenerateMoves + std::marker::Copy,
    positions_processed: &mut u64,
    terminate: &Arc<AtomicBool>,
) {
    if terminate.load(Ordering::Relaxed) {
        return;
    }
    if node.children.is_empty() {
        let moves = move_gen.gen_moves(position);
        *positions_processed += moves.len() as u64;
        node.children = moves.into_iter().map(Node::new).collect();
    } else {
        for child in node.children.iter_mut() {
            let mut child_position = position.clone();
            child_position.make_move(child.decoded());
            expand(
                child,
                &child_position,
                move_gen,
                positions_processed,
                terminate,
            );
        }
    }
}

fn evaluate(
    node: &Node,
    position: &Position,
    searcher: Side,
    move_gen: impl GenerateMoves + std::marker::Copy,
) -> i32 {
    if node.children.is_empty() {
        return if is_mate(position, move_gen) {
            if position.state.to_move == searcher {
                -1
            } else {
                1
            }
        } else {
            0
        };
    }

    let mut child_evals = Vec::with_capacity(node.children.len());
    for child in &node.children {
        let mut child_position = position.clone();
        child_position.make_move(child.decoded());
        child_evals.push(evaluate(child, &child_position, searcher, move_gen));
    }

    let mut result = combine_evals(&child_evals, position.state.to_move == searcher);
    if result > 0 {
        result += 1;
    } else if result < 0 {
        result -= 1;
    }
    result
}

fn is_mate(position: &Position, move_gen: impl GenerateMoves + std::marker::Copy) -> bool {
    move_gen.gen_moves(position).is_empty() && position.king_in_check(position.state.to_move)
}

/// Backward induction over the children's signed mate distances. The side to
/// move takes its fastest win if it has one, otherwise settles for a draw,
/// otherwise drags out the loss as long as it can.
fn combine_evals(evals: &[i32], searcher_to_move: bool) -> i32 {
    let has_zero = evals.iter().any(|&eval| eval == 0);
    if searcher_to_move {
        if let Some(&win) = evals.iter().filter(|&&eval| eval > 0).min() {
            win
        } else if has_zero {
            0
        } else {
            *evals
                .iter()
                .min()
                .expect("combine_evals called with no evals")
        }
    } else if let Some(&loss) = evals.iter().filter(|&&eval| eval < 0).max() {
        loss
    } else if has_zero {
        0
    } else {
        *evals
            .iter()
            .max()
            .expect("combine_evals called with no evals")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::move_gen::MOVE_GEN;
    use crate::position::Piece;
    use crate::square::Square::*;
    use test_case::test_case;
    use testresult::TestResult;

    #[test_case("8/8/8/8/8/3k4/8/r2K4 w - - 0 1", GameResult::BlackWon ; "white checkmated")]
    #[test_case("3R2k1/5r2/7K/3B4/8/8/8/8 b - - 0 1", GameResult::WhiteWon ; "black checkmated")]
    #[test_case("7K/5q2/8/5k2/8/8/8/8 w - - 0 1", GameResult::Draw ; "white stalemated")]
    #[test_case("8/8/8/8/8/8/3R4/5K1k b - - 0 1", GameResult::Draw ; "black stalemated")]
    fn test_search_no_legal_moves(fen: &str, want: GameResult) -> TestResult {
        let position = Position::from_fen(fen)?;
        let got = search(
            &position,
            &SearchParams::default(),
            MOVE_GEN,
            Arc::new(AtomicBool::new(false)),
        );

        let Err(SearchError::NoLegalMoves(result)) = got else {
            panic!("want NoLegalMoves error, got {:?}", got.map(|(mve, _)| mve));
        };
        assert_eq!(result, want);
        Ok(())
    }

    #[test_case("3k4/8/3K4/8/8/8/8/R7 w - - 0 1", Move::new(A1, A8) ; "rook mate")]
    #[test_case("1r5b/8/8/8/k7/8/K1p5/8 b - - 0 1", Move::with_promotion(C2, C1, Piece::Knight) ; "knight promotion mate")]
    fn test_search_mate_in_one(fen: &str, want: Move) -> TestResult {
        let position = Position::from_fen(fen)?;
        let (got, info) = search(
            &position,
            &SearchParams {
                max_depth: 1,
                max_time: None,
            },
            MOVE_GEN,
            Arc::new(AtomicBool::new(false)),
        )?;

        assert_eq!(got, want);
        assert_eq!(info.move_evals[&want], 1);
        Ok(())
    }

    #[test_case("7k/4Q3/8/8/8/8/7B/6K1 w - - 0 1", Move::new(H2, E5) ; "bishop check queen mate")]
    #[test_case("8/1k6/8/8/2r5/1r6/6K1/8 b - - 0 1", Move::new(C4, C2) ; "rook ladder")]
    #[test_case("1r5k/6pp/7N/3Q4/8/8/6K1/8 w - - 0 1", Move::new(D5, G8) ; "smothered mate")]
    #[test_case("8/2k5/8/8/3q4/7n/6PP/1R5K b - - 0 1", Move::new(D4, G1) ; "smothered mate black")]
    fn test_search_mate_in_two(fen: &str, want: Move) -> TestResult {
        let position = Position::from_fen(fen)?;
        let (got, info) = search(
            &position,
            &SearchParams {
                max_depth: 3,
                max_time: None,
            },
            MOVE_GEN,
            Arc::new(AtomicBool::new(false)),
        )?;

        assert_eq!(got, want);
        assert_eq!(info.move_evals[&want], 3);
        Ok(())
    }

    #[test]
    #[ignore = "full depth 5 tree, takes a while"]
    fn test_search_prefers_fastest_mate() -> TestResult {
        // Deeper horizons find slower mates for other root moves; the
        // two-move mate must still win with its eval unchanged.
        let position = Position::from_fen("7k/4Q3/8/8/8/8/7B/6K1 w - - 0 1")?;
        let (got, info) = search(
            &position,
            &SearchParams {
                max_depth: 5,
                max_time: None,
            },
            MOVE_GEN,
            Arc::new(AtomicBool::new(false)),
        )?;

        assert_eq!(got, Move::new(H2, E5));
        assert_eq!(info.move_evals[&got], 3);
        Ok(())
    }

    #[test]
    fn test_search_avoids_back_rank_mate() -> TestResult {
        // Walking into the corner lets a1a8 mate, everything else holds
        let position = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 b - - 0 1")?;
        let (got, info) = search(
            &position,
            &SearchParams {
                max_depth: 2,
                max_time: None,
            },
            MOVE_GEN,
            Arc::new(AtomicBool::new(false)),
        )?;

        assert_eq!(info.move_evals[&Move::new(G8, H8)], -2);
        assert_eq!(info.move_evals[&got], 0);
        assert_ne!(got, Move::new(G8, H8));
        Ok(())
    }

    #[test]
    fn test_search_positions_processed() -> TestResult {
        let (_, info) = search(
            &Position::start(),
            &SearchParams {
                max_depth: 2,
                max_time: None,
            },
            MOVE_GEN,
            Arc::new(AtomicBool::new(false)),
        )?;

        // 20 root moves plus the 400 replies
        assert_eq!(info.positions_processed, 420);
        assert_eq!(info.move_evals.len(), 20);
        assert!(info.move_evals.values().all(|&eval| eval == 0));
        Ok(())
    }

    #[test]
    fn test_search_terminate_flag() {
        let position = Position::start();
        let terminate = Arc::new(AtomicBool::new(false));
        let search_flag = Arc::clone(&terminate);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let got = search(
                &position,
                &SearchParams {
                    max_depth: 50,
                    max_time: None,
                },
                MOVE_GEN,
                search_flag,
            );
            (start.elapsed(), got)
        });

        thread::sleep(Duration::from_millis(200));
        terminate.store(true, Ordering::Relaxed);
        let (elapsed, got) = handle.join().unwrap();

        assert!(got.is_ok());
        assert!(elapsed < Duration::from_secs(30));
    }

    #[test]
    fn test_search_deadline() {
        let start = Instant::now();
        let got = search(
            &Position::start(),
            &SearchParams {
                max_depth: 50,
                max_time: Some(Duration::from_millis(200)),
            },
            MOVE_GEN,
            Arc::new(AtomicBool::new(false)),
        );

        assert!(got.is_ok());
        assert!(start.elapsed() < Duration::from_secs(30));
    }

    #[test_case(&[3, 5, 0, -4], true, 3 ; "searcher takes fastest win")]
    #[test_case(&[-2, 0, -6], true, 0 ; "searcher takes draw over loss")]
    #[test_case(&[-2, -6], true, -6 ; "searcher delays loss")]
    #[test_case(&[3, 5, 0, -4], false, -4 ; "opponent takes its win")]
    #[test_case(&[-2, -6, 3], false, -2 ; "opponent takes fastest of its wins")]
    #[test_case(&[3, 0, 5], false, 0 ; "opponent takes draw over loss")]
    #[test_case(&[3, 5], false, 5 ; "opponent delays searcher win")]
    fn test_combine_evals(evals: &[i32], searcher_to_move: bool, want: i32) {
        assert_eq!(combine_evals(evals, searcher_to_move), want);
    }
}
