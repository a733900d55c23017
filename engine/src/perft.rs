use std::collections::HashMap;
use std::fmt::Display;
use std::time::{Duration, Instant};

use tabled::{Table, Tabled};

use crate::move_gen::GenerateMoves;
use crate::moves::Move;
use crate::position::{Piece, Position};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Tabled)]
pub struct PerftDepthResult {
    tot: u64,
    captures: u64,
    en_passants: u64,
    castles: u64,
    promotions: u64,
    checks: u64,
    checkmates: u64,
}

pub struct PerftResult {
    pub depth_results: Vec<PerftDepthResult>,
    pub tot_nodes: u64,
    pub time_elapsed: Duration,
    pub nodes_per_second: f64,
}

impl PerftDepthResult {
    pub fn new(
        tot: u64,
        captures: u64,
        en_passants: u64,
        castles: u64,
        promotions: u64,
        checks: u64,
        checkmates: u64,
    ) -> Self {
        PerftDepthResult {
            tot,
            captures,
            en_passants,
            castles,
            promotions,
            checks,
            checkmates,
        }
    }

    pub fn empty() -> PerftDepthResult {
        PerftDepthResult::new(0, 0, 0, 0, 0, 0, 0)
    }
}

impl Display for PerftResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "total nodes: {}", self.tot_nodes)?;
        writeln!(f, "time elapsed: {}", self.time_elapsed.as_secs_f32())?;
        writeln!(f, "nodes/s: {}", self.nodes_per_second)?;
        writeln!(f, "{}", Table::new(&self.depth_results))?;
        Ok(())
    }
}

/// Counts the leaf nodes reachable from each root move, the classic
/// divide view.
pub fn perft(
    position: &Position,
    depth: usize,
    move_gen: impl GenerateMoves + std::marker::Copy,
) -> (HashMap<Move, usize>, usize) {
    assert!(depth > 0, "perft depth must be positive");

    let moves = move_gen.gen_moves(position);
    let mut move_counts = HashMap::with_capacity(moves.len());
    let mut tot_nodes = 0;

    for mve in moves {
        let mut move_position = position.clone();
        move_position.make_move(mve);
        let nodes = count_nodes(&move_position, depth - 1, move_gen);
        move_counts.insert(mve, nodes);
        tot_nodes += nodes;
    }

    (move_counts, tot_nodes)
}

fn count_nodes(
    position: &Position,
    depth: usize,
    move_gen: impl GenerateMoves + std::marker::Copy,
) -> usize {
    if depth == 0 {
        return 1;
    }

    let moves = move_gen.gen_moves(position);
    if depth == 1 {
        return moves.len();
    }

    moves
        .iter()
        .map(|&mve| {
            let mut move_position = position.clone();
            move_position.make_move(mve);
            count_nodes(&move_position, depth - 1, move_gen)
        })
        .sum()
}

/// Walks the move tree and tallies per-depth statistics. Row `i` describes
/// the nodes reached after `i + 1` plies.
pub fn perft_full(
    position: &Position,
    depth: usize,
    move_gen: impl GenerateMoves + std::marker::Copy,
) -> PerftResult {
    let mut depth_results = vec![PerftDepthResult::empty(); depth];

    let start = Instant::now();
    perft_helper(&mut depth_results, position, move_gen, depth, 0);
    let time_elapsed = start.elapsed();

    let tot_nodes = depth_results.iter().fold(0, |tot, curr| tot + curr.tot);
    let nodes_per_second = tot_nodes as f64 / time_elapsed.as_secs_f64();

    PerftResult {
        depth_results,
        tot_nodes,
        time_elapsed,
        nodes_per_second,
    }
}

fn perft_helper(
    depth_results: &mut [PerftDepthResult],
    position: &Position,
    move_gen: impl GenerateMoves + std::marker::Copy,
    max_depth: usize,
    curr_depth: usize,
) {
    // Generated before the depth cutoff so mates on the last ply are seen
    let moves = move_gen.gen_moves(position);

    if moves.is_empty() {
        // Stalemates end the walk too but only mates are tallied
        if curr_depth > 0 && position.king_in_check(position.state.to_move) {
            depth_results[curr_depth - 1].checkmates += 1;
        }
        return;
    }

    if curr_depth == max_depth {
        return;
    }

    let curr_res = &mut depth_results[curr_depth];
    curr_res.tot += moves.len() as u64;

    for &mve in &moves {
        let src_piece = position
            .is_piece_at(mve.src)
            .map(|(piece, _)| piece)
            .expect("generated move has a piece at src");

        let is_en_passant =
            src_piece == Piece::Pawn && position.state.en_passant_target == Some(mve.dest);
        if is_en_passant {
            curr_res.en_passants += 1;
            curr_res.captures += 1;
        } else if position.is_piece_at(mve.dest).is_some() {
            curr_res.captures += 1;
        }

        if mve.promotion.is_some() {
            curr_res.promotions += 1;
        }

        if src_piece == Piece::King && mve.src.abs_diff(mve.dest) == 2 {
            curr_res.castles += 1;
        }
    }

    let mut checks = 0;
    for &mve in &moves {
        let mut move_position = position.clone();
        move_position.make_move(mve);

        if move_position.king_in_check(move_position.state.to_move) {
            checks += 1;
        }

        perft_helper(
            depth_results,
            &move_position,
            move_gen,
            max_depth,
            curr_depth + 1,
        );
    }

    // Reborrow, the recursion above also needs the results
    depth_results[curr_depth].checks += checks;
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_case::test_case;
    use testresult::TestResult;

    use crate::move_gen::MOVE_GEN;

    #[test]
    fn test_perft_divide_start() {
        let (move_counts, tot_nodes) = perft(&Position::start(), 1, MOVE_GEN);

        assert_eq!(tot_nodes, 20);
        assert_eq!(move_counts.len(), 20);
        assert!(move_counts.values().all(|&nodes| nodes == 1));
    }

    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap(), 1, PerftDepthResult::new(48, 8, 0, 2, 0, 0, 0) ; "kiwipete 1")]
    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap(), 2, PerftDepthResult::new(2039, 351, 1, 91, 0, 3, 0) ; "kiwipete 2")]
    #[test_case(Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap(), 3, PerftDepthResult::new(2812, 209, 2, 0, 0, 267, 0) ; "rook endgame 3")]
    fn test_perft_full_last_depth(
        starting_position: Position,
        depth: usize,
        want: PerftDepthResult,
    ) {
        let res = perft_full(&starting_position, depth, MOVE_GEN);
        println!("{}", res);

        assert_eq!(res.depth_results.len(), depth);
        assert_eq!(res.depth_results.last().unwrap(), &want);
    }

    #[test]
    fn test_perft_full_counts_mates() -> TestResult {
        let position = Position::from_fen("6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1")?;
        let res = perft_full(&position, 1, MOVE_GEN);

        assert_eq!(
            res.depth_results[0],
            PerftDepthResult::new(15, 0, 0, 0, 0, 1, 1)
        );
        Ok(())
    }

    #[test]
    fn test_perft_full_skips_stalemates() -> TestResult {
        // Only c7 stalemates the cornered king, nothing should be
        // tallied as mate
        let position = Position::from_fen("k7/8/1Q6/8/8/8/8/7K w - - 0 1")?;
        let res = perft_full(&position, 1, MOVE_GEN);

        assert_eq!(
            res.depth_results[0],
            PerftDepthResult::new(26, 0, 0, 0, 0, 7, 0)
        );
        Ok(())
    }

    #[test]
    fn test_perft_full_no_moves_at_root() -> TestResult {
        let position = Position::from_fen("k7/2Q5/8/8/8/8/8/7K b - - 0 1")?;
        let res = perft_full(&position, 1, MOVE_GEN);

        assert_eq!(res.tot_nodes, 0);
        assert_eq!(res.depth_results[0], PerftDepthResult::empty());
        Ok(())
    }
}
