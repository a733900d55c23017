use arrayvec::ArrayVec;

use crate::moves::Move;
use crate::position::{Piece, Position, Side, DIAGONAL_STEPS, KNIGHT_OFFSETS, STRAIGHT_STEPS};
use crate::square::Square;
use crate::square::Square::*;

pub trait GenerateMoves {
    fn gen_moves(&self, position: &Position) -> ArrayVec<Move, 218>;
}

#[derive(Clone, Copy)]
pub struct MailboxMoveGen;

impl GenerateMoves for MailboxMoveGen {
    fn gen_moves(&self, position: &Position) -> ArrayVec<Move, 218> {
        gen_moves(position)
    }
}

pub static MOVE_GEN: MailboxMoveGen = MailboxMoveGen {};

const PROMOTION_PIECES: [Piece; 4] = [Piece::Bishop, Piece::Knight, Piece::Rook, Piece::Queen];

const KING_OFFSETS: [(i8, i8); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

fn gen_moves(position: &Position) -> ArrayVec<Move, 218> {
    let side = position.state.to_move;
    let mut moves = ArrayVec::new();

    for file in 0..8u8 {
        for rank in 0..8u8 {
            let Some((piece, piece_side)) = position.at(file, rank) else {
                continue;
            };
            if piece_side != side {
                continue;
            }
            let src = Square::from_rank_file(rank, file);
            match piece {
                Piece::Pawn => gen_pawn_moves(position, src, side, &mut moves),
                Piece::Knight => {
                    gen_offset_moves(position, src, side, &KNIGHT_OFFSETS, &mut moves)
                }
                Piece::Bishop => {
                    gen_slider_moves(position, src, side, &DIAGONAL_STEPS, &mut moves)
                }
                Piece::Rook => gen_slider_moves(position, src, side, &STRAIGHT_STEPS, &mut moves),
                Piece::Queen => {
                    gen_slider_moves(position, src, side, &DIAGONAL_STEPS, &mut moves);
                    gen_slider_moves(position, src, side, &STRAIGHT_STEPS, &mut moves);
                }
                Piece::King => {
                    gen_offset_moves(position, src, side, &KING_OFFSETS, &mut moves);
                    gen_castling_moves(position, src, side, &mut moves);
                }
            }
        }
    }

    moves
}

/// Adds the move unless the destination holds a friendly piece or applying it
/// would leave the mover's own king in check. A promoting push/capture is
/// legality-checked once, then expanded to all four promotion pieces.
fn maybe_add_move(
    position: &Position,
    mve: Move,
    side: Side,
    promotes: bool,
    moves: &mut ArrayVec<Move, 218>,
) {
    if let Some((_, dest_side)) = position.is_piece_at(mve.dest) {
        if dest_side == side {
            return;
        }
    }

    let mut next = position.clone();
    next.make_move(mve);
    if next.king_in_check(side) {
        return;
    }

    if promotes {
        for promotion in PROMOTION_PIECES {
            moves.push(Move::with_promotion(mve.src, mve.dest, promotion));
        }
    } else {
        moves.push(mve);
    }
}

fn gen_pawn_moves(position: &Position, src: Square, side: Side, moves: &mut ArrayVec<Move, 218>) {
    let (src_rank, src_file) = src.to_rank_file();
    debug_assert!(src_rank != 0 && src_rank != 7, "pawn on back rank");

    let (forward, start_rank, promo_rank): (i8, u8, u8) = match side {
        Side::White => (1, 1, 6),
        Side::Black => (-1, 6, 1),
    };
    let promotes = src_rank == promo_rank;
    let push_rank = (src_rank as i8 + forward) as u8;

    if position.at(src_file, push_rank).is_none() {
        let dest = Square::from_rank_file(push_rank, src_file);
        maybe_add_move(position, Move::new(src, dest), side, promotes, moves);

        if src_rank == start_rank {
            let double_rank = (src_rank as i8 + 2 * forward) as u8;
            if position.at(src_file, double_rank).is_none() {
                let dest = Square::from_rank_file(double_rank, src_file);
                maybe_add_move(position, Move::new(src, dest), side, false, moves);
            }
        }
    }

    for file_offset in [1i8, -1] {
        let file = src_file as i8 + file_offset;
        if !(0..8).contains(&file) {
            continue;
        }
        let dest = Square::from_rank_file(push_rank, file as u8);
        if position.at(file as u8, push_rank).is_some()
            || position.state.en_passant_target == Some(dest)
        {
            maybe_add_move(position, Move::new(src, dest), side, promotes, moves);
        }
    }
}

fn gen_offset_moves(
    position: &Position,
    src: Square,
    side: Side,
    offsets: &[(i8, i8); 8],
    moves: &mut ArrayVec<Move, 218>,
) {
    let (src_rank, src_file) = src.to_rank_file();
    for &(file_offset, rank_offset) in offsets {
        let file = src_file as i8 + file_offset;
        let rank = src_rank as i8 + rank_offset;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            let dest = Square::from_rank_file(rank as u8, file as u8);
            maybe_add_move(position, Move::new(src, dest), side, false, moves);
        }
    }
}

fn gen_slider_moves(
    position: &Position,
    src: Square,
    side: Side,
    steps: &[(i8, i8); 4],
    moves: &mut ArrayVec<Move, 218>,
) {
    let (src_rank, src_file) = src.to_rank_file();
    for &(file_step, rank_step) in steps {
        let mut file = src_file as i8 + file_step;
        let mut rank = src_rank as i8 + rank_step;
        while (0..8).contains(&file) && (0..8).contains(&rank) {
            let dest = Square::from_rank_file(rank as u8, file as u8);
            maybe_add_move(position, Move::new(src, dest), side, false, moves);
            if position.at(file as u8, rank as u8).is_some() {
                break;
            }
            file += file_step;
            rank += rank_step;
        }
    }
}

fn gen_castling_moves(
    position: &Position,
    src: Square,
    side: Side,
    moves: &mut ArrayVec<Move, 218>,
) {
    let home = match side {
        Side::White => E1,
        Side::Black => E8,
    };
    if src != home {
        return;
    }

    let rights = &position.state.castling_rights;
    let (king_side_right, queen_side_right) = match side {
        Side::White => (rights.white_king_side, rights.white_queen_side),
        Side::Black => (rights.black_king_side, rights.black_queen_side),
    };

    if king_side_right && can_castle(position, side, true) {
        let dest = if side == Side::White { G1 } else { G8 };
        moves.push(Move::new(src, dest));
    }
    if queen_side_right && can_castle(position, side, false) {
        let dest = if side == Side::White { C1 } else { C8 };
        moves.push(Move::new(src, dest));
    }
}

fn can_castle(position: &Position, side: Side, king_side: bool) -> bool {
    let rank: u8 = if side == Side::White { 0 } else { 7 };

    let rook_file: u8 = if king_side { 7 } else { 0 };
    if position.at(rook_file, rank) != Some((Piece::Rook, side)) {
        return false;
    }

    // Queen side additionally needs B1/B8 empty, but the king never crosses
    // it so it isn't probed for attacks.
    let crossing_files: &[u8] = if king_side { &[5, 6] } else { &[3, 2, 1] };
    for &file in crossing_files {
        if position.at(file, rank).is_some() {
            return false;
        }
    }

    if position.king_in_check(side) {
        return false;
    }

    let mut probe = position.clone();
    let mut king_at = Square::from_rank_file(rank, 4);
    let step_files: [u8; 2] = if king_side { [5, 6] } else { [3, 2] };
    for file in step_files {
        let next = Square::from_rank_file(rank, file);
        probe.relocate_king(side, king_at, next);
        king_at = next;
        if probe.king_in_check(side) {
            return false;
        }
    }

    true
}
