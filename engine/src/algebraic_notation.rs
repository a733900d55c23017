use crate::move_gen::GenerateMoves;
use crate::moves::Move;
use crate::position::{Piece, Position};

#[derive(thiserror::Error, Debug)]
pub enum AlgebraicNotationError {
    #[error("no piece at move src {0}")]
    NoPieceAtSrc(String),

    #[error("invalid move {0}")]
    InvalidMove(String),
}

pub fn move_to_algebraic_notation(
    position: &Position,
    mve: Move,
    move_gen: impl GenerateMoves,
) -> Result<String, AlgebraicNotationError> {
    let side = position.state.to_move;
    let src_piece = match position.is_piece_at(mve.src) {
        Some((piece, piece_side)) if piece_side == side => piece,
        _ => return Err(AlgebraicNotationError::NoPieceAtSrc(mve.src.to_string())),
    };

    let legal_moves = move_gen.gen_moves(position);
    if !legal_moves.contains(&mve) {
        return Err(AlgebraicNotationError::InvalidMove(mve.to_string()));
    }

    // Castling
    if src_piece == Piece::King && mve.src.abs_diff(mve.dest) == 2 {
        let res = if mve.src < mve.dest { "O-O" } else { "O-O-O" };
        return Ok(res.to_string());
    }

    let (src_rank, src_file) = mve.src.to_rank_file();
    let (_, dest_file) = mve.dest.to_rank_file();
    let is_capture = if src_piece == Piece::Pawn {
        // A pawn changing file is always a capture, en passant included
        src_file != dest_file
    } else {
        position.is_piece_at(mve.dest).is_some()
    };

    let mut res = String::with_capacity(7);
    if src_piece != Piece::Pawn {
        let src_piece_char: char = src_piece.into();
        res.push(src_piece_char.to_ascii_uppercase());

        // Another piece of the same kind reaching the same square forces the
        // source to be spelled out: file if unique, else rank, else both.
        let matching: Vec<Move> = legal_moves
            .iter()
            .filter(|other| other.dest == mve.dest && other.promotion == mve.promotion)
            .filter(|other| {
                position.is_piece_at(other.src).map(|(piece, _)| piece) == Some(src_piece)
            })
            .copied()
            .collect();

        if matching.len() > 1 {
            let same_file = matching
                .iter()
                .filter(|other| other.src.to_rank_file().1 == src_file)
                .count();
            let same_rank = matching
                .iter()
                .filter(|other| other.src.to_rank_file().0 == src_rank)
                .count();

            if same_file == 1 {
                res.push(file_char(src_file));
            } else if same_rank == 1 {
                res.push(rank_char(src_rank));
            } else {
                res.push(file_char(src_file));
                res.push(rank_char(src_rank));
            }
        }
    }

    if is_capture {
        if src_piece == Piece::Pawn {
            res.push(file_char(src_file));
        }
        res.push('x');
    }

    res.push_str(&mve.dest.to_string().to_ascii_lowercase());

    if let Some(promotion) = mve.promotion {
        let promotion_char: char = promotion.into();
        res.push(promotion_char.to_ascii_uppercase());
    }

    let mut move_position = position.clone();
    move_position.make_move(mve);

    if move_position.king_in_check(move_position.state.to_move) {
        if move_gen.gen_moves(&move_position).is_empty() {
            res.push('#');
        } else {
            res.push('+');
        }
    }

    Ok(res)
}

fn file_char(file: u8) -> char {
    (b'a' + file) as char
}

fn rank_char(rank: u8) -> char {
    (b'1' + rank) as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use testresult::TestResult;

    use crate::move_gen::MOVE_GEN;
    use crate::square::Square::*;

    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap(), Move::new(C3, B5), "Nb5".to_string() ; "no capture non pawn")]
    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap(), Move::new(B2, B3), "b3".to_string() ; "no capture pawn")]
    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap(), Move::new(E5, G6), "Nxg6".to_string() ; "capture non pawn")]
    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap(), Move::new(D5, E6), "dxe6".to_string() ; "capture pawn")]
    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap(), Move::new(E1, G1), "O-O".to_string() ; "castle king side white")]
    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap(), Move::new(E1, C1), "O-O-O".to_string() ; "castle queen side white")]
    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R b KQkq - 0 1").unwrap(), Move::new(E8, G8), "O-O".to_string() ; "castle king side black")]
    #[test_case(Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R b KQkq - 0 1").unwrap(), Move::new(E8, C8), "O-O-O".to_string() ; "castle queen side black")]
    #[test_case(Position::from_fen("8/8/8/8/k2Pp3/8/8/7K b - d3 0 1").unwrap(), Move::new(E4, D3), "exd3".to_string() ; "en passant")]
    #[test_case(Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap(), Move::new(D2, D4), "d4".to_string() ; "pawn double push")]
    #[test_case(Position::from_fen("8/8/3P4/8/k7/8/4p2K/8 b - - 0 3").unwrap(), Move::with_promotion(E2, E1, Piece::Queen), "e1Q".to_string() ; "promotion")]
    #[test_case(Position::from_fen("4n3/3P4/8/8/8/8/8/k3K3 w - - 0 1").unwrap(), Move::with_promotion(D7, E8, Piece::Queen), "dxe8Q".to_string() ; "capture promotion")]
    #[test_case(Position::from_fen("3R3R/8/8/8/8/8/8/K1k5 w - - 0 1").unwrap(), Move::new(D8, F8), "Rdf8".to_string() ; "rooks share a rank")]
    #[test_case(Position::from_fen("7R/8/8/8/7R/8/8/K1k5 w - - 0 1").unwrap(), Move::new(H4, H6), "R4h6".to_string() ; "rooks share a file")]
    #[test_case(Position::from_fen("5Q1Q/8/7Q/8/8/8/8/K2k4 w - - 0 1").unwrap(), Move::new(F8, F6), "Qff6".to_string() ; "three queens file")]
    #[test_case(Position::from_fen("5Q1Q/8/7Q/8/8/8/8/K2k4 w - - 0 1").unwrap(), Move::new(H8, F6), "Qh8f6".to_string() ; "three queens both")]
    #[test_case(Position::from_fen("5Q1Q/8/7Q/8/8/8/8/K2k4 w - - 0 1").unwrap(), Move::new(H6, F6), "Q6f6".to_string() ; "three queens rank")]
    #[test_case(Position::from_fen("4k3/8/8/8/8/5N2/8/1N2K3 w - - 0 1").unwrap(), Move::new(B1, D2), "Nbd2".to_string() ; "knights converge")]
    #[test_case(Position::from_fen("4k3/8/8/8/8/8/8/4KR2 w - - 0 1").unwrap(), Move::new(F1, F8), "Rf8+".to_string() ; "check")]
    #[test_case(Position::from_fen("6k1/5ppp/8/8/8/8/8/R3K3 w - - 0 1").unwrap(), Move::new(A1, A8), "Ra8#".to_string() ; "checkmate")]
    fn test_move_to_algebraic_notation(pos: Position, mve: Move, want: String) -> TestResult {
        let move_gen = MOVE_GEN;
        let got = move_to_algebraic_notation(&pos, mve, move_gen)?;

        assert_eq!(got, want);
        Ok(())
    }

    #[test]
    fn test_move_to_algebraic_notation_err() {
        let position = Position::start();

        let no_piece = move_to_algebraic_notation(&position, Move::new(D4, D5), MOVE_GEN);
        assert!(matches!(
            no_piece,
            Err(AlgebraicNotationError::NoPieceAtSrc(_))
        ));

        let wrong_side = move_to_algebraic_notation(&position, Move::new(E7, E5), MOVE_GEN);
        assert!(matches!(
            wrong_side,
            Err(AlgebraicNotationError::NoPieceAtSrc(_))
        ));

        let illegal = move_to_algebraic_notation(&position, Move::new(D2, D5), MOVE_GEN);
        assert!(matches!(
            illegal,
            Err(AlgebraicNotationError::InvalidMove(_))
        ));
    }
}
