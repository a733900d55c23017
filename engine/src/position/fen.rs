use std::str::FromStr;

use super::{Caches, CastlingRights, Grid, Piece, Position, Side, State};
use crate::square::Square;

#[derive(thiserror::Error, Debug)]
pub enum FenParseError {
    #[error("num fields: want 6 got {0}")]
    NumFields(usize),
    #[error("piece placement: want 8 ranks got {0}")]
    NumRanks(usize),
    #[error("piece placement: rank {0} doesn't span 8 files")]
    RankWidth(String),
    #[error("piece placement: got {0}, err at {1}")]
    PiecePlacement(String, char),
    #[error("piece placement: want 1 king per side, got {0} white {1} black")]
    KingCount(usize, usize),
    #[error("piece placement: more pieces of one kind than a game can produce")]
    TooManyPieces,
    #[error("side to move: want 'w'|'b' got {0}")]
    SideToMove(String),
    #[error("castling rights given: got {0}, err at idx {1}")]
    CastlingRights(String, usize),
    #[error("en passant target: got {0}")]
    EnPassantTarget(String),
    #[error("halfmove clock: got {0}")]
    HalfmoveClock(String),
    #[error("full move counter: got {0}")]
    FullMoveCounter(String),
}

impl Position {
    pub fn from_fen(fen: &str) -> Result<Position, FenParseError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenParseError::NumFields(fields.len()));
        }

        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenParseError::NumRanks(ranks.len()));
        }

        let mut grid: Grid = [[None; 8]; 8];
        let mut white_kings = 0;
        let mut black_kings = 0;

        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx;
            let mut file = 0usize;
            for ch in rank_str.chars() {
                if let Some(digit) = ch.to_digit(10) {
                    if !(1..=8).contains(&digit) {
                        return Err(FenParseError::PiecePlacement(fields[0].to_string(), ch));
                    }
                    file += digit as usize;
                    continue;
                }
                if file >= 8 {
                    return Err(FenParseError::RankWidth(rank_str.to_string()));
                }
                let piece = Piece::try_from(ch.to_ascii_lowercase())
                    .map_err(|_| FenParseError::PiecePlacement(fields[0].to_string(), ch))?;
                let side = if ch.is_ascii_uppercase() {
                    Side::White
                } else {
                    Side::Black
                };
                if piece == Piece::King {
                    match side {
                        Side::White => white_kings += 1,
                        Side::Black => black_kings += 1,
                    }
                }
                grid[file][rank] = Some((piece, side));
                file += 1;
            }
            if file != 8 {
                return Err(FenParseError::RankWidth(rank_str.to_string()));
            }
        }

        if white_kings != 1 || black_kings != 1 {
            return Err(FenParseError::KingCount(white_kings, black_kings));
        }

        let caches = Caches::from_grid(&grid).ok_or(FenParseError::TooManyPieces)?;

        let to_move = match fields[1] {
            "w" => Side::White,
            "b" => Side::Black,
            other => return Err(FenParseError::SideToMove(other.to_string())),
        };

        let castling_rights = castling_rights_from_fen(fields[2])?;
        let en_passant_target = en_passant_target_from_fen(fields[3])?;

        let half_move_clock: u32 = fields[4]
            .parse()
            .map_err(|_| FenParseError::HalfmoveClock(fields[4].to_string()))?;
        let full_move_counter: u32 = fields[5]
            .parse()
            .map_err(|_| FenParseError::FullMoveCounter(fields[5].to_string()))?;

        Ok(Position {
            grid,
            state: State {
                to_move,
                half_move_clock,
                en_passant_target,
                castling_rights,
                full_move_counter,
            },
            caches,
        })
    }

    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        let mut empty_run = 0;

        for (idx, square) in Square::list_white_perspective().into_iter().enumerate() {
            match self.is_piece_at(square) {
                Some((piece, side)) => {
                    if empty_run != 0 {
                        placement.push_str(&empty_run.to_string());
                        empty_run = 0;
                    }
                    let ch: char = piece.into();
                    placement.push(if side == Side::White {
                        ch.to_ascii_uppercase()
                    } else {
                        ch
                    });
                }
                None => empty_run += 1,
            }
            if (idx + 1) % 8 == 0 {
                if empty_run != 0 {
                    placement.push_str(&empty_run.to_string());
                    empty_run = 0;
                }
                if idx != 63 {
                    placement.push('/');
                }
            }
        }

        let to_move = if self.state.to_move == Side::White {
            "w"
        } else {
            "b"
        };

        let mut castling = String::new();
        if self.state.castling_rights.white_king_side {
            castling.push('K');
        }
        if self.state.castling_rights.white_queen_side {
            castling.push('Q');
        }
        if self.state.castling_rights.black_king_side {
            castling.push('k');
        }
        if self.state.castling_rights.black_queen_side {
            castling.push('q');
        }
        if castling.is_empty() {
            castling.push('-');
        }

        let en_passant = match self.state.en_passant_target {
            Some(square) => square.to_string().to_lowercase(),
            None => "-".to_string(),
        };

        format!(
            "{} {} {} {} {} {}",
            placement,
            to_move,
            castling,
            en_passant,
            self.state.half_move_clock,
            self.state.full_move_counter
        )
    }
}

fn castling_rights_from_fen(castling_rights_str: &str) -> Result<CastlingRights, FenParseError> {
    if castling_rights_str == "-" {
        return Ok(CastlingRights::new(false, false, false, false));
    }

    let mut white_king_side = false;
    let mut white_queen_side = false;
    let mut black_king_side = false;
    let mut black_queen_side = false;

    for (idx, ch) in castling_rights_str.chars().enumerate() {
        match ch {
            'K' if !white_king_side => white_king_side = true,
            'Q' if !white_queen_side => white_queen_side = true,
            'k' if !black_king_side => black_king_side = true,
            'q' if !black_queen_side => black_queen_side = true,
            _ => {
                return Err(FenParseError::CastlingRights(
                    castling_rights_str.to_string(),
                    idx,
                ))
            }
        }
    }

    Ok(CastlingRights::new(
        white_king_side,
        white_queen_side,
        black_king_side,
        black_queen_side,
    ))
}

fn en_passant_target_from_fen(en_passant_str: &str) -> Result<Option<Square>, FenParseError> {
    if en_passant_str == "-" {
        return Ok(None);
    }

    Square::from_str(en_passant_str.to_uppercase().as_str())
        .map(Some)
        .map_err(|_| FenParseError::EnPassantTarget(en_passant_str.to_string()))
}
