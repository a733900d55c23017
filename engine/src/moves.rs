use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::Piece;
use crate::square::Square;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Move {
    pub src: Square,
    pub dest: Square,
    pub promotion: Option<Piece>,
}

impl Move {
    pub fn new(src: Square, dest: Square) -> Move {
        Self {
            src,
            dest,
            promotion: None,
        }
    }

    pub fn with_promotion(src: Square, dest: Square, promotion: Piece) -> Self {
        Self {
            src,
            dest,
            promotion: Some(promotion),
        }
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dest)?;
        if let Some(promotion) = self.promotion {
            write!(f, " ({})", promotion)?;
        }
        Ok(())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(promotion) = self.promotion {
            let promotion_ch: char = promotion.into();
            write!(f, "{}{}{}", self.src, self.dest, promotion_ch)
        } else {
            write!(f, "{}{}", self.src, self.dest)
        }
    }
}

/// A move packed into 16 bits, small enough for search trees holding
/// millions of nodes.
///
/// From the most significant bit down: source file (3 bits), source rank
/// (3 bits), destination file (3 bits), destination rank (3 bits), promotion
/// flag (1 bit), promotion kind (2 bits), and one unused trailing bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SerializedMove(u16);

impl SerializedMove {
    pub const fn from_u16(data: u16) -> SerializedMove {
        SerializedMove(data)
    }

    pub const fn to_u16(self) -> u16 {
        self.0
    }
}

impl From<Move> for SerializedMove {
    fn from(mve: Move) -> Self {
        let (src_rank, src_file) = mve.src.to_rank_file();
        let (dest_rank, dest_file) = mve.dest.to_rank_file();
        let mut data = u16::from(src_file);
        data = (data << 3) | u16::from(src_rank);
        data = (data << 3) | u16::from(dest_file);
        data = (data << 3) | u16::from(dest_rank);
        data <<= 3;
        if let Some(promotion) = mve.promotion {
            data |= 0b100;
            data |= match promotion {
                Piece::Knight => 0b00,
                Piece::Bishop => 0b01,
                Piece::Rook => 0b10,
                Piece::Queen => 0b11,
                Piece::Pawn | Piece::King => panic!("invalid promotion piece: {}", promotion),
            };
        }
        data <<= 1;
        SerializedMove(data)
    }
}

impl From<SerializedMove> for Move {
    fn from(serialized: SerializedMove) -> Self {
        let data = serialized.0;
        let src_file = ((data >> 13) & 0b111) as u8;
        let src_rank = ((data >> 10) & 0b111) as u8;
        let dest_file = ((data >> 7) & 0b111) as u8;
        let dest_rank = ((data >> 4) & 0b111) as u8;
        let src = Square::from_rank_file(src_rank, src_file);
        let dest = Square::from_rank_file(dest_rank, dest_file);
        if (data >> 3) & 1 == 0 {
            return Move::new(src, dest);
        }
        let promotion = match (data >> 1) & 0b11 {
            0b00 => Piece::Knight,
            0b01 => Piece::Bishop,
            0b10 => Piece::Rook,
            _ => Piece::Queen,
        };
        Move::with_promotion(src, dest, promotion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use strum::IntoEnumIterator;
    use test_case::test_case;

    use crate::square::Square::*;

    #[test_case(Move::new(E2, E4), 0b1000_0110_0011_0000 ; "e2e4")]
    #[test_case(Move::new(A1, A8), 0b0000_0000_0111_0000 ; "a1a8")]
    #[test_case(Move::new(H8, H1), 0b1111_1111_1000_0000 ; "h8h1")]
    #[test_case(Move::with_promotion(C2, C1, Piece::Knight), 0b0100_0101_0000_1000 ; "c2c1 knight")]
    #[test_case(Move::with_promotion(C2, C1, Piece::Bishop), 0b0100_0101_0000_1010 ; "c2c1 bishop")]
    #[test_case(Move::with_promotion(C2, C1, Piece::Rook), 0b0100_0101_0000_1100 ; "c2c1 rook")]
    #[test_case(Move::with_promotion(E7, E8, Piece::Queen), 0b1001_1010_0111_1110 ; "e7e8 queen")]
    fn test_serialize(mve: Move, want: u16) {
        let serialized = SerializedMove::from(mve);
        assert_eq!(serialized.to_u16(), want);
        assert_eq!(Move::from(serialized), mve);
    }

    #[test]
    fn test_round_trip_all_moves() {
        let promotions = [
            None,
            Some(Piece::Knight),
            Some(Piece::Bishop),
            Some(Piece::Rook),
            Some(Piece::Queen),
        ];
        for src in Square::iter() {
            for dest in Square::iter() {
                for promotion in promotions {
                    let mve = Move {
                        src,
                        dest,
                        promotion,
                    };
                    assert_eq!(Move::from(SerializedMove::from(mve)), mve);
                }
            }
        }
    }

    #[test]
    fn test_move_to_string() {
        assert_eq!(Move::new(A7, A8).to_string(), "A7A8");
        assert_eq!(
            Move::with_promotion(A7, A8, Piece::Queen).to_string(),
            "A7A8q"
        );
    }

    #[test]
    fn test_move_debug() {
        assert_eq!(format!("{:?}", Move::new(B1, C3)), "B1 -> C3");
        assert_eq!(
            format!("{:?}", Move::with_promotion(G2, G1, Piece::Rook)),
            "G2 -> G1 (Rook)"
        );
    }
}
