use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, FromRepr};

#[rustfmt::skip]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumString, FromRepr, Display, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
}

impl Square {
    pub(crate) const fn abs_diff(self, other: Square) -> u8 {
        (self as u8).abs_diff(other as u8)
    }

    pub(crate) const fn to_rank_file(self) -> (u8, u8) {
        (self as u8 / 8, self as u8 % 8)
    }

    pub(crate) const fn from_u8(idx: u8) -> Square {
        match Square::from_repr(idx) {
            Some(sq) => sq,
            None => panic!("square out of bounds"),
        }
    }

    pub(crate) const fn from_rank_file(rank: u8, file: u8) -> Square {
        Square::from_u8(rank * 8 + file)
    }

    #[rustfmt::skip]
    pub const fn list_white_perspective() -> [Square; 64] {
        [
            Square::A8, Square::B8, Square::C8, Square::D8, Square::E8, Square::F8, Square::G8, Square::H8,
            Square::A7, Square::B7, Square::C7, Square::D7, Square::E7, Square::F7, Square::G7, Square::H7,
            Square::A6, Square::B6, Square::C6, Square::D6, Square::E6, Square::F6, Square::G6, Square::H6,
            Square::A5, Square::B5, Square::C5, Square::D5, Square::E5, Square::F5, Square::G5, Square::H5,
            Square::A4, Square::B4, Square::C4, Square::D4, Square::E4, Square::F4, Square::G4, Square::H4,
            Square::A3, Square::B3, Square::C3, Square::D3, Square::E3, Square::F3, Square::G3, Square::H3,
            Square::A2, Square::B2, Square::C2, Square::D2, Square::E2, Square::F2, Square::G2, Square::H2,
            Square::A1, Square::B1, Square::C1, Square::D1, Square::E1, Square::F1, Square::G1, Square::H1,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::str::FromStr;

    use test_case::test_case;
    use testresult::TestResult;

    #[test_case(Square::A1, (0, 0) ; "a1")]
    #[test_case(Square::H1, (0, 7) ; "h1")]
    #[test_case(Square::E4, (3, 4) ; "e4")]
    #[test_case(Square::A8, (7, 0) ; "a8")]
    #[test_case(Square::H8, (7, 7) ; "h8")]
    fn test_to_rank_file(square: Square, want: (u8, u8)) {
        assert_eq!(square.to_rank_file(), want);
        let (rank, file) = want;
        assert_eq!(Square::from_rank_file(rank, file), square);
    }

    #[test]
    fn test_from_str() -> TestResult {
        assert_eq!(Square::from_str("C6")?, Square::C6);
        assert!(Square::from_str("J9").is_err());
        Ok(())
    }
}
