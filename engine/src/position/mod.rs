use std::fmt;

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::moves::Move;
use crate::square::Square;
use crate::square::Square::*;

mod fen;

pub use fen::FenParseError;

#[derive(thiserror::Error, Debug)]
pub enum PositionError {
    #[error("char -> piece: got {0}")]
    FromCharPiece(char),
}

#[derive(Debug, PartialEq, Eq, EnumIter, Clone, Copy, Display, Deserialize, Serialize)]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub(crate) fn opposite_side(self) -> Side {
        if self == Side::White {
            Side::Black
        } else {
            Side::White
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, EnumIter, Clone, Copy, Display, Hash, Deserialize, Serialize)]
pub enum Piece {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Into<char> for Piece {
    fn into(self) -> char {
        match self {
            Piece::Pawn => 'p',
            Piece::Knight => 'n',
            Piece::Bishop => 'b',
            Piece::Rook => 'r',
            Piece::Queen => 'q',
            Piece::King => 'k',
        }
    }
}

impl TryFrom<char> for Piece {
    type Error = PositionError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'p' => Ok(Piece::Pawn),
            'n' => Ok(Piece::Knight),
            'b' => Ok(Piece::Bishop),
            'r' => Ok(Piece::Rook),
            'q' => Ok(Piece::Queen),
            'k' => Ok(Piece::King),
            _ => Err(PositionError::FromCharPiece(value)),
        }
    }
}

// Offsets are (file, rank) deltas.
pub(crate) const STRAIGHT_STEPS: [(i8, i8); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];
pub(crate) const DIAGONAL_STEPS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
pub(crate) const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, 1),
    (-2, -1),
    (1, 2),
    (-1, 2),
];

#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    fn start() -> Self {
        Self {
            white_king_side: true,
            white_queen_side: true,
            black_king_side: true,
            black_queen_side: true,
        }
    }

    pub(crate) fn new(
        white_king_side: bool,
        white_queen_side: bool,
        black_king_side: bool,
        black_queen_side: bool,
    ) -> Self {
        Self {
            white_king_side,
            white_queen_side,
            black_king_side,
            black_queen_side,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct State {
    pub to_move: Side,
    pub half_move_clock: u32,
    pub en_passant_target: Option<Square>,
    pub castling_rights: CastlingRights,
    pub full_move_counter: u32,
}

impl State {
    fn start() -> Self {
        Self {
            to_move: Side::White,
            half_move_clock: 0,
            en_passant_target: None,
            castling_rights: CastlingRights::start(),
            full_move_counter: 1,
        }
    }
}

pub(crate) type Grid = [[Option<(Piece, Side)>; 8]; 8];

// Enough room for promotions on top of the starting pieces.
const MAX_TRACKED_PIECES: usize = 10;

/// Per-side index of the pieces that check detection cares about. Knights
/// only need a count: the eight knight-attack squares are probed on the grid
/// directly, but only when at least one enemy knight exists.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct SideCache {
    king: Square,
    queens: ArrayVec<Square, MAX_TRACKED_PIECES>,
    rooks: ArrayVec<Square, MAX_TRACKED_PIECES>,
    bishops: ArrayVec<Square, MAX_TRACKED_PIECES>,
    knight_count: u8,
}

impl SideCache {
    fn from_grid(grid: &Grid, side: Side) -> Option<SideCache> {
        let mut king = None;
        let mut queens = ArrayVec::new();
        let mut rooks = ArrayVec::new();
        let mut bishops = ArrayVec::new();
        let mut knight_count: u8 = 0;

        for (file, file_squares) in grid.iter().enumerate() {
            for (rank, entry) in file_squares.iter().enumerate() {
                let Some((piece, piece_side)) = *entry else {
                    continue;
                };
                if piece_side != side {
                    continue;
                }
                let square = Square::from_rank_file(rank as u8, file as u8);
                match piece {
                    Piece::Pawn => {}
                    Piece::Knight => knight_count += 1,
                    Piece::Bishop => bishops.try_push(square).ok()?,
                    Piece::Rook => rooks.try_push(square).ok()?,
                    Piece::Queen => queens.try_push(square).ok()?,
                    Piece::King => king = Some(square),
                }
            }
        }

        Some(SideCache {
            king: king?,
            queens,
            rooks,
            bishops,
            knight_count,
        })
    }

    fn relocate(&mut self, piece: Piece, src: Square, dest: Square) {
        match piece {
            Piece::Pawn | Piece::Knight => {}
            Piece::King => self.king = dest,
            Piece::Queen => relocate_in(&mut self.queens, src, dest),
            Piece::Rook => relocate_in(&mut self.rooks, src, dest),
            Piece::Bishop => relocate_in(&mut self.bishops, src, dest),
        }
    }

    fn remove(&mut self, piece: Piece, square: Square) {
        match piece {
            Piece::Pawn => {}
            Piece::Knight => self.knight_count -= 1,
            Piece::Bishop => self.bishops.retain(|sq| *sq != square),
            Piece::Rook => self.rooks.retain(|sq| *sq != square),
            Piece::Queen => self.queens.retain(|sq| *sq != square),
            Piece::King => panic!("king can't be captured"),
        }
    }

    fn add(&mut self, piece: Piece, square: Square) {
        match piece {
            Piece::Knight => self.knight_count += 1,
            Piece::Bishop => self.bishops.push(square),
            Piece::Rook => self.rooks.push(square),
            Piece::Queen => self.queens.push(square),
            Piece::Pawn | Piece::King => panic!("can't promote to {}", piece),
        }
    }

    // Lists are compared as sets: incremental updates and a fresh grid scan
    // order them differently.
    fn matches(&self, other: &SideCache) -> bool {
        fn sorted(
            list: &ArrayVec<Square, MAX_TRACKED_PIECES>,
        ) -> ArrayVec<Square, MAX_TRACKED_PIECES> {
            let mut copy = list.clone();
            copy.sort_unstable();
            copy
        }

        self.king == other.king
            && self.knight_count == other.knight_count
            && sorted(&self.queens) == sorted(&other.queens)
            && sorted(&self.rooks) == sorted(&other.rooks)
            && sorted(&self.bishops) == sorted(&other.bishops)
    }
}

fn relocate_in(list: &mut ArrayVec<Square, MAX_TRACKED_PIECES>, src: Square, dest: Square) {
    let entry = list
        .iter_mut()
        .find(|sq| **sq == src)
        .unwrap_or_else(|| panic!("no cached piece at {}", src));
    *entry = dest;
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct Caches {
    white: SideCache,
    black: SideCache,
}

impl Caches {
    pub(crate) fn from_grid(grid: &Grid) -> Option<Caches> {
        Some(Caches {
            white: SideCache::from_grid(grid, Side::White)?,
            black: SideCache::from_grid(grid, Side::Black)?,
        })
    }

    fn get(&self, side: Side) -> &SideCache {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    fn get_mut(&mut self, side: Side) -> &mut SideCache {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }
}

#[derive(Clone, Eq, Deserialize, Serialize)]
pub struct Position {
    grid: Grid,
    pub state: State,
    caches: Caches,
}

impl Position {
    pub fn start() -> Self {
        Self::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .expect("starting position FEN parses")
    }

    pub fn is_piece_at(&self, square: Square) -> Option<(Piece, Side)> {
        let (rank, file) = square.to_rank_file();
        self.grid[file as usize][rank as usize]
    }

    pub(crate) fn at(&self, file: u8, rank: u8) -> Option<(Piece, Side)> {
        self.grid[file as usize][rank as usize]
    }

    /// Scans outward from `side`'s king: the four straight rays for enemy
    /// rooks/queens, the four diagonals for enemy bishops/queens, the knight
    /// attack squares, and the two pawn attack squares. Rays stop at the
    /// first occupied square. The cached piece locations gate each scan so
    /// the common case touches only a handful of squares.
    pub fn king_in_check(&self, side: Side) -> bool {
        let enemy_side = side.opposite_side();
        let enemy = self.caches.get(enemy_side);
        let (king_rank, king_file) = self.caches.get(side).king.to_rank_file();

        let (enemy_king_rank, enemy_king_file) = enemy.king.to_rank_file();
        if king_rank.abs_diff(enemy_king_rank) <= 1 && king_file.abs_diff(enemy_king_file) <= 1 {
            return true;
        }

        if !enemy.rooks.is_empty() || !enemy.queens.is_empty() {
            for (file_step, rank_step) in STRAIGHT_STEPS {
                if self.ray_hits_slider(
                    king_file, king_rank, file_step, rank_step, Piece::Rook, enemy_side,
                ) {
                    return true;
                }
            }
        }

        if !enemy.bishops.is_empty() || !enemy.queens.is_empty() {
            for (file_step, rank_step) in DIAGONAL_STEPS {
                if self.ray_hits_slider(
                    king_file,
                    king_rank,
                    file_step,
                    rank_step,
                    Piece::Bishop,
                    enemy_side,
                ) {
                    return true;
                }
            }
        }

        if enemy.knight_count != 0 {
            for (file_offset, rank_offset) in KNIGHT_OFFSETS {
                let file = king_file as i8 + file_offset;
                let rank = king_rank as i8 + rank_offset;
                if (0..8).contains(&file)
                    && (0..8).contains(&rank)
                    && self.grid[file as usize][rank as usize] == Some((Piece::Knight, enemy_side))
                {
                    return true;
                }
            }
        }

        let pawn_rank = king_rank as i8 + if side == Side::White { 1 } else { -1 };
        if (0..8).contains(&pawn_rank) {
            for file_offset in [-1i8, 1] {
                let file = king_file as i8 + file_offset;
                if (0..8).contains(&file)
                    && self.grid[file as usize][pawn_rank as usize]
                        == Some((Piece::Pawn, enemy_side))
                {
                    return true;
                }
            }
        }

        false
    }

    fn ray_hits_slider(
        &self,
        file: u8,
        rank: u8,
        file_step: i8,
        rank_step: i8,
        slider: Piece,
        enemy_side: Side,
    ) -> bool {
        let mut file = file as i8 + file_step;
        let mut rank = rank as i8 + rank_step;
        while (0..8).contains(&file) && (0..8).contains(&rank) {
            if let Some((piece, side)) = self.grid[file as usize][rank as usize] {
                return side == enemy_side && (piece == slider || piece == Piece::Queen);
            }
            file += file_step;
            rank += rank_step;
        }
        false
    }

    /// Applies a move and all of its side effects. The move must come from
    /// the move generator (or be otherwise legal): moving from an empty
    /// square or capturing a king is a caller bug and panics.
    pub fn make_move(&mut self, mve: Move) {
        let (src_rank, src_file) = mve.src.to_rank_file();
        let (dest_rank, dest_file) = mve.dest.to_rank_file();
        let Some((piece, side)) = self.grid[src_file as usize][src_rank as usize] else {
            panic!("no piece at {} for move {:?}", mve.src, mve);
        };
        debug_assert_eq!(side, self.state.to_move, "{} is not to move", side);
        debug_assert!(mve.promotion.is_none() || piece == Piece::Pawn);

        let captured = self.grid[dest_file as usize][dest_rank as usize];
        let en_passant_capture =
            piece == Piece::Pawn && self.state.en_passant_target == Some(mve.dest);

        self.caches.get_mut(side).relocate(piece, mve.src, mve.dest);
        if let Some((captured_piece, captured_side)) = captured {
            self.caches
                .get_mut(captured_side)
                .remove(captured_piece, mve.dest);
        }
        if let Some(promotion) = mve.promotion {
            self.caches.get_mut(side).add(promotion, mve.dest);
        }

        self.grid[src_file as usize][src_rank as usize] = None;
        self.grid[dest_file as usize][dest_rank as usize] = Some((piece, side));

        if en_passant_capture {
            let captured_rank = if side == Side::White { 4 } else { 3 };
            self.grid[dest_file as usize][captured_rank] = None;
        }

        if piece == Piece::King && mve.src.abs_diff(mve.dest) == 2 {
            // Castled, bring the rook across
            let rook_move = match mve.dest {
                C1 => Move::new(A1, D1),
                G1 => Move::new(H1, F1),
                C8 => Move::new(A8, D8),
                G8 => Move::new(H8, F8),
                _ => panic!("want: [C1, G1, C8, G8], got: {}", mve.dest),
            };
            self.caches
                .get_mut(side)
                .relocate(Piece::Rook, rook_move.src, rook_move.dest);
            let (rook_src_rank, rook_src_file) = rook_move.src.to_rank_file();
            let (rook_dest_rank, rook_dest_file) = rook_move.dest.to_rank_file();
            self.grid[rook_src_file as usize][rook_src_rank as usize] = None;
            self.grid[rook_dest_file as usize][rook_dest_rank as usize] =
                Some((Piece::Rook, side));
        }

        self.state.to_move = side.opposite_side();

        if side == Side::Black {
            self.state.full_move_counter += 1;
        }

        if captured.is_some() || piece == Piece::Pawn {
            self.state.half_move_clock = 0;
        } else {
            self.state.half_move_clock += 1;
        }

        self.update_castling_rights(piece, side, mve.src, captured, mve.dest);

        self.state.en_passant_target = match (piece, side) {
            (Piece::Pawn, Side::White) if src_rank == 1 && dest_rank == 3 => {
                Some(Square::from_rank_file(2, src_file))
            }
            (Piece::Pawn, Side::Black) if src_rank == 6 && dest_rank == 4 => {
                Some(Square::from_rank_file(5, src_file))
            }
            _ => None,
        };

        if let Some(promotion) = mve.promotion {
            self.grid[dest_file as usize][dest_rank as usize] = Some((promotion, side));
        }

        debug_assert!(
            self.caches_consistent(),
            "caches diverged from grid after {:?}\n{}",
            mve,
            self
        );
    }

    fn update_castling_rights(
        &mut self,
        piece: Piece,
        side: Side,
        src: Square,
        captured: Option<(Piece, Side)>,
        dest: Square,
    ) {
        let rights = &mut self.state.castling_rights;
        match (piece, side) {
            (Piece::King, Side::White) => {
                rights.white_king_side = false;
                rights.white_queen_side = false;
            }
            (Piece::King, Side::Black) => {
                rights.black_king_side = false;
                rights.black_queen_side = false;
            }
            (Piece::Rook, Side::White) if src == A1 => rights.white_queen_side = false,
            (Piece::Rook, Side::White) if src == H1 => rights.white_king_side = false,
            (Piece::Rook, Side::Black) if src == A8 => rights.black_queen_side = false,
            (Piece::Rook, Side::Black) if src == H8 => rights.black_king_side = false,
            _ => {}
        }

        // A rook captured on its home square also loses the right
        if let Some((Piece::Rook, captured_side)) = captured {
            match (captured_side, dest) {
                (Side::White, A1) => rights.white_queen_side = false,
                (Side::White, H1) => rights.white_king_side = false,
                (Side::Black, A8) => rights.black_queen_side = false,
                (Side::Black, H8) => rights.black_king_side = false,
                _ => {}
            }
        }
    }

    /// Moves a king with no other bookkeeping. Used to probe the squares a
    /// castling king passes through; `to` must be empty.
    pub(crate) fn relocate_king(&mut self, side: Side, from: Square, to: Square) {
        let (from_rank, from_file) = from.to_rank_file();
        let (to_rank, to_file) = to.to_rank_file();
        debug_assert_eq!(
            self.grid[from_file as usize][from_rank as usize],
            Some((Piece::King, side))
        );
        debug_assert!(self.grid[to_file as usize][to_rank as usize].is_none());
        self.grid[from_file as usize][from_rank as usize] = None;
        self.grid[to_file as usize][to_rank as usize] = Some((Piece::King, side));
        self.caches.get_mut(side).king = to;
    }

    pub(crate) fn caches_consistent(&self) -> bool {
        match Caches::from_grid(&self.grid) {
            Some(rebuilt) => {
                rebuilt.white.matches(&self.caches.white)
                    && rebuilt.black.matches(&self.caches.black)
            }
            None => false,
        }
    }
}

// Manually implement PartialEq for Position because the caches are derived
// from the grid and shouldn't influence equality.
impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.grid == other.grid && self.state == other.state
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut board_str = String::with_capacity(64 + 7);
        Square::list_white_perspective()
            .into_iter()
            .enumerate()
            .for_each(|(idx, square)| {
                let ch = match self.is_piece_at(square) {
                    Some((p, Side::White)) => <Piece as Into<char>>::into(p).to_ascii_uppercase(),
                    Some((p, Side::Black)) => <Piece as Into<char>>::into(p),
                    None => '.',
                };

                board_str.push(ch);
                if (idx + 1) % 8 == 0 && idx != 63 {
                    board_str.push('\n');
                }
            });
        write!(f, "{}", board_str)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
