pub mod algebraic_notation;
pub mod move_gen;
pub mod moves;
pub mod perft;
pub mod pgn;
pub mod position;
pub mod search;
pub mod square;

pub use algebraic_notation::{move_to_algebraic_notation, AlgebraicNotationError};
pub use move_gen::{GenerateMoves, MailboxMoveGen, MOVE_GEN};
pub use moves::{Move, SerializedMove};
pub use perft::{perft, perft_full, PerftDepthResult, PerftResult};
pub use pgn::{PgnRecorder, PgnTags};
pub use position::{CastlingRights, FenParseError, Piece, Position, PositionError, Side, State};
pub use search::{search, GameResult, SearchError, SearchParams, SearchResultInfo};
pub use square::Square;
