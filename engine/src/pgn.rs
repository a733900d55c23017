use crate::algebraic_notation::{move_to_algebraic_notation, AlgebraicNotationError};
use crate::move_gen::GenerateMoves;
use crate::moves::Move;
use crate::position::{Position, Side};
use crate::search::GameResult;

/// Optional header tags. Any that are set trigger the full seven tag
/// roster, with `?` standing in for the rest.
#[derive(Debug, Clone, Default)]
pub struct PgnTags {
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
    pub round: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
}

impl PgnTags {
    fn any_set(&self) -> bool {
        self.event.is_some()
            || self.site.is_some()
            || self.date.is_some()
            || self.round.is_some()
            || self.white.is_some()
            || self.black.is_some()
    }
}

/// Collects the moves of one game and renders them as PGN movetext.
#[derive(Debug, Default)]
pub struct PgnRecorder {
    tags: PgnTags,
    moves: Vec<String>,
}

impl PgnRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(tags: PgnTags) -> Self {
        PgnRecorder {
            tags,
            moves: Vec::new(),
        }
    }

    /// Records `mve` as played from `position` (the state before the move
    /// is applied) and returns its notation.
    pub fn record(
        &mut self,
        position: &Position,
        mve: Move,
        move_gen: impl GenerateMoves,
    ) -> Result<String, AlgebraicNotationError> {
        let notation = move_to_algebraic_notation(position, mve, move_gen)?;
        // Only moves by white get a move number prefix
        let numbered = if position.state.to_move == Side::White {
            format!("{}. {}", position.state.full_move_counter, notation)
        } else {
            notation.clone()
        };
        self.moves.push(numbered);
        Ok(notation)
    }

    pub fn finish(self, result: Option<GameResult>) -> String {
        let result_token = match result {
            Some(result) => result.to_string(),
            None => "*".to_string(),
        };

        let mut out = String::new();
        if self.tags.any_set() {
            push_tag(&mut out, "Event", self.tags.event.as_deref());
            push_tag(&mut out, "Site", self.tags.site.as_deref());
            push_tag(&mut out, "Date", self.tags.date.as_deref());
            push_tag(&mut out, "Round", self.tags.round.as_deref());
            push_tag(&mut out, "White", self.tags.white.as_deref());
            push_tag(&mut out, "Black", self.tags.black.as_deref());
            push_tag(&mut out, "Result", Some(&result_token));
            out.push('\n');
        } else if result.is_some() {
            push_tag(&mut out, "Result", Some(&result_token));
            out.push('\n');
        }

        if self.moves.is_empty() {
            out.push_str(&result_token);
        } else {
            out.push_str(&self.moves.join(" "));
            out.push(' ');
            out.push_str(&result_token);
        }
        out
    }
}

fn push_tag(out: &mut String, name: &str, value: Option<&str>) {
    out.push_str(&format!("[{} \"{}\"]\n", name, value.unwrap_or("?")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    use crate::move_gen::MOVE_GEN;
    use crate::square::Square::*;

    #[test]
    fn test_pgn_scholars_mate() -> TestResult {
        let mut position = Position::start();
        let mut recorder = PgnRecorder::new();

        let moves = [
            Move::new(E2, E4),
            Move::new(E7, E5),
            Move::new(F1, C4),
            Move::new(B8, C6),
            Move::new(D1, H5),
            Move::new(G8, F6),
            Move::new(H5, F7),
        ];
        let mut last_notation = String::new();
        for mve in moves {
            last_notation = recorder.record(&position, mve, MOVE_GEN)?;
            position.make_move(mve);
        }

        assert_eq!(last_notation, "Qxf7#");
        assert_eq!(
            recorder.finish(Some(GameResult::WhiteWon)),
            "[Result \"1-0\"]\n\n1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 4. Qxf7# 1-0"
        );
        Ok(())
    }

    #[test]
    fn test_pgn_unfinished() -> TestResult {
        let position = Position::start();
        let mut recorder = PgnRecorder::new();
        recorder.record(&position, Move::new(E2, E4), MOVE_GEN)?;

        assert_eq!(recorder.finish(None), "1. e4 *");
        Ok(())
    }

    #[test]
    fn test_pgn_black_to_move_first() -> TestResult {
        let mut position =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R b KQkq - 0 1")?;
        let mut recorder = PgnRecorder::new();

        recorder.record(&position, Move::new(E8, G8), MOVE_GEN)?;
        position.make_move(Move::new(E8, G8));
        recorder.record(&position, Move::new(E1, G1), MOVE_GEN)?;

        assert_eq!(recorder.finish(None), "O-O 2. O-O *");
        Ok(())
    }

    #[test]
    fn test_pgn_tags() -> TestResult {
        let position = Position::start();
        let mut recorder = PgnRecorder::with_tags(PgnTags {
            event: Some("Self-play".to_string()),
            date: Some("2024.06.01".to_string()),
            ..Default::default()
        });
        recorder.record(&position, Move::new(G1, F3), MOVE_GEN)?;

        let want = "[Event \"Self-play\"]\n\
                    [Site \"?\"]\n\
                    [Date \"2024.06.01\"]\n\
                    [Round \"?\"]\n\
                    [White \"?\"]\n\
                    [Black \"?\"]\n\
                    [Result \"1/2-1/2\"]\n\
                    \n\
                    1. Nf3 1/2-1/2";
        assert_eq!(recorder.finish(Some(GameResult::Draw)), want);
        Ok(())
    }
}
