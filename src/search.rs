use std::fmt;

use crate::error::LauncherError;

/// One step of the scripted search path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMove {
    Forward,
    Backward,
    Left,
    Right,
}

impl SearchMove {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'f' => Some(SearchMove::Forward),
            'b' => Some(SearchMove::Backward),
            'l' => Some(SearchMove::Left),
            'r' => Some(SearchMove::Right),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            SearchMove::Forward => 'f',
            SearchMove::Backward => 'b',
            SearchMove::Left => 'l',
            SearchMove::Right => 'r',
        }
    }
}

/// A fixed search path read cyclically. Every call to `next_move` advances the
/// cursor by one, so repeated calls walk the whole script before repeating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchPattern {
    moves: Vec<SearchMove>,
    cursor: usize,
}

impl SearchPattern {
    pub fn parse(script: &str) -> Result<Self, LauncherError> {
        let moves = script
            .trim()
            .chars()
            .map(|c| {
                SearchMove::from_char(c).ok_or_else(|| {
                    LauncherError::invalid(
                        "search.strategy",
                        format!("unknown move '{c}' (expected f, b, l or r)"),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if moves.is_empty() {
            return Err(LauncherError::invalid(
                "search.strategy",
                "search script is empty",
            ));
        }
        Ok(Self { moves, cursor: 0 })
    }

    pub fn next_move(&mut self) -> SearchMove {
        let step = self.moves[self.cursor];
        self.cursor = (self.cursor + 1) % self.moves.len();
        step
    }

    /// Index of the move the next call will return.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

impl fmt::Display for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.moves {
            write!(f, "{}", step.as_char())?;
        }
        Ok(())
    }
}
