//! Core domain types and operations
//!
//! This module defines the symbol the reel cycles through and the fixed
//! alphabet every run draws from. It has no knowledge of timers, storage
//! or rendering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of symbols on the reel
pub const ALPHABET_LEN: usize = 26;

/// One reel symbol, always an ASCII uppercase letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(char);

impl Symbol {
    /// Creates a symbol from a letter, normalizing to upper case
    ///
    /// # Returns
    /// None if `letter` is not an ASCII letter
    pub fn new(letter: char) -> Option<Self> {
        if letter.is_ascii_alphabetic() {
            Some(Self(letter.to_ascii_uppercase()))
        } else {
            None
        }
    }

    /// Parses a string holding exactly one ASCII letter
    ///
    /// Case-insensitive. Anything else (empty, several characters,
    /// digits, non-ASCII) yields None.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Self::new(letter),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::parse(&value).ok_or_else(|| format!("not a single letter: {value:?}"))
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0.to_string()
    }
}

/// The fixed, ordered reel alphabet `A..=Z`
pub const ALPHABET: [Symbol; ALPHABET_LEN] = {
    let mut letters = [Symbol('A'); ALPHABET_LEN];
    let mut i = 0;
    while i < ALPHABET_LEN {
        letters[i] = Symbol((b'A' + i as u8) as char);
        i += 1;
    }
    letters
};

/// Symbol shown before any run has finished in this session
pub const INITIAL_SYMBOL: Symbol = Symbol('A');

/// Picks the symbol to display at session start
///
/// The most recent persisted result wins; without one the reel shows
/// [`INITIAL_SYMBOL`].
pub fn initial_display_symbol(history: &[Symbol]) -> Symbol {
    history.last().copied().unwrap_or(INITIAL_SYMBOL)
}
