//! History-aware selection of a run's final symbol
//!
//! This module owns the policy that decides where the reel stops and the
//! bounded history log that feeds it. Both functions are pure apart from
//! the injected random source.

use crate::domain::core::Symbol;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// Chooses the final symbol of a run
///
/// Draws uniformly from the symbols of `alphabet` that do not appear in
/// `recent`. When `recent` already covers the whole alphabet the constraint
/// is relaxed and the draw is taken from the full alphabet instead.
///
/// # Arguments
/// * `alphabet` - Candidate symbols, must not be empty
/// * `recent` - Recently finalized symbols to avoid
/// * `rng` - Random source
///
/// # Returns
/// None only if `alphabet` is empty
///
/// # Example
/// ```rust
/// use letter_reel::domain::core::{ALPHABET, Symbol};
/// use letter_reel::domain::selection::select_final;
///
/// let recent = [Symbol::new('A').unwrap(), Symbol::new('B').unwrap()];
/// let chosen = select_final(&ALPHABET, &recent, &mut rand::thread_rng()).unwrap();
/// assert!(!recent.contains(&chosen));
/// ```
pub fn select_final<R: Rng + ?Sized>(
    alphabet: &[Symbol],
    recent: &[Symbol],
    rng: &mut R,
) -> Option<Symbol> {
    let seen: HashSet<Symbol> = recent.iter().copied().collect();
    let pool: Vec<Symbol> = alphabet
        .iter()
        .copied()
        .filter(|symbol| !seen.contains(symbol))
        .collect();

    if pool.is_empty() {
        alphabet.choose(rng).copied()
    } else {
        pool.choose(rng).copied()
    }
}

/// Keeps only the most recent `history_size` entries
///
/// Entries are dropped from the front. A size of zero empties the log.
pub fn trim_history(history: &[Symbol], history_size: usize) -> Vec<Symbol> {
    let start = history.len().saturating_sub(history_size);
    history[start..].to_vec()
}

/// Appends `chosen` and trims the result to `history_size`
pub fn record_final(history: &[Symbol], chosen: Symbol, history_size: usize) -> Vec<Symbol> {
    let mut next = Vec::with_capacity(history.len() + 1);
    next.extend_from_slice(history);
    next.push(chosen);
    trim_history(&next, history_size)
}
