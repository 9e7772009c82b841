//! Randomized run duration

use crate::config::ReelConfig;
use rand::Rng;

/// Computes the concrete delay for one run
///
/// The configured duration is perturbed by a signed jitter drawn uniformly
/// from `[-jitter_ms, +jitter_ms]`, and the result is floored at zero.
///
/// # Arguments
/// * `config` - Sanitized reel configuration
/// * `rng` - Random source
///
/// # Returns
/// Delay in milliseconds before the run finalizes
pub fn compute_run_delay_ms<R: Rng + ?Sized>(config: &ReelConfig, rng: &mut R) -> u64 {
    if config.jitter_ms == 0 {
        return config.duration_ms;
    }

    let jitter = u128::from(config.jitter_ms);
    let offset = rng.gen_range(0..=jitter * 2);
    let total = u128::from(config.duration_ms) + offset;

    // total - jitter == duration + (offset - jitter), clamped at zero
    let delay = total.saturating_sub(jitter);
    u64::try_from(delay).unwrap_or(u64::MAX)
}
