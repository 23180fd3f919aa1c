use std::time::Duration;

use rand::Rng;

use crate::ErrorCategory;

/// Jitter applied symmetrically around the nominal delay.
pub const JITTER_FRACTION: f64 = 0.2;

/// Exponential delay without jitter, clamped to `[base, max]`.
pub fn nominal_delay(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    category: ErrorCategory,
) -> Duration {
    let raw = exponential_ms(attempt, base_delay_ms, category);
    Duration::from_millis(clamp_ms(raw, base_delay_ms, max_delay_ms))
}

/// Backoff for the given attempt (1-based) with ±20% jitter, clamped to
/// `[base, max]`.
pub fn compute_delay<R: Rng + ?Sized>(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    category: ErrorCategory,
    rng: &mut R,
) -> Duration {
    let raw = exponential_ms(attempt, base_delay_ms, category);
    let jitter = rng.gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let jittered = raw * (1.0 + jitter);
    Duration::from_millis(clamp_ms(jittered, base_delay_ms, max_delay_ms))
}

fn exponential_ms(attempt: u32, base_delay_ms: u64, category: ErrorCategory) -> f64 {
    // Attempt 0 is treated as the first attempt; exponent capped well past any sane max.
    let exponent = attempt.saturating_sub(1).min(32) as i32;
    base_delay_ms as f64 * 2f64.powi(exponent) * category.delay_multiplier()
}

fn clamp_ms(value: f64, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let upper = max_delay_ms.max(base_delay_ms) as f64;
    let lower = base_delay_ms as f64;
    value.clamp(lower, upper).round() as u64
}
