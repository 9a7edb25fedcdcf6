/// One-time code generation
///
/// Codes are drawn from `OsRng` so that they are not predictable from earlier
/// outputs. A seeded PRNG must never be used here.
use rand::{rngs::OsRng, Rng};

/// Generate a zero-padded decimal code with `digits` digits.
///
/// `digits` is clamped to `1..=9` so the upper bound always fits in a `u32`.
pub fn generate_numeric_code(digits: u32) -> String {
    let digits = digits.clamp(1, 9);
    let upper = 10u32.pow(digits);
    let value = OsRng.gen_range(0..upper);
    format!("{:0width$}", value, width = digits as usize)
}
