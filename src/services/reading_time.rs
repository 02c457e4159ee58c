//! Reading-time estimate for article bodies.

pub const WORDS_PER_MINUTE: usize = 200;

/// Whole minutes needed to read `text`, rounded up, never less than one
pub fn estimate(text: &str) -> i64 {
    let words = text.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as i64
}
