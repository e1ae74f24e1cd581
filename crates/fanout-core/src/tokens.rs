//! Token estimation from character length (4 chars ≈ 1 token).
//!
//! Good enough for sizing LLM request batches; exact counts are the
//! provider's business.

/// Characters per token for estimation.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate token count for a piece of text.
///
/// Counts Unicode scalar values, not bytes, so multi-byte text is not
/// over-estimated.
pub fn estimate_tokens(text: &str) -> usize {
    chars_to_tokens(text.chars().count())
}

/// Convert a character count to an estimated token count (rounded up).
pub fn chars_to_tokens(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}
