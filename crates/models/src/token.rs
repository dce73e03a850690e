//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token by default.
//! This approximation is within ~10% for BPE tokenizers (GPT-4, Claude) on
//! English text, which is close enough for budgeting history.

/// Characters per token assumed when a model does not say otherwise.
pub const DEFAULT_CHARS_PER_TOKEN: f32 = 4.0;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ `chars_per_token` characters. Rounds up.
pub fn estimate_tokens(text: &str, chars_per_token: f32) -> usize {
    if text.is_empty() {
        return 0;
    }
    let chars = text.chars().count() as f64;
    let ratio = if chars_per_token > 0.0 {
        f64::from(chars_per_token)
    } else {
        f64::from(DEFAULT_CHARS_PER_TOKEN)
    };
    (chars / ratio).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens("", DEFAULT_CHARS_PER_TOKEN), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test", DEFAULT_CHARS_PER_TOKEN), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello", DEFAULT_CHARS_PER_TOKEN), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text, DEFAULT_CHARS_PER_TOKEN), 25);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 4 chars, 12 bytes
        assert_eq!(estimate_tokens("日本語だ", DEFAULT_CHARS_PER_TOKEN), 1);
    }

    #[test]
    fn custom_ratio() {
        let text = "a".repeat(30);
        assert_eq!(estimate_tokens(&text, 3.0), 10);
    }

    #[test]
    fn invalid_ratio_falls_back_to_default() {
        assert_eq!(estimate_tokens("abcdefgh", 0.0), 2);
    }
}
