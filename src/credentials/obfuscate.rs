//! Display-safe masking of secrets.

/// Mask character used by [`obfuscate`].
pub const MASK_CHAR: char = '*';

/// Masked output for secrets too short to reveal any part of.
const SHORT_MASK_LEN: usize = 20;
const REVEAL_PREFIX: usize = 6;
const REVEAL_SUFFIX: usize = 2;
const MIDDLE_MASK_LEN: usize = 12;

/// Mask a secret for display.
///
/// Secrets of 8 characters or fewer become 20 `*`; longer secrets keep their
/// first 6 and last 2 characters around 12 `*`. The output length does not
/// track the input length, and the result is never fed back to decryption.
pub fn obfuscate(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= REVEAL_PREFIX + REVEAL_SUFFIX {
        return MASK_CHAR.to_string().repeat(SHORT_MASK_LEN);
    }
    let prefix: String = chars[..REVEAL_PREFIX].iter().collect();
    let suffix: String = chars[chars.len() - REVEAL_SUFFIX..].iter().collect();
    format!(
        "{prefix}{}{suffix}",
        MASK_CHAR.to_string().repeat(MIDDLE_MASK_LEN)
    )
}

/// True if `value` is already [`obfuscate`] output, i.e. masking it is a no-op.
///
/// Such values are rejected at validation time so that a masked value echoed
/// back by a client never gets stored as the secret.
pub fn is_masked(value: &str) -> bool {
    obfuscate(value) == value
}
