/// Opaque capability tokens
///
/// Invite tokens and link-share tokens are random base62 strings behind a short
/// kind prefix. Only their SHA-256 digest is persisted. The plaintext is handed to
/// the caller once, at creation, and is looked up later by hashing what the bearer
/// presents.
///
/// # Format
///
/// `{prefix}{32 base62 chars}`, for example `shr_4fQ...` (36 chars total). The random
/// part alone carries 32 * log2(62) ≈ 190 bits of entropy.
///
/// # Example
///
/// ```
/// use warden_shared::auth::token::{generate, hash, TokenKind};
///
/// let (token, digest) = generate(TokenKind::Link);
/// assert!(token.starts_with("shr_"));
/// assert_eq!(token.len(), 36);
/// assert_eq!(digest, hash(&token));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Number of random characters after the prefix
pub const TOKEN_RANDOM_LENGTH: usize = 32;

/// Number of leading characters kept in clear for display and logs
pub const DISPLAY_PREFIX_LENGTH: usize = 8;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// What a token grants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Accepting a pending workspace membership
    Invite,
    /// Anonymous access to one shared resource
    Link,
}

impl TokenKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            TokenKind::Invite => "inv_",
            TokenKind::Link => "shr_",
        }
    }
}

/// Generates a token of the given kind and returns `(plaintext, sha256_hex)`
///
/// Randomness comes from `rand::thread_rng()`, a CSPRNG reseeded from the OS.
pub fn generate(kind: TokenKind) -> (String, String) {
    let mut rng = rand::thread_rng();

    let random: String = (0..TOKEN_RANDOM_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();

    let token = format!("{}{}", kind.prefix(), random);
    let digest = hash(&token);

    (token, digest)
}

/// Hex-encoded SHA-256 of a token
pub fn hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Leading characters safe to store and log next to the digest
pub fn display_prefix(token: &str) -> String {
    token.chars().take(DISPLAY_PREFIX_LENGTH).collect()
}

/// Cheap shape check done before touching the database
pub fn is_well_formed(kind: TokenKind, token: &str) -> bool {
    match token.strip_prefix(kind.prefix()) {
        Some(random) => {
            random.len() == TOKEN_RANDOM_LENGTH && random.bytes().all(|b| b.is_ascii_alphanumeric())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_tokens_are_well_formed() {
        for kind in [TokenKind::Invite, TokenKind::Link] {
            let (token, digest) = generate(kind);

            assert!(token.starts_with(kind.prefix()));
            assert_eq!(token.len(), kind.prefix().len() + TOKEN_RANDOM_LENGTH);
            assert!(is_well_formed(kind, &token));
            assert_eq!(digest.len(), 64);
            assert_eq!(digest, hash(&token));
        }
    }

    #[test]
    fn test_tokens_do_not_repeat() {
        let tokens: HashSet<String> = (0..2_000).map(|_| generate(TokenKind::Link).0).collect();
        assert_eq!(tokens.len(), 2_000);
    }

    #[test]
    fn test_random_part_uses_whole_alphabet() {
        let seen: HashSet<u8> = (0..500)
            .flat_map(|_| {
                let (token, _) = generate(TokenKind::Invite);
                token.into_bytes().into_iter().skip(4).collect::<Vec<_>>()
            })
            .collect();

        // 16k draws over 62 symbols; missing any one of them is vanishingly unlikely
        assert_eq!(seen.len(), CHARSET.len());
    }

    #[test]
    fn test_kind_mismatch_and_bad_shapes() {
        let (invite, _) = generate(TokenKind::Invite);
        assert!(!is_well_formed(TokenKind::Link, &invite));
        assert!(!is_well_formed(TokenKind::Link, "shr_short"));
        assert!(!is_well_formed(TokenKind::Link, "shr_!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!!"));
        assert!(!is_well_formed(TokenKind::Link, ""));
    }

    #[test]
    fn test_hash_is_deterministic_and_distinct() {
        assert_eq!(hash("shr_abc"), hash("shr_abc"));
        assert_ne!(hash("shr_abc"), hash("shr_abd"));
    }

    #[test]
    fn test_display_prefix() {
        assert_eq!(display_prefix("shr_abcdefghij"), "shr_abcd");
        assert_eq!(display_prefix("inv_"), "inv_");
    }
}
