/// Opaque token generation and hashing
///
/// Invite tokens are random alphanumeric strings handed out in invite links.
/// Refresh tokens are JWTs, but only their SHA-256 digest is persisted so a
/// database leak does not hand out live sessions.
///
/// # Example
///
/// ```
/// use twocare_shared::auth::token::{generate_token, hash_token, verify_token_hash, INVITE_TOKEN_LENGTH};
///
/// let token = generate_token(INVITE_TOKEN_LENGTH);
/// assert_eq!(token.len(), 32);
///
/// let hash = hash_token(&token);
/// assert!(verify_token_hash(&token, &hash));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of invite tokens
pub const INVITE_TOKEN_LENGTH: usize = 32;

/// Generates a random alphanumeric token
///
/// Uses the thread-local CSPRNG.
pub fn generate_token(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Hashes a token with SHA-256
///
/// # Returns
///
/// Lowercase hex-encoded digest (64 characters)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks a token against a stored digest in constant time
pub fn verify_token_hash(token: &str, stored_hash: &str) -> bool {
    constant_time_compare(&hash_token(token), stored_hash)
}

/// Constant-time string comparison
///
/// Returns false immediately on length mismatch; digests have fixed length so
/// this leaks nothing useful.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
