/// Bearer token primitives
///
/// Tokens are opaque random strings handed to the client exactly once. The
/// database only ever sees their SHA-256 digest, so a leaked `tokens` table
/// does not yield usable credentials. A fast digest is enough here: unlike
/// passwords, the input already carries ~154 bits of entropy.
///
/// Persistence and scoping live in [`crate::models::token`].
///
/// # Example
///
/// ```
/// use greenlight_shared::auth::token::{generate_token, hash_token, validate_token_format};
///
/// let (plaintext, digest) = generate_token();
/// assert_eq!(plaintext.len(), 26);
/// assert!(validate_token_format(&plaintext));
/// assert_eq!(hash_token(&plaintext), digest);
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a token plaintext (characters)
pub const TOKEN_LENGTH: usize = 26;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a new token
///
/// # Returns
///
/// Tuple of (plaintext, hex-encoded SHA-256 digest)
pub fn generate_token() -> (String, String) {
    let mut rng = rand::thread_rng();

    let plaintext: String = (0..TOKEN_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let hash = hash_token(&plaintext);

    (plaintext, hash)
}

/// Hashes a token plaintext with SHA-256
///
/// Deterministic, so the digest of a presented token can be used directly as
/// a lookup key.
pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// Checks that a presented token has the shape of one we issued
///
/// Lets the authentication path reject garbage without a database round trip.
pub fn validate_token_format(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LENGTH && plaintext.bytes().all(|b| b.is_ascii_alphanumeric())
}
