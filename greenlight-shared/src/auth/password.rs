/// Password hashing module using Argon2id
///
/// Plaintext passwords only ever live in memory long enough to be validated
/// and hashed. What gets persisted is the PHC string produced here, which
/// embeds the algorithm, the cost parameters and the random salt.
///
/// # Security
///
/// - **Algorithm**: Argon2id, version 0x13
/// - **Default cost**: 64 MB memory, 3 passes, 4 lanes (see [`HashCost`])
/// - **Salt**: 16 random bytes from the OS RNG, one per hash
/// - **Verification**: constant-time, a mismatch is `Ok(false)` and not an error
///
/// # Example
///
/// ```
/// use greenlight_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correctpw")?;
///
/// assert!(verify_password("correctpw", &hash)?);
/// assert!(!verify_password("wrongpw", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted plaintext length in bytes
pub const MIN_PASSWORD_BYTES: usize = 8;

/// Maximum accepted plaintext length in bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Argon2id cost parameters
///
/// Raising any of these makes each hash slower to compute, for the server
/// and for anyone brute-forcing a leaked hash alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Hashes a password with the default [`HashCost`]
///
/// Callers must check the plaintext with [`validate_password_plaintext`]
/// first; this function hashes whatever it is given.
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with(password, HashCost::default())
}

/// Hashes a password with explicit cost parameters
///
/// Returns a PHC string such as:
/// ```text
/// $argon2id$v=19$m=65536,t=3,p=4$c2FsdHNhbHRzYWx0$hash...
/// ```
///
/// # Errors
///
/// Returns `PasswordError::HashError` if the parameters are rejected or
/// hashing fails
pub fn hash_password_with(password: &str, cost: HashCost) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(cost.memory_kib)
        .t_cost(cost.iterations)
        .p_cost(cost.parallelism)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored hash
///
/// The cost parameters and salt are read back from the PHC string, so hashes
/// produced with any [`HashCost`] verify here.
///
/// # Returns
///
/// `Ok(true)` if the password matches, `Ok(false)` if it doesn't
///
/// # Errors
///
/// Returns `PasswordError::InvalidHash` if the stored hash cannot be parsed or
/// lacks its salt or digest, and `PasswordError::VerifyError` for any other
/// verification failure
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // The PHC grammar allows both segments to be absent
    if parsed_hash.salt.is_none() || parsed_hash.hash.is_none() {
        return Err(PasswordError::InvalidHash("missing salt or hash".to_string()));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks the plaintext length policy
///
/// A password must be present and between 8 and 72 bytes long. Returns the
/// client-facing message for the first rule that fails.
///
/// # Example
///
/// ```
/// use greenlight_shared::auth::password::validate_password_plaintext;
///
/// assert!(validate_password_plaintext("pa55word").is_ok());
/// assert!(validate_password_plaintext("short").is_err());
/// ```
pub fn validate_password_plaintext(password: &str) -> Result<(), &'static str> {
    if password.is_empty() {
        return Err("must be provided");
    }
    if password.len() < MIN_PASSWORD_BYTES {
        return Err("must be at least 8 bytes long");
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err("must not be more than 72 bytes long");
    }
    Ok(())
}
