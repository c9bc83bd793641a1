/// Authentication and authorization utilities
///
/// This module provides the identity primitives for Greenlight:
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`token`]: Opaque bearer token generation and SHA-256 digests
/// - [`middleware`]: Bearer token authentication for Axum requests
/// - [`authorization`]: Permission checks for authenticated users
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id, random salt, tunable cost
/// - **Bearer Tokens**: 26 random base62 characters, only the SHA-256 digest is stored
/// - **Scoped Tokens**: an activation token never authenticates a request
///
/// # Example
///
/// ```no_run
/// use greenlight_shared::auth::password::{hash_password, verify_password};
/// use greenlight_shared::auth::token::{generate_token, hash_token};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("pa55word1234")?;
/// assert!(verify_password("pa55word1234", &hash)?);
///
/// let (plaintext, digest) = generate_token();
/// assert_eq!(hash_token(&plaintext), digest);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod middleware;
pub mod password;
pub mod token;
