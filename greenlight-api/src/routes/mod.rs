/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `guard`: Permission-checking extractor
/// - `health`: Liveness endpoint
/// - `movies`: Movie catalogue CRUD and listing
/// - `users`: Registration and activation
/// - `tokens`: Authentication token issuance

pub mod guard;
pub mod health;
pub mod movies;
pub mod tokens;
pub mod users;
