//! # Greenlight Shared Library
//!
//! This crate contains the persistence models, credential handling and
//! authentication primitives used by the Greenlight API server.
//!
//! ## Module Organization
//!
//! - `models`: Versioned movie and user records, tokens, permissions, list filters
//! - `auth`: Password hashing, bearer tokens, request authentication, permission checks
//! - `db`: Connection pool and migrations
//! - `json`: Tab-indented response bodies

pub mod auth;
pub mod db;
pub mod json;
pub mod models;

/// Current version of the Greenlight shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
