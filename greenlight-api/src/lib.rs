//! # Greenlight API Server Library
//!
//! This library provides the core functionality for the Greenlight API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `background`: Supervised background tasks
//! - `codec`: Strict JSON request decoding and enveloped responses
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `mailer`: Outgoing mail templates and delivery
//! - `routes`: API route handlers
//! - `shutdown`: Graceful shutdown coordination

pub mod app;
pub mod background;
pub mod codec;
pub mod config;
pub mod error;
pub mod mailer;
pub mod routes;
pub mod shutdown;
