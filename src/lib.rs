//! PDF Viewer Server Library
//!
//! Backend for a web PDF viewer. A document is loaded once and then paged,
//! thumbnailed, text-extracted and annotation-queried through an opaque
//! session token, without being re-sent on every request.
//!
//! # Modules
//!
//! - `resolver`: descriptor (inline base64, local file, URL) to bytes
//! - `session`: token-keyed, time-expiring document cache
//! - `engine`: rendering engine seam and the MuPDF implementation
//! - `operation` / `dispatcher`: typed requests and their execution
//! - `routes`: axum HTTP surface
//!
//! The server binary is in main.rs.

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod operation;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod state;
