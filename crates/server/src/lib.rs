//! HTTP surface: axum router, request validation, the upload pipeline, and
//! the error boundary that maps failures to status codes.

pub mod error;
pub mod handlers;
pub mod ingest;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod testutil;

pub use server::{build_app, start};
