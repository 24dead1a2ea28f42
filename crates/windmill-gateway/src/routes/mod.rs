//! HTTP route handlers.

pub mod dev;
pub mod devices;
pub mod health;
pub mod ingest;
pub mod stream;
