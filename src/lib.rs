//! Rollcall - identity webhook ingestion and directory sync
//!
//! This library receives user/organization webhooks from third-party identity
//! providers, verifies their signatures, and applies idempotent writes to a
//! local directory database.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod sweep;
pub mod sync;
