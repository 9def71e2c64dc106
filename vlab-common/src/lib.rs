//! # Virtual Lab Common Library
//!
//! Shared code for the Thera Virtual Lab service including:
//! - Database models and schema initialization
//! - API envelope types
//! - Configuration loading
//! - Reconnecting transcript stream client

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod stream;

pub use error::{Error, Result};
