//! # Cantina Common Library
//!
//! Shared code for the cantina services:
//! - Error type
//! - Bootstrap configuration (TOML + root folder resolution)
//! - Database initialization and schema
//! - Calendar helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
