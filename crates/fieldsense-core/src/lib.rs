//! FieldSense Core - Domain models, error taxonomy, and configuration
//!
//! This crate contains the domain types shared by the raster, store, analysis
//! and transport crates of the FieldSense system.

pub mod config;
pub mod error;
pub mod models;

pub use error::{ErrorCategory, FieldsenseError, Result};
