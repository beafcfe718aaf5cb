//! FieldSense Store - Metadata storage ports and adapters
//!
//! This crate defines the `MetadataStore` port used by the result cache and
//! provides in-memory and PostgreSQL implementations.

pub mod memory;
pub mod ports;
pub mod postgres;

pub use memory::MemoryMetadataStore;
pub use ports::MetadataStore;
pub use postgres::{PostgresConfig, PostgresStore};
