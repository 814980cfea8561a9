//! # Quill Infrastructure
//!
//! Concrete implementations of the ports defined in `quill-core`:
//! post repositories and the spreadsheet codec.
//!
//! ## Feature Flags
//!
//! - `postgres` (default) - PostgreSQL repository via SeaORM
//!
//! Without `postgres` only the in-memory repository is compiled.

pub mod codec;
pub mod database;

pub use codec::SpreadsheetCodec;
pub use database::{DatabaseConfig, InMemoryPostRepository};

#[cfg(feature = "postgres")]
pub use database::{DatabaseConnections, PostgresPostRepository};
