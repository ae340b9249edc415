//! # Pairflow Database Crate
//!
//! This crate acts as a high-level, application-specific interface to the
//! SQLite store shared with the tick-ingestion collaborator. It is the
//! system's "permanent archive."
//!
//! ## Architectural Principles
//!
//! - **Adapter:** encapsulates all database-specific logic and SQL behind a
//!   clean API; no other crate writes queries.
//! - **Idempotent appends:** analytics rows are unique on
//!   `(pair_y, pair_x, timeframe, ts)` and written with
//!   `ON CONFLICT DO NOTHING`, so reprocessing an overlapping range is safe.
//! - **Atomic batches:** each persisted batch and its watermark advance
//!   share one transaction; stopping the engine between cycles can never
//!   leave the watermark ahead of the data.
//!
//! ## Public API
//!
//! - `connect`: the async function to establish the connection pool.
//! - `run_migrations`: applies embedded migrations, ensuring the schema is
//!   up-to-date. A migration failure is fatal at startup.
//! - `DbRepository`: the main struct that holds the connection pool and
//!   provides all the high-level data access methods.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use repository::DbRepository;
