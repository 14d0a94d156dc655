//! # Database Operations
//!
//! Storage access layer over a single PostgreSQL connection per process.
//!
//! ## Overview
//!
//! - [`connection`] - The shared connection with check-and-heal before every statement
//! - [`dao`] - Table-scoped find/insert/update/remove and transactions
//! - [`rows`] - Decoding rows into JSON documents and shaping selected fields
//! - [`migrations`] - Embedded schema migrations
//! - [`errors`] - Connection, statement and rendering errors
//!
//! No pooling: long-lived workers hold one connection for their lifetime and
//! reconnect only when a ping fails.

pub mod connection;
pub mod dao;
pub mod errors;
pub mod migrations;
pub mod rows;

pub use connection::DatabaseConnection;
pub use dao::{merge_path, Dao, DaoTransaction};
pub use errors::{DatabaseError, DatabaseResult};
