//! Storage layer tests against a live PostgreSQL database.

pub mod dao;
