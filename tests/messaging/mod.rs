//! Queue transport tests: lease semantics shared by every transport, plus the
//! PostgreSQL queue against a live database.

pub mod database_queue;
