//! Task manager tests: publish, receive and finish scenarios over in-memory
//! transports, and the PostgreSQL task store against a live database.

pub mod task_store;
