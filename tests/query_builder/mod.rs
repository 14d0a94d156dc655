//! Query Builder Tests Module
//!
//! Rendering of realistic task, subtask and queue queries in both field modes.

pub mod document_queries;
pub mod relational_queries;
