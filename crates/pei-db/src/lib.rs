//! PostgreSQL persistence for PEI drafts, the activity bank, and support
//! files.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
