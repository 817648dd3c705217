//! Core library for the PEI assistant.
//!
//! Builds prompts from a partially filled Individualized Education Plan,
//! sends them to a generative model, parses the replies and stages drafted
//! text for human approval before it reaches the form. Persistence goes
//! through the [`store::RecordStore`] trait.

pub mod ai;
pub mod approval;
pub mod assistant;
pub mod attachments;
pub mod autosave;
pub mod catalog;
pub mod context;
pub mod form;
pub mod prompt;
pub mod response;
pub mod store;
