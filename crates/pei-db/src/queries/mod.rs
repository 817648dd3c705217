pub mod activities;
pub mod peis;
pub mod rag_files;
