//! Database schema, row models and shared queries

pub mod caucus;
pub mod init;
pub mod models;
pub mod retry;

pub use caucus::*;
pub use init::*;
pub use models::*;
