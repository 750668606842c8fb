//! # CCT Common Library
//!
//! Shared code for the Congressional Coalition Tracker services:
//! - Database schema, initialization and row models
//! - Vote analysis (party-line scores, cross-party voting, agreement networks,
//!   coalition detection)
//! - Persistent analysis cache with single-flight computation
//! - Scheduled refresh of cached analyses
//! - Configuration loading

pub mod analysis;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod refresh;
pub mod text;
pub mod time;

pub use error::{Error, Result};
