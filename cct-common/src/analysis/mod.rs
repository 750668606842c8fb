//! Vote analysis
//!
//! Loading ([`dataset`]) is the only part that touches the database; the
//! aggregation passes are pure functions over a [`VoteDataset`].

pub mod agreement;
pub mod coalitions;
pub mod dataset;
pub mod hotspots;
pub mod outliers;
pub mod party;
pub mod report;
pub mod scores;
pub mod types;

pub use dataset::{AnalysisWindow, VoteDataset};
pub use report::{compute, AnalysisKind};
pub use types::{Chamber, Party, Position, VoteCode};
