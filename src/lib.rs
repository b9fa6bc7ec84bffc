//! # pressroom
//!
//! Data-access and schema-migration layer for a news-recommendation
//! experimentation platform:
//! - Relational schema and versioned migrations (accounts, articles,
//!   newsletters, impressions, clicks, surveys, experiments)
//! - Repositories wrapping CRUD and reporting queries
//! - Experiment manifest resolution: a declarative TOML manifest becomes a
//!   fully resolved, temporally consistent [`model::Experiment`] graph
//! - Allocation/eligibility queries: which phases are live on a date, who is
//!   assigned, and who is available for new assignment

pub mod config;
pub mod db;
pub mod duration;
pub mod error;
pub mod manifest;
pub mod model;
pub mod repo;
pub mod resolver;

pub use error::{Error, Result};
pub use manifest::Manifest;
pub use model::Experiment;
pub use resolver::resolve;
