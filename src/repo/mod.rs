//! Repositories wrapping CRUD and reporting queries
//!
//! Every repository takes an explicit `SqlitePool` handle; there is no
//! process-global connection. Callers own the pool lifecycle.

pub mod accounts;
pub mod allocation;
pub mod articles;
pub mod experiments;
pub mod newsletters;

pub use accounts::AccountRepository;
pub use allocation::AllocationQueries;
pub use articles::ArticleRepository;
pub use experiments::ExperimentRepository;
pub use newsletters::NewsletterRepository;
