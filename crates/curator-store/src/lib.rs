//! Persistence layer for the curation pipeline.
//!
//! One SQLite connection per process, WAL mode, short individual write
//! transactions. Three tables: discovered article references, fetched
//! articles (preview only — never the full body), and evaluations keyed
//! one-to-one by article id.

pub mod articles;
pub mod error;
pub mod evaluations;
pub mod references;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use evaluations::{ArticleWithEvaluation, CategoryStats};
pub use store::Store;
