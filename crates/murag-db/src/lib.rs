//! MuRAG DB - SQLite persistence for documents, chunks, embeddings, jobs and chat history.

mod database;
mod error;
mod migrations;
mod operations;

pub use database::Database;
pub use error::{DbError, DbResult};
pub use operations::documents::DocumentDeletion;
pub use operations::jobs::JobCounts;
pub use operations::vectors::{cosine_similarity, IndexEntry};
