//! MuRAG Core - Domain types shared by every MuRAG crate.

mod error;
mod timestamp;
mod types;

pub use error::{Error, Result};
pub use timestamp::{format_timestamp, parse_timestamp};
pub use types::*;
