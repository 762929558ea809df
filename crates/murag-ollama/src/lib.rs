//! MuRAG Ollama - local model access for embeddings and answer generation.
//!
//! This crate provides an async client for Ollama's HTTP API, the
//! [`Embedder`] and [`Generator`] traits the pipeline and answerer are
//! written against, and the citation-aware prompt builder.

mod backend;
mod client;
mod error;
pub mod prompt;
mod types;

pub use backend::{Embedder, Generator, OllamaBackend};
pub use client::OllamaClient;
pub use error::{OllamaError, OllamaResult};
pub use prompt::{build_prompt, system_prompt, PromptSource};
pub use types::*;
