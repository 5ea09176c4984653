//! Archivist - Grounded Question Answering over Private Documents
//!
//! Indexes a document corpus into immutable snapshots, retrieves passages with
//! hybrid BM25 + embedding search fused by Reciprocal Rank Fusion, optionally
//! reranks them, and answers conversational questions from the retrieved
//! context only. Every answer is judged for faithfulness and relevancy.

pub mod chat;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod llm;
pub mod retrieval;
pub mod sanitizer;
pub mod service;
pub mod session;

pub use error::{ArchivistError, Result};
