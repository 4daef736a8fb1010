//! Histvault - document-per-session chat history storage
//!
//! This library persists ordered chat transcripts as one document per
//! (user, session) pair in a partitioned document store, with in-memory,
//! filesystem and SQLite backends.

pub mod config;
pub mod core;
pub mod error;
pub mod history;
pub mod storage;
pub mod utils;

pub mod cli;

pub use crate::config::Settings;
pub use crate::core::{ConversationDocument, Message, Role};
pub use error::{DocumentError, HistoryError, HistoryResult, Operation};
pub use history::{ChatMessageHistory, SessionHistory, SessionHistoryBuilder};
pub use storage::{DocumentClient, DocumentStore};
