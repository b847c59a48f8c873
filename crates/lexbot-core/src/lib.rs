//! Core domain + routing logic for the lexbot Telegram orchestrator.
//!
//! This crate is intentionally framework-agnostic. Telegram, OpenAI, Pinecone and the
//! concrete capabilities live in adapter crates behind the traits defined here.

pub mod capability;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod inbound;
pub mod llm;
pub mod logging;
pub mod messaging;
pub mod registry;
pub mod router;
pub mod update;

pub use errors::{Error, Result};
