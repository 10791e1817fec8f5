//! Shared domain types for Airi.
//!
//! This crate contains the core domain types used across the Airi chatbot:
//! conversation turns, LLM request/stream shapes, persona definition,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod persona;
