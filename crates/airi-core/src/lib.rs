//! Domain logic and port trait definitions for Airi.
//!
//! This crate defines the chat engine (context assembly, pruning, the
//! streaming reply loop), the character guard, sentence segmentation for
//! speech, and the "ports" (repository/store traits) that the infrastructure
//! layer implements. It depends only on `airi-types` -- never on `airi-infra`
//! or any database/IO crate.

pub mod chat;
pub mod history;
pub mod llm;
pub mod persona;
pub mod speech;
