//! The chat pipeline: context assembly, token pruning, the streaming
//! reply engine, and the conversation repository port.

pub mod context;
pub mod engine;
pub mod prune;
pub mod repository;
