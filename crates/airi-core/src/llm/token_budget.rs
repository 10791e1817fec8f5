//! Token budget for the context window.
//!
//! The assembled prompt for one generation call must fit inside the
//! backend's fixed context window with room left for the response. The
//! budget is simply `context size - safety margin`; history pruning
//! trims against it.

use airi_types::llm::BackendCapabilities;

/// Prompt-size ceiling derived from the backend's context window.
#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub max_context_tokens: u32,
    pub safety_margin: u32,
}

impl TokenBudget {
    /// Create a budget from a context size and a reserved margin.
    pub fn new(max_context_tokens: u32, safety_margin: u32) -> Self {
        Self {
            max_context_tokens,
            safety_margin,
        }
    }

    /// Derive a budget from backend capabilities.
    pub fn from_capabilities(caps: &BackendCapabilities, safety_margin: u32) -> Self {
        Self::new(caps.max_context_tokens, safety_margin)
    }

    /// The maximum serialized token count the assembled prompt may occupy.
    pub fn prompt_budget(&self) -> u32 {
        self.max_context_tokens.saturating_sub(self.safety_margin)
    }
}
