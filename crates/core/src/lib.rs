//! # Forager Core
//!
//! Domain types, traits, and error definitions for the Forager ReAct agent.
//! This crate has **zero framework dependencies** — it defines the domain
//! model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (completion service, tools, memory store)
//! is a trait here. Implementations live in their respective crates, so
//! the agent loop can be driven end to end by canned test doubles.

pub mod error;
pub mod event;
pub mod intent;
pub mod memory;
pub mod message;
pub mod observation;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{MemoryError, ProviderError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use intent::Intent;
pub use memory::{
    Importance, MemoryCategory, MemoryEntry, MemoryProposal, MemorySource, MemoryStore,
};
pub use message::{Message, MessageToolCall, Role};
pub use observation::{CodeOutcome, Observation, SearchHit, ToolErrorCause};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{CapabilityRegistry, ToolCapability};
