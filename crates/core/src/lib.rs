//! # Deliberate Core
//!
//! Domain types, traits, and error definitions for the Deliberate agent
//! control loop. This crate has **no transport dependencies**: it defines the
//! seams that the providers, tools, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator of the loop is a trait here:
//! - [`CompletionService`] — the language-model transport
//! - [`Capability`] — an invocable tool, collected in a [`CapabilityRegistry`]
//! - [`EventBus`] — the optional observability port
//!
//! Implementations live in their respective crates, so the loop can be
//! driven by scripted fakes in tests and by real HTTP backends in the CLI.

pub mod error;
pub mod event;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{CapabilityError, CompletionError, Error, Result};
pub use event::{EventBus, LoopEvent};
pub use provider::{CompletionService, StructuredPayload};
pub use tool::{Capability, CapabilityDescriptor, CapabilityRegistry, CapabilityResult};
