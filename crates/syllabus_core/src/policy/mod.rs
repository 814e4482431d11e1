//! Editing policies shared by every hierarchy editor.
//!
//! # Responsibility
//! - Slug derivation, format checks and last-request-wins availability tracking.
//! - Sibling position assignment and reorder planning.
//! - Role gate evaluated before page loads and mutations.
//!
//! # Invariants
//! - Everything here is storage-agnostic; store access goes through the
//!   repository traits passed in by callers.

pub mod position;
pub mod role_gate;
pub mod slug;
