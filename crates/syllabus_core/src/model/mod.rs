//! Domain model for the content hierarchy and its actors.
//!
//! # Responsibility
//! - Define the node shape shared by exams, subjects, chapters, topics and
//!   formula cards.
//! - Define the actor/role model consumed by the role gate.
//!
//! # Invariants
//! - Every node is identified by a stable `NodeId`.
//! - Only exams are root-level; every other level requires a parent.

pub mod actor;
pub mod node;
