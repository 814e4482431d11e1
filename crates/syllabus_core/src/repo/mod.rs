//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the hierarchy store
//!   and the identity collaborator.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate rows before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `SlugTaken`,
//!   `HasChildren`, `PositionConflict`) in addition to DB transport errors.

pub mod identity_repo;
pub mod node_repo;
