//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate policy checks and repository calls into editor use-cases.
//! - Keep HTTP/CLI layers decoupled from storage details.

pub mod editor;
pub mod hierarchy_service;
