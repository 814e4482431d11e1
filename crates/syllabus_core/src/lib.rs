//! Core domain logic for the Syllabus content admin.
//! This crate is the single source of truth for hierarchy invariants: slug
//! allocation, sibling positions and the role gate.

pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::actor::{Actor, ActorId, Role};
pub use model::node::{
    HierarchyLevel, HierarchyNode, NodeChanges, NodeDraft, NodeField, NodeId,
    NodeValidationError,
};
pub use policy::position::{next_position, MoveDirection, PositionSwap};
pub use policy::role_gate::{authorize, guard_page, GateOutcome, RedirectTarget};
pub use policy::slug::{derive_slug, SlugCheckTicket, SlugCheckTracker};
pub use repo::identity_repo::{IdentityProvider, SqliteActorDirectory, SqliteSession};
pub use repo::node_repo::{
    HierarchyRepository, NodeListQuery, RepoError, RepoResult, SqliteHierarchyRepository,
};
pub use service::editor::{EditorPhase, EditorSession, FieldError, NodeForm};
pub use service::hierarchy_service::{
    ErrorKind, HierarchyService, HierarchyServiceError, NodePage, Pagination,
    DELETE_BLOCKED_MESSAGE, STORE_FAILURE_MESSAGE,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
