//! Hierarchy editing use-case service.
//!
//! # Responsibility
//! - Run the shared editor workflow: validate fields, allocate the slug,
//!   authorize the actor, assign the position and persist.
//! - Reorder siblings and guard deletes above the repository layer.
//! - Classify failures into the caller-facing error taxonomy.
//!
//! # Invariants
//! - Validation and slug conflicts are detected before any store write.
//! - Every mutation re-checks the role gate for the acting `Actor`.
//! - Nodes with children are never deleted.
//! - Store failure details are logged, never surfaced to the user.

use crate::model::actor::{Actor, Role};
use crate::model::node::{
    normalize_name, validate_parent, HierarchyLevel, HierarchyNode, NodeChanges, NodeDraft,
    NodeField, NodeId, NodeValidationError,
};
use crate::policy::position::{next_position, plan_move, MoveDirection};
use crate::policy::role_gate::authorize;
use crate::policy::slug::{check_slug_format, derive_slug, needs_availability_check};
use crate::repo::node_repo::{HierarchyRepository, NewNode, NodeListQuery, RepoError};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// User-facing message for a delete refused because the node owns children.
pub const DELETE_BLOCKED_MESSAGE: &str = "Cannot Delete (Has Topics/Chapters)";
/// User-facing message for any store failure.
pub const STORE_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Caller-facing failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad field value; never reached the store.
    Validation,
    /// Slug taken or stale reorder; resolved by editing or reloading.
    Conflict,
    /// Role gate rejection.
    Authorization,
    /// Target row is missing.
    NotFound,
    /// Delete refused because children exist.
    HasChildren,
    /// Network/query failure; opaque to the caller.
    Store,
}

/// Errors from hierarchy service operations.
#[derive(Debug)]
pub enum HierarchyServiceError {
    Validation(NodeValidationError),
    SlugTaken {
        level: HierarchyLevel,
        slug: String,
    },
    AccessDenied(Role),
    NodeNotFound {
        level: HierarchyLevel,
        id: NodeId,
    },
    ParentNotFound {
        level: HierarchyLevel,
        id: NodeId,
    },
    HasChildren {
        level: HierarchyLevel,
        id: NodeId,
        child_count: u64,
    },
    PositionConflict {
        level: HierarchyLevel,
        id: NodeId,
    },
    Repo(RepoError),
}

impl HierarchyServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::ParentNotFound { .. } => ErrorKind::Validation,
            Self::SlugTaken { .. } | Self::PositionConflict { .. } => ErrorKind::Conflict,
            Self::AccessDenied(_) => ErrorKind::Authorization,
            Self::NodeNotFound { .. } => ErrorKind::NotFound,
            Self::HasChildren { .. } => ErrorKind::HasChildren,
            Self::Repo(_) => ErrorKind::Store,
        }
    }

    /// Form field the error should be shown next to, if any.
    pub fn field(&self) -> Option<NodeField> {
        match self {
            Self::Validation(err) => Some(err.field()),
            Self::SlugTaken { .. } => Some(NodeField::Slug),
            Self::ParentNotFound { .. } => Some(NodeField::Parent),
            _ => None,
        }
    }

    /// Message safe to show to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::HasChildren { .. } => DELETE_BLOCKED_MESSAGE.to_string(),
            Self::Repo(_) => STORE_FAILURE_MESSAGE.to_string(),
            Self::AccessDenied(_) => "You do not have permission to do that.".to_string(),
            other => other.to_string(),
        }
    }
}

impl Display for HierarchyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::SlugTaken { slug, .. } => write!(f, "slug `{slug}` is already taken"),
            Self::AccessDenied(role) => write!(f, "role `{role}` may not edit content"),
            Self::NodeNotFound { level, id } => write!(f, "{level} row not found: {id}"),
            Self::ParentNotFound { level, id } => {
                write!(f, "parent {level} row not found: {id}")
            }
            Self::HasChildren {
                level,
                id,
                child_count,
            } => write!(
                f,
                "cannot delete {level} row {id}: it still owns {child_count} children"
            ),
            Self::PositionConflict { .. } => {
                write!(f, "the list changed while reordering; reload and try again")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for HierarchyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NodeValidationError> for HierarchyServiceError {
    fn from(value: NodeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for HierarchyServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { level, id } => Self::NodeNotFound { level, id },
            RepoError::SlugTaken { level, slug } => Self::SlugTaken { level, slug },
            RepoError::HasChildren {
                level,
                id,
                child_count,
            } => Self::HasChildren {
                level,
                id,
                child_count,
            },
            RepoError::PositionConflict { level, id } => Self::PositionConflict { level, id },
            other => Self::Repo(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, HierarchyServiceError>;

/// Page metadata of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// One page of nodes in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodePage {
    pub items: Vec<HierarchyNode>,
    pub pagination: Pagination,
}

/// Hierarchy service facade over repository implementations.
pub struct HierarchyService<R: HierarchyRepository> {
    repo: R,
}

impl<R: HierarchyRepository> HierarchyService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Whether `slug` is free in `level`, ignoring the row `exclude_id`.
    ///
    /// # Side effects
    /// - One read against the store.
    pub fn is_slug_available(
        &self,
        level: HierarchyLevel,
        slug: &str,
        exclude_id: Option<NodeId>,
    ) -> ServiceResult<bool> {
        let owner = self.repo.slug_owner(level, slug)?;
        Ok(match owner {
            None => true,
            Some(owner) => Some(owner) == exclude_id,
        })
    }

    /// Creates one node appended after its siblings.
    ///
    /// The slug defaults to `derive_slug(name)` when the draft has none.
    pub fn create_node(
        &self,
        actor: &Actor,
        level: HierarchyLevel,
        draft: NodeDraft,
    ) -> ServiceResult<HierarchyNode> {
        let started_at = Instant::now();
        let result = self.create_node_inner(actor, level, draft);
        log_outcome("node_create", level, started_at, &result, |node| node.id);
        result
    }

    /// Replaces name and slug of one node.
    pub fn update_node(
        &self,
        actor: &Actor,
        level: HierarchyLevel,
        id: NodeId,
        changes: NodeChanges,
    ) -> ServiceResult<HierarchyNode> {
        let started_at = Instant::now();
        let result = self.update_node_inner(actor, level, id, changes);
        log_outcome("node_update", level, started_at, &result, |node| node.id);
        result
    }

    /// Loads one node.
    pub fn get_node(&self, level: HierarchyLevel, id: NodeId) -> ServiceResult<HierarchyNode> {
        self.repo
            .get_node(level, id)?
            .ok_or(HierarchyServiceError::NodeNotFound { level, id })
    }

    /// Lists siblings in display order.
    pub fn list_children(
        &self,
        level: HierarchyLevel,
        parent_id: Option<NodeId>,
    ) -> ServiceResult<Vec<HierarchyNode>> {
        Ok(self.repo.list_children(level, parent_id)?)
    }

    /// Lists one page of nodes, optionally restricted to one parent.
    ///
    /// `page` is 1-based; `limit` defaults to `DEFAULT_PAGE_LIMIT` and is
    /// capped at `MAX_PAGE_LIMIT`.
    pub fn list_page(
        &self,
        level: HierarchyLevel,
        parent_id: Option<NodeId>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> ServiceResult<NodePage> {
        let page = normalize_page(page);
        let limit = normalize_page_limit(limit);
        let total = self.repo.count_nodes(level, parent_id)?;
        let offset = (page - 1).saturating_mul(limit);
        let items = self.repo.list_page(
            level,
            &NodeListQuery {
                parent_id,
                limit,
                offset,
            },
        )?;
        Ok(NodePage {
            items,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(u64::from(limit)),
            },
        })
    }

    /// Number of children owned by one node; drives the delete guard in UIs.
    pub fn child_count(&self, level: HierarchyLevel, id: NodeId) -> ServiceResult<u64> {
        self.get_node(level, id)?;
        Ok(self.repo.child_count(level, id)?)
    }

    /// Moves one node a single step and returns the re-read sibling list.
    ///
    /// Moving past either end is a no-op.
    pub fn move_node(
        &self,
        actor: &Actor,
        level: HierarchyLevel,
        id: NodeId,
        direction: MoveDirection,
    ) -> ServiceResult<Vec<HierarchyNode>> {
        let started_at = Instant::now();
        let result = self.move_node_inner(actor, level, id, direction);
        log_outcome("node_move", level, started_at, &result, |_| id);
        if result.is_ok() {
            debug!(
                "event=node_move module=service status=ok level={level} node_id={id} direction={}",
                direction.as_str()
            );
        }
        result
    }

    /// Deletes one node that owns no children.
    pub fn delete_node(&self, actor: &Actor, level: HierarchyLevel, id: NodeId) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result = self.delete_node_inner(actor, level, id);
        log_outcome("node_delete", level, started_at, &result, |_| id);
        result
    }

    fn create_node_inner(
        &self,
        actor: &Actor,
        level: HierarchyLevel,
        draft: NodeDraft,
    ) -> ServiceResult<HierarchyNode> {
        validate_parent(level, draft.parent_id)?;
        let name = normalize_name(&draft.name)?;
        let slug = match draft.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => derive_slug(&name),
        };
        check_slug_format(&slug)?;

        ensure_authorized(actor)?;

        if !self.is_slug_available(level, &slug, None)? {
            return Err(HierarchyServiceError::SlugTaken { level, slug });
        }
        if let (Some(parent_level), Some(parent_id)) = (level.parent(), draft.parent_id) {
            if self.repo.get_node(parent_level, parent_id)?.is_none() {
                return Err(HierarchyServiceError::ParentNotFound {
                    level: parent_level,
                    id: parent_id,
                });
            }
        }

        let position = next_position(self.repo.max_position(level, draft.parent_id)?);
        let node = self.repo.create_node(
            level,
            &NewNode {
                parent_id: draft.parent_id,
                name,
                slug,
                position,
            },
        )?;
        Ok(node)
    }

    fn update_node_inner(
        &self,
        actor: &Actor,
        level: HierarchyLevel,
        id: NodeId,
        changes: NodeChanges,
    ) -> ServiceResult<HierarchyNode> {
        let name = normalize_name(&changes.name)?;
        let slug = changes.slug.trim().to_string();
        check_slug_format(&slug)?;

        ensure_authorized(actor)?;

        let current = self.get_node(level, id)?;
        if needs_availability_check(&slug, Some(current.slug.as_str()))
            && !self.is_slug_available(level, &slug, Some(id))?
        {
            return Err(HierarchyServiceError::SlugTaken { level, slug });
        }

        Ok(self.repo.update_node(level, id, &name, &slug)?)
    }

    fn move_node_inner(
        &self,
        actor: &Actor,
        level: HierarchyLevel,
        id: NodeId,
        direction: MoveDirection,
    ) -> ServiceResult<Vec<HierarchyNode>> {
        ensure_authorized(actor)?;

        let node = self.get_node(level, id)?;
        let siblings = self.repo.list_children(level, node.parent_id)?;
        let Some(mut swap) = plan_move(&siblings, id, direction) else {
            return Ok(siblings);
        };

        if swap.is_tie() {
            self.repo.resequence_children(level, node.parent_id)?;
            let resequenced = self.repo.list_children(level, node.parent_id)?;
            match plan_move(&resequenced, id, direction) {
                Some(replanned) => swap = replanned,
                None => return Ok(resequenced),
            }
        }

        self.repo.swap_positions(level, &swap)?;
        Ok(self.repo.list_children(level, node.parent_id)?)
    }

    fn delete_node_inner(
        &self,
        actor: &Actor,
        level: HierarchyLevel,
        id: NodeId,
    ) -> ServiceResult<()> {
        ensure_authorized(actor)?;

        self.get_node(level, id)?;
        let child_count = self.repo.child_count(level, id)?;
        if child_count > 0 {
            return Err(HierarchyServiceError::HasChildren {
                level,
                id,
                child_count,
            });
        }

        self.repo.delete_node(level, id)?;
        Ok(())
    }
}

/// Normalizes a 1-based page number.
pub fn normalize_page(page: Option<u32>) -> u32 {
    page.unwrap_or(1).max(1)
}

/// Normalizes a page size according to the list contract.
pub fn normalize_page_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => DEFAULT_PAGE_LIMIT,
        Some(value) if value > MAX_PAGE_LIMIT => MAX_PAGE_LIMIT,
        Some(value) => value,
    }
}

fn ensure_authorized(actor: &Actor) -> ServiceResult<()> {
    if authorize(&actor.role) {
        return Ok(());
    }
    Err(HierarchyServiceError::AccessDenied(actor.role.clone()))
}

fn log_outcome<T>(
    event: &'static str,
    level: HierarchyLevel,
    started_at: Instant,
    result: &ServiceResult<T>,
    node_id: impl FnOnce(&T) -> NodeId,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(value) => info!(
            "event={event} module=service status=ok level={level} node_id={} duration_ms={duration_ms}",
            node_id(value)
        ),
        Err(err) if err.kind() == ErrorKind::Store => error!(
            "event={event} module=service status=error level={level} duration_ms={duration_ms} error_code=store_failed error={err}"
        ),
        Err(err) => warn!(
            "event={event} module=service status=rejected level={level} duration_ms={duration_ms} kind={:?} error={err}",
            err.kind()
        ),
    }
}
