//! Hierarchy node domain model.
//!
//! # Responsibility
//! - Define the canonical row shared by every hierarchy level.
//! - Validate field-level invariants before anything reaches storage.
//!
//! # Invariants
//! - `name` is non-blank and at most `NAME_MAX_CHARS` characters.
//! - `slug` matches `[a-z0-9-]+` and is `SLUG_MIN_CHARS..=SLUG_MAX_CHARS` long.
//! - `position` is non-negative.
//! - `parent_id` is `None` exactly when `level == HierarchyLevel::Exam`.

use crate::policy::slug::check_slug_format;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one hierarchy row.
pub type NodeId = Uuid;

pub const NAME_MAX_CHARS: usize = 100;
pub const SLUG_MIN_CHARS: usize = 2;
pub const SLUG_MAX_CHARS: usize = 50;

/// One level of the content hierarchy. Each level is its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Exam,
    Subject,
    Chapter,
    Topic,
    FormulaCard,
}

impl HierarchyLevel {
    pub const ALL: [HierarchyLevel; 5] = [
        Self::Exam,
        Self::Subject,
        Self::Chapter,
        Self::Topic,
        Self::FormulaCard,
    ];

    /// Storage table name; also used as the HTTP path segment.
    pub fn table(self) -> &'static str {
        match self {
            Self::Exam => "exams",
            Self::Subject => "subjects",
            Self::Chapter => "chapters",
            Self::Topic => "topics",
            Self::FormulaCard => "formula_cards",
        }
    }

    /// Parses a table name back into a level.
    pub fn from_table(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.table() == value)
    }

    /// Level whose rows own rows of this level.
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Exam => None,
            Self::Subject => Some(Self::Exam),
            Self::Chapter => Some(Self::Subject),
            Self::Topic => Some(Self::Chapter),
            Self::FormulaCard => Some(Self::Topic),
        }
    }

    /// Level owned by rows of this level.
    pub fn child(self) -> Option<Self> {
        match self {
            Self::Exam => Some(Self::Subject),
            Self::Subject => Some(Self::Chapter),
            Self::Chapter => Some(Self::Topic),
            Self::Topic => Some(Self::FormulaCard),
            Self::FormulaCard => None,
        }
    }

    pub fn requires_parent(self) -> bool {
        self.parent().is_some()
    }
}

impl Display for HierarchyLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Persisted hierarchy row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: NodeId,
    pub level: HierarchyLevel,
    /// `None` only for exams.
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub slug: String,
    /// Display rank among siblings, ascending.
    pub position: i64,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

impl HierarchyNode {
    /// Validates field invariants of a row read from or written to storage.
    pub fn validate(&self) -> Result<(), NodeValidationError> {
        validate_parent(self.level, self.parent_id)?;
        validate_name(&self.name)?;
        check_slug_format(&self.slug)?;
        if self.position < 0 {
            return Err(NodeValidationError::NegativePosition(self.position));
        }
        Ok(())
    }
}

/// Create request for one node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeDraft {
    pub parent_id: Option<NodeId>,
    pub name: String,
    /// Derived from `name` when absent or blank.
    pub slug: Option<String>,
}

/// Edit request for one node. Parent and position are not editable here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeChanges {
    pub name: String,
    pub slug: String,
}

/// Form field a validation error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeField {
    Name,
    Slug,
    Parent,
    Position,
}

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValidationError {
    EmptyName,
    NameTooLong { max: usize, actual: usize },
    EmptySlug,
    SlugTooShort { min: usize, actual: usize },
    SlugTooLong { max: usize, actual: usize },
    /// Slug contains characters outside `[a-z0-9-]`.
    SlugInvalidCharacters(String),
    /// Level requires a parent but none was given.
    MissingParent(HierarchyLevel),
    /// Root level was given a parent.
    UnexpectedParent(HierarchyLevel),
    NegativePosition(i64),
}

impl NodeValidationError {
    pub fn field(&self) -> NodeField {
        match self {
            Self::EmptyName | Self::NameTooLong { .. } => NodeField::Name,
            Self::EmptySlug
            | Self::SlugTooShort { .. }
            | Self::SlugTooLong { .. }
            | Self::SlugInvalidCharacters(_) => NodeField::Slug,
            Self::MissingParent(_) | Self::UnexpectedParent(_) => NodeField::Parent,
            Self::NegativePosition(_) => NodeField::Position,
        }
    }
}

impl Display for NodeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name is required"),
            Self::NameTooLong { max, actual } => {
                write!(f, "name must be at most {max} characters, got {actual}")
            }
            Self::EmptySlug => write!(f, "slug is required"),
            Self::SlugTooShort { min, actual } => {
                write!(f, "slug must be at least {min} characters, got {actual}")
            }
            Self::SlugTooLong { max, actual } => {
                write!(f, "slug must be at most {max} characters, got {actual}")
            }
            Self::SlugInvalidCharacters(slug) => write!(
                f,
                "slug `{slug}` may only contain lowercase letters, numbers and hyphens"
            ),
            Self::MissingParent(level) => write!(f, "{level} require a parent"),
            Self::UnexpectedParent(level) => write!(f, "{level} cannot have a parent"),
            Self::NegativePosition(value) => {
                write!(f, "position must be non-negative, got {value}")
            }
        }
    }
}

impl Error for NodeValidationError {}

/// Trims and checks a human-readable name.
pub fn normalize_name(value: &str) -> Result<String, NodeValidationError> {
    let trimmed = value.trim();
    validate_name(trimmed)?;
    Ok(trimmed.to_string())
}

fn validate_name(value: &str) -> Result<(), NodeValidationError> {
    if value.trim().is_empty() {
        return Err(NodeValidationError::EmptyName);
    }
    let actual = value.chars().count();
    if actual > NAME_MAX_CHARS {
        return Err(NodeValidationError::NameTooLong {
            max: NAME_MAX_CHARS,
            actual,
        });
    }
    Ok(())
}

/// Checks that parent presence matches the level.
pub fn validate_parent(
    level: HierarchyLevel,
    parent_id: Option<NodeId>,
) -> Result<(), NodeValidationError> {
    match (level.requires_parent(), parent_id) {
        (true, None) => Err(NodeValidationError::MissingParent(level)),
        (false, Some(_)) => Err(NodeValidationError::UnexpectedParent(level)),
        _ => Ok(()),
    }
}
