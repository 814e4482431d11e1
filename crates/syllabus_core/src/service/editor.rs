//! Create/edit page state machine.
//!
//! # Responsibility
//! - Track one editor page through
//!   `Loading -> Ready -> Submitting -> {Succeeded | Ready with error}`.
//! - Run client-side field validation so invalid forms never reach the store.
//! - Own the slug availability tracker for the page.
//!
//! # Invariants
//! - The initial phase is always `Loading`.
//! - Submissions are accepted only from `Ready`.
//! - `Succeeded` and `Redirected` are terminal.

use crate::model::node::{
    normalize_name, validate_parent, HierarchyLevel, NodeField, NodeId, NodeValidationError,
};
use crate::policy::role_gate::{GateOutcome, RedirectTarget};
use crate::policy::slug::{
    check_slug_format, needs_availability_check, SlugCheckTicket, SlugCheckTracker,
};
use crate::service::hierarchy_service::{ErrorKind, HierarchyServiceError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Editor page lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    /// Verifying the actor and fetching data.
    Loading,
    /// Form is interactive.
    Ready,
    /// Waiting for the store to answer a submit.
    Submitting,
    /// Saved; the page navigates away.
    Succeeded,
    /// Gate rejected the actor; the page navigates away.
    Redirected(RedirectTarget),
}

/// Form values as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeForm {
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub slug: String,
}

/// One inline error shown next to a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: NodeField,
    pub message: String,
}

impl From<&NodeValidationError> for FieldError {
    fn from(value: &NodeValidationError) -> Self {
        Self {
            field: value.field(),
            message: value.to_string(),
        }
    }
}

/// Illegal editor transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// Transition requested from the wrong phase.
    InvalidTransition {
        from: EditorPhase,
        action: &'static str,
    },
    /// Submit blocked by field errors.
    Invalid(Vec<FieldError>),
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, action } => {
                write!(f, "cannot {action} while editor is {from:?}")
            }
            Self::Invalid(errors) => write!(f, "form has {} invalid field(s)", errors.len()),
        }
    }
}

impl Error for EditorError {}

/// Validates every field of a form and returns all inline errors at once.
pub fn validate_node_form(level: HierarchyLevel, form: &NodeForm) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Err(err) = validate_parent(level, form.parent_id) {
        errors.push(FieldError::from(&err));
    }
    if let Err(err) = normalize_name(&form.name) {
        errors.push(FieldError::from(&err));
    }
    if let Err(err) = check_slug_format(form.slug.trim()) {
        errors.push(FieldError::from(&err));
    }
    errors
}

/// State of one create or edit page.
#[derive(Debug)]
pub struct EditorSession {
    level: HierarchyLevel,
    phase: EditorPhase,
    /// Slug of the row being edited; `None` on create pages.
    original_slug: Option<String>,
    field_errors: Vec<FieldError>,
    alert: Option<String>,
    slug_checks: SlugCheckTracker,
}

impl EditorSession {
    /// Create page for `level`.
    pub fn for_create(level: HierarchyLevel) -> Self {
        Self::new(level, None)
    }

    /// Edit page for a row currently stored with `original_slug`.
    pub fn for_edit(level: HierarchyLevel, original_slug: impl Into<String>) -> Self {
        Self::new(level, Some(original_slug.into()))
    }

    fn new(level: HierarchyLevel, original_slug: Option<String>) -> Self {
        Self {
            level,
            phase: EditorPhase::Loading,
            original_slug,
            field_errors: Vec::new(),
            alert: None,
            slug_checks: SlugCheckTracker::new(),
        }
    }

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Generic alert text for non-field failures.
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    /// Applies the role gate result. Denied actors end the page.
    pub fn apply_gate(&mut self, outcome: &GateOutcome) -> Result<(), EditorError> {
        self.expect_phase(EditorPhase::Loading, "apply gate")?;
        if let GateOutcome::Redirect { target } = outcome {
            self.phase = EditorPhase::Redirected(*target);
        }
        Ok(())
    }

    /// Page data arrived; the form becomes interactive.
    pub fn loaded(&mut self) -> Result<(), EditorError> {
        self.expect_phase(EditorPhase::Loading, "finish loading")?;
        self.phase = EditorPhase::Ready;
        Ok(())
    }

    /// Slug field changed. Returns a ticket when a store lookup should run.
    pub fn slug_changed(&mut self, slug: &str) -> Option<SlugCheckTicket> {
        let ticket = self.slug_checks.begin(slug)?;
        if !needs_availability_check(slug, self.original_slug.as_deref()) {
            self.slug_checks.complete(&ticket, true);
            return None;
        }
        Some(ticket)
    }

    /// Lookup result for `ticket`. Stale results are ignored.
    pub fn slug_checked(&mut self, ticket: &SlugCheckTicket, available: bool) -> bool {
        self.slug_checks.complete(ticket, available)
    }

    /// Latest known availability of `slug`; `None` while unknown.
    pub fn slug_available(&self, slug: &str) -> Option<bool> {
        if self.original_slug.as_deref() == Some(slug) {
            return Some(true);
        }
        self.slug_checks
            .latest()
            .filter(|result| result.slug == slug)
            .map(|result| result.available)
    }

    /// Validates `form` and enters `Submitting` when it is clean.
    ///
    /// On failure the page stays `Ready` and the errors are kept for display.
    pub fn begin_submit(&mut self, form: &NodeForm) -> Result<(), EditorError> {
        self.expect_phase(EditorPhase::Ready, "submit")?;
        self.alert = None;

        let mut errors = validate_node_form(self.level, form);
        let slug = form.slug.trim();
        if !errors.iter().any(|err| err.field == NodeField::Slug)
            && self.slug_available(slug) == Some(false)
        {
            errors.push(FieldError {
                field: NodeField::Slug,
                message: format!("slug `{slug}` is already taken"),
            });
        }

        if !errors.is_empty() {
            self.field_errors = errors.clone();
            return Err(EditorError::Invalid(errors));
        }

        self.field_errors.clear();
        self.phase = EditorPhase::Submitting;
        Ok(())
    }

    /// Applies the store's answer to a submit.
    pub fn finish_submit<T>(
        &mut self,
        result: &Result<T, HierarchyServiceError>,
    ) -> Result<(), EditorError> {
        self.expect_phase(EditorPhase::Submitting, "finish submit")?;
        let err = match result {
            Ok(_) => {
                self.phase = EditorPhase::Succeeded;
                return Ok(());
            }
            Err(err) => err,
        };

        match (err.kind(), err.field()) {
            (ErrorKind::Authorization, _) => {
                self.phase = EditorPhase::Redirected(RedirectTarget::AccessDenied {
                    login_after: crate::policy::role_gate::ACCESS_DENIED_REDIRECT_DELAY,
                });
                return Ok(());
            }
            (_, Some(field)) => {
                self.field_errors = vec![FieldError {
                    field,
                    message: err.user_message(),
                }];
            }
            (_, None) => self.alert = Some(err.user_message()),
        }
        self.phase = EditorPhase::Ready;
        Ok(())
    }

    fn expect_phase(&self, expected: EditorPhase, action: &'static str) -> Result<(), EditorError> {
        if self.phase != expected {
            return Err(EditorError::InvalidTransition {
                from: self.phase,
                action,
            });
        }
        Ok(())
    }
}
