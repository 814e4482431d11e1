//! Slug derivation and availability tracking.
//!
//! # Invariants
//! - `derive_slug` is pure and idempotent.
//! - Derived slugs never exceed `SLUG_MAX_CHARS` and never start or end with `-`.
//! - A `SlugCheckTracker` only accepts the result of its most recent check.

use crate::model::node::{NodeValidationError, SLUG_MAX_CHARS, SLUG_MIN_CHARS};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

static DISALLOWED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid disallowed-char regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static HYPHEN_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("valid hyphen regex"));
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("valid slug regex"));

/// Derives a URL-safe slug from a human-readable name.
///
/// Rules, in order:
/// - lowercase;
/// - drop characters outside `[a-z0-9\s-]`;
/// - whitespace runs become one hyphen, hyphen runs collapse to one;
/// - edge hyphens are trimmed;
/// - the result is cut to `SLUG_MAX_CHARS` and trimmed again.
pub fn derive_slug(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = DISALLOWED_RE.replace_all(&lowered, "");
    let hyphenated = WHITESPACE_RE.replace_all(&stripped, "-");
    let collapsed = HYPHEN_RUN_RE.replace_all(&hyphenated, "-");
    let truncated: String = collapsed
        .trim_matches('-')
        .chars()
        .take(SLUG_MAX_CHARS)
        .collect();
    truncated.trim_end_matches('-').to_string()
}

/// Checks slug shape only. Availability is checked separately.
pub fn check_slug_format(slug: &str) -> Result<(), NodeValidationError> {
    if slug.is_empty() {
        return Err(NodeValidationError::EmptySlug);
    }
    let actual = slug.chars().count();
    if actual < SLUG_MIN_CHARS {
        return Err(NodeValidationError::SlugTooShort {
            min: SLUG_MIN_CHARS,
            actual,
        });
    }
    if actual > SLUG_MAX_CHARS {
        return Err(NodeValidationError::SlugTooLong {
            max: SLUG_MAX_CHARS,
            actual,
        });
    }
    if !SLUG_RE.is_match(slug) {
        return Err(NodeValidationError::SlugInvalidCharacters(slug.to_string()));
    }
    Ok(())
}

/// Whether a store lookup is worth issuing for `slug`.
///
/// Slugs shorter than `SLUG_MIN_CHARS` are never looked up, and a slug equal
/// to the one being edited is trivially available.
pub fn needs_availability_check(slug: &str, original: Option<&str>) -> bool {
    slug.chars().count() >= SLUG_MIN_CHARS && original != Some(slug)
}

/// Handle for one in-flight availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugCheckTicket {
    generation: u64,
    slug: String,
}

impl SlugCheckTicket {
    pub fn slug(&self) -> &str {
        self.slug.as_str()
    }
}

/// Accepted availability result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugCheckResult {
    pub slug: String,
    pub available: bool,
}

/// Last-request-wins guard for asynchronous slug availability checks.
///
/// Every slug edit calls [`SlugCheckTracker::begin`]; a result reported for
/// any ticket except the newest one is discarded.
#[derive(Debug, Default)]
pub struct SlugCheckTracker {
    latest_generation: AtomicU64,
    latest_result: Mutex<Option<SlugCheckResult>>,
}

impl SlugCheckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a check for `slug`, superseding every earlier ticket.
    ///
    /// Returns `None` when the slug is too short to be checked; the previous
    /// result is cleared either way.
    pub fn begin(&self, slug: &str) -> Option<SlugCheckTicket> {
        let mut result = self.lock_result();
        *result = None;
        let generation = self.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if slug.chars().count() < SLUG_MIN_CHARS {
            return None;
        }
        Some(SlugCheckTicket {
            generation,
            slug: slug.to_string(),
        })
    }

    /// Whether `ticket` is still the newest check.
    pub fn is_current(&self, ticket: &SlugCheckTicket) -> bool {
        self.latest_generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Records the outcome of `ticket`. Returns `false` for stale tickets.
    pub fn complete(&self, ticket: &SlugCheckTicket, available: bool) -> bool {
        let mut result = self.lock_result();
        if !self.is_current(ticket) {
            return false;
        }
        *result = Some(SlugCheckResult {
            slug: ticket.slug.clone(),
            available,
        });
        true
    }

    /// Latest accepted result, if the newest check has completed.
    pub fn latest(&self) -> Option<SlugCheckResult> {
        self.lock_result().clone()
    }

    fn lock_result(&self) -> std::sync::MutexGuard<'_, Option<SlugCheckResult>> {
        self.latest_result
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
