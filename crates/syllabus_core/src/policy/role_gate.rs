//! Role gate for page loads and mutations.
//!
//! # Responsibility
//! - Decide whether an actor may use the admin editors.
//! - Resolve the current actor once per page load and return a typed outcome
//!   instead of letting every page re-implement the check.
//!
//! # Invariants
//! - Only `superadmin`, `admin` and `teacher` are authorized.
//! - A denied actor always has its session terminated before the redirect.
//! - This is a caller-side gate; storage-facing surfaces enforce it again.

use crate::model::actor::{Actor, Role};
use crate::repo::identity_repo::IdentityProvider;
use crate::repo::node_repo::RepoResult;
use log::{info, warn};
use std::time::Duration;

/// Roles allowed to create, edit, reorder and delete hierarchy nodes.
pub const PRIVILEGED_ROLES: [Role; 3] = [Role::Superadmin, Role::Admin, Role::Teacher];

/// Delay before the access-denied notice forwards to the login page.
pub const ACCESS_DENIED_REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// Returns true iff `role` may use the editors.
pub fn authorize(role: &Role) -> bool {
    PRIVILEGED_ROLES.contains(role)
}

/// Where a rejected page load is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Nobody is signed in.
    Login,
    /// Signed in without a privileged role; forwards to login after the delay.
    AccessDenied { login_after: Duration },
}

impl RedirectTarget {
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::AccessDenied { .. } => "/unauthorized",
        }
    }
}

/// Result of gating one page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Authorized { actor: Actor },
    Redirect { target: RedirectTarget },
}

impl GateOutcome {
    pub fn actor(&self) -> Option<&Actor> {
        match self {
            Self::Authorized { actor } => Some(actor),
            Self::Redirect { .. } => None,
        }
    }
}

/// Gates one page load against the identity collaborator.
///
/// # Side effects
/// - One identity lookup.
/// - Terminates the session when the actor is not privileged. A failure to
///   terminate is logged and the denial still stands.
pub fn guard_page<I>(identity: &I) -> RepoResult<GateOutcome>
where
    I: IdentityProvider + ?Sized,
{
    let Some(actor) = identity.current_actor()? else {
        info!("event=role_gate module=policy status=redirect reason=no_session");
        return Ok(GateOutcome::Redirect {
            target: RedirectTarget::Login,
        });
    };

    if authorize(&actor.role) {
        return Ok(GateOutcome::Authorized { actor });
    }

    if let Err(err) = identity.terminate_session() {
        warn!(
            "event=role_gate module=policy status=error actor_id={} error_code=session_terminate_failed error={}",
            actor.id, err
        );
    }
    info!(
        "event=role_gate module=policy status=denied actor_id={} role={}",
        actor.id, actor.role
    );
    Ok(GateOutcome::Redirect {
        target: RedirectTarget::AccessDenied {
            login_after: ACCESS_DENIED_REDIRECT_DELAY,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::{authorize, guard_page, GateOutcome, RedirectTarget};
    use crate::model::actor::{Actor, Role};
    use crate::repo::identity_repo::IdentityProvider;
    use crate::repo::node_repo::RepoResult;
    use std::cell::Cell;
    use uuid::Uuid;

    struct FixedIdentity {
        actor: Option<Actor>,
        terminated: Cell<bool>,
    }

    impl IdentityProvider for FixedIdentity {
        fn current_actor(&self) -> RepoResult<Option<Actor>> {
            if self.terminated.get() {
                return Ok(None);
            }
            Ok(self.actor.clone())
        }

        fn terminate_session(&self) -> RepoResult<()> {
            self.terminated.set(true);
            Ok(())
        }
    }

    fn identity(role: Option<Role>) -> FixedIdentity {
        FixedIdentity {
            actor: role.map(|role| Actor::new(Uuid::new_v4(), role)),
            terminated: Cell::new(false),
        }
    }

    #[test]
    fn authorize_allows_only_privileged_roles() {
        assert!(authorize(&Role::Superadmin));
        assert!(authorize(&Role::Admin));
        assert!(authorize(&Role::Teacher));
        assert!(!authorize(&Role::Other("student".to_string())));
        assert!(!authorize(&Role::parse("student")));
        assert!(!authorize(&Role::parse("")));
        assert!(authorize(&Role::parse("Teacher")));
    }

    #[test]
    fn guard_page_redirects_to_login_without_session() {
        let identity = identity(None);
        let outcome = guard_page(&identity).unwrap();
        assert_eq!(
            outcome,
            GateOutcome::Redirect {
                target: RedirectTarget::Login
            }
        );
    }

    #[test]
    fn guard_page_denies_and_terminates_unprivileged_session() {
        let identity = identity(Some(Role::Other("student".to_string())));
        let outcome = guard_page(&identity).unwrap();

        match outcome {
            GateOutcome::Redirect { target } => {
                assert_eq!(target.path(), "/unauthorized");
                assert!(matches!(target, RedirectTarget::AccessDenied { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(identity.terminated.get());
    }

    #[test]
    fn guard_page_returns_actor_for_privileged_role() {
        let identity = identity(Some(Role::Teacher));
        let outcome = guard_page(&identity).unwrap();
        assert_eq!(outcome.actor().map(|a| &a.role), Some(&Role::Teacher));
        assert!(!identity.terminated.get());
    }
}
