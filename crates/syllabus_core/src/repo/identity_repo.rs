//! Identity collaborator contract and SQLite implementation.
//!
//! # Responsibility
//! - Resolve the current actor `{id, role}` once per page load.
//! - Terminate a session when the role gate denies it.
//!
//! # Invariants
//! - Actors are read-only here except for registration helpers used by
//!   operators and tests.
//! - A terminated session never resolves to an actor again.

use crate::model::actor::{Actor, ActorId, Role};
use crate::repo::node_repo::{ensure_connection_ready, RepoError, RepoResult};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Identity provider as seen by the role gate.
pub trait IdentityProvider {
    /// Signed-in actor for the current session, if any.
    fn current_actor(&self) -> RepoResult<Option<Actor>>;
    /// Ends the current session.
    fn terminate_session(&self) -> RepoResult<()>;
}

/// SQLite-backed actor directory over `profiles` and `sessions`.
pub struct SqliteActorDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActorDirectory<'conn> {
    /// Creates directory from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["profiles", "sessions"])?;
        Ok(Self { conn })
    }

    /// Registers a new actor profile with `role`.
    pub fn register_actor(&self, role: &Role) -> RepoResult<Actor> {
        let actor = Actor::new(Uuid::new_v4(), role.clone());
        self.conn.execute(
            "INSERT INTO profiles (id, role) VALUES (?1, ?2);",
            params![actor.id.to_string(), role.as_str()],
        )?;
        info!(
            "event=actor_register module=identity status=ok actor_id={} role={}",
            actor.id, actor.role
        );
        Ok(actor)
    }

    /// Loads one actor profile.
    pub fn get_actor(&self, id: ActorId) -> RepoResult<Option<Actor>> {
        let role: Option<String> = self
            .conn
            .query_row(
                "SELECT role FROM profiles WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(role.map(|role| Actor::new(id, Role::parse(&role))))
    }

    /// Opens a session for an existing actor and returns its token.
    pub fn open_session(&self, actor_id: ActorId) -> RepoResult<String> {
        if self.get_actor(actor_id)?.is_none() {
            return Err(RepoError::ActorNotFound(actor_id));
        }
        let token = Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "INSERT INTO sessions (token, actor_id) VALUES (?1, ?2);",
            params![token, actor_id.to_string()],
        )?;
        Ok(token)
    }

    /// Binds an identity provider to one session token.
    pub fn session(&self, token: impl Into<String>) -> SqliteSession<'conn> {
        SqliteSession {
            conn: self.conn,
            token: token.into(),
        }
    }
}

/// Identity provider scoped to one session token.
pub struct SqliteSession<'conn> {
    conn: &'conn Connection,
    token: String,
}

impl IdentityProvider for SqliteSession<'_> {
    fn current_actor(&self) -> RepoResult<Option<Actor>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT p.id, p.role
                 FROM sessions s
                 INNER JOIN profiles p ON p.id = s.actor_id
                 WHERE s.token = ?1;",
                [self.token.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id_text, role)) = row else {
            return Ok(None);
        };
        let id = Uuid::parse_str(&id_text).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid `{id_text}` in profiles.id"))
        })?;
        Ok(Some(Actor::new(id, Role::parse(&role))))
    }

    fn terminate_session(&self) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM sessions WHERE token = ?1;",
            [self.token.as_str()],
        )?;
        info!("event=session_terminate module=identity status=ok");
        Ok(())
    }
}
