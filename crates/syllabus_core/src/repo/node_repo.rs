//! Hierarchy repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, ordered sibling reads, slug lookups and child counts over
//!   the five hierarchy tables.
//! - Keep SQL details and ordering behavior inside the repository boundary.
//!
//! # Invariants
//! - Sibling listing is deterministic: `position ASC, rowid ASC`, so equal
//!   positions keep insertion order.
//! - Rows with children are never deleted; the check runs inside the same
//!   immediate transaction as the delete.
//! - Position swaps are compare-and-swap: both rows must still hold the
//!   positions the caller planned from.
//! - Write paths validate rows before SQL mutations; read paths reject invalid
//!   persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::actor::ActorId;
use crate::model::node::{HierarchyLevel, HierarchyNode, NodeId, NodeValidationError};
use crate::policy::position::{resequence, PositionSwap};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NODE_COLUMNS: &str = "id, parent_id, name, slug, position, created_at, updated_at";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from hierarchy and identity repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Row failed field validation before or after storage.
    Validation(NodeValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist.
    NotFound { level: HierarchyLevel, id: NodeId },
    /// Another row of the same table already owns the slug.
    SlugTaken { level: HierarchyLevel, slug: String },
    /// Row still owns children and cannot be deleted.
    HasChildren {
        level: HierarchyLevel,
        id: NodeId,
        child_count: u64,
    },
    /// A planned swap no longer matches stored positions.
    PositionConflict { level: HierarchyLevel, id: NodeId },
    /// Referenced actor profile does not exist.
    ActorNotFound(ActorId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { level, id } => write!(f, "{level} row not found: {id}"),
            Self::SlugTaken { level, slug } => {
                write!(f, "slug `{slug}` is already used in {level}")
            }
            Self::HasChildren {
                level,
                id,
                child_count,
            } => write!(f, "{level} row {id} still owns {child_count} children"),
            Self::PositionConflict { level, id } => write!(
                f,
                "{level} row {id} changed position concurrently; reload and retry"
            ),
            Self::ActorNotFound(id) => write!(f, "actor profile not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "repository requires table `{table}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NodeValidationError> for RepoError {
    fn from(value: NodeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Insert payload; position is decided by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub parent_id: Option<NodeId>,
    pub name: String,
    pub slug: String,
    pub position: i64,
}

/// Paged listing options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeListQuery {
    /// Restrict to children of this parent; `None` lists the whole table.
    pub parent_id: Option<NodeId>,
    pub limit: u32,
    pub offset: u32,
}

/// Repository interface for the hierarchy store.
pub trait HierarchyRepository {
    /// Inserts one row and returns it as stored.
    fn create_node(&self, level: HierarchyLevel, node: &NewNode) -> RepoResult<HierarchyNode>;
    /// Replaces name and slug of one row and returns it as stored.
    fn update_node(
        &self,
        level: HierarchyLevel,
        id: NodeId,
        name: &str,
        slug: &str,
    ) -> RepoResult<HierarchyNode>;
    /// Loads one row by id.
    fn get_node(&self, level: HierarchyLevel, id: NodeId) -> RepoResult<Option<HierarchyNode>>;
    /// Lists siblings under one parent (`None` for root-level exams) in display order.
    fn list_children(
        &self,
        level: HierarchyLevel,
        parent_id: Option<NodeId>,
    ) -> RepoResult<Vec<HierarchyNode>>;
    /// Lists one page of rows in display order.
    fn list_page(&self, level: HierarchyLevel, query: &NodeListQuery)
        -> RepoResult<Vec<HierarchyNode>>;
    /// Counts rows, optionally restricted to one parent.
    fn count_nodes(&self, level: HierarchyLevel, parent_id: Option<NodeId>) -> RepoResult<u64>;
    /// Returns the id of the row owning `slug`, if any.
    fn slug_owner(&self, level: HierarchyLevel, slug: &str) -> RepoResult<Option<NodeId>>;
    /// Highest sibling position under one parent.
    fn max_position(
        &self,
        level: HierarchyLevel,
        parent_id: Option<NodeId>,
    ) -> RepoResult<Option<i64>>;
    /// Number of rows in the child level owned by `id`.
    fn child_count(&self, level: HierarchyLevel, id: NodeId) -> RepoResult<u64>;
    /// Atomically exchanges two sibling positions.
    fn swap_positions(&self, level: HierarchyLevel, swap: &PositionSwap) -> RepoResult<()>;
    /// Rewrites sibling positions to `0..n` in current display order.
    fn resequence_children(
        &self,
        level: HierarchyLevel,
        parent_id: Option<NodeId>,
    ) -> RepoResult<()>;
    /// Deletes one childless row.
    fn delete_node(&self, level: HierarchyLevel, id: NodeId) -> RepoResult<()>;
}

/// SQLite-backed hierarchy repository.
pub struct SqliteHierarchyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHierarchyRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let tables = HierarchyLevel::ALL.map(HierarchyLevel::table);
        ensure_connection_ready(conn, &tables)?;
        Ok(Self { conn })
    }
}

impl HierarchyRepository for SqliteHierarchyRepository<'_> {
    fn create_node(&self, level: HierarchyLevel, node: &NewNode) -> RepoResult<HierarchyNode> {
        let id = Uuid::new_v4();
        let candidate = HierarchyNode {
            id,
            level,
            parent_id: node.parent_id,
            name: node.name.clone(),
            slug: node.slug.clone(),
            position: node.position,
            created_at: 0,
            updated_at: 0,
        };
        candidate.validate()?;

        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (id, parent_id, name, slug, position)
                     VALUES (?1, ?2, ?3, ?4, ?5);",
                    level.table()
                ),
                params![
                    id.to_string(),
                    node.parent_id.map(|value| value.to_string()),
                    node.name.as_str(),
                    node.slug.as_str(),
                    node.position,
                ],
            )
            .map_err(|err| map_write_error(level, &node.slug, err))?;

        load_required_node(self.conn, level, id)
    }

    fn update_node(
        &self,
        level: HierarchyLevel,
        id: NodeId,
        name: &str,
        slug: &str,
    ) -> RepoResult<HierarchyNode> {
        let mut candidate = load_required_node(self.conn, level, id)?;
        candidate.name = name.to_string();
        candidate.slug = slug.to_string();
        candidate.validate()?;

        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE {}
                     SET name = ?2,
                         slug = ?3,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE id = ?1;",
                    level.table()
                ),
                params![id.to_string(), name, slug],
            )
            .map_err(|err| map_write_error(level, slug, err))?;
        if changed == 0 {
            return Err(RepoError::NotFound { level, id });
        }

        load_required_node(self.conn, level, id)
    }

    fn get_node(&self, level: HierarchyLevel, id: NodeId) -> RepoResult<Option<HierarchyNode>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE id = ?1;",
            level.table()
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(level, row)?));
        }
        Ok(None)
    }

    fn list_children(
        &self,
        level: HierarchyLevel,
        parent_id: Option<NodeId>,
    ) -> RepoResult<Vec<HierarchyNode>> {
        list_children_in(self.conn, level, parent_id)
    }

    fn list_page(
        &self,
        level: HierarchyLevel,
        query: &NodeListQuery,
    ) -> RepoResult<Vec<HierarchyNode>> {
        let mut sql = format!("SELECT {NODE_COLUMNS} FROM {} WHERE 1 = 1", level.table());
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(parent_id) = query.parent_id {
            sql.push_str(" AND parent_id = ?");
            bind_values.push(Value::Text(parent_id.to_string()));
        }

        sql.push_str(" ORDER BY position ASC, rowid ASC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.limit)));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_node_row(level, row)?);
        }
        Ok(items)
    }

    fn count_nodes(&self, level: HierarchyLevel, parent_id: Option<NodeId>) -> RepoResult<u64> {
        let count: i64 = match parent_id {
            Some(parent_id) => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE parent_id = ?1;", level.table()),
                [parent_id.to_string()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {};", level.table()),
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count.max(0) as u64)
    }

    fn slug_owner(&self, level: HierarchyLevel, slug: &str) -> RepoResult<Option<NodeId>> {
        let owner: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT id FROM {} WHERE slug = ?1;", level.table()),
                [slug],
                |row| row.get(0),
            )
            .optional()?;
        owner
            .map(|value| parse_uuid(&value, level, "id"))
            .transpose()
    }

    fn max_position(
        &self,
        level: HierarchyLevel,
        parent_id: Option<NodeId>,
    ) -> RepoResult<Option<i64>> {
        let max = self.conn.query_row(
            &format!(
                "SELECT MAX(position) FROM {} WHERE parent_id IS ?1;",
                level.table()
            ),
            [parent_id.map(|value| value.to_string())],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(max)
    }

    fn child_count(&self, level: HierarchyLevel, id: NodeId) -> RepoResult<u64> {
        child_count_in(self.conn, level, id)
    }

    fn swap_positions(&self, level: HierarchyLevel, swap: &PositionSwap) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let sql = format!(
            "UPDATE {}
             SET position = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND position = ?2;",
            level.table()
        );

        let moved = tx.execute(
            &sql,
            params![
                swap.moving_id.to_string(),
                swap.moving_position,
                swap.neighbor_position,
            ],
        )?;
        if moved == 0 {
            return Err(RepoError::PositionConflict {
                level,
                id: swap.moving_id,
            });
        }

        let displaced = tx.execute(
            &sql,
            params![
                swap.neighbor_id.to_string(),
                swap.neighbor_position,
                swap.moving_position,
            ],
        )?;
        if displaced == 0 {
            return Err(RepoError::PositionConflict {
                level,
                id: swap.neighbor_id,
            });
        }

        tx.commit()?;
        Ok(())
    }

    fn resequence_children(
        &self,
        level: HierarchyLevel,
        parent_id: Option<NodeId>,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let siblings = list_children_in(&tx, level, parent_id)?;
        let sql = format!(
            "UPDATE {}
             SET position = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND position != ?2;",
            level.table()
        );
        for (id, position) in resequence(&siblings) {
            tx.execute(&sql, params![id.to_string(), position])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_node(&self, level: HierarchyLevel, id: NodeId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let child_count = child_count_in(&tx, level, id)?;
        if child_count > 0 {
            return Err(RepoError::HasChildren {
                level,
                id,
                child_count,
            });
        }

        let changed = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", level.table()),
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { level, id });
        }

        tx.commit()?;
        Ok(())
    }
}

fn load_required_node(
    conn: &Connection,
    level: HierarchyLevel,
    id: NodeId,
) -> RepoResult<HierarchyNode> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS} FROM {} WHERE id = ?1;",
        level.table()
    ))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_node_row(level, row);
    }
    Err(RepoError::NotFound { level, id })
}

fn list_children_in(
    conn: &Connection,
    level: HierarchyLevel,
    parent_id: Option<NodeId>,
) -> RepoResult<Vec<HierarchyNode>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS}
         FROM {}
         WHERE parent_id IS ?1
         ORDER BY position ASC, rowid ASC;",
        level.table()
    ))?;
    let mut rows = stmt.query([parent_id.map(|value| value.to_string())])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_node_row(level, row)?);
    }
    Ok(items)
}

fn child_count_in(conn: &Connection, level: HierarchyLevel, id: NodeId) -> RepoResult<u64> {
    let Some(child_level) = level.child() else {
        return Ok(0);
    };
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE parent_id = ?1;",
            child_level.table()
        ),
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Maps constraint failures on insert/update to semantic errors.
fn map_write_error(level: HierarchyLevel, slug: &str, err: rusqlite::Error) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation
            && message.contains("UNIQUE")
            && message.contains(".slug")
        {
            return RepoError::SlugTaken {
                level,
                slug: slug.to_string(),
            };
        }
    }
    err.into()
}

fn parse_node_row(level: HierarchyLevel, row: &Row<'_>) -> RepoResult<HierarchyNode> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, level, "id")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, level, "parent_id"))
        .transpose()?;

    let node = HierarchyNode {
        id,
        level,
        parent_id,
        name: row.get("name")?,
        slug: row.get("slug")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    node.validate()
        .map_err(|err| RepoError::InvalidData(format!("{} row {id}: {err}", level.table())))?;
    Ok(node)
}

fn parse_uuid(value: &str, level: HierarchyLevel, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid `{value}` in {}.{column}",
            level.table()
        ))
    })
}

/// Rejects connections that were not opened through `db::open_db*`.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}
