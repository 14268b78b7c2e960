use std::path::Path;

use hierarchy_core::{
    Backend, Depth, Error, Node, NodeId, NodeLookup, NodeStore, Relationship, RelationshipIndex,
    RelationshipLookup, Result, UnitOfWork,
};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::debug;

use crate::schema::ensure_schema;

const RELATIONSHIP_COLUMNS: &str = "SELECT r.seq, a.id, a.name, d.id, d.name, r.depth
     FROM hierarchy_relationships r
     JOIN hierarchy_nodes a ON a.id = r.ancestor
     JOIN hierarchy_nodes d ON d.id = r.descendant";

fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn row_to_node(row: &Row) -> rusqlite::Result<Node> {
    Ok(Node::new(NodeId(row.get(0)?), row.get::<_, String>(1)?))
}

fn row_to_relationship(row: &Row) -> rusqlite::Result<Relationship> {
    Ok(Relationship {
        seq: row.get(0)?,
        ancestor: Node::new(NodeId(row.get(1)?), row.get::<_, String>(2)?),
        descendant: Node::new(NodeId(row.get(3)?), row.get::<_, String>(4)?),
        depth: row.get(5)?,
    })
}

fn select_relationships(
    conn: &Connection,
    filter: &str,
    arg: Option<i64>,
) -> Result<Vec<Relationship>> {
    let sql = format!("{RELATIONSHIP_COLUMNS} {filter} ORDER BY r.seq ASC");
    let mut stmt = conn.prepare_cached(&sql).map_err(storage)?;
    let rows = match arg {
        Some(id) => stmt.query_map([id], row_to_relationship),
        None => stmt.query_map([], row_to_relationship),
    }
    .map_err(storage)?;

    let mut out = Vec::new();
    for rel in rows {
        out.push(rel.map_err(storage)?);
    }
    Ok(out)
}

fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Node>> {
    conn.prepare_cached("SELECT id, name FROM hierarchy_nodes WHERE name = ?1")
        .map_err(storage)?
        .query_row([name], row_to_node)
        .optional()
        .map_err(storage)
}

fn all_nodes(conn: &Connection) -> Result<Vec<Node>> {
    let mut stmt = conn
        .prepare_cached("SELECT id, name FROM hierarchy_nodes ORDER BY id ASC")
        .map_err(storage)?;
    let rows = stmt.query_map([], row_to_node).map_err(storage)?;
    let mut nodes = Vec::new();
    for node in rows {
        nodes.push(node.map_err(storage)?);
    }
    Ok(nodes)
}

fn find_direct_parent(conn: &Connection, descendant: NodeId) -> Result<Option<Relationship>> {
    let mut direct = select_relationships(
        conn,
        "WHERE r.descendant = ?1 AND r.depth = 1",
        Some(descendant.0),
    )?;
    if direct.len() > 1 {
        return Err(Error::InconsistentState(format!(
            "node {} has {} direct parents",
            descendant.0,
            direct.len()
        )));
    }
    Ok(direct.pop())
}

/// SQLite-backed [`Backend`] persisting nodes and closure rows in one database.
///
/// Units of work run as `BEGIN IMMEDIATE` transactions, so writers on other connections to
/// the same file wait for the lock instead of interleaving.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        Self::from_connection(conn)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage)?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Backend for SqliteBackend {
    type UnitOfWork<'a> = SqliteUnitOfWork<'a>;
    type Snapshot<'a> = SqliteSnapshot<'a>;

    fn begin(&mut self) -> Result<SqliteUnitOfWork<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage)?;
        Ok(SqliteUnitOfWork { tx })
    }

    fn snapshot(&self) -> Result<SqliteSnapshot<'_>> {
        // Deferred read transaction; dropped (rolled back) once the reads are done.
        let tx = self.conn.unchecked_transaction().map_err(storage)?;
        Ok(SqliteSnapshot { tx })
    }
}

/// Consistent read view backed by a deferred SQLite transaction.
pub struct SqliteSnapshot<'a> {
    tx: Transaction<'a>,
}

impl NodeLookup for SqliteSnapshot<'_> {
    fn find_by_name(&self, name: &str) -> Result<Option<Node>> {
        find_by_name(&self.tx, name)
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        all_nodes(&self.tx)
    }
}

impl RelationshipLookup for SqliteSnapshot<'_> {
    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>> {
        select_relationships(&self.tx, "WHERE r.ancestor = ?1", Some(ancestor.0))
    }

    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>> {
        select_relationships(&self.tx, "WHERE r.descendant = ?1", Some(descendant.0))
    }

    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>> {
        find_direct_parent(&self.tx, descendant)
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        select_relationships(&self.tx, "", None)
    }
}

/// Read-write unit of work; rolled back on drop unless committed.
pub struct SqliteUnitOfWork<'a> {
    tx: Transaction<'a>,
}

impl NodeLookup for SqliteUnitOfWork<'_> {
    fn find_by_name(&self, name: &str) -> Result<Option<Node>> {
        find_by_name(&self.tx, name)
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        all_nodes(&self.tx)
    }
}

impl NodeStore for SqliteUnitOfWork<'_> {
    fn create(&mut self, name: &str) -> Result<Node> {
        let inserted = self
            .tx
            .prepare_cached("INSERT INTO hierarchy_nodes (name) VALUES (?1)")
            .map_err(storage)?
            .execute([name]);
        match inserted {
            Ok(_) => Ok(Node::new(NodeId(self.tx.last_insert_rowid()), name)),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(Error::already_exists(name))
            }
            Err(e) => Err(storage(e)),
        }
    }

    fn delete(&mut self, node: &Node) -> Result<()> {
        self.tx
            .prepare_cached("DELETE FROM hierarchy_nodes WHERE id = ?1")
            .map_err(storage)?
            .execute([node.id.0])
            .map_err(storage)?;
        Ok(())
    }
}

impl RelationshipLookup for SqliteUnitOfWork<'_> {
    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>> {
        select_relationships(&self.tx, "WHERE r.ancestor = ?1", Some(ancestor.0))
    }

    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>> {
        select_relationships(&self.tx, "WHERE r.descendant = ?1", Some(descendant.0))
    }

    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>> {
        find_direct_parent(&self.tx, descendant)
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        select_relationships(&self.tx, "", None)
    }
}

impl RelationshipIndex for SqliteUnitOfWork<'_> {
    fn insert(&mut self, ancestor: &Node, descendant: &Node, depth: Depth) -> Result<()> {
        self.tx
            .prepare_cached(
                "INSERT INTO hierarchy_relationships (ancestor, descendant, depth) VALUES (?1, ?2, ?3)",
            )
            .map_err(storage)?
            .execute(params![ancestor.id.0, descendant.id.0, depth])
            .map_err(storage)?;
        Ok(())
    }

    fn delete_by_ancestor(&mut self, ancestor: NodeId) -> Result<usize> {
        self.tx
            .prepare_cached("DELETE FROM hierarchy_relationships WHERE ancestor = ?1")
            .map_err(storage)?
            .execute([ancestor.0])
            .map_err(storage)
    }

    fn delete_by_descendant(&mut self, descendant: NodeId) -> Result<usize> {
        self.tx
            .prepare_cached("DELETE FROM hierarchy_relationships WHERE descendant = ?1")
            .map_err(storage)?
            .execute([descendant.0])
            .map_err(storage)
    }

    fn delete_by_ancestor_and_descendant(
        &mut self,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> Result<usize> {
        self.tx
            .prepare_cached(
                "DELETE FROM hierarchy_relationships WHERE ancestor = ?1 AND descendant = ?2",
            )
            .map_err(storage)?
            .execute([ancestor.0, descendant.0])
            .map_err(storage)
    }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn commit(self) -> Result<()> {
        self.tx.commit().map_err(storage)?;
        debug!("committed sqlite unit of work");
        Ok(())
    }
}
