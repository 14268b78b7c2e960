use std::cell::RefCell;

use postgres::error::SqlState;
use postgres::{Client, GenericClient, IsolationLevel, NoTls, Row, Transaction};
use tracing::{debug, warn};

use hierarchy_core::{
    Backend, Depth, Error, Node, NodeId, NodeLookup, NodeStore, Relationship, RelationshipIndex,
    RelationshipLookup, Result, UnitOfWork,
};

use crate::schema::ensure_schema;

const SELECT_RELATIONSHIPS: &str = "SELECT r.seq, a.id, a.name, d.id, d.name, r.depth
     FROM hierarchy_relationships r
     JOIN hierarchy_nodes a ON a.id = r.ancestor
     JOIN hierarchy_nodes d ON d.id = r.descendant";

fn storage_debug<E: std::fmt::Debug>(e: E) -> Error {
    Error::Storage(format!("{e:?}"))
}

fn depth_to_sql(depth: Depth) -> Result<i32> {
    i32::try_from(depth).map_err(|_| Error::Storage("depth overflow".into()))
}

fn row_to_relationship(row: &Row) -> Result<Relationship> {
    let depth: i32 = row.get(5);
    Ok(Relationship {
        seq: row.get(0),
        ancestor: Node::new(NodeId(row.get(1)), row.get::<_, String>(2)),
        descendant: Node::new(NodeId(row.get(3)), row.get::<_, String>(4)),
        depth: Depth::try_from(depth)
            .map_err(|_| Error::InconsistentState(format!("negative depth {depth}")))?,
    })
}

fn select_relationships<C: GenericClient>(
    client: &mut C,
    filter: &str,
    id: Option<i64>,
) -> Result<Vec<Relationship>> {
    let sql = format!("{SELECT_RELATIONSHIPS} {filter} ORDER BY r.seq ASC");
    let rows = match id {
        Some(id) => client.query(sql.as_str(), &[&id]),
        None => client.query(sql.as_str(), &[]),
    }
    .map_err(storage_debug)?;
    rows.iter().map(row_to_relationship).collect()
}

fn find_by_name<C: GenericClient>(client: &mut C, name: &str) -> Result<Option<Node>> {
    let row = client
        .query_opt("SELECT id, name FROM hierarchy_nodes WHERE name = $1", &[&name])
        .map_err(storage_debug)?;
    Ok(row.map(|r| Node::new(NodeId(r.get(0)), r.get::<_, String>(1))))
}

fn all_nodes<C: GenericClient>(client: &mut C) -> Result<Vec<Node>> {
    let rows = client
        .query("SELECT id, name FROM hierarchy_nodes ORDER BY id ASC", &[])
        .map_err(storage_debug)?;
    Ok(rows
        .iter()
        .map(|r| Node::new(NodeId(r.get(0)), r.get::<_, String>(1)))
        .collect())
}

fn find_direct_parent<C: GenericClient>(
    client: &mut C,
    descendant: NodeId,
) -> Result<Option<Relationship>> {
    let mut direct = select_relationships(
        client,
        "WHERE r.descendant = $1 AND r.depth = 1",
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

/// PostgreSQL [`Backend`] over a synchronous client.
///
/// Units of work run at `SERIALIZABLE`; a conflicting concurrent writer surfaces as
/// `Error::Storage` and the caller may retry. Snapshots run at
/// `REPEATABLE READ READ ONLY`.
pub struct PgBackend {
    client: RefCell<Client>,
    schema: String,
}

impl PgBackend {
    pub fn connect(url: &str, schema: &str) -> Result<Self> {
        let client = Client::connect(url, NoTls).map_err(storage_debug)?;
        Self::from_client(client, schema)
    }

    pub fn from_client(mut client: Client, schema: &str) -> Result<Self> {
        ensure_schema(&mut client, schema)?;
        Ok(Self {
            client: RefCell::new(client),
            schema: schema.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn client_mut(&mut self) -> &mut Client {
        self.client.get_mut()
    }
}

impl Backend for PgBackend {
    type UnitOfWork<'a> = PgUnitOfWork<'a>;
    type Snapshot<'a> = PgSnapshot<'a>;

    fn begin(&mut self) -> Result<PgUnitOfWork<'_>> {
        let tx = self
            .client
            .get_mut()
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .map_err(storage_debug)?;
        Ok(PgUnitOfWork { tx: RefCell::new(tx) })
    }

    fn snapshot(&self) -> Result<PgSnapshot<'_>> {
        self.client
            .borrow_mut()
            .batch_execute("BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .map_err(storage_debug)?;
        Ok(PgSnapshot {
            client: &self.client,
        })
    }
}

/// Read-only transaction on the backend's client, ended when dropped.
pub struct PgSnapshot<'a> {
    client: &'a RefCell<Client>,
}

impl Drop for PgSnapshot<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.client.borrow_mut().batch_execute("COMMIT") {
            warn!(error = ?e, "failed to end read-only snapshot");
        }
    }
}

impl NodeLookup for PgSnapshot<'_> {
    fn find_by_name(&self, name: &str) -> Result<Option<Node>> {
        find_by_name(&mut *self.client.borrow_mut(), name)
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        all_nodes(&mut *self.client.borrow_mut())
    }
}

impl RelationshipLookup for PgSnapshot<'_> {
    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>> {
        select_relationships(
            &mut *self.client.borrow_mut(),
            "WHERE r.ancestor = $1",
            Some(ancestor.0),
        )
    }

    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>> {
        select_relationships(
            &mut *self.client.borrow_mut(),
            "WHERE r.descendant = $1",
            Some(descendant.0),
        )
    }

    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>> {
        find_direct_parent(&mut *self.client.borrow_mut(), descendant)
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        select_relationships(&mut *self.client.borrow_mut(), "", None)
    }
}

/// Serializable read-write transaction; rolled back on drop unless committed.
pub struct PgUnitOfWork<'a> {
    tx: RefCell<Transaction<'a>>,
}

impl PgUnitOfWork<'_> {
    fn execute(&mut self, sql: &str, params: &[&(dyn postgres::types::ToSql + Sync)]) -> Result<u64> {
        self.tx.get_mut().execute(sql, params).map_err(storage_debug)
    }
}

impl NodeLookup for PgUnitOfWork<'_> {
    fn find_by_name(&self, name: &str) -> Result<Option<Node>> {
        find_by_name(&mut *self.tx.borrow_mut(), name)
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        all_nodes(&mut *self.tx.borrow_mut())
    }
}

impl NodeStore for PgUnitOfWork<'_> {
    fn create(&mut self, name: &str) -> Result<Node> {
        let row = self
            .tx
            .get_mut()
            .query_one(
                "INSERT INTO hierarchy_nodes (name) VALUES ($1) RETURNING id",
                &[&name],
            )
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    Error::already_exists(name)
                } else {
                    storage_debug(e)
                }
            })?;
        Ok(Node::new(NodeId(row.get(0)), name))
    }

    fn delete(&mut self, node: &Node) -> Result<()> {
        self.execute("DELETE FROM hierarchy_nodes WHERE id = $1", &[&node.id.0])?;
        Ok(())
    }
}

impl RelationshipLookup for PgUnitOfWork<'_> {
    fn find_by_ancestor(&self, ancestor: NodeId) -> Result<Vec<Relationship>> {
        select_relationships(
            &mut *self.tx.borrow_mut(),
            "WHERE r.ancestor = $1",
            Some(ancestor.0),
        )
    }

    fn find_by_descendant(&self, descendant: NodeId) -> Result<Vec<Relationship>> {
        select_relationships(
            &mut *self.tx.borrow_mut(),
            "WHERE r.descendant = $1",
            Some(descendant.0),
        )
    }

    fn find_direct_parent(&self, descendant: NodeId) -> Result<Option<Relationship>> {
        find_direct_parent(&mut *self.tx.borrow_mut(), descendant)
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        select_relationships(&mut *self.tx.borrow_mut(), "", None)
    }
}

impl RelationshipIndex for PgUnitOfWork<'_> {
    fn insert(&mut self, ancestor: &Node, descendant: &Node, depth: Depth) -> Result<()> {
        let depth = depth_to_sql(depth)?;
        self.execute(
            "INSERT INTO hierarchy_relationships (ancestor, descendant, depth) VALUES ($1, $2, $3)",
            &[&ancestor.id.0, &descendant.id.0, &depth],
        )?;
        Ok(())
    }

    fn delete_by_ancestor(&mut self, ancestor: NodeId) -> Result<usize> {
        let n = self.execute(
            "DELETE FROM hierarchy_relationships WHERE ancestor = $1",
            &[&ancestor.0],
        )?;
        Ok(n as usize)
    }

    fn delete_by_descendant(&mut self, descendant: NodeId) -> Result<usize> {
        let n = self.execute(
            "DELETE FROM hierarchy_relationships WHERE descendant = $1",
            &[&descendant.0],
        )?;
        Ok(n as usize)
    }

    fn delete_by_ancestor_and_descendant(
        &mut self,
        ancestor: NodeId,
        descendant: NodeId,
    ) -> Result<usize> {
        let n = self.execute(
            "DELETE FROM hierarchy_relationships WHERE ancestor = $1 AND descendant = $2",
            &[&ancestor.0, &descendant.0],
        )?;
        Ok(n as usize)
    }
}

impl UnitOfWork for PgUnitOfWork<'_> {
    fn commit(self) -> Result<()> {
        self.tx.into_inner().commit().map_err(storage_debug)?;
        debug!("committed postgres unit of work");
        Ok(())
    }
}
