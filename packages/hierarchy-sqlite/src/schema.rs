use hierarchy_core::{Error, Result};
use rusqlite::Connection;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS hierarchy_nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS hierarchy_relationships (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    ancestor INTEGER NOT NULL REFERENCES hierarchy_nodes(id),
    descendant INTEGER NOT NULL REFERENCES hierarchy_nodes(id),
    depth INTEGER NOT NULL CHECK (depth >= 1),
    CHECK (ancestor <> descendant),
    UNIQUE (ancestor, descendant)
);

CREATE INDEX IF NOT EXISTS idx_hierarchy_relationships_ancestor
    ON hierarchy_relationships (ancestor, seq);
CREATE INDEX IF NOT EXISTS idx_hierarchy_relationships_descendant
    ON hierarchy_relationships (descendant, depth);
";

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| Error::Storage(e.to_string()))?;
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| Error::Storage(e.to_string()))?;
    Ok(())
}
