use postgres::Client;
use hierarchy_core::{Error, Result};

const SCHEMA_LOCK_KEY: i64 = 0x6869657261726368; // "hierarch"

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS hierarchy_nodes (
  id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
  name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS hierarchy_relationships (
  seq BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
  ancestor BIGINT NOT NULL REFERENCES hierarchy_nodes (id),
  descendant BIGINT NOT NULL REFERENCES hierarchy_nodes (id),
  depth INTEGER NOT NULL CHECK (depth >= 1),
  CHECK (ancestor <> descendant),
  UNIQUE (ancestor, descendant)
);

CREATE INDEX IF NOT EXISTS idx_hierarchy_relationships_ancestor
  ON hierarchy_relationships (ancestor, seq);

CREATE INDEX IF NOT EXISTS idx_hierarchy_relationships_descendant
  ON hierarchy_relationships (descendant, depth);
"#;

pub(crate) fn quote_schema(schema: &str) -> Result<String> {
    let valid = !schema.is_empty()
        && schema
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(Error::Config(format!("invalid schema name '{schema}'")));
    }
    Ok(format!("\"{schema}\""))
}

/// Create `schema` and the hierarchy tables in it, then point the session's
/// `search_path` at it.
pub fn ensure_schema(client: &mut Client, schema: &str) -> Result<()> {
    let quoted = quote_schema(schema)?;

    // Concurrent `CREATE ... IF NOT EXISTS` can still race on the catalog; hold a
    // cluster-wide advisory lock while bootstrapping.
    client
        .query_one("SELECT pg_advisory_lock($1)", &[&SCHEMA_LOCK_KEY])
        .map_err(|e| Error::Storage(format!("{e:?}")))?;

    let res = client
        .batch_execute(&format!(
            "CREATE SCHEMA IF NOT EXISTS {quoted}; SET search_path TO {quoted}; {SCHEMA_SQL}"
        ))
        .map_err(|e| Error::Storage(format!("{e:?}")));

    // Also released when the session ends.
    let _ = client.query_one("SELECT pg_advisory_unlock($1)", &[&SCHEMA_LOCK_KEY]);

    res
}

pub fn reset_for_tests(client: &mut Client) -> Result<()> {
    client
        .batch_execute("TRUNCATE hierarchy_relationships, hierarchy_nodes RESTART IDENTITY")
        .map_err(|e| Error::Storage(format!("{e:?}")))
}
