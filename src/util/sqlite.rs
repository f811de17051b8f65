//! SQLite connection helpers shared by every pipeline stage.
use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, instrument};

/// Open an existing store for read/write. Never creates a new file: a missing store is a
/// configuration error, not an empty database.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn open_store(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open store {}", path.display()))?;
    apply_bulk_pragmas(&conn)?;
    info!("store opened");
    Ok(conn)
}

/// Read-only handle for lookups against a finished store.
pub fn open_store_read_only(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open store {} read-only", path.display()))
}

/// Session tuning for bulk loads: WAL journal, relaxed sync, 64MB page cache.
pub fn apply_bulk_pragmas(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, so it cannot go through execute_batch.
    let mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .context("PRAGMA journal_mode")?;
    conn.execute_batch(
        r#"
PRAGMA synchronous = NORMAL;     -- WAL makes NORMAL crash-safe for committed batches
PRAGMA cache_size = -64000;      -- negative => KiB units, here 64MB
PRAGMA temp_store = MEMORY;      -- index builds sort in RAM
"#,
    )
    .context("applying bulk pragmas")?;
    tracing::debug!(journal_mode = %mode, "pragmas applied");
    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND lower(name) = lower(?) LIMIT 1",
    )?;
    let mut rows = stmt.query([table])?;
    Ok(rows.next()?.is_some())
}

pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)?))?;
    let mut rows = stmt.query([])?;
    let mut cols = HashSet::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        cols.insert(name.to_lowercase());
    }
    Ok(cols)
}

/// Quote a table/column name for interpolation into SQL. Only plain identifiers are accepted
/// since these come from configuration.
pub fn quote_ident(ident: &str) -> Result<String> {
    let valid = !ident.is_empty()
        && ident
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("invalid SQL identifier {ident:?}");
    }
    Ok(format!("\"{ident}\""))
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
    conn.query_row(&sql, [], |row| row.get(0))
        .with_context(|| format!("counting rows in {table}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ident_rejects_injection() {
        assert_eq!(quote_ident("movies").unwrap(), "\"movies\"");
        assert_eq!(quote_ident("_t2").unwrap(), "\"_t2\"");
        assert!(quote_ident("movies; DROP TABLE x").is_err());
        assert!(quote_ident("1abc").is_err());
        assert!(quote_ident("").is_err());
    }

    #[test]
    fn introspection_finds_tables_and_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE Movies (tconst TEXT PRIMARY KEY, Title TEXT)")
            .unwrap();
        assert!(table_exists(&conn, "movies").unwrap());
        assert!(!table_exists(&conn, "directors").unwrap());
        let cols = table_columns(&conn, "Movies").unwrap();
        assert!(cols.contains("tconst"));
        assert!(cols.contains("title"));
        assert_eq!(count_rows(&conn, "Movies").unwrap(), 0);
    }

    #[test]
    fn open_store_refuses_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.sqlite");
        assert!(open_store(&missing).is_err());
        assert!(!missing.exists());
    }
}
