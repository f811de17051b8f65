use anyhow::{Context, Result};
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::info;

use super::schema::MovieSource;
use super::MovieKey;
use crate::util::sqlite::quote_ident;

/// Project every movie key in the store into a lookup set. NULL keys are skipped.
pub fn load_movie_keys(conn: &Connection, source: &MovieSource) -> Result<HashSet<MovieKey>> {
    let sql = format!(
        "SELECT {col} FROM {table} WHERE {col} IS NOT NULL",
        col = quote_ident(&source.key_column)?,
        table = quote_ident(&source.table)?,
    );
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("reading keys from {}", source.table))?;
    let mut rows = stmt.query([])?;
    let mut keys = HashSet::new();
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        keys.insert(key);
    }
    info!(movies = keys.len(), "loaded existing movie keys");
    Ok(keys)
}
