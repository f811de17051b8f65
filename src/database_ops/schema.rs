//! Derived table lifecycle: everything this pipeline owns is dropped and recreated on each run.
use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::util::sqlite::{quote_ident, table_columns, table_exists};

pub const DIRECTORS_TABLE: &str = "directors";
pub const LINKS_TABLE: &str = "movie_directors";
pub const SEARCH_TABLE: &str = "directors_fts";

/// Where the pre-existing movie keys live. Read-only for this pipeline.
#[derive(Debug, Clone)]
pub struct MovieSource {
    pub table: String,
    pub key_column: String,
}

impl Default for MovieSource {
    fn default() -> Self {
        Self {
            table: "movies".to_string(),
            key_column: "tconst".to_string(),
        }
    }
}

/// Fail before touching anything if the movie table or its key column is absent.
pub fn verify_movie_source(conn: &Connection, source: &MovieSource) -> Result<()> {
    if !table_exists(conn, &source.table)? {
        bail!("store has no movie table {:?}", source.table);
    }
    let cols = table_columns(conn, &source.table)?;
    if !cols.contains(&source.key_column.to_lowercase()) {
        bail!(
            "movie table {:?} has no key column {:?}",
            source.table,
            source.key_column
        );
    }
    Ok(())
}

/// Drop the search table first: an external-content FTS5 table refers to `directors`.
pub fn drop_derived(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    for table in [SEARCH_TABLE, LINKS_TABLE, DIRECTORS_TABLE] {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)?))
            .with_context(|| format!("dropping {table}"))?;
    }
    tx.commit()?;
    info!("existing director tables dropped");
    Ok(())
}

/// `directors.id` is an explicit INTEGER PRIMARY KEY so the rowids the search index stores
/// survive VACUUM.
pub fn create_tables(conn: &mut Connection, enforce_foreign_keys: bool) -> Result<()> {
    let director_ref = if enforce_foreign_keys {
        " REFERENCES directors(nconst)"
    } else {
        ""
    };
    conn.pragma_update(None, "foreign_keys", enforce_foreign_keys)?;

    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE directors (
    id INTEGER PRIMARY KEY,
    nconst TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);
"#,
    )
    .context("creating directors")?;
    tx.execute_batch(&format!(
        r#"
CREATE TABLE movie_directors (
    tconst TEXT NOT NULL,
    nconst TEXT NOT NULL{director_ref},
    PRIMARY KEY (tconst, nconst)
);
"#
    ))
    .context("creating movie_directors")?;
    tx.commit()?;
    info!(enforce_foreign_keys, "director tables created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::test_support::store_with_movies;

    #[test]
    fn recreate_wipes_previous_rows() {
        let mut conn = store_with_movies(&["t1"]);
        create_tables(&mut conn, false).unwrap();
        conn.execute(
            "INSERT INTO directors (nconst, name) VALUES ('n1', 'Alice')",
            [],
        )
        .unwrap();

        drop_derived(&mut conn).unwrap();
        create_tables(&mut conn, false).unwrap();

        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM directors", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
        // the movie table is never touched
        let m: i64 = conn
            .query_row("SELECT COUNT(*) FROM movies", [], |r| r.get(0))
            .unwrap();
        assert_eq!(m, 1);
    }

    #[test]
    fn link_primary_key_rejects_duplicates() {
        let mut conn = store_with_movies(&["t1"]);
        create_tables(&mut conn, false).unwrap();
        conn.execute(
            "INSERT INTO movie_directors (tconst, nconst) VALUES ('t1', 'n1')",
            [],
        )
        .unwrap();
        assert!(conn
            .execute(
                "INSERT INTO movie_directors (tconst, nconst) VALUES ('t1', 'n1')",
                [],
            )
            .is_err());
    }

    #[test]
    fn foreign_keys_reject_orphan_links_when_enforced() {
        let mut conn = store_with_movies(&["t1"]);
        create_tables(&mut conn, true).unwrap();
        assert!(conn
            .execute(
                "INSERT INTO movie_directors (tconst, nconst) VALUES ('t1', 'n404')",
                [],
            )
            .is_err());
    }

    #[test]
    fn verify_movie_source_checks_table_and_column() {
        let conn = store_with_movies(&[]);
        verify_movie_source(&conn, &MovieSource::default()).unwrap();

        let wrong_col = MovieSource {
            key_column: "imdb_id".into(),
            ..MovieSource::default()
        };
        assert!(verify_movie_source(&conn, &wrong_col).is_err());

        let wrong_table = MovieSource {
            table: "films".into(),
            ..MovieSource::default()
        };
        assert!(verify_movie_source(&conn, &wrong_table).is_err());
    }
}
