//! Lookup indexes on the link table, the FTS5 name index, and the queries they serve.
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

use super::{MovieKey, PersonKey};

/// B-tree indexes for lookups in both directions of `movie_directors`.
pub fn build_link_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE INDEX idx_movie_directors_tconst ON movie_directors(tconst);
CREATE INDEX idx_movie_directors_nconst ON movie_directors(nconst);
"#,
    )
    .context("creating movie_directors indexes")?;
    info!("link indexes created");
    Ok(())
}

/// External-content FTS5 table over `directors.name`, addressed by `directors.id`.
/// Populated once from the loaded rows; later edits to `directors` are not tracked.
pub fn build_search_index(conn: &mut Connection) -> Result<u64> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE VIRTUAL TABLE directors_fts USING fts5(
    name,
    content='directors',
    content_rowid='id'
);
"#,
    )
    .context("creating directors_fts (is FTS5 compiled in?)")?;
    let rows = tx
        .execute(
            "INSERT INTO directors_fts (rowid, name) SELECT id, name FROM directors",
            [],
        )
        .context("populating directors_fts")?;
    tx.commit()?;
    info!(rows, "search index populated");
    Ok(rows as u64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorHit {
    pub id: i64,
    pub nconst: PersonKey,
    pub name: String,
}

/// Full-text search over director names, best match first. `query` uses FTS5 syntax.
pub fn search_directors(conn: &Connection, query: &str, limit: usize) -> Result<Vec<DirectorHit>> {
    let mut stmt = conn.prepare_cached(
        r#"
SELECT d.id, d.nconst, d.name
FROM directors_fts
JOIN directors d ON d.id = directors_fts.rowid
WHERE directors_fts MATCH ?1
ORDER BY directors_fts.rank
LIMIT ?2
"#,
    )?;
    let hits = stmt
        .query_map(params![query, limit as i64], |row| {
            Ok(DirectorHit {
                id: row.get(0)?,
                nconst: row.get(1)?,
                name: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("searching directors for {query:?}"))?;
    Ok(hits)
}

pub fn directors_for_movie(conn: &Connection, movie: &str) -> Result<Vec<PersonKey>> {
    let mut stmt = conn.prepare_cached(
        "SELECT nconst FROM movie_directors WHERE tconst = ?1 ORDER BY nconst",
    )?;
    let keys = stmt
        .query_map([movie], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(keys)
}

pub fn movies_for_director(conn: &Connection, director: &str) -> Result<Vec<MovieKey>> {
    let mut stmt = conn.prepare_cached(
        "SELECT tconst FROM movie_directors WHERE nconst = ?1 ORDER BY tconst",
    )?;
    let keys = stmt
        .query_map([director], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::schema::create_tables;
    use crate::database_ops::test_support::store_with_movies;

    fn seeded() -> Connection {
        let mut conn = store_with_movies(&["t1", "t2"]);
        create_tables(&mut conn, false).unwrap();
        conn.execute_batch(
            r#"
INSERT INTO directors (nconst, name) VALUES
    ('n1', 'Alice Guy'), ('n2', 'Akira Kurosawa'), ('n3', 'Alice Rohrwacher');
INSERT INTO movie_directors (tconst, nconst) VALUES
    ('t1', 'n1'), ('t1', 'n2'), ('t2', 'n2');
"#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn link_indexes_serve_both_directions() {
        let conn = seeded();
        build_link_indexes(&conn).unwrap();
        assert_eq!(directors_for_movie(&conn, "t1").unwrap(), vec!["n1", "n2"]);
        assert_eq!(movies_for_director(&conn, "n2").unwrap(), vec!["t1", "t2"]);

        let plan: String = conn
            .query_row(
                "EXPLAIN QUERY PLAN SELECT tconst FROM movie_directors WHERE nconst = 'n2'",
                [],
                |r| r.get(3),
            )
            .unwrap();
        assert!(plan.contains("idx_movie_directors_nconst"), "{plan}");
    }

    #[test]
    fn search_finds_tokens_and_returns_entity_rows() {
        let mut conn = seeded();
        assert_eq!(build_search_index(&mut conn).unwrap(), 3);

        let hits = search_directors(&conn, "alice", 10).unwrap();
        let keys: Vec<&str> = hits.iter().map(|h| h.nconst.as_str()).collect();
        assert_eq!(hits.len(), 2);
        assert!(keys.contains(&"n1") && keys.contains(&"n3"));

        let hits = search_directors(&conn, "kurosawa", 10).unwrap();
        assert_eq!(hits[0].name, "Akira Kurosawa");
        assert!(search_directors(&conn, "nobody", 10).unwrap().is_empty());
    }
}
