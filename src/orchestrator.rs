//! The enrichment run as an ordered chain of stages. Each stage takes the previous stage's
//! output by value or reference and hands back its own result; nothing is shared between stages
//! except the store connection.
use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::time::Instant;
use tracing::{info, instrument};

use crate::config::EnrichConfig;
use crate::database_ops::compact::{artifact_path, compress_file, vacuum, CompressionReport};
use crate::database_ops::extract::TsvExtract;
use crate::database_ops::indexes::{build_link_indexes, build_search_index};
use crate::database_ops::join::retain_named;
use crate::database_ops::loader::{load_directors, load_links};
use crate::database_ops::movies::load_movie_keys;
use crate::database_ops::names::resolve_names;
use crate::database_ops::principals::{extract_director_credits, CreditExtraction};
use crate::database_ops::schema::{create_tables, drop_derived, verify_movie_source};
use crate::util::sqlite::{count_rows, open_store, quote_ident};

/// What the load stages produced, before compaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub movies_in_store: usize,
    pub credit_rows_scanned: u64,
    pub director_credits: u64,
    pub directors_found: usize,
    pub name_rows_scanned: u64,
    pub names_resolved: usize,
    pub names_stopped_early: bool,
    pub directors_loaded: u64,
    pub links_loaded: u64,
    pub commits: u64,
    pub search_rows: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub load: LoadSummary,
    pub directors_in_store: i64,
    pub links_in_store: i64,
    pub store_bytes: u64,
    pub compression: Option<CompressionReport>,
    pub elapsed_ms: u64,
}

/// Full run: preflight, enrich, vacuum, close, compress.
#[instrument(skip_all, fields(store = %cfg.store.display()))]
pub fn run_pipeline(cfg: &EnrichConfig) -> Result<RunSummary> {
    let started = Instant::now();
    cfg.preflight()?;

    let mut conn = open_store(&cfg.store)?;
    verify_movie_source(&conn, &cfg.movies)?;

    let credits = TsvExtract::open(&cfg.principals)?;
    let names = TsvExtract::open(&cfg.names)?;
    let load = enrich_store(&mut conn, cfg, credits, names)?;

    vacuum(&conn)?;
    let directors_in_store = count_rows(&conn, "directors")?;
    let links_in_store = count_rows(&conn, "movie_directors")?;
    conn.close()
        .map_err(|(_, e)| e)
        .context("closing store before compression")?;

    let store_bytes = fs::metadata(&cfg.store)?.len();
    info!(
        directors = directors_in_store,
        links = links_in_store,
        store_mb = store_bytes / (1024 * 1024),
        "store finalized"
    );

    let compression = if cfg.compress {
        Some(compress_file(
            &cfg.store,
            &artifact_path(&cfg.store),
            cfg.gzip_level,
        )?)
    } else {
        info!("compression skipped");
        None
    };

    Ok(RunSummary {
        load,
        directors_in_store,
        links_in_store,
        store_bytes,
        compression,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

/// Rebuild the director tables inside an open store from the two extracts.
pub fn enrich_store<A: Read, B: Read>(
    conn: &mut Connection,
    cfg: &EnrichConfig,
    credits: TsvExtract<A>,
    names: TsvExtract<B>,
) -> Result<LoadSummary> {
    drop_derived(conn)?;
    create_tables(conn, cfg.enforce_foreign_keys)?;

    let movie_keys = load_movie_keys(conn, &cfg.movies)?;
    let movies_in_store = movie_keys.len();

    let CreditExtraction { multimap, stats } =
        extract_director_credits(credits, &movie_keys, &cfg.role)?;
    drop(movie_keys);

    let resolved = {
        let needed = multimap.needed_keys();
        resolve_names(names, &needed)?
    };
    let multimap = retain_named(multimap, &resolved);

    let directors = load_directors(conn, &resolved, &cfg.write)?;
    let links = load_links(conn, &multimap, &cfg.write)?;
    check_link_integrity(conn, cfg)?;

    build_link_indexes(conn)?;
    let search_rows = build_search_index(conn)?;

    Ok(LoadSummary {
        movies_in_store,
        credit_rows_scanned: stats.rows_scanned,
        director_credits: stats.matching_rows,
        directors_found: stats.directors,
        name_rows_scanned: resolved.rows_scanned,
        names_resolved: resolved.names.len(),
        names_stopped_early: resolved.stopped_early,
        directors_loaded: directors.rows,
        links_loaded: links.rows,
        commits: directors.commits + links.commits,
        search_rows,
    })
}

/// Post-load check that no link points at a missing director or a movie outside the store.
fn check_link_integrity(conn: &Connection, cfg: &EnrichConfig) -> Result<()> {
    let sql = format!(
        r#"
SELECT
    (SELECT COUNT(*) FROM movie_directors md
      WHERE NOT EXISTS (SELECT 1 FROM directors d WHERE d.nconst = md.nconst)),
    (SELECT COUNT(*) FROM movie_directors md
      WHERE NOT EXISTS (SELECT 1 FROM {table} m WHERE m.{col} = md.tconst))
"#,
        table = quote_ident(&cfg.movies.table)?,
        col = quote_ident(&cfg.movies.key_column)?,
    );
    let (orphan_directors, orphan_movies): (i64, i64) = conn
        .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
        .context("checking link integrity")?;
    if orphan_directors > 0 || orphan_movies > 0 {
        bail!(
            "link integrity violated: {orphan_directors} links without a director, \
             {orphan_movies} links without a movie"
        );
    }
    Ok(())
}
