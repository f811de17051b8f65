//! Batched writes of directors and links.
//!
//! `CommitMode::PerBatch` commits every `batch_size` rows, which keeps the WAL and memory flat
//! but means a crash leaves a partial load behind. Recovery is a full rerun, which starts by
//! dropping the derived tables. `CommitMode::Atomic` wraps the whole pass in one transaction.
use anyhow::{Context, Result};
use itertools::Itertools;
use rusqlite::{params, Connection};
use std::str::FromStr;
use tracing::info;

use super::names::ResolvedNames;
use super::principals::DirectorMultimap;

pub const DEFAULT_BATCH_SIZE: usize = 50_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitMode {
    #[default]
    PerBatch,
    Atomic,
}

impl FromStr for CommitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-batch" | "per_batch" | "batch" => Ok(CommitMode::PerBatch),
            "atomic" | "single" => Ok(CommitMode::Atomic),
            other => Err(format!(
                "unknown commit mode {other:?} (expected per-batch or atomic)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePolicy {
    pub batch_size: usize,
    pub commit: CommitMode,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            commit: CommitMode::PerBatch,
        }
    }
}

impl WritePolicy {
    pub fn new(batch_size: usize, commit: CommitMode) -> Self {
        Self {
            batch_size: batch_size.max(1),
            commit,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: u64,
    pub commits: u64,
}

pub fn load_directors(
    conn: &mut Connection,
    names: &ResolvedNames,
    policy: &WritePolicy,
) -> Result<LoadReport> {
    info!(directors = names.names.len(), "inserting directors");
    let report = write_pairs(
        conn,
        "directors",
        "INSERT INTO directors (nconst, name) VALUES (?1, ?2)",
        names.names.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        policy,
    )?;
    info!(rows = report.rows, commits = report.commits, "directors inserted");
    Ok(report)
}

pub fn load_links(
    conn: &mut Connection,
    multimap: &DirectorMultimap,
    policy: &WritePolicy,
) -> Result<LoadReport> {
    info!(links = multimap.link_count(), "inserting movie-director links");
    let report = write_pairs(
        conn,
        "movie_directors",
        "INSERT INTO movie_directors (tconst, nconst) VALUES (?1, ?2)",
        multimap.links(),
        policy,
    )?;
    info!(rows = report.rows, commits = report.commits, "links inserted");
    Ok(report)
}

fn write_pairs<'a, I>(
    conn: &mut Connection,
    table: &str,
    sql: &str,
    rows: I,
    policy: &WritePolicy,
) -> Result<LoadReport>
where
    I: Iterator<Item = (&'a str, &'a str)>,
{
    let mut report = LoadReport::default();
    let batches = rows.chunks(policy.batch_size.max(1));
    match policy.commit {
        CommitMode::PerBatch => {
            for batch in &batches {
                let tx = conn.transaction()?;
                let n = insert_batch(&tx, sql, batch).with_context(|| {
                    format!("{table}: batch after {} committed rows", report.rows)
                })?;
                tx.commit()
                    .with_context(|| format!("{table}: committing batch"))?;
                report.rows += n;
                report.commits += 1;
                info!(table, inserted = report.rows, "batch committed");
            }
        }
        CommitMode::Atomic => {
            let tx = conn.transaction()?;
            for batch in &batches {
                let n = insert_batch(&tx, sql, batch)
                    .with_context(|| format!("{table}: batch after {} rows", report.rows))?;
                report.rows += n;
                info!(table, inserted = report.rows, "batch staged");
            }
            tx.commit()
                .with_context(|| format!("{table}: committing load"))?;
            report.commits = 1;
        }
    }
    Ok(report)
}

fn insert_batch<'a>(
    conn: &Connection,
    sql: &str,
    batch: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<u64> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut n = 0u64;
    for (a, b) in batch {
        stmt.execute(params![a, b])?;
        n += 1;
    }
    Ok(n)
}
