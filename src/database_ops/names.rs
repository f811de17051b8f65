//! Pass 2: resolve display names for exactly the directors pass 1 found.
use anyhow::Result;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::io::Read;
use tracing::{info, warn};

use super::extract::{text_field, TsvExtract};
use super::{PersonKey, NULL_SENTINEL};

const PROGRESS_EVERY: u64 = 1_000_000;

#[derive(Debug, Default)]
pub struct ResolvedNames {
    /// person key -> name, in extract order.
    pub names: IndexMap<PersonKey, String>,
    pub needed: usize,
    pub rows_scanned: u64,
    /// True when the scan stopped because every needed key was resolved.
    pub stopped_early: bool,
}

impl ResolvedNames {
    pub fn contains(&self, key: &str) -> bool {
        self.names.contains_key(key)
    }

    pub fn missing(&self) -> usize {
        self.needed.saturating_sub(self.names.len())
    }
}

/// Stream the names extract until every key in `needed` has a usable name or the extract runs
/// out. Running out is not an error; unresolved keys are dropped by the join filter.
pub fn resolve_names<R: Read>(
    mut extract: TsvExtract<R>,
    needed: &HashSet<&str>,
) -> Result<ResolvedNames> {
    let idx_person = extract.column("nconst")?;
    let idx_name = extract.column("primaryName")?;
    let label = extract.label().to_string();
    info!(extract = %label, needed = needed.len(), "scanning names");

    let mut names: IndexMap<PersonKey, String> = IndexMap::with_capacity(needed.len());
    // The target is fixed and the scan is read-only, so stopping once it is met loses nothing.
    let mut stopped_early = names.len() == needed.len();

    while !stopped_early {
        let Some(rec) = extract.next_record()? else {
            break;
        };
        let row = rec.position().map(|p| p.record()).unwrap_or_default();
        if row > 0 && row % PROGRESS_EVERY == 0 {
            info!(rows = row, found = names.len(), "names progress");
        }

        let person = text_field(rec, idx_person, &label)?;
        if !needed.contains(person) || names.contains_key(person) {
            continue;
        }
        let name = text_field(rec, idx_name, &label)?;
        if name.is_empty() || name == NULL_SENTINEL {
            continue;
        }
        names.insert(person.to_owned(), name.to_owned());
        stopped_early = names.len() == needed.len();
    }

    let resolved = ResolvedNames {
        names,
        needed: needed.len(),
        rows_scanned: extract.rows_read(),
        stopped_early,
    };
    if resolved.stopped_early {
        info!(
            found = resolved.names.len(),
            rows = resolved.rows_scanned,
            "all director names found, scan stopped"
        );
    } else {
        warn!(
            found = resolved.names.len(),
            missing = resolved.missing(),
            rows = resolved.rows_scanned,
            "names extract exhausted before every director was resolved"
        );
    }
    Ok(resolved)
}
