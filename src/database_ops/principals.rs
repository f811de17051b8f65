//! Pass 1: semi-join `title.principals` against the store's movie keys.
use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashSet;
use std::io::Read;
use tracing::info;

use super::extract::{text_field, TsvExtract};
use super::{MovieKey, PersonKey};

const PROGRESS_EVERY: u64 = 1_000_000;

/// director key -> movie keys, in first-seen order so reruns load rows identically.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectorMultimap {
    entries: IndexMap<PersonKey, IndexSet<MovieKey>>,
}

impl DirectorMultimap {
    /// Returns false when the pair was already present.
    pub fn insert(&mut self, director: &str, movie: &str) -> bool {
        match self.entries.get_mut(director) {
            Some(movies) => movies.insert(movie.to_owned()),
            None => {
                let mut movies = IndexSet::new();
                movies.insert(movie.to_owned());
                self.entries.insert(director.to_owned(), movies);
                true
            }
        }
    }

    /// Number of distinct directors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct (movie, director) pairs.
    pub fn link_count(&self) -> usize {
        self.entries.values().map(IndexSet::len).sum()
    }

    pub fn contains_director(&self, director: &str) -> bool {
        self.entries.contains_key(director)
    }

    pub fn movies_of(&self, director: &str) -> Option<&IndexSet<MovieKey>> {
        self.entries.get(director)
    }

    pub fn director_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The set the name resolver has to satisfy.
    pub fn needed_keys(&self) -> HashSet<&str> {
        self.director_keys().collect()
    }

    /// Every link as `(movie, director)`.
    pub fn links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(director, movies)| {
            movies
                .iter()
                .map(move |movie| (movie.as_str(), director.as_str()))
        })
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|director, _| keep(director));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub rows_scanned: u64,
    pub matching_rows: u64,
    pub directors: usize,
    pub links: usize,
}

#[derive(Debug)]
pub struct CreditExtraction {
    pub multimap: DirectorMultimap,
    pub stats: ExtractionStats,
}

/// Stream the credits extract once, keeping rows whose role matches and whose movie is already
/// in the store. Linear in extract size; memory grows only with matches.
pub fn extract_director_credits<R: Read>(
    mut extract: TsvExtract<R>,
    movies: &HashSet<MovieKey>,
    role: &str,
) -> Result<CreditExtraction> {
    let idx_movie = extract.column("tconst")?;
    let idx_person = extract.column("nconst")?;
    let idx_role = extract.column("category")?;
    let label = extract.label().to_string();
    info!(extract = %label, role, "scanning credits");

    let mut multimap = DirectorMultimap::default();
    let mut matching_rows = 0u64;

    while let Some(rec) = extract.next_record()? {
        let row = rec.position().map(|p| p.record()).unwrap_or_default();
        if row > 0 && row % PROGRESS_EVERY == 0 {
            info!(rows = row, matches = matching_rows, "credits progress");
        }
        // Compare raw bytes first; most rows are not the target role.
        if rec.get(idx_role) != Some(role.as_bytes()) {
            continue;
        }
        let movie = text_field(rec, idx_movie, &label)?;
        let person = text_field(rec, idx_person, &label)?;
        if movie.is_empty() || person.is_empty() || !movies.contains(movie) {
            continue;
        }
        multimap.insert(person, movie);
        matching_rows += 1;
    }

    let stats = ExtractionStats {
        rows_scanned: extract.rows_read(),
        matching_rows,
        directors: multimap.len(),
        links: multimap.link_count(),
    };
    info!(
        rows = stats.rows_scanned,
        directors = stats.directors,
        links = stats.links,
        "credits scan complete"
    );
    Ok(CreditExtraction { multimap, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::test_support::tsv;
    use crate::database_ops::DIRECTOR_ROLE;
    use std::io::Cursor;

    const HEADER: &[&str] = &["tconst", "ordering", "nconst", "category", "job", "characters"];

    fn movies(keys: &[&str]) -> HashSet<MovieKey> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn run(rows: &[&[&str]], known: &[&str]) -> CreditExtraction {
        let extract = TsvExtract::from_reader("principals", Cursor::new(tsv(HEADER, rows)));
        extract_director_credits(extract, &movies(known), DIRECTOR_ROLE).unwrap()
    }

    #[test]
    fn keeps_only_director_rows_for_known_movies() {
        let out = run(
            &[
                &["t1", "1", "n1", "director", "\\N", "\\N"],
                &["t1", "2", "n1", "actor", "\\N", "[\"Bob\"]"],
                &["t2", "1", "n2", "director", "\\N", "\\N"],
                &["t9", "1", "n3", "director", "\\N", "\\N"],
            ],
            &["t1", "t2"],
        );
        assert_eq!(out.stats.rows_scanned, 4);
        assert_eq!(out.stats.matching_rows, 2);
        assert_eq!(out.multimap.len(), 2);
        assert!(!out.multimap.contains_director("n3"));
        let links: Vec<_> = out.multimap.links().collect();
        assert_eq!(links, vec![("t1", "n1"), ("t2", "n2")]);
    }

    #[test]
    fn duplicate_credits_collapse() {
        let out = run(
            &[
                &["t1", "1", "n1", "director", "\\N", "\\N"],
                &["t1", "4", "n1", "director", "co-director", "\\N"],
                &["t2", "1", "n1", "director", "\\N", "\\N"],
            ],
            &["t1", "t2"],
        );
        assert_eq!(out.stats.matching_rows, 3);
        assert_eq!(out.stats.links, 2);
        assert_eq!(out.multimap.movies_of("n1").unwrap().len(), 2);
    }

    #[test]
    fn empty_keys_are_skipped() {
        let out = run(
            &[
                &["", "1", "n1", "director", "\\N", "\\N"],
                &["t1", "1", "", "director", "\\N", "\\N"],
            ],
            &["t1", ""],
        );
        assert!(out.multimap.is_empty());
    }

    #[test]
    fn role_match_is_exact() {
        let out = run(
            &[
                &["t1", "1", "n1", "Director", "\\N", "\\N"],
                &["t1", "2", "n2", "directors", "\\N", "\\N"],
            ],
            &["t1"],
        );
        assert!(out.multimap.is_empty());
    }
}
