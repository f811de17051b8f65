//! Run configuration. Defaults come from the environment (and `.env`); the CLI overrides them.
use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::database_ops::compact::DEFAULT_GZIP_LEVEL;
use crate::database_ops::loader::{CommitMode, WritePolicy, DEFAULT_BATCH_SIZE};
use crate::database_ops::schema::MovieSource;
use crate::database_ops::DIRECTOR_ROLE;
use crate::util::env as env_util;

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// SQLite store that already holds the movie table.
    pub store: PathBuf,
    /// `title.principals.tsv` (or `.tsv.gz`).
    pub principals: PathBuf,
    /// `name.basics.tsv` (or `.tsv.gz`).
    pub names: PathBuf,
    pub movies: MovieSource,
    /// `category` value that marks a credit as a directing credit.
    pub role: String,
    pub write: WritePolicy,
    /// Declare `movie_directors.nconst` as a foreign key and switch enforcement on.
    pub enforce_foreign_keys: bool,
    pub compress: bool,
    pub gzip_level: u32,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from("moviechain_core.sqlite"),
            principals: PathBuf::from("title.principals.tsv"),
            names: PathBuf::from("name.basics.tsv"),
            movies: MovieSource::default(),
            role: DIRECTOR_ROLE.to_string(),
            write: WritePolicy::default(),
            enforce_foreign_keys: false,
            compress: true,
            gzip_level: DEFAULT_GZIP_LEVEL,
        }
    }
}

impl EnrichConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let movies = MovieSource {
            table: env_util::env_opt("MOVIES_TABLE").unwrap_or(defaults.movies.table),
            key_column: env_util::env_opt("MOVIES_KEY_COLUMN")
                .unwrap_or(defaults.movies.key_column),
        };
        Self {
            store: env_util::env_path("MOVIECHAIN_DB", "moviechain_core.sqlite"),
            principals: env_util::env_path("TITLE_PRINCIPALS_TSV", "title.principals.tsv"),
            names: env_util::env_path("NAME_BASICS_TSV", "name.basics.tsv"),
            movies,
            role: env_util::env_opt("DIRECTOR_ROLE").unwrap_or(defaults.role),
            write: WritePolicy::new(
                env_util::env_parse("DIRECTOR_BATCH_SIZE", DEFAULT_BATCH_SIZE),
                env_util::env_parse("DIRECTOR_COMMIT_MODE", CommitMode::PerBatch),
            ),
            enforce_foreign_keys: env_util::env_flag("ENFORCE_FOREIGN_KEYS", false),
            compress: !env_util::env_flag("SKIP_COMPRESS", false),
            gzip_level: env_util::env_parse("GZIP_LEVEL", DEFAULT_GZIP_LEVEL),
        }
    }

    /// Everything that can be checked without reading data. Runs before any table is dropped.
    pub fn preflight(&self) -> Result<()> {
        if self.role.trim().is_empty() {
            bail!("director role must not be empty");
        }
        if self.gzip_level > 9 {
            bail!("gzip level {} out of range 0-9", self.gzip_level);
        }
        env_util::preflight_paths(
            "director enrichment",
            &[
                ("store", self.store.as_path()),
                ("title principals", self.principals.as_path()),
                ("name basics", self.names.as_path()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_reports_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("core.sqlite");
        std::fs::write(&store, b"").unwrap();
        let cfg = EnrichConfig {
            store,
            principals: dir.path().join("title.principals.tsv"),
            names: dir.path().join("name.basics.tsv"),
            ..EnrichConfig::default()
        };
        let err = cfg.preflight().unwrap_err().to_string();
        assert!(err.contains("title principals"), "{err}");
        assert!(err.contains("name basics"), "{err}");
        assert!(!err.contains("store ("), "{err}");
    }

    #[test]
    fn preflight_rejects_bad_level() {
        let cfg = EnrichConfig {
            gzip_level: 12,
            ..EnrichConfig::default()
        };
        assert!(cfg.preflight().is_err());
    }
}
