use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use moviechain_directors::database_ops::indexes::{movies_for_director, search_directors};
use moviechain_directors::database_ops::loader::{CommitMode, WritePolicy};
use moviechain_directors::logging::init_tracing;
use moviechain_directors::util::{env as env_util, sqlite::open_store_read_only};
use moviechain_directors::{run_pipeline, EnrichConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "moviechain-directors",
    version,
    about = "Add IMDb director data to the MovieChain store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Rebuild directors, movie_directors and directors_fts, then vacuum and gzip the store
    Build {
        /// Store path (default: env MOVIECHAIN_DB or ./moviechain_core.sqlite)
        #[arg(long)]
        db: Option<PathBuf>,
        /// title.principals extract (default: env TITLE_PRINCIPALS_TSV or ./title.principals.tsv)
        #[arg(long)]
        principals: Option<PathBuf>,
        /// name.basics extract (default: env NAME_BASICS_TSV or ./name.basics.tsv)
        #[arg(long)]
        names: Option<PathBuf>,
        /// Table holding the existing movies (default: movies)
        #[arg(long)]
        movies_table: Option<String>,
        /// Key column of the movie table (default: tconst)
        #[arg(long)]
        movie_key_column: Option<String>,
        /// Credit category to import (default: director)
        #[arg(long)]
        role: Option<String>,
        /// Rows per insert batch (default: env DIRECTOR_BATCH_SIZE or 50000)
        #[arg(long)]
        batch_size: Option<usize>,
        /// per-batch commits every batch; atomic loads each table in one transaction
        #[arg(long)]
        commit_mode: Option<CommitMode>,
        /// Declare and enforce the movie_directors -> directors foreign key
        #[arg(long, default_value_t = false)]
        enforce_foreign_keys: bool,
        /// Leave the store uncompressed
        #[arg(long, default_value_t = false)]
        skip_compress: bool,
        /// gzip level 0-9 (default: env GZIP_LEVEL or 9)
        #[arg(long)]
        gzip_level: Option<u32>,
        /// Print the run summary as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Full-text search over director names in a built store
    Search {
        /// Store path (default: env MOVIECHAIN_DB or ./moviechain_core.sqlite)
        #[arg(long)]
        db: Option<PathBuf>,
        /// FTS5 query, e.g. "kurosawa" or "alice*"
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Also list each director's movies
        #[arg(long, default_value_t = false)]
        with_movies: bool,
    },
}

fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            db,
            principals,
            names,
            movies_table,
            movie_key_column,
            role,
            batch_size,
            commit_mode,
            enforce_foreign_keys,
            skip_compress,
            gzip_level,
            json,
        } => {
            let mut cfg = EnrichConfig::from_env();
            if let Some(v) = db {
                cfg.store = v;
            }
            if let Some(v) = principals {
                cfg.principals = v;
            }
            if let Some(v) = names {
                cfg.names = v;
            }
            if let Some(v) = movies_table {
                cfg.movies.table = v;
            }
            if let Some(v) = movie_key_column {
                cfg.movies.key_column = v;
            }
            if let Some(v) = role {
                cfg.role = v;
            }
            cfg.write = WritePolicy::new(
                batch_size.unwrap_or(cfg.write.batch_size),
                commit_mode.unwrap_or(cfg.write.commit),
            );
            cfg.enforce_foreign_keys |= enforce_foreign_keys;
            if skip_compress {
                cfg.compress = false;
            }
            if let Some(v) = gzip_level {
                cfg.gzip_level = v;
            }

            info!(
                store = %cfg.store.display(),
                principals = %cfg.principals.display(),
                names = %cfg.names.display(),
                batch_size = cfg.write.batch_size,
                commit_mode = ?cfg.write.commit,
                "starting director enrichment"
            );
            let summary = run_pipeline(&cfg).context("director enrichment failed")?;
            info!(
                directors = summary.directors_in_store,
                links = summary.links_in_store,
                elapsed_ms = summary.elapsed_ms,
                "director data added"
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Commands::Search {
            db,
            query,
            limit,
            with_movies,
        } => {
            let path = db.unwrap_or_else(|| EnrichConfig::from_env().store);
            let conn = open_store_read_only(&path)?;
            for hit in search_directors(&conn, &query, limit)? {
                if with_movies {
                    let movies = movies_for_director(&conn, &hit.nconst)?;
                    println!("{}\t{}\t{}", hit.nconst, hit.name, movies.join(","));
                } else {
                    println!("{}\t{}", hit.nconst, hit.name);
                }
            }
        }
    }
    Ok(())
}
