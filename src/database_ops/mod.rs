//! Director enrichment stages. Each module owns one step of the pipeline and exposes plain
//! functions that take the previous step's output; `crate::orchestrator` wires them together.

pub mod compact;
pub mod extract;
pub mod indexes;
pub mod join;
pub mod loader;
pub mod movies;
pub mod names;
pub mod principals;
pub mod schema;

/// Literal IMDb uses for an absent value.
pub const NULL_SENTINEL: &str = "\\N";

/// Role value in `title.principals` that marks a director credit.
pub const DIRECTOR_ROLE: &str = "director";

pub type MovieKey = String;
pub type PersonKey = String;
