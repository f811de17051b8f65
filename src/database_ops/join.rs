use tracing::info;

use super::names::ResolvedNames;
use super::principals::DirectorMultimap;

/// Drop every director that did not get a name. After this, each link's director key has a
/// matching entry in `names`, which is what keeps `movie_directors` free of orphans.
pub fn retain_named(mut multimap: DirectorMultimap, names: &ResolvedNames) -> DirectorMultimap {
    let before = multimap.len();
    multimap.retain(|director| names.contains(director));
    info!(
        kept = multimap.len(),
        dropped = before - multimap.len(),
        links = multimap.link_count(),
        "filtered directors without names"
    );
    multimap
}
