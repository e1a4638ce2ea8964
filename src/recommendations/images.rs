//! Picks a display image from the size-tagged candidates the metadata
//! service returns, ignoring its deprecated placeholder star.

use crate::metadata::ImageCandidate;

/// Hash in the URL of the metadata service's deprecated default star image.
pub const PLACEHOLDER_MARKER: &str = "2a96cbd8b46e442fc41c2b86b821562f";

/// Size tags in order of preference.
pub const SIZE_PREFERENCE: [&str; 4] = ["extralarge", "large", "medium", "mega"];

pub fn is_placeholder(url: &str) -> bool {
    url.contains(PLACEHOLDER_MARKER)
}

/// Pick the best usable image URL.
///
/// Preferred sizes are tried in [`SIZE_PREFERENCE`] order; failing that, the
/// first non-placeholder URL of any size wins.
pub fn resolve_image(candidates: &[ImageCandidate]) -> Option<String> {
    let usable = |c: &&ImageCandidate| !c.url.trim().is_empty() && !is_placeholder(&c.url);

    SIZE_PREFERENCE
        .iter()
        .find_map(|size| {
            candidates
                .iter()
                .filter(usable)
                .find(|c| c.size.eq_ignore_ascii_case(size))
        })
        .or_else(|| candidates.iter().find(usable))
        .map(|c| c.url.clone())
}
