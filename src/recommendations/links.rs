//! Outbound links for recommendations: MusicBrainz, YouTube and Spotify.

use crate::models::EntityKind;
use crate::recommendations::types::ExternalLinks;

const MUSICBRAINZ_BASE: &str = "https://musicbrainz.org";
const YOUTUBE_SEARCH: &str = "https://www.youtube.com/results?search_query=";
const SPOTIFY_SEARCH: &str = "https://open.spotify.com/search/";

fn musicbrainz_entity(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Artist => "artist",
        EntityKind::Album => "release",
        EntityKind::Track => "recording",
    }
}

/// Build the link set for a recommendation.
///
/// `artist` is ignored for artist results; for albums and tracks it is
/// prepended to the search text so lookups are not ambiguous.
pub fn build_links(
    kind: EntityKind,
    name: &str,
    artist: &str,
    mbid: Option<&str>,
    source_url: &str,
) -> ExternalLinks {
    let query = match kind {
        EntityKind::Artist => name.trim().to_string(),
        EntityKind::Album | EntityKind::Track => {
            format!("{} {}", artist.trim(), name.trim()).trim().to_string()
        }
    };
    let encoded = urlencoding::encode(&query);
    let entity = musicbrainz_entity(kind);

    let musicbrainz = match mbid.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("{}/{}/{}", MUSICBRAINZ_BASE, entity, id),
        None => format!(
            "{}/search?query={}&type={}",
            MUSICBRAINZ_BASE, encoded, entity
        ),
    };

    ExternalLinks {
        source_url: source_url.to_string(),
        musicbrainz,
        youtube_search: format!("{}{}", YOUTUBE_SEARCH, encoded),
        spotify_search: format!("{}{}", SPOTIFY_SEARCH, encoded),
    }
}
