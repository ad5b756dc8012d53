//! Catch-up path recognition
//!
//! Matches `/timeshift/{username}/{password}/{epg_channel}/{YYYY-MM-DD:HH-MM}/{stream_id}.{ext}`
//! independently of the router so it can run before any route or fallback
//! claims the path.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::CatchupRequest;
use crate::utils::time::parse_catchup_timestamp;

static CATCHUP_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/?timeshift/([^/]+)/([^/]+)/([^/]+)/(\d{4}-\d{2}-\d{2}:\d{2}-\d{2})/([^/.]+)\.([A-Za-z0-9]+)$",
    )
    .expect("catch-up path pattern is valid")
});

/// Parse `path` into a [`CatchupRequest`] when it has the catch-up shape.
///
/// Returns `None` for every other path, including ones whose timestamp is
/// not a real calendar minute or whose credentials are not valid
/// percent-encoded UTF-8.
pub fn match_catchup_path(path: &str) -> Option<CatchupRequest> {
    let caps = CATCHUP_PATH.captures(path)?;

    let username = urlencoding::decode(&caps[1]).ok()?.into_owned();
    let password = urlencoding::decode(&caps[2]).ok()?.into_owned();
    let requested_at = parse_catchup_timestamp(&caps[4])?;

    Some(CatchupRequest {
        username,
        password,
        epg_channel_number: caps[3].to_string(),
        requested_at,
        provider_stream_id: caps[5].to_string(),
        extension: caps[6].to_string(),
    })
}
