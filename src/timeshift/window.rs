//! Playback window calculation
//!
//! The client sends the programme start in UTC; providers expect their own
//! local time. Duration comes from the EPG programme covering the requested
//! instant, plus a startup buffer, bounded to eight hours.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use super::diagnostics::Diagnostics;
use crate::models::{PlaybackWindow, Program};
use crate::repositories::EpgRepository;
use crate::utils::time::{format_catchup_timestamp, utc_to_local};

/// Duration used when no programme covers the requested instant
pub const DEFAULT_DURATION_MINUTES: u32 = 120;
/// Added to every programme length
pub const BUFFER_MINUTES: i64 = 5;
pub const MIN_DURATION_MINUTES: u32 = 5;
pub const MAX_DURATION_MINUTES: u32 = 480;

/// `ceil(minutes(end - start)) + 5`, clamped to `[5, 480]`
pub fn program_duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let seconds = (end - start).num_seconds().max(0);
    let minutes = (seconds + 59) / 60 + BUFFER_MINUTES;
    minutes.clamp(MIN_DURATION_MINUTES as i64, MAX_DURATION_MINUTES as i64) as u32
}

/// Duration for an optional EPG match
pub fn duration_for(program: Option<&Program>) -> u32 {
    match program {
        Some(p) => program_duration_minutes(p.start_time, p.end_time),
        None => DEFAULT_DURATION_MINUTES,
    }
}

/// Compute the provider-local window for `requested_at` on `channel_id`.
///
/// EPG lookup failures degrade to the default duration; the catch-up still
/// plays, only with a generic length.
pub async fn compute_window(
    epg: &dyn EpgRepository,
    channel_id: i64,
    requested_at: DateTime<Utc>,
    provider_timezone: Tz,
    diagnostics: &Diagnostics,
) -> PlaybackWindow {
    let start_local = utc_to_local(requested_at, provider_timezone);
    diagnostics.step(
        "window",
        format!(
            "{} UTC -> {} {}",
            format_catchup_timestamp(&requested_at),
            format_catchup_timestamp(&start_local),
            provider_timezone
        ),
    );

    let program = match epg.program_at(channel_id, requested_at).await {
        Ok(program) => program,
        Err(e) => {
            warn!(
                "EPG lookup failed for channel {}: {}, using default {}min",
                channel_id, e, DEFAULT_DURATION_MINUTES
            );
            None
        }
    };

    let duration_minutes = duration_for(program.as_ref());
    match &program {
        Some(p) => diagnostics.step(
            "window",
            format!(
                "programme '{}' -> {}min (incl. {}min buffer)",
                p.title, duration_minutes, BUFFER_MINUTES
            ),
        ),
        None => diagnostics.step(
            "window",
            format!("no programme at requested time, using default {duration_minutes}min"),
        ),
    }

    PlaybackWindow {
        start_local,
        duration_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{CatalogSnapshot, InMemoryCatalog};
    use chrono::Duration;
    use rstest::rstest;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[rstest]
    #[case(45 * 60, 50)]
    #[case(44 * 60 + 1, 50)]
    #[case(0, 5)]
    #[case(-600, 5)]
    #[case(1, 6)]
    #[case(475 * 60, 480)]
    #[case(476 * 60, 480)]
    #[case(24 * 3600, 480)]
    fn test_program_duration(#[case] seconds: i64, #[case] expected: u32) {
        let start = at("2025-01-15T14:30:00Z");
        let end = start + Duration::seconds(seconds);
        assert_eq!(program_duration_minutes(start, end), expected);
    }

    #[test]
    fn test_missing_program_is_default() {
        assert_eq!(duration_for(None), 120);
    }

    fn epg() -> InMemoryCatalog {
        InMemoryCatalog::new(CatalogSnapshot {
            programs: vec![Program {
                id: 1,
                channel_id: 100,
                title: "News".into(),
                description: None,
                start_time: at("2025-01-15T14:30:00Z"),
                end_time: at("2025-01-15T15:15:00Z"),
            }],
            ..CatalogSnapshot::default()
        })
    }

    #[tokio::test]
    async fn test_window_from_epg() {
        let window = compute_window(
            &epg(),
            100,
            at("2025-01-15T14:30:00Z"),
            chrono_tz::UTC,
            &Diagnostics::default(),
        )
        .await;
        assert_eq!(window.timestamp(), "2025-01-15:14-30");
        assert_eq!(window.duration_minutes, 50);
    }

    #[tokio::test]
    async fn test_window_converts_to_provider_time() {
        let window = compute_window(
            &epg(),
            100,
            at("2025-01-15T14:30:00Z"),
            chrono_tz::Europe::Brussels,
            &Diagnostics::default(),
        )
        .await;
        assert_eq!(window.timestamp(), "2025-01-15:15-30");
        assert_eq!(window.duration_minutes, 50);
    }

    #[tokio::test]
    async fn test_window_without_programme() {
        let window = compute_window(
            &epg(),
            999,
            at("2025-01-15T14:30:00Z"),
            chrono_tz::UTC,
            &Diagnostics::default(),
        )
        .await;
        assert_eq!(window.duration_minutes, 120);
    }
}
