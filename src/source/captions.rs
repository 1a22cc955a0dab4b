//! Caption track selection and `json3` normalization.
//!
//! yt-dlp reports two maps of caption tracks: `subtitles` (uploaded by the
//! channel) and `automatic_captions` (speech recognition plus YouTube's
//! machine translations, the latter recognizable by a `tlang=` parameter in
//! the track URL). Each track lists several formats; only `json3` is used.

use super::Language;
use crate::transcript::{TrackKind, TranscriptSegment};
use serde_json::Value;

/// A caption track chosen for download.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CaptionTrack {
    pub code: String,
    pub kind: TrackKind,
    pub url: String,
}

/// Pick the best caption track in `language`.
///
/// Order: manual (exact code, then regional variant), auto-generated, then
/// translated into `language` when `allow_translated` is set. Tracks in
/// other languages are never returned.
pub(crate) fn select_track(
    info: &Value,
    language: Language,
    allow_translated: bool,
) -> Option<CaptionTrack> {
    let code = language.code();

    let manual = tracks_for(&info["subtitles"], code)
        .into_iter()
        .find_map(|(key, formats)| {
            json3_url(formats).map(|url| CaptionTrack {
                code: key,
                kind: TrackKind::Manual,
                url,
            })
        });
    if manual.is_some() {
        return manual;
    }

    let mut auto: Vec<CaptionTrack> = tracks_for(&info["automatic_captions"], code)
        .into_iter()
        .filter_map(|(key, formats)| {
            let url = json3_url(formats)?;
            let kind = if key.ends_with("-orig") || !url.contains("tlang=") {
                TrackKind::AutoGenerated
            } else {
                TrackKind::Translated
            };
            Some(CaptionTrack { code: key, kind, url })
        })
        .collect();

    // Stable sort keeps exact-code tracks ahead of regional ones
    auto.sort_by_key(|t| match t.kind {
        TrackKind::AutoGenerated => 0,
        _ => 1,
    });

    auto.into_iter()
        .find(|t| t.kind == TrackKind::AutoGenerated || allow_translated)
}

/// Tracks whose key is `code`, `code-orig` or a regional `code-XX`, exact first.
fn tracks_for<'a>(tracks: &'a Value, code: &str) -> Vec<(String, &'a Value)> {
    let Some(map) = tracks.as_object() else {
        return Vec::new();
    };

    let prefix = format!("{}-", code);
    let mut matches: Vec<(String, &Value)> = map
        .iter()
        .filter(|(key, _)| key.as_str() == code || key.starts_with(&prefix))
        .map(|(key, formats)| (key.clone(), formats))
        .collect();

    matches.sort_by_key(|(key, _)| if key == code { 0 } else { 1 });
    matches
}

fn json3_url(formats: &Value) -> Option<String> {
    formats.as_array()?.iter().find_map(|f| {
        if f["ext"].as_str() == Some("json3") {
            f["url"].as_str().map(|s| s.to_string())
        } else {
            None
        }
    })
}

/// Convert a `json3` caption payload into ordered transcript segments.
///
/// Events without text (window definitions, line breaks) are dropped, and a
/// line repeated by rolling captions is kept once.
pub(crate) fn parse_json3(payload: &Value) -> Vec<TranscriptSegment> {
    let Some(events) = payload["events"].as_array() else {
        return Vec::new();
    };

    let mut timed: Vec<(f64, Option<f64>, String)> = events
        .iter()
        .filter_map(|event| {
            let segs = event["segs"].as_array()?;
            let raw: String = segs.iter().filter_map(|s| s["utf8"].as_str()).collect();
            let text = normalize_text(&raw);
            if text.is_empty() {
                return None;
            }
            let start = event["tStartMs"].as_f64().unwrap_or(0.0) / 1000.0;
            let duration = event["dDurationMs"].as_f64().map(|d| d / 1000.0);
            Some((start, duration, text))
        })
        .collect();

    timed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut segments: Vec<TranscriptSegment> = Vec::with_capacity(timed.len());
    for (i, (start, duration, text)) in timed.iter().enumerate() {
        if segments.last().is_some_and(|prev| &prev.text == text) {
            continue;
        }
        let end = match duration {
            Some(d) => start + d,
            None => timed.get(i + 1).map(|next| next.0).unwrap_or(*start),
        };
        segments.push(TranscriptSegment::new(*start, end, text.clone()));
    }

    segments
}

fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
