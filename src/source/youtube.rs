//! YouTube source implementation.
//!
//! Metadata and caption track listings come from `yt-dlp --dump-json`; the
//! chosen caption track is downloaded directly in `json3` format.

use super::captions::{parse_json3, select_track};
use super::{watch_url, Language, MetadataFetcher, TranscriptFetcher, VideoMetadata};
use crate::config::YoutubeSettings;
use crate::error::{RecapError, Result};
use crate::transcript::Transcript;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Availability values that put a video out of reach.
const UNAVAILABLE_STATES: [&str; 4] = ["private", "needs_auth", "subscriber_only", "premium_only"];

/// YouTube transcript and metadata source backed by yt-dlp.
pub struct YoutubeSource {
    ytdlp: String,
    http: reqwest::Client,
    allow_translated: bool,
}

impl YoutubeSource {
    pub fn new() -> Self {
        Self::with_settings(&YoutubeSettings::default())
    }

    pub fn with_settings(settings: &YoutubeSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            ytdlp: settings.ytdlp_path.clone(),
            http,
            allow_translated: settings.allow_translated,
        }
    }

    /// Run yt-dlp and return its JSON description of the video.
    async fn probe(&self, video_id: &str) -> Result<Value> {
        let url = watch_url(video_id);

        let output = tokio::process::Command::new(&self.ytdlp)
            .args(["--dump-json", "--no-download", "--no-warnings", "--no-playlist", &url])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RecapError::ToolNotFound(self.ytdlp.clone())
                } else {
                    RecapError::ToolFailed(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_ytdlp_failure(video_id, &stderr));
        }

        let json: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            RecapError::ToolFailed(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        ensure_available(video_id, &json)?;
        Ok(json)
    }

    /// Download a caption track in json3 format.
    async fn download_captions(&self, url: &str) -> Result<Value> {
        let response = self.http.get(url).send().await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(RecapError::RateLimited(
                    "caption download throttled (HTTP 429)".to_string(),
                ))
            }
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                return Err(RecapError::NoTranscript(format!(
                    "caption track rejected with HTTP {}",
                    response.status()
                )))
            }
            _ => {}
        }

        Ok(response.error_for_status()?.json().await?)
    }
}

impl Default for YoutubeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptFetcher for YoutubeSource {
    #[instrument(skip(self), fields(language = %language))]
    async fn fetch_transcript(&self, video_id: &str, language: Language) -> Result<Transcript> {
        let info = self.probe(video_id).await?;

        let track = select_track(&info, language, self.allow_translated).ok_or_else(|| {
            RecapError::NoTranscript(format!("{} has no {} captions", video_id, language))
        })?;
        debug!("Using {} caption track {}", track.kind, track.code);

        let payload = self.download_captions(&track.url).await?;
        let segments = parse_json3(&payload);
        if segments.is_empty() {
            return Err(RecapError::NoTranscript(format!(
                "caption track {} for {} is empty",
                track.code, video_id
            )));
        }

        info!(
            "Fetched {} caption segments ({} track {})",
            segments.len(),
            track.kind,
            track.code
        );

        Ok(Transcript::new(
            video_id.to_string(),
            language,
            track.code,
            track.kind,
            segments,
        ))
    }
}

#[async_trait]
impl MetadataFetcher for YoutubeSource {
    #[instrument(skip(self))]
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        let info = self.probe(video_id).await?;
        Ok(metadata_from_json(video_id, &info))
    }
}

/// Map a yt-dlp failure message onto the error taxonomy.
fn classify_ytdlp_failure(video_id: &str, stderr: &str) -> RecapError {
    let message = stderr.trim();
    let lower = message.to_lowercase();

    if lower.contains("http error 429") || lower.contains("too many requests") {
        RecapError::RateLimited(format!("yt-dlp was throttled for {}", video_id))
    } else if [
        "private video",
        "video unavailable",
        "this video is unavailable",
        "has been removed",
        "not available in your country",
        "confirm your age",
        "members-only",
        "account associated with this video has been terminated",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
    {
        RecapError::VideoUnavailable(format!("{}: {}", video_id, message))
    } else if lower.contains("incomplete youtube id") || lower.contains("is not a valid url") {
        RecapError::InvalidInput(format!("{}: {}", video_id, message))
    } else {
        RecapError::ToolFailed(format!("yt-dlp failed for {}: {}", video_id, message))
    }
}

fn ensure_available(video_id: &str, info: &Value) -> Result<()> {
    if let Some(state) = info["availability"].as_str() {
        if UNAVAILABLE_STATES.contains(&state) {
            return Err(RecapError::VideoUnavailable(format!("{} is {}", video_id, state)));
        }
    }
    if info["age_limit"].as_u64().is_some_and(|age| age > 0) {
        return Err(RecapError::VideoUnavailable(format!("{} is age-restricted", video_id)));
    }
    Ok(())
}

/// Normalize yt-dlp's JSON into `VideoMetadata`.
fn metadata_from_json(video_id: &str, json: &Value) -> VideoMetadata {
    let text = |key: &str| {
        json[key]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    // yt-dlp returns the date as YYYYMMDD
    let published_at = json["upload_date"]
        .as_str()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok());

    VideoMetadata {
        video_id: video_id.to_string(),
        title: text("title"),
        channel: text("channel").or_else(|| text("uploader")),
        view_count: json["view_count"].as_u64(),
        duration_seconds: json["duration"].as_f64().map(|d| d.round() as u32),
        published_at,
        subscriber_count: json["channel_follower_count"].as_u64(),
        thumbnail_url: text("thumbnail"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_from_json() {
        let info = json!({
            "title": "Rust in 100 Seconds",
            "channel": "Fireship",
            "view_count": 1_500_000,
            "duration": 149.0,
            "upload_date": "20210720",
            "channel_follower_count": 3_000_000,
            "thumbnail": "https://i.ytimg.com/vi/5C_HPTJg5ek/maxresdefault.jpg"
        });

        let meta = metadata_from_json("5C_HPTJg5ek", &info);
        assert_eq!(meta.title.as_deref(), Some("Rust in 100 Seconds"));
        assert_eq!(meta.channel.as_deref(), Some("Fireship"));
        assert_eq!(meta.view_count, Some(1_500_000));
        assert_eq!(meta.duration_seconds, Some(149));
        assert_eq!(meta.published_at, NaiveDate::from_ymd_opt(2021, 7, 20));
        assert_eq!(meta.subscriber_count, Some(3_000_000));
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let info = json!({"title": "", "uploader": "Someone", "view_count": 0});

        let meta = metadata_from_json("abc", &info);
        assert_eq!(meta.title, None);
        assert_eq!(meta.channel.as_deref(), Some("Someone"));
        assert_eq!(meta.view_count, Some(0));
        assert_eq!(meta.duration_seconds, None);
        assert_eq!(meta.published_at, None);
        assert_eq!(meta.subscriber_count, None);
        assert_eq!(meta.thumbnail_url, None);
    }

    #[test]
    fn test_classify_ytdlp_failure() {
        assert!(matches!(
            classify_ytdlp_failure("x", "ERROR: [youtube] x: Private video. Sign in if you've been granted access"),
            RecapError::VideoUnavailable(_)
        ));
        assert!(matches!(
            classify_ytdlp_failure("x", "ERROR: unable to download webpage: HTTP Error 429: Too Many Requests"),
            RecapError::RateLimited(_)
        ));
        assert!(matches!(
            classify_ytdlp_failure("x", "ERROR: [youtube] x: The uploader has not made this video available in your country"),
            RecapError::VideoUnavailable(_)
        ));
        assert!(matches!(
            classify_ytdlp_failure("x", "ERROR: something odd"),
            RecapError::ToolFailed(_)
        ));
    }

    #[test]
    fn test_ensure_available() {
        assert!(ensure_available("x", &json!({"availability": "public", "age_limit": 0})).is_ok());
        assert!(matches!(
            ensure_available("x", &json!({"availability": "private"})),
            Err(RecapError::VideoUnavailable(_))
        ));
        assert!(matches!(
            ensure_available("x", &json!({"age_limit": 18})),
            Err(RecapError::VideoUnavailable(_))
        ));
    }
}
