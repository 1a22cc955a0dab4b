//! Tolerant parsing of model output into summary text and topics.
//!
//! Models are asked for a "Topics:" section of `MM:SS - Label` lines, but
//! the output drifts. Heuristics, tried in order:
//!
//! 1. The whole completion is a JSON object with `summary` and `topics`.
//! 2. A heading line such as `Topics:`, `## Key topics`, `**Chapitres**` or
//!    `Themen:` splits text from topics. The topic section is read as a JSON
//!    array if it contains one, otherwise line by line.
//! 3. Without a heading, lines that are clearly topic lines (leading
//!    timestamp, or a label ending in a bracketed timestamp) are lifted out.
//!
//! Recognized topic lines, after removing bullets, numbering and markdown
//! emphasis:
//!
//! - `02:15 - Label`, `[02:15] Label`, `(1:02:15): Label`, `02:15 | Label`
//! - ranges: `02:15 - 04:00 - Label`, `[02:15-04:00] Label`, `02:15 to 04:00: Label`
//! - label first: `Label (02:15)`, `Label [02:15 - 04:00]`
//! - inside a topic section only: `Label - 02:15`, `Label: 02:15`, `Label at 02:15`
//!
//! Anything unrecognized is ignored. Topic extraction never fails the
//! summary; the worst case is an empty topic list.

use super::{StructuredSummary, Topic};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const TS: &str = r"(?:\d{1,2}:)?\d{1,3}:\d{2}";

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*|__)?\s*(?:key\s+|main\s+)?(?:topics?|chapters?|timestamps?|sujets|th[eè]mes|chapitres|themen|kapitel|zeitstempel)(?:\s+covered)?\s*(?:\*\*|__)?\s*:?\s*(?:\*\*|__)?\s*$",
        )
        .expect("heading regex is valid")
    })
}

fn summary_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*|__)?\s*(?:summary|r[ée]sum[ée]|zusammenfassung)\s*(?:\*\*|__)?\s*:?\s*(?:\*\*|__)?\s*$",
        )
        .expect("summary heading regex is valid")
    })
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[-*•+]|\d{1,2}[.)])\s+").expect("bullet regex is valid"))
}

/// `02:15 - Label` and friends.
fn leading_ts_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^[\[\(]?(?P<start>{TS})(?:\s*(?:-|–|—|to)\s*(?P<end>{TS}))?[\]\)]?\s*(?:[-–—:|.]\s*)?(?P<label>\S.*)$"
        ))
        .expect("leading timestamp regex is valid")
    })
}

/// `Label (02:15)` and `Label [02:15 - 04:00]`.
fn bracketed_ts_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^(?P<label>.*?\p{{L}}.*?)\s*[\(\[](?:at\s+)?(?P<start>{TS})(?:\s*(?:-|–|—|to)\s*(?P<end>{TS}))?[\)\]]\s*[.,;]?$"
        ))
        .expect("bracketed timestamp regex is valid")
    })
}

/// `Label - 02:15`, `Label: 02:15`, `Label at 02:15`.
fn trailing_ts_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^(?P<label>.*?\p{{L}}.*?)\s*(?:[-–—:|@]|\bat\b)\s*(?P<start>{TS})(?:\s*(?:-|–|—|to)\s*(?P<end>{TS}))?\s*[.,;]?$"
        ))
        .expect("trailing timestamp regex is valid")
    })
}

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\S+").expect("word regex is valid"))
}

/// Parse clock notation (`MM:SS` or `H:MM:SS`) into seconds.
pub fn parse_timestamp(s: &str) -> Option<u32> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let nums: Vec<u32> = parts.iter().map(|p| p.parse().ok()).collect::<Option<_>>()?;

    match nums.as_slice() {
        [m, s] if *s < 60 => m.checked_mul(60)?.checked_add(*s),
        [h, m, s] if *m < 60 && *s < 60 => h.checked_mul(3600)?.checked_add(m * 60 + s),
        _ => None,
    }
}

/// Split a completion into summary text and topics.
///
/// Topics are returned in the order found; call [`sanitize_topics`] to sort
/// and bound them.
pub fn parse_completion(raw: &str) -> StructuredSummary {
    let raw = raw.trim();

    if let Some(parsed) = parse_json_completion(raw) {
        return parsed;
    }

    let lines: Vec<&str> = raw.lines().collect();

    if let Some(idx) = lines.iter().rposition(|l| heading_regex().is_match(l)) {
        let text = clean_text(&lines[..idx]);
        let section = lines[idx + 1..].join("\n");
        let topics = parse_topic_section(&section);
        let text = if text.is_empty() { clean_text(&lines) } else { text };
        return StructuredSummary { text, topics };
    }

    let mut topics = Vec::new();
    let mut prose = Vec::new();
    for line in &lines {
        match parse_topic_line(line, false) {
            Some(topic) => topics.push(topic),
            None => prose.push(*line),
        }
    }

    let text = clean_text(&prose);
    if text.is_empty() {
        // Nothing but topic lines: keep them as the text too
        return StructuredSummary {
            text: clean_text(&lines),
            topics,
        };
    }
    StructuredSummary { text, topics }
}

/// Sort, dedupe and bound topics by the video duration.
pub fn sanitize_topics(topics: Vec<Topic>, duration_seconds: Option<u32>) -> Vec<Topic> {
    let limit = duration_seconds.filter(|d| *d > 0);

    let mut topics: Vec<Topic> = topics
        .into_iter()
        .filter(|t| !t.label.trim().is_empty())
        .filter(|t| limit.map_or(true, |d| t.start_seconds <= d))
        .map(|mut t| {
            t.label = t.label.trim().to_string();
            t.end_seconds = t
                .end_seconds
                .filter(|end| *end > t.start_seconds)
                .map(|end| limit.map_or(end, |d| end.min(d)));
            t
        })
        .collect();

    topics.sort_by_cached_key(|t| (t.start_seconds, t.label.to_lowercase()));
    topics.dedup_by(|b, a| {
        a.start_seconds == b.start_seconds && a.label.to_lowercase() == b.label.to_lowercase()
    });
    topics
}

/// Cut text longer than `max_words` back to the last sentence end within the limit.
///
/// Falls back to a word boundary when no sentence ends within the limit.
pub fn clamp_words(text: &str, max_words: usize) -> String {
    let Some(first_over) = word_regex().find_iter(text).nth(max_words) else {
        return text.to_string();
    };

    let prefix = &text[..first_over.start()];
    let cut = last_sentence_end(prefix).unwrap_or(prefix.len());
    prefix[..cut].trim_end().to_string()
}

fn last_sentence_end(text: &str) -> Option<usize> {
    let mut last = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |(_, next)| next.is_whitespace())
        {
            last = Some(i + c.len_utf8());
        }
    }
    last.filter(|end| *end > 0)
}

fn clean_text(lines: &[&str]) -> String {
    let mut lines: Vec<&str> = lines.to_vec();
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    if lines.first().is_some_and(|l| summary_heading_regex().is_match(l)) {
        lines.remove(0);
    }
    lines.join("\n").trim().to_string()
}

fn parse_topic_section(section: &str) -> Vec<Topic> {
    if let (Some(start), Some(end)) = (section.find('['), section.rfind(']')) {
        if start < end {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&section[start..=end]) {
                let topics: Vec<Topic> = items.iter().filter_map(topic_from_json).collect();
                if !topics.is_empty() {
                    return topics;
                }
            }
        }
    }

    section
        .lines()
        .filter_map(|line| parse_topic_line(line, true))
        .collect()
}

/// Parse one topic line. `in_section` enables the looser label-first forms.
fn parse_topic_line(line: &str, in_section: bool) -> Option<Topic> {
    let line = line.trim().replace("**", "").replace("__", "").replace('`', "");
    let line = bullet_regex().replace(line.trim(), "");
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let caps = leading_ts_regex()
        .captures(line)
        .or_else(|| bracketed_ts_regex().captures(line))
        .or_else(|| {
            if in_section {
                trailing_ts_regex().captures(line)
            } else {
                None
            }
        })?;

    let label = caps
        .name("label")?
        .as_str()
        .trim()
        .trim_matches(|c: char| matches!(c, '-' | '–' | '—' | ':' | '|' | '"' | '\''))
        .trim()
        .to_string();
    if !label.chars().any(char::is_alphabetic) {
        return None;
    }

    let start = parse_timestamp(caps.name("start")?.as_str())?;
    let end = caps.name("end").and_then(|m| parse_timestamp(m.as_str()));

    Some(Topic {
        label,
        start_seconds: start,
        end_seconds: end,
    })
}

fn parse_json_completion(raw: &str) -> Option<StructuredSummary> {
    let body = raw
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if !body.starts_with('{') {
        return None;
    }

    let value: Value = serde_json::from_str(body).ok()?;
    let text = ["summary", "text"]
        .iter()
        .find_map(|k| value[*k].as_str())?
        .trim()
        .to_string();
    if text.is_empty() {
        return None;
    }

    let topics = value["topics"]
        .as_array()
        .map(|items| items.iter().filter_map(topic_from_json).collect())
        .unwrap_or_default();

    Some(StructuredSummary { text, topics })
}

fn topic_from_json(item: &Value) -> Option<Topic> {
    let label = ["label", "title", "topic", "name"]
        .iter()
        .find_map(|k| item[*k].as_str())?
        .trim()
        .to_string();
    let start = ["start_seconds", "offset_seconds", "start", "timestamp", "time"]
        .iter()
        .find_map(|k| seconds_from_json(&item[*k]))?;
    let end = ["end_seconds", "end"]
        .iter()
        .find_map(|k| seconds_from_json(&item[*k]));

    Some(Topic {
        label,
        start_seconds: start,
        end_seconds: end,
    })
}

fn seconds_from_json(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_f64().filter(|s| *s >= 0.0).map(|s| s.round() as u32),
        Value::String(s) => parse_timestamp(s).or_else(|| s.trim().parse().ok()),
        _ => None,
    }
}
