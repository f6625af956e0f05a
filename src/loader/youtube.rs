//! Video transcript loader.
//!
//! Resolves the video id from the URL, reads the caption track list embedded
//! in the watch page, picks a track by language preference (manual captions
//! before auto-generated ones) and joins the timed-text segments into one
//! transcript.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;

use super::error::{LoadError, LoadResult};
use super::fetch::fetch_text;
use super::{DocumentLoader, DocumentType, LoaderSettings, RawInput, require_url};

static RE_VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/|/live/|/v/)([A-Za-z0-9_-]{11})").unwrap()
});

const CAPTION_TRACKS_KEY: &str = "\"captionTracks\":";

/// One entry of the watch page's `captionTracks` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    /// `"asr"` for auto-generated captions, absent for manual ones.
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Transcript loader backed by the public watch page and timed-text endpoint.
pub struct YoutubeLoader {
    timeout: Duration,
    languages: Vec<String>,
}

impl YoutubeLoader {
    pub fn new(settings: &LoaderSettings) -> Self {
        Self {
            timeout: settings.http_timeout,
            languages: settings.transcript_languages.clone(),
        }
    }
}

impl DocumentLoader for YoutubeLoader {
    fn load(&self, input: &RawInput) -> LoadResult<String> {
        let url = require_url(DocumentType::Youtube, input)?;
        let id = video_id(url).ok_or_else(|| LoadError::InvalidUrl {
            document_type: DocumentType::Youtube.to_string(),
            url: url.to_string(),
        })?;

        let watch_url = format!("https://www.youtube.com/watch?v={id}");
        let page = fetch_text(&watch_url, self.timeout)?;
        let tracks = caption_tracks(&page)?;
        let track = select_track(&tracks, &self.languages).ok_or_else(|| {
            LoadError::NoTranscript {
                video_id: id.clone(),
            }
        })?;

        tracing::debug!(
            video_id = %id,
            language = %track.language_code,
            generated = track.is_generated(),
            "caption track selected"
        );

        let xml = fetch_text(&track.base_url, self.timeout)?;
        let transcript = transcript_text(&xml);
        if transcript.is_empty() {
            return Err(LoadError::NoTranscript { video_id: id });
        }
        Ok(transcript)
    }
}

/// Extract the 11-character video id from any common video URL shape.
pub fn video_id(url: &str) -> Option<String> {
    RE_VIDEO_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Read the caption track list out of a watch page.
///
/// Returns an empty list when the page has no captions at all.
pub fn caption_tracks(page: &str) -> LoadResult<Vec<CaptionTrack>> {
    let Some(start) = page.find(CAPTION_TRACKS_KEY) else {
        return Ok(Vec::new());
    };
    let rest = &page[start + CAPTION_TRACKS_KEY.len()..];
    let array = json_array_prefix(rest).ok_or_else(|| LoadError::Parse {
        format: "youtube".into(),
        message: "unterminated captionTracks array".into(),
    })?;

    serde_json::from_str(array).map_err(|e| LoadError::Parse {
        format: "youtube".into(),
        message: format!("captionTracks: {e}"),
    })
}

/// Slice the leading JSON array (brackets balanced, strings respected).
fn json_array_prefix(s: &str) -> Option<&str> {
    let s = s.trim_start();
    if !s.starts_with('[') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pick a track: for each preferred language, a manual track first, then a
/// generated one; otherwise the first track offered.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    languages: &[String],
) -> Option<&'a CaptionTrack> {
    for lang in languages {
        let matching = |t: &&CaptionTrack| t.language_code.eq_ignore_ascii_case(lang);
        if let Some(t) = tracks.iter().filter(matching).find(|t| !t.is_generated()) {
            return Some(t);
        }
        if let Some(t) = tracks.iter().find(matching) {
            return Some(t);
        }
    }
    tracks.first()
}

/// Join the segments of a timed-text document into plain text.
///
/// Handles both the classic `<text>` format and the `srv3` `<p>` format.
pub fn transcript_text(xml: &str) -> String {
    let fragment = Html::parse_fragment(xml);
    let Ok(sel) = Selector::parse("text, p") else {
        return String::new();
    };

    fragment
        .select(&sel)
        .map(|el| decode_entities(&el.text().collect::<String>()))
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Caption text is often entity-encoded twice; undo the second layer.
fn decode_entities(s: &str) -> String {
    s.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_from_url_shapes() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(video_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ"), id);
        assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ?t=42"), id);
        assert_eq!(video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(video_id("https://example.com/video"), None);
    }

    #[test]
    fn caption_tracks_from_watch_page() {
        let page = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=en","name":{"simpleText":"English [auto]"},"languageCode":"en","kind":"asr"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=x&lang=pt","name":{"simpleText":"Português"},"languageCode":"pt"}],"audioTracks":[]}}};</script>"#;

        let tracks = caption_tracks(page).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].base_url, "https://www.youtube.com/api/timedtext?v=x&lang=en");
        assert!(tracks[0].is_generated());
        assert_eq!(tracks[1].language_code, "pt");
        assert!(!tracks[1].is_generated());
    }

    #[test]
    fn page_without_captions_has_no_tracks() {
        assert!(caption_tracks("<html>no captions here</html>").unwrap().is_empty());
    }

    #[test]
    fn brackets_inside_strings_do_not_end_the_array() {
        let s = r#"[{"baseUrl":"a]b","languageCode":"en"}] trailing"#;
        assert_eq!(json_array_prefix(s), Some(r#"[{"baseUrl":"a]b","languageCode":"en"}]"#));
    }

    fn track(lang: &str, generated: bool) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://example.com/{lang}/{generated}"),
            language_code: lang.into(),
            kind: generated.then(|| "asr".to_string()),
        }
    }

    #[test]
    fn select_prefers_language_order_then_manual() {
        let tracks = vec![track("en", true), track("en", false), track("pt", true)];
        let langs = vec!["pt".to_string(), "en".to_string()];
        let chosen = select_track(&tracks, &langs).unwrap();
        assert_eq!(chosen.language_code, "pt");

        let langs = vec!["en".to_string()];
        let chosen = select_track(&tracks, &langs).unwrap();
        assert!(!chosen.is_generated());
    }

    #[test]
    fn select_falls_back_to_first_track() {
        let tracks = vec![track("de", false)];
        let langs = vec!["pt".to_string()];
        assert_eq!(select_track(&tracks, &langs).unwrap().language_code, "de");
        assert!(select_track(&[], &langs).is_none());
    }

    #[test]
    fn transcript_joins_segments() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0" dur="1.2">Hello   there</text><text start="1.2" dur="2">it&amp;#39;s a
test</text></transcript>"#;
        assert_eq!(transcript_text(xml), "Hello there it's a test");
    }

    #[test]
    fn transcript_srv3_format() {
        let xml = r#"<timedtext format="3"><body><p t="0" d="1000"><s>one</s><s> two</s></p><p t="1000" d="500">three</p></body></timedtext>"#;
        assert_eq!(transcript_text(xml), "one two three");
    }
}
