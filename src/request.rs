use serde::Deserialize;

use crate::{config::non_empty, error::ApiError};

const PLACEHOLDER_VALUE: &str = "undefined";
const DEFAULT_TITLE: &str = "audio";
const MAX_VIDEO_ID_LEN: usize = 64;
const UNSAFE_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Raw query string of the delivery endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
    pub title: Option<String>,
}

/// Raw query string of the metadata endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FetchInfoQuery {
    pub url: Option<String>,
}

/// A video identifier that is safe to embed into the watch URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoId(String);

impl VideoId {
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        let value = present(raw).ok_or_else(|| ApiError::validation("Missing video ID."))?;

        let well_formed = value.len() <= MAX_VIDEO_ID_LEN
            && value
                .chars()
                .all(|character| character.is_ascii_alphanumeric() || matches!(character, '-' | '_'));
        if !well_formed {
            return Err(ApiError::validation("Invalid video ID."));
        }

        Ok(Self(value.to_string()))
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub video_id: VideoId,
    pub title: String,
}

impl DownloadRequest {
    pub fn from_query(query: &DownloadQuery) -> Result<Self, ApiError> {
        let video_id = VideoId::parse(query.video_id.as_deref())?;
        let title = query
            .title
            .as_deref()
            .and_then(non_empty)
            .unwrap_or(DEFAULT_TITLE)
            .to_string();

        Ok(Self { video_id, title })
    }

    pub fn filename(&self) -> SanitizedFilename {
        SanitizedFilename::from_title(&self.title)
    }
}

/// Validates the `url` parameter of a metadata request.
pub fn metadata_url(query: &FetchInfoQuery) -> Result<String, ApiError> {
    present(query.url.as_deref())
        .map(ToString::to_string)
        .ok_or_else(|| ApiError::validation("Missing YouTube URL."))
}

/// Treats absent, blank and the literal `undefined` (what a JS client sends
/// for an unset variable) as missing.
fn present(raw: Option<&str>) -> Option<&str> {
    raw.and_then(non_empty)
        .filter(|value| *value != PLACEHOLDER_VALUE)
}

/// `<title>.mp3` with header- and filesystem-unsafe characters replaced.
/// Only ever used for `Content-Disposition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedFilename(String);

impl SanitizedFilename {
    pub fn from_title(title: &str) -> Self {
        let mut stem = String::with_capacity(title.len());
        let mut previous_replaced = false;

        for character in title.chars() {
            if UNSAFE_FILENAME_CHARS.contains(&character) {
                if !previous_replaced {
                    stem.push('_');
                }
                previous_replaced = true;
            } else if !character.is_control() {
                stem.push(character);
                previous_replaced = false;
            }
        }

        let stem = stem.trim();
        let stem = if stem.is_empty() { DEFAULT_TITLE } else { stem };
        Self(format!("{stem}.mp3"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quoted `filename` is an ASCII fallback; `filename*` keeps the UTF-8 name.
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii_fallback(&self.0),
            urlencoding::encode(&self.0)
        )
    }
}

fn ascii_fallback(value: &str) -> String {
    let fallback: String = value
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric()
                || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
            {
                character
            } else {
                '_'
            }
        })
        .collect();

    let compact = fallback.trim();
    if compact.is_empty() {
        format!("{DEFAULT_TITLE}.mp3")
    } else {
        compact.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(video_id: Option<&str>, title: Option<&str>) -> DownloadQuery {
        DownloadQuery {
            video_id: video_id.map(ToString::to_string),
            title: title.map(ToString::to_string),
        }
    }

    #[test]
    fn rejects_missing_blank_and_placeholder_ids() {
        for raw in [None, Some(""), Some("   "), Some("undefined")] {
            let error = DownloadRequest::from_query(&query(raw, None)).unwrap_err();
            assert_eq!(error.message, "Missing video ID.");
        }
    }

    #[test]
    fn rejects_ids_that_would_alter_the_watch_url() {
        for raw in ["abc&list=xyz", "../etc", "a b", "id#frag"] {
            assert!(VideoId::parse(Some(raw)).is_err(), "{raw} accepted");
        }
    }

    #[test]
    fn title_defaults_to_audio() {
        let request = DownloadRequest::from_query(&query(Some("dQw4w9WgXcQ"), Some(" "))).unwrap();
        assert_eq!(request.title, "audio");
        assert_eq!(request.filename().as_str(), "audio.mp3");
        assert_eq!(
            request.video_id.watch_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn filename_never_contains_unsafe_characters() {
        let titles = [
            "AC/DC - Back In Black",
            "What? Why: <live> \"remix\"",
            "a\\b|c*d",
            "<>:\"/\\|?*",
            "line\nbreak\ttab",
            "Beyoncé – Halo",
            "",
        ];

        for title in titles {
            let filename = SanitizedFilename::from_title(title);
            let value = filename.as_str();
            assert!(value.ends_with(".mp3"), "{value}");
            assert!(
                !value.chars().any(|c| UNSAFE_FILENAME_CHARS.contains(&c) || c.is_control()),
                "{value}"
            );
        }
    }

    #[test]
    fn unsafe_runs_collapse_to_one_underscore() {
        assert_eq!(
            SanitizedFilename::from_title("AC/DC: Live?").as_str(),
            "AC_DC_ Live_.mp3"
        );
        assert_eq!(SanitizedFilename::from_title("a<>:b").as_str(), "a_b.mp3");
    }

    #[test]
    fn content_disposition_carries_both_forms() {
        let header = SanitizedFilename::from_title("Beyoncé").content_disposition();
        assert_eq!(
            header,
            "attachment; filename=\"Beyonc_.mp3\"; filename*=UTF-8''Beyonc%C3%A9.mp3"
        );
    }

    #[test]
    fn quoted_filename_is_plain_ascii() {
        for title in ["Beyoncé – Halo", "東京 Night", "Mötley Crüe (Live)", "AC/DC: Live?"] {
            let header = SanitizedFilename::from_title(title).content_disposition();
            let quoted = header
                .split('"')
                .nth(1)
                .unwrap();
            assert!(quoted.is_ascii(), "{quoted}");
            assert!(quoted.ends_with(".mp3"), "{quoted}");
        }

        let header = SanitizedFilename::from_title("Mötley Crüe (Live)").content_disposition();
        assert!(header.starts_with("attachment; filename=\"M_tley Cr_e (Live).mp3\""), "{header}");
        assert!(header.ends_with("filename*=UTF-8''M%C3%B6tley%20Cr%C3%BCe%20%28Live%29.mp3"), "{header}");
    }

    #[test]
    fn metadata_url_is_required() {
        let missing = FetchInfoQuery { url: Some("undefined".to_string()) };
        assert_eq!(metadata_url(&missing).unwrap_err().message, "Missing YouTube URL.");

        let present = FetchInfoQuery {
            url: Some(" https://youtu.be/dQw4w9WgXcQ ".to_string()),
        };
        assert_eq!(metadata_url(&present).unwrap(), "https://youtu.be/dQw4w9WgXcQ");
    }
}
