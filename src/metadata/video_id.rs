use url::Url;

const BARE_ID_LEN: usize = 11;
const PATH_PREFIXES: [&str; 4] = ["shorts", "embed", "live", "v"];

fn is_id_char(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '-' | '_')
}

fn valid_id(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if !candidate.is_empty() && candidate.len() <= 64 && candidate.chars().all(is_id_char) {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn is_youtube_host(host: &str) -> bool {
    host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube-nocookie.com")
}

/// Finds the video id in a watch, short-link, shorts, embed or live URL
/// without touching the network. A bare 11-character id is accepted as is.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if input.len() == BARE_ID_LEN && input.chars().all(is_id_char) {
        return Some(input.to_string());
    }

    let parsed = Url::parse(input)
        .or_else(|_| Url::parse(&format!("https://{input}")))
        .ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    let mut segments = parsed.path_segments()?.filter(|segment| !segment.is_empty());

    if host == "youtu.be" || host == "www.youtu.be" {
        return segments.next().and_then(valid_id);
    }

    if !is_youtube_host(&host) {
        return None;
    }

    if let Some(id) = parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .and_then(|(_, value)| valid_id(&value))
    {
        return Some(id);
    }

    match (segments.next(), segments.next()) {
        (Some(prefix), Some(id)) if PATH_PREFIXES.contains(&prefix) => valid_id(id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_urls() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn short_links_and_paths() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/aqz-KE-bpKQ").as_deref(),
            Some("aqz-KE-bpKQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn bare_ids() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn rejects_other_hosts_and_missing_ids() {
        assert_eq!(extract_video_id("https://vimeo.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/feed/trending"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v="), None);
        assert_eq!(extract_video_id("https://youtu.be/"), None);
        assert_eq!(extract_video_id("ftp://youtube.com/watch?v=dQw4w9WgXcQ"), None);
    }
}
