use once_cell::sync::Lazy;
use regex::Regex;

// youtu.be/ID, youtube.com/watch?v=ID, youtube.com/embed/ID
static PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)(?:https?://)?(?:www\.)?youtu\.be/([a-zA-Z0-9_-]{11})").unwrap(),
        Regex::new(r"(?i)(?:https?://)?(?:www\.|m\.)?youtube\.com/watch\?(?:[^\s&]*&(?:amp;)?)*v=([a-zA-Z0-9_-]{11})")
            .unwrap(),
        Regex::new(r"(?i)(?:https?://)?(?:www\.)?youtube\.com/embed/([a-zA-Z0-9_-]{11})").unwrap(),
    ]
});

/// First YouTube video id found in `text`, trying each url shape in turn.
pub fn extract_youtube_id(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    PATTERNS
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
