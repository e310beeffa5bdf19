const STOP_WORDS: &[&str] = &[
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "a", "an", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should",
];

const MAX_TITLE_KEYWORDS: usize = 5;

/// Normalize a title for keyword extraction: lowercase, drop punctuation,
/// and collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let mut normalized = String::with_capacity(title.len());
    let mut space_pending = false;

    for ch in title.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            for lower in ch.to_lowercase() {
                normalized.push(lower);
            }
            space_pending = false;
        } else if ch.is_whitespace() {
            if !space_pending {
                normalized.push(' ');
                space_pending = true;
            }
        }
    }

    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Up to five meaningful words of a title, in title order.
pub fn title_keywords(title: &str) -> Vec<String> {
    let normalized = normalize_title(title);
    let mut keywords: Vec<String> = Vec::new();
    for word in normalized.split_whitespace() {
        if word.chars().count() <= 2 || STOP_WORDS.contains(&word) {
            continue;
        }
        if keywords.iter().any(|k| k == word) {
            continue;
        }
        keywords.push(word.to_string());
        if keywords.len() == MAX_TITLE_KEYWORDS {
            break;
        }
    }
    keywords
}
