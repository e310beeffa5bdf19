use once_cell::sync::Lazy;
use regex::Regex;

static RE_EPISODE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bepisode\s+(\d+)\b\s*[:\-–|.]?\s*").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_\s-]").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());
static RE_DOUBLED_EPISODE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/podcasts/episode-(\d+)-episode-(\d+)-(.+)$").unwrap());

/// Build the url segment for an episode.
///
/// An "Episode N" marker inside the title wins over `episode_number` and is removed
/// from the title, so `("Episode 7: Foo", Some(3))` gives `episode-7-foo`.
pub fn slug(title: &str, episode_number: Option<u32>) -> String {
    let title = RE_TAG.replace_all(title, " ");

    let (number, remaining) = match RE_EPISODE_MARKER.captures(&title) {
        Some(caps) => {
            let embedded = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
            let marker = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            let mut remaining = String::with_capacity(title.len());
            remaining.push_str(&title[..marker.start]);
            remaining.push(' ');
            remaining.push_str(&title[marker.end..]);
            (embedded.or(episode_number), remaining)
        }
        None => (episode_number, title.to_string()),
    };

    let title_slug = slugify(&remaining);
    match number.filter(|n| *n > 0) {
        Some(n) if title_slug.is_empty() => format!("episode-{n}"),
        Some(n) => format!("episode-{n}-{title_slug}"),
        None => title_slug,
    }
}

/// Lowercase, keep word characters, spaces and hyphens, then hyphenate.
pub fn slugify(input: &str) -> String {
    let lowercase = input.to_lowercase();
    let cleaned = RE_NON_SLUG.replace_all(&lowercase, "");
    let hyphenated = RE_WHITESPACE.replace_all(cleaned.trim(), "-");
    let collapsed = RE_HYPHENS.replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}

/// Repairs paths like `/podcasts/episode-365-episode-364-foo` produced by older links.
pub fn correct_episode_path(path: &str) -> Option<String> {
    let caps = RE_DOUBLED_EPISODE_PATH.captures(path)?;
    let number = caps.get(2)?.as_str();
    let rest = caps.get(3)?.as_str();
    Some(format!("/podcasts/episode-{number}-{rest}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_deterministic() {
        let a = slug("The Future of AI: What's Next?", Some(12));
        let b = slug("The Future of AI: What's Next?", Some(12));
        assert_eq!(a, b);
        assert_eq!(a, "episode-12-the-future-of-ai-whats-next");
    }

    #[test]
    fn embedded_episode_number_wins() {
        let s = slug("Episode 7: Prompt Engineering", Some(3));
        assert!(s.starts_with("episode-7-"));
        assert_eq!(s, "episode-7-prompt-engineering");
    }

    #[test]
    fn embedded_marker_is_removed_anywhere() {
        assert_eq!(slug("Deep Dive - Episode 5", None), "episode-5-deep-dive");
        assert_eq!(slug("episode 42 the answer", None), "episode-42-the-answer");
    }

    #[test]
    fn no_number_gives_bare_title_slug() {
        assert_eq!(slug("  Hello,   World!  ", None), "hello-world");
        assert_eq!(slug("a -- b", None), "a-b");
    }

    #[test]
    fn empty_title_with_number() {
        assert_eq!(slug("", Some(9)), "episode-9");
        assert_eq!(slug("!!!", None), "");
    }

    #[test]
    fn html_in_title_is_ignored() {
        assert_eq!(slug("<b>Bold</b> Move", Some(1)), "episode-1-bold-move");
    }

    #[test]
    fn zero_is_treated_as_no_number() {
        assert_eq!(slug("Pilot", Some(0)), "pilot");
    }

    #[test]
    fn doubled_episode_path_is_corrected() {
        assert_eq!(
            correct_episode_path("/podcasts/episode-365-episode-364-ai-agents").as_deref(),
            Some("/podcasts/episode-364-ai-agents")
        );
        assert_eq!(correct_episode_path("/podcasts/episode-364-ai-agents"), None);
        assert_eq!(correct_episode_path("/episodes/12"), None);
    }
}
