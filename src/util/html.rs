use once_cell::sync::Lazy;
use regex::Regex;

static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static RE_P_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<p(?:\s[^>]*)?>").unwrap());
static RE_P_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</p\s*>").unwrap());
static RE_LI_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<li(?:\s[^>]*)?>").unwrap());
static RE_LI_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</li\s*>").unwrap());
static RE_LIST_CONTAINER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(?:ul|ol)(?:\s[^>]*)?>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z!?][^>]*>").unwrap());
static RE_EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Decode HTML character entities (`&apos;`, `&#39;`, `&amp;` ...) once.
pub fn decode_entities(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}

/// Turn a feed description into plain text that keeps its structure as markers:
/// blank lines between paragraphs, `\n` for line breaks and `- ` for list items.
pub fn normalize_description(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let decoded = decode_entities(raw);
    let text = decoded.replace("\r\n", "\n").replace('\r', "\n");
    let text = remove_script_and_style(&text);

    // order matters: structural tags first, then everything else goes
    let text = RE_BR.replace_all(&text, "\n");
    let text = RE_P_OPEN.replace_all(&text, "\n\n");
    let text = RE_P_CLOSE.replace_all(&text, "");
    let text = RE_LI_OPEN.replace_all(&text, "\n- ");
    let text = RE_LI_CLOSE.replace_all(&text, "");
    let text = RE_LIST_CONTAINER.replace_all(&text, "\n");
    let text = RE_TAG.replace_all(&text, "");
    let text = text.replace("&nbsp;", " ").replace('\u{a0}', " ");
    let text = RE_EXTRA_NEWLINES.replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Single-line plain text for summaries: tags stripped, whitespace collapsed.
pub fn plain_summary(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let decoded = decode_entities(input);
    let buf = remove_script_and_style(&decoded);
    let out = RE_TAG.replace_all(&buf, " ");

    let mut collapsed = String::with_capacity(out.len());
    let mut last_space = false;
    for ch in out.chars() {
        if ch.is_whitespace() {
            if !last_space {
                collapsed.push(' ');
                last_space = true;
            }
        } else {
            collapsed.push(ch);
            last_space = false;
        }
    }

    collapsed.trim().to_string()
}

/// Removes `<script>` and `<style>` blocks including their content.
fn remove_script_and_style(input: &str) -> String {
    let mut buf = input.to_string();
    for tag in ["script", "style"] {
        let open = format!("<{}", tag);
        let close = format!("</{}>", tag);
        loop {
            // ascii lowercase keeps byte offsets aligned with `buf`
            let lower = buf.to_ascii_lowercase();
            if let Some(start) = lower.find(&open) {
                if let Some(end_rel) = lower[start..].find(&close) {
                    let end = start + end_rel + close.len();
                    buf.replace_range(start..end, "");
                    continue;
                } else {
                    // no closing tag; drop from start to end
                    buf.replace_range(start..buf.len(), "");
                }
            }
            break;
        }
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_split_into_sections() {
        let text = normalize_description("<p>A</p><p>B</p>");
        assert_eq!(text, "A\n\nB");
        assert_eq!(text.split("\n\n").collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn three_or_more_newlines_collapse_to_two() {
        assert_eq!(normalize_description("one\n\n\nthree"), "one\n\nthree");
        assert_eq!(normalize_description("one\n\n\n\n\n\nsix"), "one\n\nsix");
        assert_eq!(normalize_description("a<br><br><br><br>b"), "a\n\nb");
    }

    #[test]
    fn line_breaks_become_newlines() {
        let text = normalize_description("Check this: https://example.com/x and <br>next line");
        assert_eq!(text, "Check this: https://example.com/x and \nnext line");
        assert!(text.contains("\nnext line"));
    }

    #[test]
    fn list_items_become_dash_lines() {
        let text = normalize_description("<p>Topics:</p><ul><li>First</li><li>Second</li></ul>");
        assert_eq!(text, "Topics:\n\n- First\n- Second");
    }

    #[test]
    fn remaining_tags_are_stripped() {
        let text = normalize_description(
            r#"<p>Hello <strong>world</strong>, <a href="https://x.io">link</a></p>"#,
        );
        assert_eq!(text, "Hello world, link");
    }

    #[test]
    fn entities_are_decoded_before_normalizing() {
        assert_eq!(normalize_description("It&apos;s &amp; it&#39;s"), "It's & it's");
        assert_eq!(normalize_description("a&nbsp;b"), "a b");
        assert_eq!(normalize_description("&lt;p&gt;x&lt;/p&gt;"), "x");
    }

    #[test]
    fn script_blocks_are_dropped() {
        let text = normalize_description("<p>Intro</p><SCRIPT>alert(1)</SCRIPT><p>Outro</p>");
        assert_eq!(text, "Intro\n\nOutro");
    }

    #[test]
    fn paragraph_tag_prefix_does_not_match_other_tags() {
        assert_eq!(normalize_description("<pre>code</pre>"), "code");
    }

    #[test]
    fn plain_summary_collapses_whitespace() {
        assert_eq!(
            plain_summary("<p>First   line</p>\n<p>Second&nbsp;line</p>"),
            "First line Second line"
        );
        assert_eq!(plain_summary(""), "");
    }
}
