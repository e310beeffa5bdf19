use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static RE_LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:-|\*|•|\d+\.)\s+").unwrap());
static RE_SECTION_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Span {
    Text(String),
    Link(String),
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "items", rename_all = "camelCase")]
pub enum DescriptionBlock {
    Paragraph(Vec<Span>),
    /// One entry per list item, marker already stripped.
    List(Vec<Vec<Span>>),
}

/// Split normalized description text into paragraphs and bulleted lists.
///
/// Sections are separated by blank lines. A section is a list when most of its
/// non-empty lines start with `-`, `*`, `•` or `N.`; otherwise it is a paragraph
/// and single newlines become [`Span::LineBreak`].
pub fn render_description(text: &str) -> Vec<DescriptionBlock> {
    RE_SECTION_BREAK
        .split(text)
        .filter(|section| !section.trim().is_empty())
        .map(render_section)
        .collect()
}

fn render_section(section: &str) -> DescriptionBlock {
    let lines: Vec<&str> = section
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect();
    let marked = lines
        .iter()
        .filter(|line| RE_LIST_MARKER.is_match(line))
        .count();

    if marked * 2 > lines.len() {
        let items = lines
            .iter()
            .map(|line| link_spans(RE_LIST_MARKER.replace(line, "").trim()))
            .collect();
        return DescriptionBlock::List(items);
    }

    let mut spans = Vec::new();
    for (i, line) in section.trim().split('\n').enumerate() {
        if i > 0 {
            spans.push(Span::LineBreak);
        }
        spans.extend(link_spans(line));
    }
    DescriptionBlock::Paragraph(spans)
}

/// Split a line into text and link spans.
pub fn link_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;
    for m in RE_URL.find_iter(text) {
        if m.start() > last {
            spans.push(Span::Text(text[last..m.start()].to_string()));
        }
        spans.push(Span::Link(m.as_str().to_string()));
        last = m.end();
    }
    if last < text.len() {
        spans.push(Span::Text(text[last..].to_string()));
    }
    spans
}

pub fn blocks_to_html(blocks: &[DescriptionBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            DescriptionBlock::Paragraph(spans) => {
                out.push_str("<p>");
                push_spans(&mut out, spans);
                out.push_str("</p>\n");
            }
            DescriptionBlock::List(items) => {
                out.push_str("<ul>\n");
                for item in items {
                    out.push_str("  <li>");
                    push_spans(&mut out, item);
                    out.push_str("</li>\n");
                }
                out.push_str("</ul>\n");
            }
        }
    }
    out
}

fn push_spans(out: &mut String, spans: &[Span]) {
    for span in spans {
        match span {
            Span::Text(text) => out.push_str(&html_escape::encode_text(text)),
            Span::Link(href) => {
                out.push_str("<a href=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(href));
                out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
                out.push_str(&html_escape::encode_text(href));
                out.push_str("</a>");
            }
            Span::LineBreak => out.push_str("<br />"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::html::normalize_description;

    #[test]
    fn url_and_line_break_in_paragraph() {
        let text = normalize_description("Check this: https://example.com/x and <br>next line");
        let blocks = render_description(&text);
        assert_eq!(
            blocks,
            vec![DescriptionBlock::Paragraph(vec![
                Span::Text("Check this: ".to_string()),
                Span::Link("https://example.com/x".to_string()),
                Span::Text(" and ".to_string()),
                Span::LineBreak,
                Span::Text("next line".to_string()),
            ])]
        );
    }

    #[test]
    fn majority_marked_section_is_a_list() {
        let blocks = render_description("Intro line\n\n- one\n* two https://a.io\n3. three");
        assert_eq!(blocks.len(), 2);
        assert_eq!(
            blocks[1],
            DescriptionBlock::List(vec![
                vec![Span::Text("one".to_string())],
                vec![
                    Span::Text("two ".to_string()),
                    Span::Link("https://a.io".to_string())
                ],
                vec![Span::Text("three".to_string())],
            ])
        );
    }

    #[test]
    fn minority_marked_section_stays_a_paragraph() {
        let blocks = render_description("Some text\nmore text\n- only one bullet");
        assert!(matches!(blocks[0], DescriptionBlock::Paragraph(_)));
    }

    #[test]
    fn empty_sections_are_skipped() {
        assert!(render_description("").is_empty());
        assert_eq!(render_description("a\n\n\n\nb").len(), 2);
    }

    #[test]
    fn html_output_escapes_text() {
        let blocks = render_description("a < b https://x.io/?q=1&r=2\n\n• item");
        let html = blocks_to_html(&blocks);
        assert!(html.contains("<p>a &lt; b <a href=\"https://x.io/?q=1&amp;r=2\""));
        assert!(html.contains("<ul>\n  <li>item</li>\n</ul>"));
    }
}
