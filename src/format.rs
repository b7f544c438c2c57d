//! Response formatting: raw assistant text to sanitized display markup.
//!
//! The formatter is the sole authority for escaping backend text. Nothing
//! else in the crate may re-interpret `Message::content` as markup.

use once_cell::sync::Lazy;
use regex::Regex;

/// Icon-name token embedded in snippet containers for the copy affordance.
/// The copy manager strips it back out of clipboard payloads.
pub const COPY_ICON_TOKEN: &str = "content_copy";

/// Markup that has passed through all formatting passes and is safe to
/// render as structured content without further escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedHtml(String);

impl SanitizedHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```([A-Za-z0-9_+\-]*)\n?((?s:.*?))```").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^### (.+)$").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https?://|www\.)[^\s<]+").unwrap());
static RELATED_LINKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)((?:related|useful) links:.*?)(<br><br>|$)").unwrap()
});

// Private-use character delimiting extracted code blocks so the text passes
// never see snippet bodies.
const PLACEHOLDER_MARK: char = '\u{E000}';

/// Format a raw assistant response into sanitized markup.
///
/// The passes run in a fixed order; a later pass never re-matches content
/// produced by an earlier one. Input with none of the trigger patterns comes
/// back unchanged except for newline-to-`<br>` conversion. Unterminated
/// triple-backtick fences are left as literal text.
pub fn format_response(raw: &str) -> SanitizedHtml {
    let (mut text, snippets) = extract_code_blocks(raw);

    text = HEADING.replace_all(&text, "<h3>$1</h3>").into_owned();
    text = BOLD.replace_all(&text, "<strong>$1</strong>").into_owned();
    text = LINK
        .replace_all(&text, |caps: &regex::Captures| {
            let url = &caps[0];
            let href = if url.starts_with("www.") {
                format!("http://{url}")
            } else {
                url.to_string()
            };
            format!("<a href=\"{href}\" target=\"_blank\">{url}</a>")
        })
        .into_owned();
    text = text.replace('\n', "<br>");
    text = RELATED_LINKS
        .replace_all(&text, "<div class=\"related-links\">$1</div>$2")
        .into_owned();

    for (index, snippet) in snippets.iter().enumerate() {
        text = text.replace(&placeholder(index), snippet);
    }

    SanitizedHtml(text)
}

fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_MARK}{index}{PLACEHOLDER_MARK}")
}

/// Substitute each fenced code block with an opaque placeholder, returning
/// the rendered snippet containers for re-insertion after the text passes.
fn extract_code_blocks(raw: &str) -> (String, Vec<String>) {
    let mut snippets = Vec::new();
    let text = CODE_FENCE
        .replace_all(raw, |caps: &regex::Captures| {
            let lang = caps.get(1).map_or("", |m| m.as_str());
            let body = caps.get(2).map_or("", |m| m.as_str());
            snippets.push(render_snippet(lang, body));
            placeholder(snippets.len() - 1)
        })
        .into_owned();
    (text, snippets)
}

/// Wrap a code body in a snippet container with an inline copy affordance.
/// Only `<` and `>` are escaped; the body is otherwise verbatim.
fn render_snippet(lang: &str, body: &str) -> String {
    let escaped = strip_blank_edges(body).replace('<', "&lt;").replace('>', "&gt;");
    let lang_attr = if lang.is_empty() {
        String::new()
    } else {
        format!(" data-lang=\"{lang}\"")
    };
    format!(
        "<div class=\"code-snippet\"{lang_attr}>\
         <span class=\"copy-snippet material-icons\">{COPY_ICON_TOKEN}</span>\
         <pre class=\"snippet-content\">{escaped}</pre></div>"
    )
}

/// Drop leading and trailing blank lines inside a fenced block.
fn strip_blank_edges(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let first = lines.iter().position(|line| !line.trim().is_empty());
    let Some(first) = first else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(first);
    lines[first..=last].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_only_gains_line_breaks() {
        let out = format_response("hello there\nsecond line");
        assert_eq!(out.as_str(), "hello there<br>second line");
    }

    #[test]
    fn trigger_free_single_line_is_unchanged() {
        let out = format_response("nothing special here");
        assert_eq!(out.as_str(), "nothing special here");
    }

    #[test]
    fn bold_markers_become_strong() {
        let out = format_response("**a**");
        assert_eq!(out.as_str(), "<strong>a</strong>");
    }

    #[test]
    fn multiple_bold_spans_per_line() {
        let out = format_response("**a** and **b**");
        assert_eq!(out.as_str(), "<strong>a</strong> and <strong>b</strong>");
    }

    #[test]
    fn heading_lines_become_h3() {
        let out = format_response("### Title\nbody");
        assert_eq!(out.as_str(), "<h3>Title</h3><br>body");
    }

    #[test]
    fn urls_become_anchors_opening_in_new_context() {
        let out = format_response("see https://example.com/docs for details");
        assert_eq!(
            out.as_str(),
            "see <a href=\"https://example.com/docs\" target=\"_blank\">https://example.com/docs</a> for details"
        );
    }

    #[test]
    fn bare_www_hosts_get_a_scheme() {
        let out = format_response("visit www.example.com today");
        assert!(out
            .as_str()
            .contains("<a href=\"http://www.example.com\" target=\"_blank\">www.example.com</a>"));
    }

    #[test]
    fn anchors_are_not_rematched() {
        let out = format_response("https://a.example https://b.example");
        assert_eq!(out.as_str().matches("<a href=").count(), 2);
        assert_eq!(out.as_str().matches("target=\"_blank\"").count(), 2);
    }

    #[test]
    fn code_fences_are_escaped_and_excluded_from_later_passes() {
        let out = format_response("```rust\nlet x: Vec<u8> = **not bold**;\nhttps://no.link\n```");
        let html = out.as_str();
        assert!(html.contains("Vec&lt;u8&gt;"));
        assert!(html.contains("**not bold**"));
        assert!(!html.contains("<strong>"));
        assert!(!html.contains("<a href"));
        assert!(html.contains(COPY_ICON_TOKEN));
        assert!(html.contains("class=\"snippet-content\""));
        assert!(html.contains("data-lang=\"rust\""));
    }

    #[test]
    fn blank_lines_inside_fences_are_trimmed() {
        let out = format_response("```\n\n\ncode here\n\n```");
        assert!(out.as_str().contains("<pre class=\"snippet-content\">code here</pre>"));
    }

    #[test]
    fn unterminated_fence_is_left_literal() {
        let out = format_response("before ```rust\nlet x = 1;");
        assert_eq!(out.as_str(), "before ```rust<br>let x = 1;");
    }

    #[test]
    fn surrounding_text_is_still_formatted_around_a_fence() {
        let out = format_response("**bold**\n```\ncode\n```\n**more**");
        let html = out.as_str();
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<strong>more</strong>"));
        assert!(html.contains("<pre class=\"snippet-content\">code</pre>"));
    }

    #[test]
    fn related_links_block_is_wrapped() {
        let out = format_response(
            "Related links:\nhttps://example.com/a\nhttps://example.com/b\n\nafter",
        );
        let html = out.as_str();
        assert!(html.starts_with("<div class=\"related-links\">Related links:"));
        assert!(html.contains("</div><br><br>after"));
    }

    #[test]
    fn useful_links_label_is_recognized() {
        let out = format_response("Useful links:\nhttps://example.com");
        assert!(out.as_str().starts_with("<div class=\"related-links\">"));
        assert!(out.as_str().ends_with("</div>"));
    }

    #[test]
    fn formatting_is_idempotent_on_trigger_free_output() {
        let first = format_response("plain text, no markers");
        let second = format_response(first.as_str());
        assert_eq!(first, second);
    }
}
