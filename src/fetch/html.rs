//! Main-content text extraction from fetched HTML.

use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    body: Regex,
    head: Regex,
    comment: Regex,
    blocks: [Regex; 4],
    tag: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        body: Regex::new(r"(?is)<body\b[^>]*>(.*?)(?:</body\s*>|\z)").expect("body pattern"),
        head: Regex::new(r"(?is)<head\b[^>]*>.*?</head\s*>").expect("head pattern"),
        comment: Regex::new(r"(?s)<!--.*?-->").expect("comment pattern"),
        blocks: [
            Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script pattern"),
            Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("style pattern"),
            Regex::new(r"(?is)<noscript\b[^>]*>.*?</noscript\s*>").expect("noscript pattern"),
            Regex::new(r"(?is)<template\b[^>]*>.*?</template\s*>").expect("template pattern"),
        ],
        tag: Regex::new(r"(?s)<[^>]*>").expect("tag pattern"),
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Extracts the visible text of a page's `<body>`, one trimmed run per line.
///
/// Documents without a `<body>` element fall back to everything outside
/// `<head>`. Returns `None` when no visible text remains.
pub fn extract_main_text(html: &str) -> Option<String> {
    let p = patterns();

    let body = match p.body.captures(html).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => p.head.replace_all(html, "").into_owned(),
    };

    let mut cleaned = p.comment.replace_all(&body, "").into_owned();
    for block in &p.blocks {
        cleaned = block.replace_all(&cleaned, "").into_owned();
    }
    let text = p.tag.replace_all(&cleaned, "\n");

    let lines: Vec<String> = text
        .lines()
        .map(|line| decode_entities(line.trim()))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_body_text_without_scripts() {
        let html = r#"<html><head><title>Store</title><style>p { color: red; }</style></head>
<body>
  <h1>Returns</h1>
  <script>var tracking = "ignore me";</script>
  <p>Items can be returned within <b>30 days</b>.</p>
  <!-- hidden note -->
</body></html>"#;

        let text = extract_main_text(html).unwrap();
        assert_eq!(text, "Returns\nItems can be returned within\n30 days\n.");
        assert!(!text.contains("tracking"));
        assert!(!text.contains("Store"));
    }

    #[test]
    fn test_decodes_basic_entities() {
        let text = extract_main_text("<body><p>Fish &amp; Chips &lt;fresh&gt;</p></body>").unwrap();
        assert_eq!(text, "Fish & Chips <fresh>");
    }

    #[test]
    fn test_without_body_uses_content_outside_head() {
        let text = extract_main_text("<head><title>x</title></head><div>Plain page</div>").unwrap();
        assert_eq!(text, "Plain page");
    }

    #[test]
    fn test_empty_body_is_none() {
        assert_eq!(extract_main_text("<html><body>  <script>x()</script> </body></html>"), None);
        assert_eq!(extract_main_text(""), None);
    }
}
