use scraper::Html;

/// Tags whose whole subtree never contributes to the extracted text.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "meta", "header", "footer",
];

/// Extract readable text from a detail page.
///
/// Every surviving text node is trimmed and kept on its own line, so block
/// boundaries in the markup come out as `\n`. Markup that cannot be made
/// sense of yields whatever text html5ever recovered, possibly nothing.
pub fn extract_text(raw_html: &str) -> String {
    if raw_html.trim().is_empty() {
        return String::new();
    }

    let document = Html::parse_document(raw_html);
    let mut lines = Vec::new();

    // Iterative walk; detail pages can nest arbitrarily deep.
    let mut stack = vec![*document.root_element()];
    while let Some(node) = stack.pop() {
        if let Some(text) = node.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        } else if let Some(element) = node.value().as_element() {
            if SKIPPED_TAGS.contains(&element.name()) {
                continue;
            }
            stack.extend(node.children().rev());
        }
    }

    lines.join("\n")
}
