//! Plain-text reduction of HTML email bodies.

use scraper::{Html, Selector};
use std::sync::LazyLock;

/// The HTML body held no text once the signature was removed.
#[derive(Debug, thiserror::Error)]
#[error("html body contains no text")]
pub struct HtmlError;

fn body_selector() -> &'static Selector {
    static SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("body").expect("failed to parse body selector"));
    &SEL
}

/// Elements whose id contains "Signature" (mail client signature blocks).
fn signature_selector() -> &'static Selector {
    static SEL: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("[id*=\"Signature\"]").expect("failed to parse signature selector")
    });
    &SEL
}

/// Text of the document body with the first signature block removed, trimmed.
pub fn html_to_text(html: &str) -> Result<String, HtmlError> {
    // parse_document always synthesizes <html> and <body>
    let document = Html::parse_document(html);
    let mut text: String = document
        .select(body_selector())
        .flat_map(|body| body.text())
        .collect();

    let signature: Option<String> = document
        .select(signature_selector())
        .next()
        .map(|el| el.text().collect());
    if let Some(signature) = signature.filter(|s| !s.is_empty()) {
        text = text.replace(&signature, "");
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(HtmlError);
    }
    Ok(text.to_string())
}
