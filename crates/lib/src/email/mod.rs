//! Email normalization: raw webhook fields to an [`InboundMessage`].
//!
//! The email provider posts `from`, `to`, `subject` and a body as `html`, `text`
//! or `content`. Addresses lose their display names; HTML bodies are reduced to text.

mod address;
mod html;

pub use address::extract_address;
pub use html::{html_to_text, HtmlError};

use serde::Deserialize;

use crate::error::BridgeError;
use crate::report::Reporter;
use crate::ticket::InboundMessage;

/// Fields of the provider's webhook payload, as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEmail {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl RawEmail {
    /// Fill the field named `key`; unknown keys are ignored. Later values win.
    pub fn set_field(&mut self, key: &str, value: String) {
        let slot = match key {
            "from" => &mut self.from,
            "to" => &mut self.to,
            "subject" => &mut self.subject,
            "html" => &mut self.html,
            "text" => &mut self.text,
            "content" => &mut self.content,
            _ => return,
        };
        *slot = Some(value);
    }
}

fn non_blank(value: Option<&String>) -> Option<&String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Normalize a raw payload.
///
/// Empty or absent addresses stay empty (the pipeline rejects them as missing); a present
/// address that cannot be parsed fails with [`BridgeError::MalformedAddress`]. When the HTML
/// body cannot be reduced to text the plain-text field is used, then the raw HTML; the
/// failure is reported but not fatal.
pub fn normalize(raw: &RawEmail, reporter: &dyn Reporter) -> Result<InboundMessage, BridgeError> {
    let from = parse_address_field(raw.from.as_deref())?;
    let to = parse_address_field(raw.to.as_deref())?;
    let subject = raw.subject.clone().unwrap_or_default();
    let content = match non_blank(raw.html.as_ref()) {
        Some(html) => match html_to_text(html) {
            Ok(text) => Some(text),
            Err(e) => {
                reporter.record_failure(&e);
                Some(non_blank(raw.text.as_ref()).unwrap_or(html).clone())
            }
        },
        None => non_blank(raw.text.as_ref())
            .or_else(|| non_blank(raw.content.as_ref()))
            .cloned(),
    };
    Ok(InboundMessage {
        from,
        to,
        subject,
        content,
    })
}

fn parse_address_field(value: Option<&str>) -> Result<String, BridgeError> {
    match value.map(str::trim) {
        None | Some("") => Ok(String::new()),
        Some(v) => extract_address(v),
    }
}
