//! Pseudo-anonymization of addresses for log lines.

use regex::Regex;
use std::sync::LazyLock;

const INVALID: &str = "invalid email address";

/// alias@domain.tld, greedy: the tld is whatever follows the last dot.
fn address_re() -> &'static Regex {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(.*)@(.*)\.(.*)").expect("failed to compile address regex")
    });
    &RE
}

/// Render an address as `jo****@ex****.com`: two leading characters of alias and domain,
/// or `**` when a part has two characters or fewer. Multi-part tlds are not special-cased.
pub fn pseudo_anonymize(address: &str) -> String {
    if address.is_empty() || !address.contains('@') || !address.contains('.') {
        return INVALID.to_string();
    }
    let Some(caps) = address_re().captures(address) else {
        return INVALID.to_string();
    };
    let alias = caps.get(1).map_or("", |m| m.as_str());
    let domain = caps.get(2).map_or("", |m| m.as_str());
    let tld = caps.get(3).map_or("", |m| m.as_str());
    format!("{}@{}.{}", keep_first_two(alias), keep_first_two(domain), tld)
}

fn keep_first_two(part: &str) -> String {
    if part.chars().count() <= 2 {
        return "**".to_string();
    }
    let head: String = part.chars().take(2).collect();
    format!("{}****", head)
}
