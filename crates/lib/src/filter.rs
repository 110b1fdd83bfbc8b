//! Sender/recipient allow-lists.
//!
//! A rule list is a comma or semicolon separated string. Entries starting with `@`
//! match every address of that domain; anything else must equal the address.
//! Both comparisons ignore case, including non-ASCII letters.

/// Check `address` against `rules`. An absent or empty rule list allows everything.
pub fn is_allowed(address: &str, rules: Option<&str>) -> bool {
    let rules = match rules {
        Some(r) if !r.is_empty() => r,
        _ => return true,
    };
    rules
        .split([',', ';'])
        .filter(|rule| !rule.is_empty())
        .any(|rule| rule_matches(address, rule))
}

fn rule_matches(address: &str, rule: &str) -> bool {
    let address = address.to_lowercase();
    let rule = rule.to_lowercase();
    if rule.starts_with('@') {
        address.ends_with(&rule)
    } else {
        // exact only: "o@example.com" must not admit "foo@example.com"
        address == rule
    }
}
