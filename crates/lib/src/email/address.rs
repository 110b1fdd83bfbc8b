//! Address extraction from "Display Name <addr>" header values.

use crate::error::BridgeError;

/// Extract the bare address from a header value.
///
/// With a `<`, the address is the text after the last `<` up to the next `>` (or the end),
/// trimmed. Without one, a value containing `@` is taken as is. Anything else is malformed.
pub fn extract_address(raw: &str) -> Result<String, BridgeError> {
    let Some(open) = raw.rfind('<') else {
        if raw.contains('@') {
            return Ok(raw.to_string());
        }
        return Err(BridgeError::MalformedAddress(raw.to_string()));
    };
    let rest = &raw[open + 1..];
    let addr = match rest.find('>') {
        Some(close) => &rest[..close],
        None => rest,
    };
    Ok(addr.trim().to_string())
}
