//! Webhook body decoding (JSON, multipart form or urlencoded form).

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart},
    http::{header::CONTENT_TYPE, HeaderMap, Request},
};

use crate::email::RawEmail;
use crate::error::BridgeError;

/// Lowercased media type without parameters.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// True for `application/json` and `application/*+json` content types.
fn is_json(content_type: &str) -> bool {
    let essence = essence(content_type);
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

fn is_multipart(content_type: &str) -> bool {
    essence(content_type) == "multipart/form-data"
}

/// Decode the provider's POST body. JSON and `multipart/form-data` are recognized by
/// content type; anything else is read as a urlencoded form.
pub async fn decode_payload(headers: &HeaderMap, body: Bytes) -> Result<RawEmail, BridgeError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if is_json(content_type) {
        return serde_json::from_slice(&body).map_err(|e| BridgeError::Payload(e.to_string()));
    }
    if is_multipart(content_type) {
        return decode_multipart(content_type, body).await;
    }
    let mut raw = RawEmail::default();
    for (key, value) in url::form_urlencoded::parse(&body) {
        raw.set_field(&key, value.into_owned());
    }
    Ok(raw)
}

/// Text fields of a multipart form. File parts (attachments) are skipped.
async fn decode_multipart(content_type: &str, body: Bytes) -> Result<RawEmail, BridgeError> {
    let request = Request::builder()
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .map_err(|e| BridgeError::Payload(e.to_string()))?;
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| BridgeError::Payload(e.body_text()))?;

    let mut raw = RawEmail::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BridgeError::Payload(e.body_text()))?
    {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|e| BridgeError::Payload(e.body_text()))?;
        raw.set_field(&name, value);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h
    }

    #[tokio::test]
    async fn decodes_form_body() {
        let body = "from=Jane+%3Cjane%40example.com%3E&to=bugs%40example.com&subject=%5Bapp%5D+crash&html=%3Cp%3Ehi%3C%2Fp%3E&x=1";
        let raw = decode_payload(&headers("application/x-www-form-urlencoded"), Bytes::from(body))
            .await
            .unwrap();
        assert_eq!(raw.from.as_deref(), Some("Jane <jane@example.com>"));
        assert_eq!(raw.to.as_deref(), Some("bugs@example.com"));
        assert_eq!(raw.subject.as_deref(), Some("[app] crash"));
        assert_eq!(raw.html.as_deref(), Some("<p>hi</p>"));
        assert_eq!(raw.text, None);
    }

    #[tokio::test]
    async fn decodes_json_body() {
        let body = r#"{"from":"jane@example.com","to":"bugs@example.com","subject":"s","content":"c","extra":1}"#;
        let raw = decode_payload(&headers("application/json; charset=utf-8"), Bytes::from(body))
            .await
            .unwrap();
        assert_eq!(raw.from.as_deref(), Some("jane@example.com"));
        assert_eq!(raw.content.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn decodes_multipart_body() {
        let body = concat!(
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"from\"\r\n\r\n",
            "Jane <jane@example.com>\r\n",
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"to\"\r\n\r\n",
            "bugs@example.com\r\n",
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"subject\"\r\n\r\n",
            "[app] crash\r\n",
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"text\"\r\n\r\n",
            "line one\r\nline two\r\n",
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"attachment1\"; filename=\"log.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "ignored\r\n",
            "--XX--\r\n",
        );
        let raw = decode_payload(&headers("multipart/form-data; boundary=XX"), Bytes::from(body))
            .await
            .unwrap();
        assert_eq!(raw.from.as_deref(), Some("Jane <jane@example.com>"));
        assert_eq!(raw.to.as_deref(), Some("bugs@example.com"));
        assert_eq!(raw.subject.as_deref(), Some("[app] crash"));
        assert_eq!(raw.text.as_deref(), Some("line one\r\nline two"));
        assert_eq!(raw.html, None);
    }

    #[tokio::test]
    async fn multipart_without_boundary_is_payload_error() {
        let err = decode_payload(&headers("multipart/form-data"), Bytes::from("--XX--"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Payload(_)));
    }

    #[tokio::test]
    async fn invalid_json_is_payload_error() {
        let err = decode_payload(&headers("application/json"), Bytes::from("{not json"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Payload(_)));
    }

    #[tokio::test]
    async fn missing_content_type_is_form() {
        let raw = decode_payload(&HeaderMap::new(), Bytes::from("subject=hello"))
            .await
            .unwrap();
        assert_eq!(raw.subject.as_deref(), Some("hello"));
    }

    #[test]
    fn json_detection() {
        assert!(is_json("application/json"));
        assert!(is_json("Application/JSON"));
        assert!(is_json("application/vnd.sendgrid+json"));
        assert!(!is_json("application/x-www-form-urlencoded"));
        assert!(!is_json(""));
        assert!(is_multipart("multipart/form-data; boundary=abc"));
        assert!(!is_multipart("multipart/mixed; boundary=abc"));
    }
}
