//! Header extraction and signature-metadata validation.
//!
//! Turns the gateway's forwarded header payload into the minimal header
//! subset needed to validate the request signature. The identity service only
//! ever sees the headers the caller declared as signed (plus `authorization`
//! itself), nothing else.

use std::collections::HashMap;

use super::error::AuthError;

/// Lower-cased header name to ordered list of values.
pub type HeaderBundle = HashMap<String, Vec<String>>;

/// JSON key under which the gateway nests the forwarded headers.
const HEADERS_JSON_KEY: &str = "data";

const AUTHORIZATION_KEY: &str = "authorization";

/// Parameter of the `Authorization` value that lists the signed header names.
const SIGNING_HEADERS_KEY: &str = "headers";

/// Synthetic `"<method> <path>"` pseudo-header bound into the signature.
pub const REQUEST_TARGET: &str = "(request-target)";

/// Extract the signed-header subset from a gateway payload.
///
/// Input shape:
///
/// ```json
/// { "type": "USER_DEFINED", "data": { "<header>": "<value>", ... } }
/// ```
///
/// Header names are matched case-insensitively; values are passed through
/// untouched. The returned bundle contains exactly the headers named in the
/// signature's `headers` parameter plus `authorization` itself.
pub fn extract_and_validate(payload: &[u8]) -> Result<HeaderBundle, AuthError> {
    let doc: serde_json::Value = serde_json::from_slice(payload).unwrap_or_default();

    let mut headers: HeaderBundle = doc
        .get(HEADERS_JSON_KEY)
        .and_then(|data| data.as_object())
        .map(|data| {
            data.iter()
                .filter_map(|(name, value)| {
                    value
                        .as_str()
                        .map(|v| (name.to_ascii_lowercase(), vec![v.to_string()]))
                })
                .collect()
        })
        .unwrap_or_default();

    // Some gateways rename `date` to `x-date` in transit.
    if !headers.contains_key("date") {
        if let Some(x_date) = headers.get("x-date").cloned() {
            headers.insert("date".to_string(), x_date);
        }
    }

    let auth_value = headers
        .get(AUTHORIZATION_KEY)
        .and_then(|values| values.first())
        .cloned()
        .ok_or(AuthError::AuthorizationHeaderMissing)?;

    let required = required_headers_from_signature(&auth_value)?;

    let mut subset = HeaderBundle::with_capacity(required.len());
    let mut missing = Vec::new();
    for name in &required {
        match headers.get(name) {
            Some(values) => {
                subset.insert(name.clone(), values.clone());
            }
            None => missing.push(name.clone()),
        }
    }

    if !missing.is_empty() {
        let mut provided: Vec<String> = headers.keys().cloned().collect();
        provided.sort();
        return Err(AuthError::MissingRequiredHeaders {
            required,
            provided,
            missing,
        });
    }

    Ok(subset)
}

/// Extract the header names the caller claims were signed.
///
/// Input: `Signature algorithm="rsa-sha256", headers="date (request-target) host", keyId="..."`.
/// Output: `["date", "(request-target)", "host", "authorization"]`.
fn required_headers_from_signature(auth_value: &str) -> Result<Vec<String>, AuthError> {
    let signing_headers = signature_params(auth_value)
        .remove(SIGNING_HEADERS_KEY)
        .ok_or(AuthError::SigningHeadersMissing)?;

    let mut required: Vec<String> = signing_headers
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect();
    required.push(AUTHORIZATION_KEY.to_string());
    Ok(required)
}

/// Parse an auth-scheme credentials string (`Scheme k1="v1", k2="v2"`) into
/// its parameter map. The scheme token is dropped before parameter parsing so
/// that a `headers` parameter in first position still resolves.
fn signature_params(auth_value: &str) -> HashMap<String, String> {
    let params = match auth_value.split_once(char::is_whitespace) {
        // A scheme token never contains '='; anything else is already a parameter.
        Some((scheme, rest)) if !scheme.contains('=') => rest,
        _ => auth_value,
    };

    split_http_list(params)
        .into_iter()
        .filter_map(|item| {
            let (key, value) = item.split_once('=')?;
            Some((key.trim().to_ascii_lowercase(), unquote(value.trim())))
        })
        .collect()
}

/// Split a comma-separated HTTP list, keeping quoted strings intact.
fn split_http_list(value: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                if !current.trim().is_empty() {
                    items.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items
}

/// Strip surrounding quotes and collapse quoted-string backslash escapes.
fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);

    if !inner.contains('\\') {
        return inner.to_string();
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(data: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": "USER_DEFINED",
            "data": data,
        }))
        .unwrap()
    }

    #[test]
    fn projects_bundle_down_to_signed_headers() {
        let body = payload(serde_json::json!({
            "FoO": "test",
            "method": "get",
            "authorization": "Signature algorithm=\"rsa-sha256\", headers=\"foo\", signature=\"sig\"",
        }));

        let bundle = extract_and_validate(&body).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle["foo"], vec!["test".to_string()]);
        assert!(bundle.contains_key("authorization"));
        assert!(!bundle.contains_key("method"));
    }

    #[test]
    fn missing_authorization_header_is_rejected() {
        let body = payload(serde_json::json!({"FoO": "test", "method": "get"}));
        let err = extract_and_validate(&body).unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationHeaderMissing));
    }

    #[test]
    fn malformed_payload_behaves_as_empty_bundle() {
        let err = extract_and_validate(b"not json at all").unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationHeaderMissing));

        let err = extract_and_validate(b"{\"type\": \"USER_DEFINED\"}").unwrap_err();
        assert!(matches!(err, AuthError::AuthorizationHeaderMissing));
    }

    #[test]
    fn missing_declared_header_carries_diagnostics() {
        let body = payload(serde_json::json!({
            "foo": "test",
            "authorization": "Signature algorithm=\"rsa-sha256\", headers=\"foo1\", signature=\"sig\"",
        }));

        match extract_and_validate(&body).unwrap_err() {
            AuthError::MissingRequiredHeaders {
                required,
                provided,
                missing,
            } => {
                assert_eq!(required, vec!["foo1", "authorization"]);
                assert!(provided.contains(&"foo".to_string()));
                assert_eq!(missing, vec!["foo1"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn required_headers_parsed_from_signature_value() {
        let auth = r#"Signature algorithm="rsa-sha256", headers="Date (request-target) host", signature="<signature>""#;
        let required = required_headers_from_signature(auth).unwrap();
        assert_eq!(
            required,
            vec!["date", "(request-target)", "host", "authorization"]
        );
    }

    #[test]
    fn signature_without_headers_param_is_rejected() {
        let auth = r#"Signature algorithm="rsa-sha256", signature="<signature>""#;
        let err = required_headers_from_signature(auth).unwrap_err();
        assert!(matches!(err, AuthError::SigningHeadersMissing));
    }

    #[test]
    fn headers_param_in_first_position_still_resolves() {
        let auth = r#"Signature headers="date (request-target) host", keyId="ocid1.key", signature="s""#;
        let required = required_headers_from_signature(auth).unwrap();
        assert_eq!(
            required,
            vec!["date", "(request-target)", "host", "authorization"]
        );
    }

    #[test]
    fn quoted_commas_do_not_split_parameters() {
        let auth = r#"Signature keyId="ten,ant/user", headers="date host", signature="a,b""#;
        let required = required_headers_from_signature(auth).unwrap();
        assert_eq!(required, vec!["date", "host", "authorization"]);
    }

    #[test]
    fn header_names_matched_case_insensitively() {
        let body = payload(serde_json::json!({
            "Authorization": "Signature headers=\"Host\", signature=\"sig\"",
            "HOST": "tracking.internal",
        }));

        let bundle = extract_and_validate(&body).unwrap();
        assert_eq!(bundle["host"], vec!["tracking.internal".to_string()]);
    }

    #[test]
    fn values_are_never_case_normalized() {
        let body = payload(serde_json::json!({
            "authorization": "Signature headers=\"host\", signature=\"sig\"",
            "host": "Tracking.INTERNAL",
        }));

        let bundle = extract_and_validate(&body).unwrap();
        assert_eq!(bundle["host"], vec!["Tracking.INTERNAL".to_string()]);
    }

    #[test]
    fn date_synthesized_from_x_date() {
        let body = payload(serde_json::json!({
            "authorization": "Signature headers=\"date\", signature=\"sig\"",
            "x-date": "Mon, 04 Aug 2026 12:00:00 GMT",
        }));

        let bundle = extract_and_validate(&body).unwrap();
        assert_eq!(bundle["date"], vec!["Mon, 04 Aug 2026 12:00:00 GMT"]);
    }

    #[test]
    fn existing_date_wins_over_x_date() {
        let body = payload(serde_json::json!({
            "authorization": "Signature headers=\"date\", signature=\"sig\"",
            "date": "real",
            "x-date": "synthesized",
        }));

        let bundle = extract_and_validate(&body).unwrap();
        assert_eq!(bundle["date"], vec!["real".to_string()]);
    }

    #[test]
    fn declared_headers_split_on_arbitrary_whitespace() {
        let auth = r#"Signature headers="date   (request-target)  host", signature="s""#;
        let required = required_headers_from_signature(auth).unwrap();
        assert_eq!(
            required,
            vec!["date", "(request-target)", "host", "authorization"]
        );
    }
}
