//! Decoding of request parameters that may carry signed literals.
//!
//! A prop whose value looks like JSON is parsed and walked; every object
//! shaped `{"__pln": "<signed>"}` is verified and replaced by its payload.
//! Objects that fail verification stay plain JSON so a forged literal only
//! loses its trust, it never fails the request.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::observability::metrics;
use crate::pln::codec::{SignedLiteralCodec, PLN_MARKER};

/// Query parameter consumed by the router, never passed on as a prop.
pub const VIEW_PARAM: &str = "_view";

/// A decoded request prop.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// Raw parameter text that was not JSON.
    Text(String),
    /// Untrusted JSON value, including literals that failed verification.
    Json(JsonValue),
    /// Payload of a literal whose signature verified.
    Verified(String),
    /// JSON object with at least one nested prop to keep apart.
    Object(BTreeMap<String, PropValue>),
    List(Vec<PropValue>),
}

impl PropValue {
    pub fn as_verified(&self) -> Option<&str> {
        match self {
            PropValue::Verified(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// True when this value or anything inside it verified.
    pub fn contains_verified(&self) -> bool {
        match self {
            PropValue::Verified(_) => true,
            PropValue::Object(map) => map.values().any(PropValue::contains_verified),
            PropValue::List(items) => items.iter().any(PropValue::contains_verified),
            PropValue::Text(_) | PropValue::Json(_) => false,
        }
    }
}

/// Decode a single raw parameter value.
pub fn decode_prop(raw: &str, codec: Option<&SignedLiteralCodec>) -> PropValue {
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(json) = serde_json::from_str::<JsonValue>(raw) {
            return walk(json, codec);
        }
    }
    PropValue::Text(raw.to_string())
}

/// Decode query and form parameters into props.
///
/// `form` holds the decoded body fields (URL-encoded or multipart). The
/// first value of each name is used. Form fields override query parameters
/// of the same name; `_view` is skipped.
pub fn decode_props(
    query: Option<&str>,
    form: &[(String, String)],
    codec: Option<&SignedLiteralCodec>,
) -> BTreeMap<String, PropValue> {
    let mut props = BTreeMap::new();

    if let Some(query) = query {
        collect(&mut props, url::form_urlencoded::parse(query.as_bytes()), codec);
    }
    let mut form_props = BTreeMap::new();
    collect(
        &mut form_props,
        form.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        codec,
    );
    props.extend(form_props);

    props
}

fn collect<K: AsRef<str>, V: AsRef<str>>(
    props: &mut BTreeMap<String, PropValue>,
    pairs: impl Iterator<Item = (K, V)>,
    codec: Option<&SignedLiteralCodec>,
) {
    for (key, value) in pairs {
        let key = key.as_ref();
        if key == VIEW_PARAM || props.contains_key(key) {
            continue;
        }
        props.insert(key.to_string(), decode_prop(value.as_ref(), codec));
    }
}

fn walk(json: JsonValue, codec: Option<&SignedLiteralCodec>) -> PropValue {
    match json {
        JsonValue::Object(map) => {
            if let Some(JsonValue::String(signed)) = map.get(PLN_MARKER) {
                if let Some(payload) = verify_literal(signed, codec) {
                    return PropValue::Verified(payload);
                }
                return PropValue::Json(JsonValue::Object(map));
            }

            let walked: BTreeMap<String, PropValue> = map
                .into_iter()
                .map(|(key, value)| (key, walk(value, codec)))
                .collect();
            if walked.values().any(PropValue::contains_verified) {
                PropValue::Object(walked)
            } else {
                PropValue::Json(JsonValue::Object(
                    walked.into_iter().map(|(k, v)| (k, into_json(v))).collect(),
                ))
            }
        }
        JsonValue::Array(items) => {
            let walked: Vec<PropValue> = items.into_iter().map(|v| walk(v, codec)).collect();
            if walked.iter().any(PropValue::contains_verified) {
                PropValue::List(walked)
            } else {
                PropValue::Json(JsonValue::Array(walked.into_iter().map(into_json).collect()))
            }
        }
        scalar => PropValue::Json(scalar),
    }
}

fn verify_literal(signed: &str, codec: Option<&SignedLiteralCodec>) -> Option<String> {
    let Some(codec) = codec else {
        tracing::debug!("Signed literal received but no codec is configured");
        metrics::record_literal_verification("unavailable");
        return None;
    };

    match codec.verify(signed) {
        Ok(payload) => {
            metrics::record_literal_verification("verified");
            Some(payload)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Signed literal rejected, treating as plain JSON");
            metrics::record_literal_verification("rejected");
            None
        }
    }
}

// Only called on subtrees without verified literals.
fn into_json(value: PropValue) -> JsonValue {
    match value {
        PropValue::Json(json) => json,
        PropValue::Text(text) | PropValue::Verified(text) => JsonValue::String(text),
        PropValue::Object(map) => {
            JsonValue::Object(map.into_iter().map(|(k, v)| (k, into_json(v))).collect())
        }
        PropValue::List(items) => JsonValue::Array(items.into_iter().map(into_json).collect()),
    }
}
