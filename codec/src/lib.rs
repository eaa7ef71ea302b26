//! String codec for retained application state.
//!
//! Every retainable value is packed into a single string so it can live in a
//! URL fragment or a `localStorage` slot. Encoded entries are self-describing:
//! leading markers say whether the payload is safeguarded (obfuscated) and
//! whether it is JSON, so [`decode`] never needs external type metadata and
//! quietly passes through strings it did not produce.
//!
//! ENTRY LAYOUT
//! ============
//! ```text
//! [afesa] base64( [asonja] json | plain string | __undefined__ )
//! ```
//! The safeguard marker is always outermost and is stripped first on decode.
//! Non-object JSON values travel inside a one-field `{"apwra": ..}` envelope
//! so a bare string can never be confused with JSON.
//!
//! Safeguarding is obfuscation, not encryption.

use std::borrow::Cow;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Prefix of a JSON-encoded payload.
pub const JSON_MARKER: &str = "asonja";
/// Prefix of a safeguarded (obfuscated) payload.
pub const SAFEGUARD_MARKER: &str = "afesa";
/// Stand-in for an undefined value, which JSON cannot express.
pub const UNDEFINED_SENTINEL: &str = "__undefined__";

const ENVELOPE_FIELD: &str = "apwra";

/// Error returned by the encode/decode entry points.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value has no JSON representation (non-string map keys, a failing
    /// `Serialize` impl, ...).
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    /// Safeguarding was requested or encountered, but this build cannot
    /// perform it.
    #[error("{operation}(): safeguard obfuscation is not supported in this build")]
    EnvironmentUnsupported { operation: &'static str },
    /// A decoded value could not be converted into the requested Rust type.
    #[error("decoded value does not match the requested type: {0}")]
    Mismatch(String),
}

/// Encode a value (or `None` for undefined) into its string entry.
///
/// # Errors
///
/// Returns [`CodecError::EnvironmentUnsupported`] when `safeguard` is set
/// and the `safeguard` feature is disabled.
pub fn encode(value: Option<&Value>, safeguard: bool) -> Result<String, CodecError> {
    let encoded = match value {
        None => UNDEFINED_SENTINEL.to_owned(),
        Some(Value::String(text)) if !collides_with_marker(text) => text.clone(),
        Some(object) if object.as_object().is_some_and(|map| !looks_like_envelope(map)) => {
            format!("{JSON_MARKER}{object}")
        }
        Some(other) => {
            let mut envelope = Map::new();
            envelope.insert(ENVELOPE_FIELD.to_owned(), other.clone());
            format!("{JSON_MARKER}{}", Value::Object(envelope))
        }
    };

    if safeguard {
        Ok(format!("{SAFEGUARD_MARKER}{}", obfuscate(&encoded)?))
    } else {
        Ok(encoded)
    }
}

/// Encode any serializable value.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedType`] when `value` does not serialize to
/// JSON, plus anything [`encode`] returns.
pub fn encode_value<T: Serialize + ?Sized>(value: &T, safeguard: bool) -> Result<String, CodecError> {
    let json = to_json(value)?;
    encode(Some(&json), safeguard)
}

/// Convert a serializable value into the JSON model used by the codec.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedType`] when serialization fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, CodecError> {
    serde_json::to_value(value).map_err(|err| CodecError::UnsupportedType(err.to_string()))
}

/// Decode an entry, reversing [`encode`].
///
/// Strings that carry no recognizable marker come back unchanged as
/// `Value::String`. A marked payload that does not de-obfuscate, or whose
/// JSON is not an object, is treated the same way.
///
/// # Errors
///
/// Returns [`CodecError::EnvironmentUnsupported`] for a safeguarded entry
/// when the `safeguard` feature is disabled.
pub fn decode(input: &str) -> Result<Option<Value>, CodecError> {
    let mut text = Cow::Borrowed(input);

    if let Some(payload) = input.strip_prefix(SAFEGUARD_MARKER) {
        match deobfuscate(payload)? {
            Some(clear) => text = Cow::Owned(clear),
            None => return Ok(Some(Value::String(input.to_owned()))),
        }
    }

    if let Some(payload) = text.strip_prefix(JSON_MARKER) {
        // `encode` only ever writes an object after the marker.
        if let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(payload) {
            return Ok(Some(unwrap_envelope(parsed)));
        }
    }

    if text == UNDEFINED_SENTINEL {
        return Ok(None);
    }
    Ok(Some(Value::String(text.into_owned())))
}

/// Decode a value that may already be decoded.
///
/// Strings are run through [`decode`]; every other value (and `None`) passes
/// through untouched, so calling this twice is harmless.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_any(value: Option<Value>) -> Result<Option<Value>, CodecError> {
    match value {
        Some(Value::String(text)) => decode(&text),
        other => Ok(other),
    }
}

/// Decode an entry straight into a Rust type.
///
/// # Errors
///
/// Returns [`CodecError::Mismatch`] when the decoded JSON does not fit `T`,
/// plus anything [`decode`] returns.
pub fn decode_value<T: DeserializeOwned>(input: &str) -> Result<Option<T>, CodecError> {
    decode(input)?.map(from_json).transpose()
}

/// Convert a decoded JSON value into a Rust type.
///
/// # Errors
///
/// Returns [`CodecError::Mismatch`] when the shape does not fit `T`.
pub fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(|err| CodecError::Mismatch(err.to_string()))
}

/// Plain strings that would be misread as an encoding must be JSON-wrapped.
fn collides_with_marker(text: &str) -> bool {
    text.starts_with(JSON_MARKER) || text.starts_with(SAFEGUARD_MARKER) || text == UNDEFINED_SENTINEL
}

fn looks_like_envelope(map: &Map<String, Value>) -> bool {
    map.len() == 1 && map.contains_key(ENVELOPE_FIELD)
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if looks_like_envelope(&map) => {
            map.remove(ENVELOPE_FIELD).unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(feature = "safeguard")]
fn obfuscate(text: &str) -> Result<String, CodecError> {
    use base64::Engine;
    Ok(base64::engine::general_purpose::STANDARD.encode(text.as_bytes()))
}

#[cfg(not(feature = "safeguard"))]
fn obfuscate(_text: &str) -> Result<String, CodecError> {
    Err(CodecError::EnvironmentUnsupported { operation: "encode" })
}

/// `Ok(None)` means the payload is not valid base64 text.
#[cfg(feature = "safeguard")]
fn deobfuscate(payload: &str) -> Result<Option<String>, CodecError> {
    use base64::Engine;
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(payload) else {
        return Ok(None);
    };
    match String::from_utf8(bytes) {
        Ok(text) => Ok(Some(text)),
        Err(_) => Ok(None),
    }
}

#[cfg(not(feature = "safeguard"))]
fn deobfuscate(_payload: &str) -> Result<Option<String>, CodecError> {
    Err(CodecError::EnvironmentUnsupported { operation: "decode" })
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
