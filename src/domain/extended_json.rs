//! Conversion between [`Document`] and its extended-JSON representation.
//!
//! Decoding accepts both relaxed input (plain JSON numbers, RFC 3339 dates) and
//! canonical input (`{"$numberInt": "5"}` and friends). Encoding always emits the
//! canonical form, so every decoded document survives an encode/decode cycle with
//! its value types intact.

use crate::domain::document::{Binary, DateTime, Document, ObjectId, Value};
use crate::error::{AppError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value as Json, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const NUMBER_INT: &str = "$numberInt";
const NUMBER_LONG: &str = "$numberLong";
const NUMBER_DOUBLE: &str = "$numberDouble";
const OID: &str = "$oid";
const DATE: &str = "$date";
const BINARY: &str = "$binary";

/// Decodes a top-level extended-JSON object into a [`Document`].
///
/// # Errors
/// Returns `AppError::MalformedDocument` if the input is not an object, uses an
/// unsupported `$` type wrapper, or carries a wrapper with an invalid payload.
pub fn decode(json: &Json) -> Result<Document> {
    match json {
        Json::Object(map) => decode_document(map),
        other => Err(malformed(format!("expected a document, found {}", kind(other)))),
    }
}

/// Encodes a [`Document`] as canonical extended JSON.
#[must_use]
pub fn encode(doc: &Document) -> Json {
    Json::Object(doc.iter().map(|(k, v)| (k.to_owned(), encode_value(v, false))).collect())
}

/// Encodes a [`Document`] as canonical extended JSON, refusing documents that
/// would not decode back to themselves.
///
/// # Errors
/// Returns `AppError::MalformedDocument` if a key starts with `$` or a
/// sub-document is shaped like a type wrapper (`{"$numberInt": "5"}`).
pub fn encode_lossless(doc: &Document) -> Result<Json> {
    let json = encode(doc);
    if decode(&json)? == *doc {
        Ok(json)
    } else {
        Err(malformed("document is shaped like an extended-JSON type wrapper"))
    }
}

/// Encodes a [`Document`] as relaxed extended JSON, with plain numbers wherever
/// JSON can represent them. Meant for display; use [`encode`] for storage.
#[must_use]
pub fn encode_relaxed(doc: &Document) -> Json {
    Json::Object(doc.iter().map(|(k, v)| (k.to_owned(), encode_value(v, true))).collect())
}

fn decode_document(map: &Map<String, Json>) -> Result<Document> {
    let mut doc = Document::new();
    for (key, value) in map {
        if key.starts_with('$') {
            return Err(malformed(format!("unsupported field \"{key}\"")));
        }
        doc.set(key.as_str(), decode_value(value)?);
    }
    Ok(doc)
}

fn decode_value(json: &Json) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => Ok(decode_number(n)),
        Json::String(s) => Ok(Value::String(s.clone())),
        Json::Array(items) => items.iter().map(decode_value).collect::<Result<Vec<_>>>().map(Value::Array),
        Json::Object(map) => match wrapper(map)? {
            Some((tag, payload)) => decode_wrapper(tag, payload),
            None => decode_document(map).map(Value::Document),
        },
    }
}

#[allow(clippy::cast_precision_loss)]
fn decode_number(n: &Number) -> Value {
    if let Some(v) = n.as_i64() {
        i32::try_from(v).map_or(Value::Int64(v), Value::Int32)
    } else if let Some(v) = n.as_u64() {
        Value::Double(v as f64)
    } else {
        Value::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Identifies a `$` type wrapper. A wrapper must be the object's only key.
fn wrapper(map: &Map<String, Json>) -> Result<Option<(&str, &Json)>> {
    let Some(tag) = map.keys().find(|k| k.starts_with('$')) else {
        return Ok(None);
    };
    if map.len() > 1 {
        return Err(malformed(format!("type wrapper \"{tag}\" must not carry other fields")));
    }
    Ok(map.get(tag).map(|payload| (tag.as_str(), payload)))
}

fn decode_wrapper(tag: &str, payload: &Json) -> Result<Value> {
    match tag {
        NUMBER_INT => wrapped_str(tag, payload)?
            .parse()
            .map(Value::Int32)
            .map_err(|e| malformed(format!("invalid {tag}: {e}"))),
        NUMBER_LONG => parse_long(payload).map(Value::Int64),
        NUMBER_DOUBLE => parse_double(wrapped_str(tag, payload)?).map(Value::Double),
        OID => ObjectId::parse_str(wrapped_str(tag, payload)?)
            .map(Value::ObjectId)
            .map_err(|e| malformed(format!("invalid {tag}: {e}"))),
        DATE => decode_date(payload).map(Value::DateTime),
        BINARY => decode_binary(payload).map(Value::Binary),
        other => Err(malformed(format!("unsupported type wrapper \"{other}\""))),
    }
}

fn wrapped_str<'a>(tag: &str, payload: &'a Json) -> Result<&'a str> {
    payload.as_str().ok_or_else(|| malformed(format!("{tag} expects a string, found {}", kind(payload))))
}

fn parse_long(payload: &Json) -> Result<i64> {
    wrapped_str(NUMBER_LONG, payload)?.parse().map_err(|e| malformed(format!("invalid {NUMBER_LONG}: {e}")))
}

fn parse_double(s: &str) -> Result<f64> {
    match s {
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        other => other.parse().map_err(|e| malformed(format!("invalid {NUMBER_DOUBLE}: {e}"))),
    }
}

fn decode_date(payload: &Json) -> Result<DateTime> {
    match payload {
        Json::Object(inner) if inner.len() == 1 && inner.contains_key(NUMBER_LONG) => {
            parse_long(&inner[NUMBER_LONG]).map(DateTime::from_millis)
        }
        Json::String(s) => {
            let parsed =
                OffsetDateTime::parse(s, &Rfc3339).map_err(|e| malformed(format!("invalid {DATE}: {e}")))?;
            let millis = parsed.unix_timestamp_nanos() / 1_000_000;
            i64::try_from(millis).map(DateTime::from_millis).map_err(|_| malformed(format!("{DATE} out of range")))
        }
        Json::Number(n) => {
            n.as_i64().map(DateTime::from_millis).ok_or_else(|| malformed(format!("{DATE} must be an integer")))
        }
        other => Err(malformed(format!("{DATE} cannot hold {}", kind(other)))),
    }
}

fn decode_binary(payload: &Json) -> Result<Binary> {
    let inner = match payload {
        Json::Object(inner) if inner.len() == 2 => inner,
        _ => return Err(malformed(format!("{BINARY} expects {{\"base64\", \"subType\"}}"))),
    };
    let encoded = inner.get("base64").and_then(Json::as_str).ok_or_else(|| malformed("missing base64"))?;
    let subtype = inner.get("subType").and_then(Json::as_str).ok_or_else(|| malformed("missing subType"))?;

    let bytes = STANDARD.decode(encoded).map_err(|e| malformed(format!("invalid base64: {e}")))?;
    let subtype = u8::from_str_radix(subtype, 16).map_err(|e| malformed(format!("invalid subType: {e}")))?;
    Ok(Binary { subtype, bytes })
}

fn encode_value(value: &Value, relaxed: bool) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int32(v) if relaxed => json!(v),
        Value::Int32(v) => json!({ NUMBER_INT: v.to_string() }),
        Value::Int64(v) if relaxed => json!(v),
        Value::Int64(v) => json!({ NUMBER_LONG: v.to_string() }),
        Value::Double(v) if relaxed && v.is_finite() => json!(v),
        Value::Double(v) => json!({ NUMBER_DOUBLE: format_double(*v) }),
        Value::String(s) => Json::String(s.clone()),
        Value::Document(d) if relaxed => encode_relaxed(d),
        Value::Document(d) => encode(d),
        Value::Array(items) => Json::Array(items.iter().map(|v| encode_value(v, relaxed)).collect()),
        Value::ObjectId(oid) => json!({ OID: oid.to_hex() }),
        Value::DateTime(dt) => encode_date(*dt, relaxed),
        Value::Binary(bin) => json!({
            BINARY: { "base64": STANDARD.encode(&bin.bytes), "subType": format!("{:02x}", bin.subtype) }
        }),
    }
}

fn encode_date(dt: DateTime, relaxed: bool) -> Json {
    if relaxed {
        let formatted = OffsetDateTime::from_unix_timestamp_nanos(i128::from(dt.timestamp_millis()) * 1_000_000)
            .ok()
            .and_then(|t| t.format(&Rfc3339).ok());
        if let Some(formatted) = formatted {
            return json!({ DATE: formatted });
        }
    }
    json!({ DATE: { NUMBER_LONG: dt.timestamp_millis().to_string() } })
}

fn format_double(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_owned()
    } else if v.is_infinite() {
        let sign = if v > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else {
        // Debug keeps the fractional part ("1.0") and round-trips exactly.
        format!("{v:?}")
    }
}

const fn kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

fn malformed(msg: impl Into<String>) -> AppError {
    AppError::MalformedDocument(msg.into())
}
