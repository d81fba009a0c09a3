//! Beacon body envelopes: form-encoded `data=` field or raw JSON.
//!
//! The Mixpanel browser library posts `data=<url-encoded JSON>` as
//! `application/x-www-form-urlencoded`; server-side libraries post the
//! JSON array directly. [`BodyEncoding::from_content_type`] picks the
//! envelope, [`decode`] extracts the JSON text and [`encode`] wraps the
//! rewritten JSON back up.

use std::borrow::Cow;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::{DecodeStage, TransformError};

/// Form field carrying the event batch.
pub const DATA_FIELD: &str = "data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// `data=<url-encoded JSON>`
    #[default]
    Form,
    /// Bare JSON array.
    Json,
}

impl BodyEncoding {
    /// Pick the envelope from a `Content-Type` header value.
    ///
    /// Parameters such as `charset` are ignored. Anything unrecognized,
    /// including a missing header, yields `fallback`.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>, fallback: Self) -> Self {
        let Some(value) = content_type else {
            return fallback;
        };
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/x-www-form-urlencoded" {
            Self::Form
        } else if essence == "application/json" || essence.ends_with("+json") {
            Self::Json
        } else {
            fallback
        }
    }
}

/// Decoded body: the JSON text plus, for forms, the fields around it.
#[derive(Debug)]
pub struct Envelope<'a> {
    pub json: Cow<'a, str>,
    form_fields: Vec<(Cow<'a, str>, Cow<'a, str>)>,
}

/// Extract the JSON text of the event batch from `body`.
pub fn decode(body: &[u8], encoding: BodyEncoding) -> Result<Envelope<'_>, TransformError> {
    let text = std::str::from_utf8(body).map_err(|e| TransformError::Decode {
        stage: match encoding {
            BodyEncoding::Form => DecodeStage::Form,
            BodyEncoding::Json => DecodeStage::Json,
        },
        reason: format!("body is not valid UTF-8 ({e})"),
    })?;

    match encoding {
        BodyEncoding::Json => Ok(Envelope {
            json: Cow::Borrowed(text),
            form_fields: Vec::new(),
        }),
        BodyEncoding::Form => {
            let mut json = None;
            let mut form_fields = Vec::new();
            for segment in text.split('&').filter(|s| !s.is_empty()) {
                let Some((key, value)) = decode_pair(segment)? else {
                    continue;
                };
                if key == DATA_FIELD {
                    // first occurrence wins, like a query-string lookup
                    if json.is_none() {
                        json = Some(value);
                    }
                } else {
                    form_fields.push((key, value));
                }
            }

            match json {
                Some(json) if !json.is_empty() => Ok(Envelope { json, form_fields }),
                _ => Err(TransformError::MissingDataField),
            }
        }
    }
}

/// Percent-decode one `key=value` segment.
///
/// `form_urlencoded` substitutes U+FFFD for escapes that are not UTF-8;
/// a segment gaining replacement characters in decoding is rejected.
fn decode_pair(segment: &str) -> Result<Option<(Cow<'_, str>, Cow<'_, str>)>, TransformError> {
    let Some((key, value)) = form_urlencoded::parse(segment.as_bytes()).next() else {
        return Ok(None);
    };
    let replaced = |s: &str| s.matches(char::REPLACEMENT_CHARACTER).count();
    if replaced(&key) + replaced(&value) > replaced(segment) {
        return Err(TransformError::Decode {
            stage: DecodeStage::Form,
            reason: format!("field '{key}' is not valid UTF-8 once percent-decoded"),
        });
    }
    Ok(Some((key, value)))
}

/// Wrap rewritten JSON text back into the envelope it came from.
///
/// Form output is `data=` first, followed by any other fields in their
/// original order. Spaces are written as `%20` rather than `+`, which the
/// collector would otherwise keep as a literal plus sign.
#[must_use]
pub fn encode(envelope: &Envelope<'_>, json: &str, encoding: BodyEncoding) -> Bytes {
    match encoding {
        BodyEncoding::Json => Bytes::copy_from_slice(json.as_bytes()),
        BodyEncoding::Form => {
            let mut body = String::with_capacity(json.len() + 16);
            body.push_str(DATA_FIELD);
            body.push('=');
            push_form_escaped(&mut body, json);
            for (key, value) in &envelope.form_fields {
                body.push('&');
                push_form_escaped(&mut body, key);
                body.push('=');
                push_form_escaped(&mut body, value);
            }
            Bytes::from(body)
        }
    }
}

fn push_form_escaped(buf: &mut String, value: &str) {
    for chunk in form_urlencoded::byte_serialize(value.as_bytes()) {
        if chunk == "+" {
            buf.push_str("%20");
        } else {
            buf.push_str(chunk);
        }
    }
}
