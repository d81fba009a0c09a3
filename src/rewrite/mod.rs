//! Beacon body rewriting.
//!
//! [`BodyRewriter`] takes the raw body of an analytics `track` request,
//! sets `properties.token` on every event to the configured project key,
//! overwrites the URL-derived properties listed in the [`ClearList`], and
//! returns the re-encoded body. Submodules handle the envelope
//! ([`encoding`]), the field table ([`clear_list`]) and path writes into
//! JSON values ([`path`]).
//!
//! Input that does not look like an array of event objects is rejected
//! rather than passed through: forwarding an unscrubbed body would leak
//! exactly what this proxy exists to remove.

pub mod clear_list;
pub mod encoding;
pub mod path;

use bytes::Bytes;
use serde_json::Value;

use crate::error::{DecodeStage, TransformError};
pub use clear_list::{ClearList, Placeholders};
pub use encoding::BodyEncoding;

const PROPERTIES: &str = "properties";
const TOKEN: &str = "token";

pub struct BodyRewriter {
    api_key: String,
    clear_list: ClearList,
}

impl std::fmt::Debug for BodyRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyRewriter")
            .field("api_key", &"<redacted>")
            .field("clear_list", &self.clear_list)
            .finish()
    }
}

impl BodyRewriter {
    #[must_use]
    pub fn new(api_key: impl Into<String>, clear_list: ClearList) -> Self {
        Self {
            api_key: api_key.into(),
            clear_list,
        }
    }

    #[must_use]
    pub const fn clear_list(&self) -> &ClearList {
        &self.clear_list
    }

    /// Rewrite a complete request body.
    pub fn rewrite(&self, body: &[u8], encoding: BodyEncoding) -> Result<Bytes, TransformError> {
        let envelope = encoding::decode(body, encoding)?;
        let mut events = parse_batch(&envelope.json)?;
        self.apply(&mut events)?;
        let json = Value::Array(events).to_string();
        Ok(encoding::encode(&envelope, &json, encoding))
    }

    /// Inject the key and clear the listed properties on every event.
    ///
    /// Works on a scratch copy of each event so a failing write leaves
    /// `events` untouched from that event on.
    pub fn apply(&self, events: &mut [Value]) -> Result<(), TransformError> {
        for (index, event) in events.iter_mut().enumerate() {
            let mut scratch = event.clone();
            set_property(&mut scratch, index, TOKEN, &self.api_key)?;
            for field in self.clear_list.iter() {
                set_property(&mut scratch, index, field.key, &field.value)?;
            }
            *event = scratch;
        }
        Ok(())
    }
}

fn set_property(
    event: &mut Value,
    index: usize,
    key: &str,
    value: &str,
) -> Result<(), TransformError> {
    path::set_path(event, &[PROPERTIES, key], Value::String(value.to_string())).map_err(|reason| {
        TransformError::FieldSet {
            field: format!("{PROPERTIES}.{key}"),
            index,
            reason,
        }
    })
}

/// Parse the JSON text into events, checking the batch shape.
///
/// The batch must be an array whose elements are objects carrying a
/// `properties` key. An empty array is a valid (empty) batch.
pub fn parse_batch(json: &str) -> Result<Vec<Value>, TransformError> {
    let value: Value = serde_json::from_str(json).map_err(|e| TransformError::Decode {
        stage: DecodeStage::Json,
        reason: e.to_string(),
    })?;

    let events = match value {
        Value::Array(events) => events,
        other => {
            return Err(TransformError::Decode {
                stage: DecodeStage::Batch,
                reason: format!("expected an array of events, found {}", path::kind_of(&other)),
            })
        }
    };

    for (index, event) in events.iter().enumerate() {
        let Some(object) = event.as_object() else {
            return Err(TransformError::Decode {
                stage: DecodeStage::Batch,
                reason: format!("event {index} is {}, not an object", path::kind_of(event)),
            });
        };
        if !object.contains_key(PROPERTIES) {
            return Err(TransformError::Decode {
                stage: DecodeStage::Batch,
                reason: format!("event {index} has no '{PROPERTIES}'"),
            });
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rewrite::clear_list::DEFAULT_SENTINEL;

    fn sentinel_rewriter(key: &str) -> BodyRewriter {
        BodyRewriter::new(key, ClearList::new(Placeholders::Sentinel, DEFAULT_SENTINEL))
    }

    fn realistic_rewriter(key: &str) -> BodyRewriter {
        BodyRewriter::new(key, ClearList::new(Placeholders::Realistic, DEFAULT_SENTINEL))
    }

    fn rewrite_json(rewriter: &BodyRewriter, input: &Value) -> Value {
        let out = rewriter
            .rewrite(input.to_string().as_bytes(), BodyEncoding::Json)
            .unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn two_event_scenario_with_sentinel() {
        let input = json!([
            {"properties": {"$referrer": "https://a", "$current_url": "https://a/x"}},
            {"properties": {}}
        ]);
        let out = rewrite_json(&sentinel_rewriter("ABC"), &input);

        assert_eq!(out[0]["properties"]["token"], "ABC");
        assert_eq!(out[1]["properties"]["token"], "ABC");
        assert_eq!(out[0]["properties"]["$referrer"], DEFAULT_SENTINEL);
        assert_eq!(out[0]["properties"]["$current_url"], DEFAULT_SENTINEL);
        // absent clear-list fields are created too
        assert_eq!(out[1]["properties"]["$referrer"], DEFAULT_SENTINEL);
    }

    #[test]
    fn token_set_on_every_event() {
        for n in [0_usize, 1, 7] {
            let input = Value::Array(
                (0..n)
                    .map(|i| json!({"event": format!("e{i}"), "properties": {"token": "old"}}))
                    .collect(),
            );
            let out = rewrite_json(&realistic_rewriter("K"), &input);
            let events = out.as_array().unwrap();
            assert_eq!(events.len(), n);
            assert!(events.iter().all(|e| e["properties"]["token"] == "K"));
        }
    }

    #[test]
    fn untouched_fields_survive() {
        let input = json!([{
            "event": "route",
            "properties": {
                "$os": "Mac OS X",
                "$browser_version": 106,
                "time": 1_665_604_202.076,
                "version": ["12.1.1"],
                "_version": [null],
                "$referrer": "https://localhost:1443/admin",
                "token": "changethishere"
            }
        }]);
        let rewriter = realistic_rewriter("K");
        let mut out = rewrite_json(&rewriter, &input);

        let mut expected = input.clone();
        let props = expected[0]["properties"].as_object_mut().unwrap();
        props.insert("token".into(), json!("K"));
        for field in rewriter.clear_list().iter() {
            props.insert(field.key.into(), json!(field.value));
        }
        assert_eq!(out, expected);

        out[0]["properties"]["$referrer"] = json!("x");
        assert_ne!(out, expected);
    }

    #[test]
    fn number_text_survives_rewrite() {
        let body = br#"[{"properties":{"big":123456789012345678901234567890,"precise":0.12345678901234567890123,"sci":1e2,"neg":-0.0}}]"#;
        let out = sentinel_rewriter("K")
            .rewrite(body, BodyEncoding::Json)
            .unwrap();
        let text = std::str::from_utf8(&out).unwrap();

        assert!(text.contains(r#""big":123456789012345678901234567890"#), "{text}");
        assert!(text.contains(r#""precise":0.12345678901234567890123"#), "{text}");
        assert!(text.contains(r#""sci":1e2"#), "{text}");
        assert!(text.contains(r#""neg":-0.0"#), "{text}");
    }

    #[test]
    fn realistic_placeholders_per_field() {
        let input = json!([{"properties": {
            "$referrer": "https://localhost:1443/admin",
            "$referring_domain": "localhost:1443",
            "$initial_referrer": "$direct",
            "$initial_referring_domain": "$direct"
        }}]);
        let out = rewrite_json(&realistic_rewriter("K"), &input);
        let props = &out[0]["properties"];
        assert_eq!(props["$referrer"], "https://example.com");
        assert_eq!(props["$referring_domain"], "example.com");
        assert_eq!(props["$initial_referrer"], "https://example.com:1443/admin");
        assert_eq!(props["$initial_referring_domain"], "example.com");
        assert_eq!(
            props["$current_url"],
            "https://example.com:1443/admin#/status/dashboard"
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let rewriter = realistic_rewriter("K");
        let body = br#"[{"event":"a","properties":{"$referrer":"https://a b","x":1}}]"#;
        let once = rewriter.rewrite(body, BodyEncoding::Json).unwrap();
        let twice = rewriter.rewrite(&once, BodyEncoding::Json).unwrap();
        assert_eq!(once, twice);

        let form = rewriter
            .rewrite(b"data=%5B%7B%22properties%22%3A%7B%7D%7D%5D", BodyEncoding::Form)
            .unwrap();
        let form_twice = rewriter.rewrite(&form, BodyEncoding::Form).unwrap();
        assert_eq!(form, form_twice);
    }

    #[test]
    fn form_round_trip_keeps_length() {
        let rewriter = sentinel_rewriter("K");
        let json = r#"[{"event":"a b","properties":{}},{"event":"c","properties":{"$referrer":"r"}}]"#;
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("data", json)
            .finish();

        let out = rewriter.rewrite(body.as_bytes(), BodyEncoding::Form).unwrap();
        assert!(!out.contains(&b'+'));

        let envelope = encoding::decode(&out, BodyEncoding::Form).unwrap();
        let events = parse_batch(&envelope.json).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "a b");
        assert_eq!(events[1]["properties"]["$referrer"], DEFAULT_SENTINEL);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let rewriter = sentinel_rewriter("K");
        for body in [&b"notjson"[..], b"{}", b"[{}]", b"[1]", b"null"] {
            let err = rewriter.rewrite(body, BodyEncoding::Json).unwrap_err();
            assert!(
                matches!(err, TransformError::Decode { .. }),
                "{body:?} gave {err}"
            );
        }
    }

    #[test]
    fn malformed_form_payload_is_rejected() {
        let rewriter = sentinel_rewriter("K");
        for data in ["notjson", "%7B%7D", "%5B%7B%7D%5D"] {
            let body = format!("data={data}");
            let err = rewriter.rewrite(body.as_bytes(), BodyEncoding::Form).unwrap_err();
            assert!(matches!(err, TransformError::Decode { .. }));
        }
    }

    #[test]
    fn non_object_properties_fail_on_token() {
        let rewriter = sentinel_rewriter("K");
        let err = rewriter
            .rewrite(br#"[{"properties":{}},{"properties":[1]}]"#, BodyEncoding::Json)
            .unwrap_err();
        match err {
            TransformError::FieldSet { field, index, .. } => {
                assert_eq!(field, "properties.token");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_apply_leaves_failing_event_intact() {
        let rewriter = sentinel_rewriter("K");
        let mut events = vec![json!({"properties": {}}), json!({"properties": "x"})];
        assert!(rewriter.apply(&mut events).is_err());
        assert_eq!(events[1], json!({"properties": "x"}));
    }

    #[test]
    fn debug_hides_key() {
        let rewriter = sentinel_rewriter("super-secret");
        assert!(!format!("{rewriter:?}").contains("super-secret"));
    }
}
