//! `beacon-scrub scrub`: rewrite one beacon body offline.
//!
//! Reads a captured request body from a file or stdin, runs it through
//! the same [`BodyRewriter`] the proxy uses, and writes the rewritten
//! body to stdout. Handy for checking what the proxy would forward.

use std::io::{Read, Write};

use crate::cli::ScrubArgs;
use crate::error::BeaconScrubError;
use crate::rewrite::{BodyRewriter, ClearList};

pub fn execute(args: &ScrubArgs) -> Result<(), BeaconScrubError> {
    let body = match &args.input {
        Some(path) => std::fs::read(path).map_err(|source| BeaconScrubError::InputRead {
            path: path.clone(),
            source,
        })?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().lock().read_to_end(&mut buf)?;
            buf
        }
    };

    let out = scrub_body(args, &body)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&out)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}

fn scrub_body(args: &ScrubArgs, body: &[u8]) -> Result<bytes::Bytes, BeaconScrubError> {
    let rewriter = BodyRewriter::new(
        args.key.clone(),
        ClearList::new(args.placeholders, &args.sentinel),
    );
    Ok(rewriter.rewrite(body, args.encoding)?)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::error::TransformError;
    use crate::rewrite::clear_list::DEFAULT_SENTINEL;
    use crate::rewrite::{BodyEncoding, Placeholders};

    fn args(encoding: BodyEncoding, placeholders: Placeholders) -> ScrubArgs {
        ScrubArgs {
            input: None,
            key: "ABC".into(),
            encoding,
            placeholders,
            sentinel: DEFAULT_SENTINEL.into(),
        }
    }

    #[test]
    fn json_body_rewritten() {
        let out = scrub_body(
            &args(BodyEncoding::Json, Placeholders::Sentinel),
            br#"[{"event":"e","properties":{"$current_url":"https://a/b"}}]"#,
        )
        .unwrap();
        let events: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(events[0]["properties"]["token"], "ABC");
        assert_eq!(events[0]["properties"]["$current_url"], DEFAULT_SENTINEL);
    }

    #[test]
    fn missing_input_file_reported_as_input() {
        let path = std::env::temp_dir().join("beacon-scrub-no-such-body.txt");
        let args = ScrubArgs {
            input: Some(path.clone()),
            ..args(BodyEncoding::Form, Placeholders::Realistic)
        };
        let err = execute(&args).unwrap_err();
        match &err {
            BeaconScrubError::InputRead { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.to_string().contains("Config"));
    }

    #[test]
    fn malformed_body_reported() {
        let err = scrub_body(&args(BodyEncoding::Form, Placeholders::Realistic), b"verbose=1")
            .unwrap_err();
        assert!(matches!(
            err,
            BeaconScrubError::Transform(TransformError::MissingDataField)
        ));
    }
}
