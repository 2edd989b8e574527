use crate::document::OpenApiDocument;
use crate::error::FetchError;
use serde_json::Value;

/// Decode a fetched body as an `OpenAPI` 3.x document.
///
/// Bodies whose first non-whitespace byte is `{` are read as JSON, anything
/// else as YAML.
///
/// # Errors
/// Returns [`FetchError::Decode`] when the body is not UTF-8, does not parse,
/// or is not an `OpenAPI` 3.x document.
pub fn decode_document(body: &[u8]) -> Result<OpenApiDocument, FetchError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| FetchError::Decode(format!("body is not valid UTF-8: {e}")))?;
    let text = text.trim_start_matches('\u{feff}').trim_start();

    if text.is_empty() {
        return Err(FetchError::Decode("body is empty".to_owned()));
    }

    let (mut value, raw_version): (Value, _) = if text.starts_with('{') {
        let value = serde_json::from_str(text)
            .map_err(|e| FetchError::Decode(format!("invalid JSON: {e}")))?;
        (value, None)
    } else {
        let value = serde_saphyr::from_str(text)
            .map_err(|e| FetchError::Decode(format!("invalid YAML: {e}")))?;
        (value, raw_yaml_version(text))
    };

    check_version(&mut value, raw_version)?;

    serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Lexical form of a top-level `openapi:` scalar.
///
/// An unquoted `openapi: 3.10` parses as the float `3.1`; the source text is
/// the only place the written version survives.
fn raw_yaml_version(text: &str) -> Option<&str> {
    text.lines().find_map(|line| {
        let rest = line.strip_prefix("openapi:")?;
        let scalar = rest.split(" #").next().unwrap_or(rest).trim();
        let scalar = scalar.trim_matches(|c| c == '\'' || c == '"');
        (!scalar.is_empty()).then_some(scalar)
    })
}

/// Require an `OpenAPI` 3.x version, turning a numeric version back into a string.
///
/// A number is replaced by `raw` when the YAML text provided it. Without it
/// (unquoted numbers in JSON) the float's shortest form is used, so
/// `3.10` reads as `3.1`.
fn check_version(value: &mut Value, raw: Option<&str>) -> Result<(), FetchError> {
    let Some(root) = value.as_object_mut() else {
        return Err(FetchError::Decode("document root is not an object".to_owned()));
    };
    let version = match root.get("openapi") {
        Some(Value::String(version)) => version.clone(),
        Some(Value::Number(number)) => raw.map_or_else(|| number.to_string(), str::to_owned),
        Some(_) => {
            return Err(FetchError::Decode(
                "'openapi' version field is not a string".to_owned(),
            ));
        }
        None if root.contains_key("swagger") => {
            return Err(FetchError::Decode(
                "Swagger 2.0 documents are not supported".to_owned(),
            ));
        }
        None => return Err(FetchError::Decode("missing 'openapi' version field".to_owned())),
    };
    if !version.starts_with("3.") {
        return Err(FetchError::Decode(format!(
            "unsupported OpenAPI version '{version}'"
        )));
    }
    root.insert("openapi".to_owned(), Value::String(version));
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::document::HttpMethod;

    #[test]
    fn test_decode_json() {
        let doc = decode_document(
            br#"  {"openapi":"3.0.1","info":{"title":"Orders","version":"1"},
                "paths":{"/orders":{"get":{"responses":{"200":{"description":"ok"}}}}}}"#,
        )
        .unwrap();
        assert_eq!(doc.info.title, "Orders");
        assert!(doc.paths["/orders"].operation(HttpMethod::Get).is_some());
    }

    #[test]
    fn test_decode_yaml() {
        let yaml = "openapi: 3.0.3\ninfo:\n  title: Catalog\n  version: '2'\npaths:\n  /items:\n    post:\n      responses:\n        '201':\n          description: created\n";
        let doc = decode_document(yaml.as_bytes()).unwrap();
        assert_eq!(doc.info.version, "2");
        assert!(doc.paths["/items"].operation(HttpMethod::Post).is_some());
    }

    #[test]
    fn test_unquoted_yaml_version_is_normalized() {
        let doc = decode_document(b"openapi: 3.1\ninfo:\n  title: T\n  version: '1'\npaths: {}\n").unwrap();
        assert_eq!(doc.openapi, "3.1");
    }

    #[test]
    fn test_unquoted_yaml_version_keeps_written_digits() {
        let doc =
            decode_document(b"openapi: 3.10 # minor ten\ninfo:\n  title: T\n  version: '1'\npaths: {}\n")
                .unwrap();
        assert_eq!(doc.openapi, "3.10");
    }

    #[test]
    fn test_raw_yaml_version_ignores_nested_keys() {
        let text = "info:\n  openapi: 9\nopenapi: '3.0.3'\n";
        assert_eq!(raw_yaml_version(text), Some("3.0.3"));
        assert_eq!(raw_yaml_version("paths: {}\n"), None);
    }

    #[test]
    fn test_reject_swagger_two() {
        let err = decode_document(br#"{"swagger":"2.0","paths":{}}"#).unwrap_err();
        assert!(err.to_string().contains("Swagger 2.0"));
    }

    #[test]
    fn test_reject_garbage() {
        assert!(matches!(
            decode_document(b"<html>bad gateway</html>"),
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(decode_document(b"   "), Err(FetchError::Decode(_))));
        assert!(matches!(decode_document(&[0xff, 0xfe]), Err(FetchError::Decode(_))));
    }
}
