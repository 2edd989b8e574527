use super::{SwaggerTransformFactory, directive_value};
use crate::config::TransformValues;
use crate::document::{Operation, ParameterLocation};
use serde_json::{Map, Value, json};

const REQUEST_HEADER: &str = "RequestHeader";
const REQUEST_HEADER_REMOVE: &str = "RequestHeaderRemove";
const RESPONSE_HEADER: &str = "ResponseHeader";
const SET: &str = "Set";
const APPEND: &str = "Append";

/// Mirrors `RequestHeader`, `RequestHeaderRemove` and `ResponseHeader` directives.
///
/// - `{RequestHeader: name, Set: value}`: the gateway supplies the header, so
///   clients no longer send it and the parameter is removed.
/// - `{RequestHeader: name, Append: value}`: an optional header parameter is
///   added when the operation does not declare one.
/// - `{RequestHeaderRemove: name}`: the header never reaches the upstream.
/// - `{ResponseHeader: name, Set|Append: value}`: every inline response gains
///   the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderTransformFactory;

impl SwaggerTransformFactory for HeaderTransformFactory {
    fn build(&self, operation: &mut Operation, values: &TransformValues) -> bool {
        if let Some(name) = directive_value(values, REQUEST_HEADER) {
            if directive_value(values, SET).is_some() {
                operation.remove_parameter(ParameterLocation::Header, name);
                return true;
            }
            if let Some(value) = directive_value(values, APPEND) {
                if !operation.has_parameter(ParameterLocation::Header, name) {
                    operation.parameters.push(appended_header(name, value));
                }
                return true;
            }
            return false;
        }

        if let Some(name) = directive_value(values, REQUEST_HEADER_REMOVE) {
            operation.remove_parameter(ParameterLocation::Header, name);
            return true;
        }

        if let Some(name) = directive_value(values, RESPONSE_HEADER) {
            let Some(value) =
                directive_value(values, SET).or_else(|| directive_value(values, APPEND))
            else {
                return false;
            };
            for response in operation.responses.values_mut() {
                add_response_header(response, name, value);
            }
            return true;
        }

        false
    }
}

fn appended_header(name: &str, value: &str) -> Value {
    json!({
        "name": name,
        "in": "header",
        "required": false,
        "description": format!("The gateway appends '{value}' to this header."),
        "schema": { "type": "string" },
    })
}

/// Declare `name` on an inline response; `$ref` responses are left alone.
fn add_response_header(response: &mut Value, name: &str, value: &str) {
    let Some(response) = response.as_object_mut() else {
        return;
    };
    if response.contains_key("$ref") {
        return;
    }
    let headers = response
        .entry("headers")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(headers) = headers.as_object_mut() else {
        return;
    };
    if headers.keys().any(|existing| existing.eq_ignore_ascii_case(name)) {
        return;
    }
    headers.insert(
        name.to_owned(),
        json!({
            "description": format!("Set by the gateway to '{value}'."),
            "schema": { "type": "string" },
        }),
    );
}
