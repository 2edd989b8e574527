//! In-memory `OpenAPI` document model.
//!
//! Only the parts the aggregator reads or rewrites are typed. Schemas,
//! parameters, responses and other leaves stay raw JSON so documents of any
//! 3.x minor version round-trip. All maps are ordered so serialization is
//! deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// `x-*` members and any other fields the model does not name.
pub type Extensions = BTreeMap<String, Value>;

/// Security scheme name to required scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// `OpenAPI` version written into documents built from scratch.
pub const DEFAULT_OPENAPI_VERSION: &str = "3.0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiDocument {
    #[serde(default = "default_openapi_version")]
    pub openapi: String,
    #[serde(default)]
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Value>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default, skip_serializing_if = "Components::is_empty")]
    pub components: Components,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

fn default_openapi_version() -> String {
    DEFAULT_OPENAPI_VERSION.to_owned()
}

impl Default for OpenApiDocument {
    fn default() -> Self {
        Self::new(Info::default())
    }
}

impl OpenApiDocument {
    /// Empty document carrying the given metadata.
    #[must_use]
    pub fn new(info: Info) -> Self {
        Self {
            openapi: default_openapi_version(),
            info,
            servers: Vec::new(),
            paths: BTreeMap::new(),
            components: Components::default(),
            security: Vec::new(),
            tags: Vec::new(),
            external_docs: None,
            extensions: Extensions::new(),
        }
    }

    /// Number of operations across all path items.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.values().map(|item| item.operations().count()).sum()
    }

    /// Visit every raw JSON subtree that may carry a `$ref`.
    pub fn visit_values_mut(&mut self, visit: &mut impl FnMut(&mut Value)) {
        for item in self.paths.values_mut() {
            item.visit_values_mut(visit);
        }
        self.components.visit_values_mut(visit);
    }

    /// Rename security scheme keys in document- and operation-level requirements.
    pub fn rename_security_schemes(&mut self, renames: &BTreeMap<String, String>) {
        if renames.is_empty() {
            return;
        }
        for requirement in &mut self.security {
            rename_requirement_keys(requirement, renames);
        }
        for item in self.paths.values_mut() {
            for (_, operation) in item.operations_mut() {
                for requirement in operation.security.iter_mut().flatten() {
                    rename_requirement_keys(requirement, renames);
                }
            }
        }
    }
}

fn rename_requirement_keys(requirement: &mut SecurityRequirement, renames: &BTreeMap<String, String>) {
    let renamed = std::mem::take(requirement)
        .into_iter()
        .map(|(name, scopes)| match renames.get(&name) {
            Some(new_name) => (new_name.clone(), scopes),
            None => (name, scopes),
        })
        .collect();
    *requirement = renamed;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// HTTP methods that may carry an operation in a path item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    /// Upper-case method token, as used in route configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a method token is not one of the `OpenAPI` operation methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HTTP method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMethod(s.to_owned()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl PathItem {
    fn slot_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Trace => &mut self.trace,
        }
    }

    #[must_use]
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Trace => self.trace.as_ref(),
        }
    }

    pub fn operation_mut(&mut self, method: HttpMethod) -> Option<&mut Operation> {
        self.slot_mut(method).as_mut()
    }

    pub fn set_operation(&mut self, method: HttpMethod, operation: Operation) {
        *self.slot_mut(method) = Some(operation);
    }

    pub fn remove_operation(&mut self, method: HttpMethod) -> Option<Operation> {
        self.slot_mut(method).take()
    }

    /// Operations present on this path item, in [`HttpMethod::ALL`] order.
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        [
            (HttpMethod::Get, &self.get),
            (HttpMethod::Put, &self.put),
            (HttpMethod::Post, &self.post),
            (HttpMethod::Delete, &self.delete),
            (HttpMethod::Options, &self.options),
            (HttpMethod::Head, &self.head),
            (HttpMethod::Patch, &self.patch),
            (HttpMethod::Trace, &self.trace),
        ]
        .into_iter()
        .filter_map(|(method, slot)| slot.as_ref().map(|op| (method, op)))
    }

    pub fn operations_mut(&mut self) -> impl Iterator<Item = (HttpMethod, &mut Operation)> {
        [
            (HttpMethod::Get, &mut self.get),
            (HttpMethod::Put, &mut self.put),
            (HttpMethod::Post, &mut self.post),
            (HttpMethod::Delete, &mut self.delete),
            (HttpMethod::Options, &mut self.options),
            (HttpMethod::Head, &mut self.head),
            (HttpMethod::Patch, &mut self.patch),
            (HttpMethod::Trace, &mut self.trace),
        ]
        .into_iter()
        .filter_map(|(method, slot)| slot.as_mut().map(|op| (method, op)))
    }

    #[must_use]
    pub fn methods(&self) -> Vec<HttpMethod> {
        self.operations().map(|(method, _)| method).collect()
    }

    #[must_use]
    pub fn has_operations(&self) -> bool {
        self.operations().next().is_some()
    }

    fn visit_values_mut(&mut self, visit: &mut impl FnMut(&mut Value)) {
        self.parameters.iter_mut().for_each(&mut *visit);
        for (_, operation) in self.operations_mut() {
            operation.visit_values_mut(visit);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(default)]
    pub responses: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub callbacks: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    /// `Some(vec![])` explicitly disables security and is kept distinct from absence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Parameter location, the `in` member of a parameter object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Path => "path",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl Operation {
    /// Whether an inline parameter with this location and name exists.
    ///
    /// Header names compare case-insensitively; other locations compare exactly.
    /// `$ref` parameters are not resolved.
    #[must_use]
    pub fn has_parameter(&self, location: ParameterLocation, name: &str) -> bool {
        self.parameters
            .iter()
            .any(|p| parameter_matches(p, location, name))
    }

    /// Remove inline parameters with this location and name; returns how many were removed.
    pub fn remove_parameter(&mut self, location: ParameterLocation, name: &str) -> usize {
        let before = self.parameters.len();
        self.parameters
            .retain(|p| !parameter_matches(p, location, name));
        before - self.parameters.len()
    }

    fn visit_values_mut(&mut self, visit: &mut impl FnMut(&mut Value)) {
        self.parameters.iter_mut().for_each(&mut *visit);
        self.request_body.iter_mut().for_each(&mut *visit);
        self.responses.values_mut().for_each(&mut *visit);
        self.callbacks.values_mut().for_each(&mut *visit);
    }
}

fn parameter_matches(parameter: &Value, location: ParameterLocation, name: &str) -> bool {
    let in_matches = parameter.get("in").and_then(Value::as_str) == Some(location.as_str());
    if !in_matches {
        return false;
    }
    let Some(param_name) = parameter.get("name").and_then(Value::as_str) else {
        return false;
    };
    match location {
        ParameterLocation::Header => param_name.eq_ignore_ascii_case(name),
        ParameterLocation::Query | ParameterLocation::Path | ParameterLocation::Cookie => {
            param_name == name
        }
    }
}

/// Reusable component categories of the `components` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Schemas,
    Responses,
    Parameters,
    Examples,
    RequestBodies,
    Headers,
    SecuritySchemes,
    Links,
    Callbacks,
    PathItems,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 10] = [
        ComponentKind::Schemas,
        ComponentKind::Responses,
        ComponentKind::Parameters,
        ComponentKind::Examples,
        ComponentKind::RequestBodies,
        ComponentKind::Headers,
        ComponentKind::SecuritySchemes,
        ComponentKind::Links,
        ComponentKind::Callbacks,
        ComponentKind::PathItems,
    ];

    /// Member name inside `components`.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            ComponentKind::Schemas => "schemas",
            ComponentKind::Responses => "responses",
            ComponentKind::Parameters => "parameters",
            ComponentKind::Examples => "examples",
            ComponentKind::RequestBodies => "requestBodies",
            ComponentKind::Headers => "headers",
            ComponentKind::SecuritySchemes => "securitySchemes",
            ComponentKind::Links => "links",
            ComponentKind::Callbacks => "callbacks",
            ComponentKind::PathItems => "pathItems",
        }
    }

    /// Local JSON reference to a component of this kind.
    #[must_use]
    pub fn reference(self, name: &str) -> String {
        format!("#/components/{}/{name}", self.key())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub examples: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_bodies: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub callbacks: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub path_items: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Components {
    #[must_use]
    pub fn category(&self, kind: ComponentKind) -> &BTreeMap<String, Value> {
        match kind {
            ComponentKind::Schemas => &self.schemas,
            ComponentKind::Responses => &self.responses,
            ComponentKind::Parameters => &self.parameters,
            ComponentKind::Examples => &self.examples,
            ComponentKind::RequestBodies => &self.request_bodies,
            ComponentKind::Headers => &self.headers,
            ComponentKind::SecuritySchemes => &self.security_schemes,
            ComponentKind::Links => &self.links,
            ComponentKind::Callbacks => &self.callbacks,
            ComponentKind::PathItems => &self.path_items,
        }
    }

    pub fn category_mut(&mut self, kind: ComponentKind) -> &mut BTreeMap<String, Value> {
        match kind {
            ComponentKind::Schemas => &mut self.schemas,
            ComponentKind::Responses => &mut self.responses,
            ComponentKind::Parameters => &mut self.parameters,
            ComponentKind::Examples => &mut self.examples,
            ComponentKind::RequestBodies => &mut self.request_bodies,
            ComponentKind::Headers => &mut self.headers,
            ComponentKind::SecuritySchemes => &mut self.security_schemes,
            ComponentKind::Links => &mut self.links,
            ComponentKind::Callbacks => &mut self.callbacks,
            ComponentKind::PathItems => &mut self.path_items,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && ComponentKind::ALL.iter().all(|k| self.category(*k).is_empty())
    }

    fn visit_values_mut(&mut self, visit: &mut impl FnMut(&mut Value)) {
        for kind in ComponentKind::ALL {
            self.category_mut(kind).values_mut().for_each(&mut *visit);
        }
    }
}

/// Rewrite every `$ref` that points at a renamed component (or into one).
///
/// `renames` maps the old reference (`#/components/<kind>/<name>`) to the new one.
pub fn rewrite_refs(value: &mut Value, renames: &BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if key != "$ref" {
                    rewrite_refs(child, renames);
                } else if let Value::String(target) = child
                    && let Some(rewritten) = rewrite_ref(target, renames)
                {
                    *target = rewritten;
                }
            }
        }
        Value::Array(items) => {
            for child in items {
                rewrite_refs(child, renames);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

fn rewrite_ref(target: &str, renames: &BTreeMap<String, String>) -> Option<String> {
    if let Some(new_ref) = renames.get(target) {
        return Some(new_ref.clone());
    }
    renames.iter().find_map(|(old, new)| {
        target
            .strip_prefix(old.as_str())
            .filter(|rest| rest.starts_with('/'))
            .map(|rest| format!("{new}{rest}"))
    })
}
