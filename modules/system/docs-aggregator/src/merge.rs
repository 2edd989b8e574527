//! Folding filtered source documents into one output document.
//!
//! Paths are first-write-wins: the first source (in configuration order)
//! that contributes a path key owns it. Components follow a different rule:
//! colliding names with differing values are either renamed (the default) or
//! overwritten by the later source. Identical duplicates always collapse.

use crate::document::{
    ComponentKind, Components, Info, OpenApiDocument, PathItem, SecurityRequirement, Tag,
    rewrite_refs,
};
use crate::domain::join_path;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Planned component renames per category, old name to new name.
type Renames = BTreeMap<ComponentKind, BTreeMap<String, String>>;

/// One filtered and transformed document ready to be merged.
#[derive(Debug, Clone)]
pub struct Contribution<'a> {
    /// Path keys are still un-prefixed.
    pub document: OpenApiDocument,
    pub path_prefix: &'a str,
    pub cluster_id: &'a str,
    pub destination_id: &'a str,
    pub document_path: &'a str,
    /// The document path equals its source's metadata marker.
    pub is_metadata: bool,
}

/// Where the output's info came from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MetadataOrigin {
    cluster_id: String,
    destination_id: String,
    document_path: String,
}

/// Running state of a merge, folded by value.
#[derive(Debug, Clone, Default)]
pub struct MergeAccumulator {
    rename_duplicates: bool,
    info: Option<(Info, MetadataOrigin)>,
    paths: BTreeMap<String, PathItem>,
    components: Components,
    security: Vec<SecurityRequirement>,
    tags: Vec<Tag>,
    contributions: usize,
}

impl MergeAccumulator {
    #[must_use]
    pub fn new(rename_duplicates: bool) -> Self {
        Self {
            rename_duplicates,
            ..Self::default()
        }
    }

    /// Number of documents folded so far.
    #[must_use]
    pub fn contributions(&self) -> usize {
        self.contributions
    }

    #[must_use]
    pub fn fold(mut self, contribution: Contribution<'_>) -> Self {
        let Contribution {
            mut document,
            path_prefix,
            cluster_id,
            destination_id,
            document_path,
            is_metadata,
        } = contribution;

        self.merge_components(&mut document, cluster_id, destination_id);

        for (key, item) in std::mem::take(&mut document.paths) {
            let output_key = join_path(path_prefix, &key);
            if self.paths.contains_key(&output_key) {
                tracing::debug!(
                    path = %output_key,
                    cluster_id,
                    destination_id,
                    document = document_path,
                    "path already provided by an earlier source; skipped"
                );
                continue;
            }
            self.paths.insert(output_key, item);
        }

        self.security.append(&mut document.security);

        for tag in document.tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }

        if is_metadata {
            self.take_metadata(document.info, cluster_id, destination_id, document_path);
        }

        self.contributions += 1;
        self
    }

    /// Produce the output document on top of `base`.
    ///
    /// The base keeps its `OpenAPI` version, servers and extensions; its info
    /// is replaced only when a metadata source contributed.
    #[must_use]
    pub fn finish(self, base: OpenApiDocument) -> OpenApiDocument {
        OpenApiDocument {
            info: self.info.map_or(base.info, |(info, _)| info),
            paths: self.paths,
            components: self.components,
            security: self.security,
            tags: self.tags,
            ..base
        }
    }

    fn take_metadata(
        &mut self,
        info: Info,
        cluster_id: &str,
        destination_id: &str,
        document_path: &str,
    ) {
        if let Some((_, origin)) = &self.info {
            tracing::warn!(
                cluster_id,
                destination_id,
                document = document_path,
                metadata_cluster = %origin.cluster_id,
                metadata_destination = %origin.destination_id,
                metadata_document = %origin.document_path,
                "metadata already taken from an earlier source; ignored"
            );
            return;
        }
        self.info = Some((
            info,
            MetadataOrigin {
                cluster_id: cluster_id.to_owned(),
                destination_id: destination_id.to_owned(),
                document_path: document_path.to_owned(),
            },
        ));
    }

    fn merge_components(
        &mut self,
        document: &mut OpenApiDocument,
        cluster_id: &str,
        destination_id: &str,
    ) {
        let mut incoming = std::mem::take(&mut document.components);

        if self.rename_duplicates {
            let renames = self.plan_renames(&incoming, cluster_id, destination_id);
            for (kind, names) in &renames {
                for (from, to) in names {
                    tracing::debug!(
                        kind = kind.key(),
                        from = %from,
                        to = %to,
                        cluster_id,
                        destination_id,
                        "renamed colliding component"
                    );
                }
            }
            if !renames.is_empty() {
                apply_renames(document, &mut incoming, &renames);
            }
        }

        for kind in ComponentKind::ALL {
            let merged = self.components.category_mut(kind);
            for (name, value) in std::mem::take(incoming.category_mut(kind)) {
                if let Some(existing) = merged.get(&name) {
                    if *existing == value {
                        continue;
                    }
                    tracing::debug!(
                        kind = kind.key(),
                        name = %name,
                        cluster_id,
                        destination_id,
                        "component overwritten by a later source"
                    );
                }
                merged.insert(name, value);
            }
        }

        self.components.extensions.append(&mut incoming.extensions);
    }

    /// New names for incoming components that collide with a differing entry.
    ///
    /// A rename rewrites `$ref`s, so a component identical to an existing
    /// entry may differ once its references point at renamed targets.
    /// Planning repeats on the rewritten values until no collision is left.
    fn plan_renames(&self, incoming: &Components, cluster_id: &str, destination_id: &str) -> Renames {
        let mut renames = Renames::new();
        // Every round renames at least one more name, or moves one to a later candidate.
        let max_rounds = ComponentKind::ALL
            .iter()
            .map(|kind| incoming.category(*kind).len())
            .sum::<usize>()
            + 1;

        for _ in 0..max_rounds {
            let mut rewritten = incoming.clone();
            rename_components(&mut rewritten, &renames);
            let mut changed = false;

            for kind in ComponentKind::ALL {
                let existing = self.components.category(kind);
                let own = incoming.category(kind);

                for name in own.keys() {
                    let current = renames
                        .get(&kind)
                        .and_then(|names| names.get(name))
                        .unwrap_or(name);
                    let Some(value) = rewritten.category(kind).get(current) else {
                        continue;
                    };
                    if existing.get(current).is_none_or(|v| v == value) {
                        continue;
                    }

                    let taken: BTreeSet<&str> = renames
                        .get(&kind)
                        .map(|names| names.values().map(String::as_str).collect())
                        .unwrap_or_default();
                    let new_name = unique_name(name, cluster_id, destination_id, |candidate| {
                        existing.get(candidate).is_none_or(|v| v == value)
                            && !own.contains_key(candidate)
                            && !taken.contains(candidate)
                    });

                    renames.entry(kind).or_default().insert(name.clone(), new_name);
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        renames
    }
}

/// First free name among `<name>_<cluster>`, `<name>_<cluster>_<destination>`
/// and `<name>_<cluster>_<destination>_<n>`.
fn unique_name(
    name: &str,
    cluster_id: &str,
    destination_id: &str,
    is_free: impl Fn(&str) -> bool,
) -> String {
    let cluster = sanitize(cluster_id);
    let destination = sanitize(destination_id);

    let by_cluster = format!("{name}_{cluster}");
    if is_free(&by_cluster) {
        return by_cluster;
    }
    let by_destination = format!("{by_cluster}_{destination}");
    if is_free(&by_destination) {
        return by_destination;
    }
    (2_usize..)
        .map(|n| format!("{by_destination}_{n}"))
        .find(|candidate| is_free(candidate))
        .unwrap_or(by_destination)
}

/// Component names must match `^[a-zA-Z0-9.\-_]+$`.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn reference_renames(renames: &Renames) -> BTreeMap<String, String> {
    renames
        .iter()
        .flat_map(|(kind, names)| {
            names
                .iter()
                .map(|(old, new)| (kind.reference(old), kind.reference(new)))
        })
        .collect()
}

/// Move renamed entries to their new names and rewrite every `$ref` to them.
fn rename_components(components: &mut Components, renames: &Renames) {
    for (kind, names) in renames {
        let category = components.category_mut(*kind);
        let moved: Vec<(String, Value)> = names
            .iter()
            .filter_map(|(old, new)| category.remove(old).map(|value| (new.clone(), value)))
            .collect();
        category.extend(moved);
    }

    let refs = reference_renames(renames);
    for kind in ComponentKind::ALL {
        for value in components.category_mut(kind).values_mut() {
            rewrite_refs(value, &refs);
        }
    }
}

fn apply_renames(document: &mut OpenApiDocument, incoming: &mut Components, renames: &Renames) {
    rename_components(incoming, renames);

    let refs = reference_renames(renames);
    document.visit_values_mut(&mut |value: &mut Value| rewrite_refs(value, &refs));

    if let Some(schemes) = renames.get(&ComponentKind::SecuritySchemes) {
        document.rename_security_schemes(schemes);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::document::{HttpMethod, Operation};
    use serde_json::json;
    use tracing_test::traced_test;

    fn document(title: &str, paths: &[&str]) -> OpenApiDocument {
        let mut doc = OpenApiDocument::new(Info {
            title: title.to_owned(),
            version: "1".to_owned(),
            ..Info::default()
        });
        for path in paths {
            let mut item = PathItem::default();
            item.set_operation(
                HttpMethod::Get,
                Operation {
                    summary: Some(format!("{title} {path}")),
                    ..Operation::default()
                },
            );
            doc.paths.insert((*path).to_owned(), item);
        }
        doc
    }

    fn contribution<'a>(
        document: OpenApiDocument,
        prefix: &'a str,
        cluster_id: &'a str,
        is_metadata: bool,
    ) -> Contribution<'a> {
        Contribution {
            document,
            path_prefix: prefix,
            cluster_id,
            destination_id: "d1",
            document_path: "/swagger.json",
            is_metadata,
        }
    }

    fn summary(doc: &OpenApiDocument, path: &str) -> String {
        doc.paths[path]
            .operation(HttpMethod::Get)
            .and_then(|op| op.summary.clone())
            .unwrap_or_default()
    }

    #[traced_test]
    #[test]
    fn test_paths_first_write_wins() {
        let out = MergeAccumulator::new(true)
            .fold(contribution(document("A", &["/x"]), "/svc/", "a", false))
            .fold(contribution(document("B", &["/x", "/y"]), "/svc", "b", false))
            .finish(OpenApiDocument::default());

        assert_eq!(out.paths.keys().collect::<Vec<_>>(), vec!["/svc/x", "/svc/y"]);
        assert_eq!(summary(&out, "/svc/x"), "A /x");
        assert!(logs_contain("path already provided by an earlier source"));
    }

    #[test]
    fn test_identical_components_collapse() {
        let schema = json!({"type": "object"});
        let mut first = document("A", &[]);
        first.components.schemas.insert("Item".into(), schema.clone());
        let mut second = document("B", &[]);
        second.components.schemas.insert("Item".into(), schema);

        let out = MergeAccumulator::new(true)
            .fold(contribution(first, "", "a", false))
            .fold(contribution(second, "", "b", false))
            .finish(OpenApiDocument::default());

        assert_eq!(out.components.schemas.len(), 1);
    }

    #[test]
    fn test_colliding_components_are_renamed_and_refs_rewritten() {
        let mut first = document("A", &[]);
        first
            .components
            .schemas
            .insert("Item".into(), json!({"type": "string"}));

        let mut second = document("B", &["/items"]);
        second
            .components
            .schemas
            .insert("Item".into(), json!({"type": "integer"}));
        second.components.schemas.insert(
            "ItemList".into(),
            json!({"type": "array", "items": {"$ref": "#/components/schemas/Item"}}),
        );
        second
            .paths
            .get_mut("/items")
            .and_then(|item| item.operation_mut(HttpMethod::Get))
            .unwrap()
            .responses
            .insert(
                "200".into(),
                json!({"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Item"}}}}),
            );

        let out = MergeAccumulator::new(true)
            .fold(contribution(first, "", "alpha", false))
            .fold(contribution(second, "/b", "beta", false))
            .finish(OpenApiDocument::default());

        let schemas = &out.components.schemas;
        assert_eq!(schemas["Item"], json!({"type": "string"}));
        assert_eq!(schemas["Item_beta"], json!({"type": "integer"}));
        assert_eq!(
            schemas["ItemList"]["items"]["$ref"],
            "#/components/schemas/Item_beta"
        );
        let response = &out.paths["/b/items"].get.as_ref().unwrap().responses["200"];
        assert_eq!(
            response["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Item_beta"
        );
    }

    #[test]
    fn test_identical_component_referencing_renamed_one_is_renamed_too() {
        let list = json!({"type": "array", "items": {"$ref": "#/components/schemas/Item"}});

        let mut first = document("A", &[]);
        first.components.schemas.insert("Item".into(), json!({"type": "string"}));
        first.components.schemas.insert("ItemList".into(), list.clone());

        let mut second = document("B", &[]);
        second.components.schemas.insert("Item".into(), json!({"type": "integer"}));
        second.components.schemas.insert("ItemList".into(), list.clone());

        let out = MergeAccumulator::new(true)
            .fold(contribution(first, "", "a", false))
            .fold(contribution(second, "", "b", false))
            .finish(OpenApiDocument::default());

        let schemas = &out.components.schemas;
        assert_eq!(schemas["ItemList"], list);
        assert_eq!(schemas["Item"], json!({"type": "string"}));
        assert_eq!(schemas["Item_b"], json!({"type": "integer"}));
        assert_eq!(
            schemas["ItemList_b"]["items"]["$ref"],
            "#/components/schemas/Item_b"
        );
        assert_eq!(schemas.len(), 4);
    }

    #[test]
    fn test_rename_chain_through_several_references() {
        let mut first = document("A", &[]);
        first.components.schemas.insert("Leaf".into(), json!({"v": 1}));
        first
            .components
            .schemas
            .insert("Mid".into(), json!({"$ref": "#/components/schemas/Leaf"}));
        first
            .components
            .schemas
            .insert("Top".into(), json!({"$ref": "#/components/schemas/Mid"}));

        let mut second = first.clone();
        second.components.schemas.insert("Leaf".into(), json!({"v": 2}));

        let out = MergeAccumulator::new(true)
            .fold(contribution(first, "", "a", false))
            .fold(contribution(second, "", "b", false))
            .finish(OpenApiDocument::default());

        let schemas = &out.components.schemas;
        assert_eq!(schemas["Top"]["$ref"], "#/components/schemas/Mid");
        assert_eq!(schemas["Mid"]["$ref"], "#/components/schemas/Leaf");
        assert_eq!(schemas["Top_b"]["$ref"], "#/components/schemas/Mid_b");
        assert_eq!(schemas["Mid_b"]["$ref"], "#/components/schemas/Leaf_b");
        assert_eq!(schemas["Leaf_b"], json!({"v": 2}));
    }

    #[test]
    fn test_rename_falls_back_to_destination_then_counter() {
        let mut acc = MergeAccumulator::new(true);
        for (value, expected) in [
            ("a", "Item"),
            ("b", "Item_c"),
            ("c", "Item_c_d1"),
            ("d", "Item_c_d1_2"),
        ] {
            let mut doc = document("X", &[]);
            doc.components.schemas.insert("Item".into(), json!({"title": value}));
            acc = acc.fold(contribution(doc, "", "c", false));
            assert!(acc.components.schemas.contains_key(expected), "{expected}");
        }
        assert_eq!(acc.contributions(), 4);
    }

    #[test]
    fn test_rename_avoids_names_used_by_the_contribution_itself() {
        let mut first = document("A", &[]);
        first.components.schemas.insert("Item".into(), json!({"v": 1}));

        let mut second = document("B", &[]);
        second.components.schemas.insert("Item".into(), json!({"v": 2}));
        second.components.schemas.insert("Item_b".into(), json!({"v": 3}));

        let out = MergeAccumulator::new(true)
            .fold(contribution(first, "", "a", false))
            .fold(contribution(second, "", "b", false))
            .finish(OpenApiDocument::default());

        let schemas = &out.components.schemas;
        assert_eq!(schemas["Item_b"], json!({"v": 3}));
        assert_eq!(schemas["Item_b_d1"], json!({"v": 2}));
    }

    #[test]
    fn test_without_renaming_last_write_wins() {
        let mut first = document("A", &[]);
        first.components.schemas.insert("Item".into(), json!({"v": 1}));
        let mut second = document("B", &[]);
        second.components.schemas.insert("Item".into(), json!({"v": 2}));

        let out = MergeAccumulator::new(false)
            .fold(contribution(first, "", "a", false))
            .fold(contribution(second, "", "b", false))
            .finish(OpenApiDocument::default());

        assert_eq!(out.components.schemas.len(), 1);
        assert_eq!(out.components.schemas["Item"], json!({"v": 2}));
    }

    #[test]
    fn test_renamed_security_scheme_updates_requirements() {
        let mut first = document("A", &[]);
        first
            .components
            .security_schemes
            .insert("oauth".into(), json!({"type": "oauth2", "flows": {}}));

        let mut second = document("B", &[]);
        second
            .components
            .security_schemes
            .insert("oauth".into(), json!({"type": "http", "scheme": "bearer"}));
        second
            .security
            .push(BTreeMap::from([("oauth".to_owned(), Vec::new())]));

        let out = MergeAccumulator::new(true)
            .fold(contribution(first, "", "a", false))
            .fold(contribution(second, "", "b", false))
            .finish(OpenApiDocument::default());

        assert!(out.components.security_schemes.contains_key("oauth_b"));
        assert_eq!(out.security.len(), 1);
        assert!(out.security[0].contains_key("oauth_b"));
    }

    #[test]
    fn test_security_concatenated_and_tags_unioned() {
        let requirement = BTreeMap::from([("key".to_owned(), Vec::new())]);
        let tag = |name: &str| Tag {
            name: name.to_owned(),
            description: None,
            external_docs: None,
            extensions: BTreeMap::new(),
        };

        let mut first = document("A", &[]);
        first.security.push(requirement.clone());
        first.tags = vec![tag("orders"), tag("items")];
        let mut second = document("B", &[]);
        second.security.push(requirement);
        second.tags = vec![tag("items"), tag("billing")];

        let out = MergeAccumulator::new(true)
            .fold(contribution(first, "", "a", false))
            .fold(contribution(second, "", "b", false))
            .finish(OpenApiDocument::default());

        assert_eq!(out.security.len(), 2);
        let names: Vec<_> = out.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "items", "billing"]);
    }

    #[traced_test]
    #[test]
    fn test_first_metadata_source_wins() {
        let base = OpenApiDocument {
            openapi: "3.0.3".into(),
            servers: vec![json!({"url": "https://gateway"})],
            ..OpenApiDocument::default()
        };

        let out = MergeAccumulator::new(true)
            .fold(contribution(document("Plain", &[]), "", "a", false))
            .fold(contribution(document("Orders", &[]), "", "a", true))
            .fold(contribution(document("Catalog", &[]), "", "b", true))
            .finish(base);

        assert_eq!(out.info.title, "Orders");
        assert_eq!(out.openapi, "3.0.3");
        assert_eq!(out.servers.len(), 1);
        assert!(logs_contain("metadata already taken from an earlier source"));
    }

    #[test]
    fn test_without_metadata_base_info_is_kept() {
        let base = OpenApiDocument::new(Info {
            title: "Gateway".into(),
            version: "v1".into(),
            ..Info::default()
        });
        let out = MergeAccumulator::new(true)
            .fold(contribution(document("Orders", &["/o"]), "", "a", false))
            .finish(base);
        assert_eq!(out.info.title, "Gateway");
    }

    #[test]
    fn test_empty_contribution_is_noop() {
        let base = document("Gateway", &[]);
        let out = MergeAccumulator::new(true)
            .fold(contribution(OpenApiDocument::default(), "/svc", "a", false))
            .finish(base.clone());
        assert_eq!(out, base);
    }

    #[test]
    fn test_sanitize_component_suffix() {
        assert_eq!(sanitize("orders api/v2"), "orders_api_v2");
        assert_eq!(sanitize("a.b-c_d"), "a.b-c_d");
    }
}
