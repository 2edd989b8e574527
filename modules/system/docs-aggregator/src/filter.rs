//! Path and method pruning of a fetched document.

use crate::document::{OpenApiDocument, PathItem};
use crate::domain::{PublishedPaths, SourceDescriptor};

/// Prune `document` according to `source`'s regex filter and, when the source
/// asks for it, the published-route whitelist.
///
/// Path keys are still un-prefixed on return; the whitelist is consulted with
/// the prefixed key the merge will use.
#[must_use]
pub fn filter_document(
    mut document: OpenApiDocument,
    source: &SourceDescriptor,
    published: &PublishedPaths,
) -> OpenApiDocument {
    let before = document.paths.len();

    document.paths.retain(|key, item| {
        if let Some(filter) = &source.filter
            && !filter.is_match(key)
        {
            return false;
        }
        if source.only_published_paths {
            return retain_published(&source.output_path(key), item, published);
        }
        true
    });

    let dropped = before - document.paths.len();
    if dropped > 0 {
        tracing::debug!(
            dropped,
            kept = document.paths.len(),
            prefix = %source.path_prefix,
            "filtered document paths"
        );
    }
    document
}

/// Strip methods the whitelist does not allow; `false` when nothing is left.
fn retain_published(output_path: &str, item: &mut PathItem, published: &PublishedPaths) -> bool {
    let Some(allowed) = published.methods(output_path) else {
        return false;
    };
    for method in item.methods() {
        if !allowed.allows(method) {
            item.remove_operation(method);
        }
    }
    item.has_operations()
}
