//! Documentation-side effects of gateway transform directives.
//!
//! A route may rewrite requests and responses on their way through the
//! gateway. Factories registered here mirror those rewrites onto the
//! operations the route exposes, so the published document describes what a
//! client actually has to send and will actually receive.

mod header;
mod query;

pub use header::HeaderTransformFactory;
pub use query::QueryTransformFactory;

use crate::config::TransformValues;
use crate::document::{Operation, PathItem};
use std::sync::Arc;

/// Applies one family of transform directives to an operation.
pub trait SwaggerTransformFactory: Send + Sync {
    /// Apply `values` to `operation`.
    ///
    /// Returns `false` when the directive is not one this factory handles; the
    /// operation must then be left untouched.
    fn build(&self, operation: &mut Operation, values: &TransformValues) -> bool;
}

/// Ordered set of registered [`SwaggerTransformFactory`] implementations.
#[derive(Clone, Default)]
pub struct TransformApplier {
    factories: Vec<Arc<dyn SwaggerTransformFactory>>,
}

impl std::fmt::Debug for TransformApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformApplier")
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl TransformApplier {
    /// Applier without any factory; every directive is a no-op.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applier with the built-in header and query factories.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with_factory(HeaderTransformFactory)
            .with_factory(QueryTransformFactory)
    }

    #[must_use]
    pub fn with_factory(mut self, factory: impl SwaggerTransformFactory + 'static) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn register(&mut self, factory: Arc<dyn SwaggerTransformFactory>) {
        self.factories.push(factory);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Run every factory once per directive on every operation of `item`.
    ///
    /// Returns how many (operation, directive, factory) applications were recognized.
    pub fn apply(&self, item: &mut PathItem, directives: &[&TransformValues]) -> usize {
        if self.factories.is_empty() || directives.is_empty() {
            return 0;
        }
        let mut recognized = 0;
        for (method, operation) in item.operations_mut() {
            for values in directives {
                for factory in &self.factories {
                    if factory.build(operation, values) {
                        recognized += 1;
                    }
                }
            }
            tracing::trace!(%method, directives = directives.len(), "applied transform directives");
        }
        recognized
    }
}

/// Value of `key` in a directive, ignoring key case.
pub(crate) fn directive_value<'a>(values: &'a TransformValues, key: &str) -> Option<&'a str> {
    values
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}
