use super::{SwaggerTransformFactory, directive_value};
use crate::config::TransformValues;
use crate::document::{Operation, ParameterLocation};

const QUERY_REMOVE_PARAMETER: &str = "QueryRemoveParameter";
const QUERY_VALUE_PARAMETER: &str = "QueryValueParameter";
const SET: &str = "Set";

/// Mirrors query-string directives.
///
/// Both `{QueryRemoveParameter: name}` and `{QueryValueParameter: name, Set: value}`
/// take the parameter out of the client's hands, so it is removed from the operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryTransformFactory;

impl SwaggerTransformFactory for QueryTransformFactory {
    fn build(&self, operation: &mut Operation, values: &TransformValues) -> bool {
        if let Some(name) = directive_value(values, QUERY_REMOVE_PARAMETER) {
            operation.remove_parameter(ParameterLocation::Query, name);
            return true;
        }
        if let Some(name) = directive_value(values, QUERY_VALUE_PARAMETER)
            && directive_value(values, SET).is_some()
        {
            operation.remove_parameter(ParameterLocation::Query, name);
            return true;
        }
        false
    }
}
