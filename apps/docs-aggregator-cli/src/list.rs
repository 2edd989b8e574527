use clap::Args;
use docs_aggregator::AggregationEngine;

#[derive(Args)]
pub struct ListArgs {
    /// Print `name<TAB>url` pairs, `{documentName}` substituted in this template
    #[arg(long, value_name = "TEMPLATE")]
    pub route_template: Option<String>,

    /// Print as a JSON array
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn run(&self, engine: &AggregationEngine) -> anyhow::Result<()> {
        for line in self.lines(engine)? {
            println!("{line}");
        }
        Ok(())
    }

    fn lines(&self, engine: &AggregationEngine) -> anyhow::Result<Vec<String>> {
        match (&self.route_template, self.json) {
            (Some(template), true) => Ok(vec![serde_json::to_string_pretty(
                &engine.document_endpoints(template),
            )?]),
            (Some(template), false) => Ok(engine
                .document_endpoints(template)
                .into_iter()
                .map(|endpoint| format!("{}\t{}", endpoint.name, endpoint.url))
                .collect()),
            (None, true) => Ok(vec![serde_json::to_string_pretty(&engine.document_names())?]),
            (None, false) => Ok(engine.document_names()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use docs_aggregator::{ConfigStore, GatewayConfig};
    use std::sync::Arc;

    const CONFIG: &str = r"
clusters:
  orders:
    destinations:
      d1:
        address: http://orders.internal
  users:
    destinations:
      d1:
        address: http://users.internal
";

    fn engine() -> AggregationEngine {
        let config = GatewayConfig::from_yaml_str(CONFIG).unwrap();
        AggregationEngine::new(Arc::new(ConfigStore::new(&config)))
    }

    #[test]
    fn test_plain_names() {
        let args = ListArgs {
            route_template: None,
            json: false,
        };
        assert_eq!(args.lines(&engine()).unwrap(), vec!["orders", "users"]);
    }

    #[test]
    fn test_route_template_pairs() {
        let args = ListArgs {
            route_template: Some("/swagger/{documentName}/swagger.json".to_owned()),
            json: false,
        };
        assert_eq!(
            args.lines(&engine()).unwrap(),
            vec![
                "orders\t/swagger/orders/swagger.json",
                "users\t/swagger/users/swagger.json"
            ]
        );
    }

    #[test]
    fn test_json_endpoints() {
        let args = ListArgs {
            route_template: Some("/docs/{documentName}".to_owned()),
            json: true,
        };
        let lines = args.lines(&engine()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value[1]["name"], "users");
        assert_eq!(value[1]["url"], "/docs/users");
    }
}
