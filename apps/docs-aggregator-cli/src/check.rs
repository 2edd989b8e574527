use std::process::ExitCode;

use docs_aggregator::ConfigSnapshot;

/// Human-readable report of what the snapshot resolved to.
fn report(snapshot: &ConfigSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    for (cluster_id, cluster) in &snapshot.topology.clusters {
        let sources: usize = cluster
            .destinations
            .values()
            .map(|destination| destination.sources.len())
            .sum();
        lines.push(format!(
            "cluster {cluster_id}: {} destination(s), {sources} source(s)",
            cluster.destinations.len()
        ));
    }
    lines.push(format!("routes: {}", snapshot.routes.routes().len()));
    lines.push(format!("documents: {}", snapshot.document_names().join(", ")));
    for failure in &snapshot.rejected {
        lines.push(format!("rejected {failure}"));
    }
    lines
}

/// Print the report; fails when any source was rejected.
pub fn run(snapshot: &ConfigSnapshot) -> ExitCode {
    for line in report(snapshot) {
        println!("{line}");
    }
    if snapshot.rejected.is_empty() {
        ExitCode::SUCCESS
    } else {
        eprintln!("{} source(s) rejected", snapshot.rejected.len());
        ExitCode::FAILURE
    }
}
