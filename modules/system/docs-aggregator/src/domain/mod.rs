//! Resolved, immutable view of the gateway configuration.

pub mod routes;
pub mod topology;

pub use routes::{MethodSet, PublishedPaths, Route, RouteTable};
pub use topology::{
    Cluster, ClusterTopology, Destination, DestinationHttpSettings, OutputSelector,
    SourceDescriptor, compile_filter, join_path,
};
