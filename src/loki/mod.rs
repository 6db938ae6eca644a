//! Loki flow queries: LogQL compilation and execution

pub mod client;
pub mod flow_query;
pub mod logql;
pub mod topology_query;

pub use flow_query::{CompiledQuery, FlowQueryBuilder};
pub use topology_query::TopologyQueryBuilder;
