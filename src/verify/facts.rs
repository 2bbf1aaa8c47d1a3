//! Facts implied by a subgraph

use super::models::Fact;
use crate::graph::{NodeId, Subgraph, UNKNOWN_NAME};

/// Relationship facts (`"<source> <TYPE> <target>"`) followed by node facts
/// (`"<name> is a <type>"`), in stored order.
///
/// Relationship endpoints outside the node set render as `Unknown`. Nodes
/// lacking a name or a type contribute nothing.
pub fn extract_facts(subgraph: &Subgraph) -> Vec<Fact> {
    let names = subgraph.name_index();
    let name_of = |id: NodeId| {
        names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    };

    let relationship_facts = subgraph
        .relationships()
        .iter()
        .map(|rel| format!("{} {} {}", name_of(rel.start), rel.rel_type, name_of(rel.end)));

    let node_facts = subgraph
        .nodes()
        .iter()
        .filter_map(|node| Some(format!("{} is a {}", node.name()?, node.entity_type()?)));

    relationship_facts.chain(node_facts).collect()
}
