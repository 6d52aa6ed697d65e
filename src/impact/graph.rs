//! Node/edge projection of an impact report for visualization tools.

use crate::impact::types::ImpactReport;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: i64,
    pub label: String,
    pub file_path: String,
    /// 0 for the analyzed symbol, otherwise the caller's depth.
    pub rank: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    /// Caller.
    pub source: i64,
    /// Callee.
    pub target: i64,
    pub line: i64,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ImpactGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub fn export(report: &ImpactReport) -> ImpactGraph {
    let mut graph = ImpactGraph::default();
    let mut node_ids = HashSet::new();
    let mut edge_keys = HashSet::new();

    node_ids.insert(report.target.id);
    graph.nodes.push(GraphNode {
        id: report.target.id,
        label: report.target.name.clone(),
        file_path: report.target.file_path.clone(),
        rank: 0,
    });

    // entries are depth-ordered, so a node keeps its shallowest rank
    for entry in &report.entries {
        if node_ids.insert(entry.caller.id) {
            graph.nodes.push(GraphNode {
                id: entry.caller.id,
                label: entry.caller.name.clone(),
                file_path: entry.caller.file_path.clone(),
                rank: entry.depth,
            });
        }
        if edge_keys.insert((entry.caller.id, entry.callee_id, entry.line)) {
            graph.edges.push(GraphEdge {
                source: entry.caller.id,
                target: entry.callee_id,
                line: entry.line,
            });
        }
    }
    graph
}

impl ImpactGraph {
    /// Graphviz rendering, callers pointing at callees.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph impact {\n  rankdir=LR;\n  node [shape=box];\n");
        for node in &self.nodes {
            let style = if node.rank == 0 { ", style=bold" } else { "" };
            let _ = writeln!(
                out,
                "  n{} [label=\"{}\\n{}\"{}];",
                node.id,
                escape(&node.label),
                escape(&node.file_path),
                style
            );
        }
        for edge in &self.edges {
            let _ = writeln!(
                out,
                "  n{} -> n{} [label=\"{}\"];",
                edge.source, edge.target, edge.line
            );
        }
        out.push_str("}\n");
        out
    }
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::types::ImpactEntry;
    use crate::model::SymbolCompact;

    fn compact(id: i64, name: &str) -> SymbolCompact {
        SymbolCompact {
            id,
            kind: "function".to_string(),
            name: name.to_string(),
            file_path: "chain.py".to_string(),
            start_line: id,
            signature: None,
        }
    }

    fn entry(caller: i64, name: &str, callee: i64, depth: usize, line: i64) -> ImpactEntry {
        ImpactEntry {
            caller: compact(caller, name),
            file_path: "chain.py".to_string(),
            line,
            depth,
            callee_id: callee,
        }
    }

    fn report() -> ImpactReport {
        ImpactReport {
            target: compact(3, "h"),
            ambiguous_with: 0,
            max_depth: 5,
            entries: vec![
                entry(2, "g", 3, 1, 4),
                entry(1, "f", 2, 2, 2),
                entry(1, "f", 2, 2, 3),
            ],
            direct: 1,
            ripple: 2,
            by_depth: Vec::new(),
            truncated: false,
            duration_ms: 0,
        }
    }

    #[test]
    fn export_ranks_nodes_by_depth() {
        let graph = export(&report());
        let ranks: Vec<(&str, usize)> = graph
            .nodes
            .iter()
            .map(|n| (n.label.as_str(), n.rank))
            .collect();
        assert_eq!(ranks, vec![("h", 0), ("g", 1), ("f", 2)]);
        assert_eq!(graph.edges.len(), 3);
        assert_eq!(
            graph.edges[0],
            GraphEdge {
                source: 2,
                target: 3,
                line: 4
            }
        );
    }

    #[test]
    fn dot_output_lists_every_edge() {
        let dot = export(&report()).to_dot();
        assert!(dot.starts_with("digraph impact {"));
        assert!(dot.contains("n3 [label=\"h\\nchain.py\", style=bold];"));
        assert!(dot.contains("n2 -> n3 [label=\"4\"];"));
        assert_eq!(dot.matches("->").count(), 3);
    }
}
