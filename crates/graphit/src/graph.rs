//! directed graph with graphviz attributes
//!
//! Nodes are unique by id and keep insertion order. Edges are kept in insertion order and are
//! never deduplicated. [Graph]'s [std::fmt::Display] implementation writes the graph in DOT.
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};

/// Visual attributes (`label`, `color`, ...) by name
pub type Attributes = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    nodes: IndexMap<String, Attributes>,
    edges: Vec<GraphEdge>,
}

impl Graph {
    /// Add a node, or merge `attributes` into an existing node with the same id
    pub fn add_node<'a>(
        &mut self,
        id: impl Into<String>,
        attributes: impl IntoIterator<Item = (&'a str, String)>,
    ) {
        let id = id.into();
        tracing::trace!(%id, "node");
        self.nodes
            .entry(id)
            .or_default()
            .extend(attributes.into_iter().map(|(k, v)| (k.to_string(), v)));
    }

    pub fn add_edge<'a>(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        attributes: impl IntoIterator<Item = (&'a str, String)>,
    ) {
        let edge = GraphEdge {
            from: from.into(),
            to: to.into(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        };
        tracing::trace!(from=%edge.from, to=%edge.to, "edge");
        self.edges.push(edge);
    }

    pub fn node(&self, id: &str) -> Option<GraphNode> {
        self.nodes.get(id).map(|attributes| GraphNode {
            id: id.to_string(),
            attributes: attributes.clone(),
        })
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.nodes.iter().map(|(id, attributes)| (id.as_str(), attributes))
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Edges between `from` and `to`, in insertion order
    pub fn edges_between<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
    ) -> impl Iterator<Item = &'a GraphEdge> {
        self.edges
            .iter()
            .filter(move |edge| edge.from == from && edge.to == to)
    }
}

/// Node id for an image reference
///
/// Graphviz reads `a:b` as node `a` port `b`, so the first `:` (the tag separator) becomes a
/// line break.
pub fn sanitize(reference: &str) -> String {
    reference.replacen(':', "\n", 1)
}

fn quoted(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn write_attributes(f: &mut Formatter<'_>, attributes: &Attributes) -> std::fmt::Result {
    if attributes.is_empty() {
        return Ok(());
    }

    let attributes: Vec<String> = attributes
        .iter()
        .map(|(key, value)| format!("{key}={}", quoted(value)))
        .collect();
    write!(f, " [{}]", attributes.join(", "))
}

impl Display for Graph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "digraph {{")?;

        for (id, attributes) in &self.nodes {
            write!(f, "    {}", quoted(id))?;
            write_attributes(f, attributes)?;
            writeln!(f, ";")?;
        }

        for edge in &self.edges {
            write!(f, "    {} -> {}", quoted(&edge.from), quoted(&edge.to))?;
            write_attributes(f, &edge.attributes)?;
            writeln!(f, ";")?;
        }

        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitize_first_colon_only() {
        assert_eq!(sanitize("linuxkit/kernel:4.9"), "linuxkit/kernel\n4.9");
        assert_eq!(sanitize("registry:5000/img:v1"), "registry\n5000/img:v1");
        assert_eq!(sanitize("init-a"), "init-a");
    }

    #[test]
    fn nodes_merge_attributes() {
        let mut graph = Graph::default();
        graph.add_node("/etc", [("color", "red".to_string())]);
        graph.add_node("/etc", [("color", "blue".to_string())]);
        graph.add_node("/var", []);

        assert_eq!(graph.nodes().count(), 2);
        assert_eq!(graph.node("/etc").unwrap().attributes["color"], "blue");
    }

    #[test]
    fn edges_are_not_merged() {
        let mut graph = Graph::default();
        graph.add_edge("a", "b", []);
        graph.add_edge("a", "b", []);

        assert_eq!(graph.edges_between("a", "b").count(), 2);
    }

    #[test]
    fn dot() {
        let mut graph = Graph::default();
        graph.add_node("kernel", [("label", sanitize("linuxkit/kernel:4.9"))]);
        graph.add_node("rootfs", [("label", "RootFS".to_string())]);
        graph.add_node("say \"hi\"", []);
        graph.add_edge(
            "kernel",
            "rootfs",
            [("color", "red".to_string()), ("label", "a\\b".to_string())],
        );

        assert_eq!(
            graph.to_string(),
            concat!(
                "digraph {\n",
                "    \"kernel\" [label=\"linuxkit/kernel\\n4.9\"];\n",
                "    \"rootfs\" [label=\"RootFS\"];\n",
                "    \"say \\\"hi\\\"\";\n",
                "    \"kernel\" -> \"rootfs\" [color=\"red\", label=\"a\\\\b\"];\n",
                "}\n",
            )
        );
    }
}
