//! The stylesheet tree the compiler reads.
//!
//! Nodes live in an arena owned by [`StyleTree`] and are addressed by
//! [`NodeId`]. Names are already resolved to `(namespace, local)` pairs.

use serde::Serialize;
use std::fmt;

pub const XSL_NS: &str = "http://www.w3.org/1999/XSL/Transform";
pub const IXSL_NS: &str = "http://saxonica.com/ns/interactiveXSLT";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub namespace: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.into(),
        }
    }

    pub fn xsl(local: &str) -> Self {
        Self::new(Some(XSL_NS), local)
    }

    pub fn ixsl(local: &str) -> Self {
        Self::new(Some(IXSL_NS), local)
    }

    pub fn local(local: &str) -> Self {
        Self::new(None, local)
    }

    pub fn is_xsl(&self) -> bool {
        self.namespace.as_deref() == Some(XSL_NS)
    }

    pub fn is_xsl_named(&self, local: &str) -> bool {
        self.is_xsl() && self.local == local
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace.as_deref() {
            None => f.write_str(&self.local),
            Some(XSL_NS) => write!(f, "xsl:{}", self.local),
            Some(IXSL_NS) => write!(f, "ixsl:{}", self.local),
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name: ExpandedName,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Identifies a node in error reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub name: String,
    pub location: Location,
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}", self.name, self.location)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        name: ExpandedName,
        attributes: Vec<RawAttribute>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct StyleNode {
    pub kind: NodeKind,
    pub location: Location,
    children: Vec<NodeId>,
}

impl StyleNode {
    pub fn element_name(&self) -> Option<&ExpandedName> {
        match &self.kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text(_) => None,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        let name = match &self.kind {
            NodeKind::Element { name, .. } => name.to_string(),
            NodeKind::Text(_) => "text()".to_string(),
        };
        NodeRef {
            name,
            location: self.location,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StyleTree {
    nodes: Vec<StyleNode>,
}

impl StyleTree {
    pub fn new(root: ExpandedName, attributes: Vec<RawAttribute>, location: Location) -> Self {
        Self {
            nodes: vec![StyleNode {
                kind: NodeKind::Element {
                    name: root,
                    attributes,
                },
                location,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &StyleNode {
        &self.nodes[id.0]
    }

    pub fn append_element(
        &mut self,
        parent: NodeId,
        name: ExpandedName,
        attributes: Vec<RawAttribute>,
        location: Location,
    ) -> NodeId {
        self.push(parent, NodeKind::Element { name, attributes }, location)
    }

    pub fn append_text(&mut self, parent: NodeId, text: String, location: Location) -> NodeId {
        self.push(parent, NodeKind::Text(text), location)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind, location: Location) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(StyleNode {
            kind,
            location,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// A fresh forward pass over the children of `id`.
    pub fn children(&self, id: NodeId) -> ChildAxis<'_> {
        ChildAxis {
            tree: self,
            ids: self.nodes[id.0].children.iter(),
        }
    }
}

/// Forward-only iterator over child nodes. Call [`StyleTree::children`]
/// again for another pass.
pub struct ChildAxis<'a> {
    tree: &'a StyleTree,
    ids: std::slice::Iter<'a, NodeId>,
}

impl<'a> Iterator for ChildAxis<'a> {
    type Item = (NodeId, &'a StyleNode);

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next().map(|&id| (id, self.tree.node(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_axis_can_be_reacquired() {
        let mut tree = StyleTree::new(ExpandedName::xsl("template"), vec![], Location::default());
        let root = tree.root();
        tree.append_text(root, "a".to_string(), Location::default());
        tree.append_element(root, ExpandedName::xsl("fallback"), vec![], Location::default());

        assert_eq!(tree.children(root).count(), 2);
        let mut axis = tree.children(root);
        assert!(axis.next().is_some());
        assert!(axis.next().is_some());
        assert!(axis.next().is_none());
        assert_eq!(tree.children(root).count(), 2);
    }

    #[test]
    fn names_display_with_conventional_prefixes() {
        assert_eq!(ExpandedName::xsl("analyze-string").to_string(), "xsl:analyze-string");
        assert_eq!(ExpandedName::ixsl("schedule-action").to_string(), "ixsl:schedule-action");
        assert_eq!(ExpandedName::local("select").to_string(), "select");
        assert_eq!(
            ExpandedName::new(Some("urn:x"), "y").to_string(),
            "Q{urn:x}y"
        );
    }
}
