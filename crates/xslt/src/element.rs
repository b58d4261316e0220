//! Per-phase snapshots of a stylesheet element.
//!
//! Binding produces [`PreparedElement`]s, validation turns them into
//! [`ValidatedElement`]s, and only validated elements reach compile.

use crate::binder::BoundAttributes;
use crate::instruction::CompiledNode;
use crate::registry::InstructionKind;
use crate::tree::{ExpandedName, NodeRef};
use scrivener_xpath::{ItemType, SequenceType};
use std::sync::Arc;

#[derive(Clone)]
pub struct PreparedElement {
    pub name: ExpandedName,
    pub node: NodeRef,
    pub kind: Arc<dyn InstructionKind>,
    pub attributes: BoundAttributes,
    pub children: Vec<PreparedNode>,
}

#[derive(Clone)]
pub enum PreparedNode {
    Element(PreparedElement),
    Text { text: String, node: NodeRef },
}

impl PreparedElement {
    pub fn child_elements(&self) -> impl Iterator<Item = &PreparedElement> {
        self.children.iter().filter_map(|child| match child {
            PreparedNode::Element(e) => Some(e),
            PreparedNode::Text { .. } => None,
        })
    }
}

#[derive(Clone)]
pub struct ValidatedElement {
    pub name: ExpandedName,
    pub node: NodeRef,
    pub kind: Arc<dyn InstructionKind>,
    /// Type-checked attributes.
    pub attributes: BoundAttributes,
    /// Children that passed the structural check, in document order.
    pub children: Vec<ValidatedNode>,
    /// False when validation found a problem that leaves nothing sensible
    /// to compile, such as a violated exactly-one child rule.
    pub compilable: bool,
    pub result_type: SequenceType,
}

#[derive(Clone)]
pub enum ValidatedNode {
    Element(ValidatedElement),
    Text { text: String, node: NodeRef },
}

impl ValidatedNode {
    pub fn name(&self) -> Option<&ExpandedName> {
        match self {
            ValidatedNode::Element(e) => Some(&e.name),
            ValidatedNode::Text { .. } => None,
        }
    }

    pub fn node(&self) -> &NodeRef {
        match self {
            ValidatedNode::Element(e) => &e.node,
            ValidatedNode::Text { node, .. } => node,
        }
    }

    pub fn result_type(&self) -> SequenceType {
        match self {
            ValidatedNode::Element(e) => e.result_type,
            ValidatedNode::Text { .. } => SequenceType::single(ItemType::String),
        }
    }
}

impl ValidatedElement {
    pub fn child_elements(&self) -> impl Iterator<Item = &ValidatedElement> {
        self.children.iter().filter_map(|child| match child {
            ValidatedNode::Element(e) => Some(e),
            ValidatedNode::Text { .. } => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut ValidatedElement> {
        self.children.iter_mut().filter_map(|child| match child {
            ValidatedNode::Element(e) => Some(e),
            ValidatedNode::Text { .. } => None,
        })
    }

    pub fn children_named<'a>(
        &'a self,
        name: &'a ExpandedName,
    ) -> impl Iterator<Item = &'a ValidatedElement> + 'a {
        self.child_elements().filter(move |e| &e.name == name)
    }
}

/// A compiled child, tagged with the element name it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledChild {
    pub name: Option<ExpandedName>,
    pub node: CompiledNode,
}
