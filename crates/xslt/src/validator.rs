//! Structural validation of element children.

use crate::element::ValidatedNode;
use crate::error::ErrorSink;
use crate::registry::Category;
use crate::tree::{ExpandedName, NodeRef};
use log::debug;

#[derive(Debug, Clone)]
pub enum ChildPolicy {
    /// Instructions and text, optionally preceded by any number of `leading` elements.
    SequenceConstructor { leading: Option<ExpandedName> },
    /// Nothing but `xsl:fallback`.
    Empty,
    Slots(SlotPolicy),
}

impl ChildPolicy {
    pub fn sequence_constructor() -> Self {
        ChildPolicy::SequenceConstructor { leading: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurs {
    /// Zero or several is an error the parent cannot recover from.
    ExactlyOne,
    /// Later occurrences are rejected; the first is kept.
    AtMostOne,
    Any,
}

#[derive(Debug, Clone)]
pub struct ChildSlot {
    pub kind: ExpandedName,
    pub occurs: Occurs,
    pub code: &'static str,
    pub message: String,
}

impl ChildSlot {
    pub fn new(kind: ExpandedName, occurs: Occurs, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            occurs,
            code,
            message: message.into(),
        }
    }

    pub fn any(kind: ExpandedName) -> Self {
        Self::new(kind, Occurs::Any, "XTSE0010", "")
    }
}

#[derive(Debug, Clone)]
pub struct RequireAny {
    pub kinds: Vec<ExpandedName>,
    pub code: &'static str,
    pub message: String,
}

/// Children drawn from a fixed set of element kinds.
#[derive(Debug, Clone, Default)]
pub struct SlotPolicy {
    pub slots: Vec<ChildSlot>,
    pub require_any: Option<RequireAny>,
    pub allow_text: bool,
    /// Reported for children that fit no slot.
    pub disallowed_message: Option<String>,
}

impl SlotPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(mut self, slot: ChildSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn require_any(
        mut self,
        kinds: Vec<ExpandedName>,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        self.require_any = Some(RequireAny {
            kinds,
            code,
            message: message.into(),
        });
        self
    }

    pub fn allow_text(mut self) -> Self {
        self.allow_text = true;
        self
    }

    pub fn disallowed_message(mut self, message: impl Into<String>) -> Self {
        self.disallowed_message = Some(message.into());
        self
    }
}

/// Outcome of checking an element's children against its policy.
pub struct ChildCheck {
    pub retained: Vec<ValidatedNode>,
    pub valid: bool,
}

fn is_fallback(child: &ValidatedNode) -> bool {
    child.name().is_some_and(|n| n.is_xsl_named("fallback"))
}

/// Applies `policy` to `children`, recording every violation. Rejected
/// children are dropped; `xsl:fallback` is always kept.
pub fn check_children(
    policy: &ChildPolicy,
    parent: &ExpandedName,
    parent_node: &NodeRef,
    children: Vec<ValidatedNode>,
    sink: &mut ErrorSink,
) -> ChildCheck {
    let not_allowed = |child: &ValidatedNode| match child.name() {
        Some(name) => format!("Element {} is not allowed as a child of {}", name, parent),
        None => format!("Text is not allowed as a child of {}", parent),
    };

    match policy {
        ChildPolicy::SequenceConstructor { leading } => {
            let mut in_leading = true;
            let mut retained = Vec::with_capacity(children.len());
            for child in children {
                if is_fallback(&child) {
                    retained.push(child);
                    continue;
                }
                match &child {
                    ValidatedNode::Element(e) if Some(&e.name) == leading.as_ref() => {
                        if !in_leading {
                            sink.structural(
                                "XTSE0010",
                                format!(
                                    "Element {} must come before any other children of {}",
                                    e.name, parent
                                ),
                                &e.node,
                            );
                            continue;
                        }
                    }
                    ValidatedNode::Element(e) if e.kind.category() != Category::Instruction => {
                        sink.structural("XTSE0010", not_allowed(&child), &e.node);
                        continue;
                    }
                    _ => in_leading = false,
                }
                retained.push(child);
            }
            ChildCheck {
                retained,
                valid: true,
            }
        }
        ChildPolicy::Empty => {
            let mut retained = Vec::new();
            for child in children {
                if is_fallback(&child) {
                    retained.push(child);
                } else {
                    sink.structural(
                        "XTSE0260",
                        format!("Element {} must be empty", parent),
                        child.node(),
                    );
                }
            }
            ChildCheck {
                retained,
                valid: true,
            }
        }
        ChildPolicy::Slots(slots) => check_slots(slots, parent, parent_node, children, sink, not_allowed),
    }
}

fn check_slots(
    policy: &SlotPolicy,
    parent: &ExpandedName,
    parent_node: &NodeRef,
    children: Vec<ValidatedNode>,
    sink: &mut ErrorSink,
    not_allowed: impl Fn(&ValidatedNode) -> String,
) -> ChildCheck {
    let mut counts = vec![0usize; policy.slots.len()];
    let mut retained = Vec::with_capacity(children.len());

    for child in children {
        if is_fallback(&child) {
            retained.push(child);
            continue;
        }

        let slot = child
            .name()
            .and_then(|name| policy.slots.iter().position(|s| &s.kind == name));

        match slot {
            Some(i) => {
                counts[i] += 1;
                let slot = &policy.slots[i];
                if slot.occurs == Occurs::AtMostOne && counts[i] > 1 {
                    sink.structural(slot.code, slot.message.clone(), child.node());
                    continue;
                }
                retained.push(child);
            }
            None if child.name().is_none() && policy.allow_text => retained.push(child),
            None => {
                let message = policy
                    .disallowed_message
                    .clone()
                    .unwrap_or_else(|| not_allowed(&child));
                sink.structural("XTSE0010", message, child.node());
            }
        }
    }

    let mut valid = true;
    for (slot, count) in policy.slots.iter().zip(&counts) {
        if slot.occurs == Occurs::ExactlyOne && *count != 1 {
            sink.structural(slot.code, slot.message.clone(), parent_node);
            valid = false;
        }
    }

    if let Some(require) = &policy.require_any {
        let present = policy
            .slots
            .iter()
            .zip(&counts)
            .any(|(slot, count)| *count > 0 && require.kinds.contains(&slot.kind));
        if !present {
            sink.structural(require.code, require.message.clone(), parent_node);
            valid = false;
        }
    }

    if !valid {
        debug!("{} failed its child cardinality rules", parent);
    }
    ChildCheck { retained, valid }
}
