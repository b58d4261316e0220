//! Builds a [`StyleTree`] from stylesheet XML.

use crate::error::XsltError;
use crate::tree::{ExpandedName, Location, NodeId, RawAttribute, StyleTree};
use log::debug;
use roxmltree::{Document, Node};

pub fn parse_stylesheet(source: &str) -> Result<StyleTree, XsltError> {
    let doc = Document::parse(source)?;
    let root = doc.root_element();

    let mut tree = StyleTree::new(element_name(root), attributes(root), location(&doc, root));
    let tree_root = tree.root();
    append_children(&doc, root, tree_root, &mut tree);

    debug!("Parsed stylesheet rooted at {}", element_name(root));
    Ok(tree)
}

fn element_name(node: Node) -> ExpandedName {
    let tag = node.tag_name();
    ExpandedName::new(tag.namespace(), tag.name())
}

fn attributes(node: Node) -> Vec<RawAttribute> {
    node.attributes()
        .map(|attr| RawAttribute {
            name: ExpandedName::new(attr.namespace(), attr.name()),
            value: attr.value().to_string(),
        })
        .collect()
}

fn location(doc: &Document, node: Node) -> Location {
    let pos = doc.text_pos_at(node.range().start);
    Location {
        line: pos.row,
        column: pos.col,
    }
}

fn append_children(doc: &Document, node: Node, parent: NodeId, tree: &mut StyleTree) {
    let preserve_space = element_name(node).is_xsl_named("text");

    for child in node.children() {
        if child.is_element() {
            let id = tree.append_element(
                parent,
                element_name(child),
                attributes(child),
                location(doc, child),
            );
            append_children(doc, child, id, tree);
        } else if let Some(text) = child.text()
            && child.is_text()
            && (preserve_space || !text.trim().is_empty())
        {
            tree.append_text(parent, text.to_string(), location(doc, child));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;

    #[test]
    fn resolves_names_and_strips_whitespace() {
        let tree = parse_stylesheet(
            r#"<xsl:stylesheet version="3.0"
                    xmlns:xsl="http://www.w3.org/1999/XSL/Transform"
                    xmlns:ixsl="http://saxonica.com/ns/interactiveXSLT">
                <xsl:template name="main">
                    <ixsl:schedule-action wait="10">
                        <xsl:call-template name="next"/>
                    </ixsl:schedule-action>
                </xsl:template>
            </xsl:stylesheet>"#,
        )
        .unwrap();

        let root = tree.root();
        assert_eq!(
            tree.node(root).element_name(),
            Some(&ExpandedName::xsl("stylesheet"))
        );
        let (template, _) = tree.children(root).next().unwrap();
        assert_eq!(tree.children(template).count(), 1);
        let (schedule, node) = tree.children(template).next().unwrap();
        assert_eq!(node.element_name(), Some(&ExpandedName::ixsl("schedule-action")));
        assert_eq!(node.location.line, 4);
        assert_eq!(tree.children(schedule).count(), 1);
    }

    #[test]
    fn keeps_whitespace_inside_xsl_text() {
        let tree = parse_stylesheet(
            r#"<xsl:text xmlns:xsl="http://www.w3.org/1999/XSL/Transform">  </xsl:text>"#,
        )
        .unwrap();
        let (_, text) = tree.children(tree.root()).next().unwrap();
        assert!(matches!(&text.kind, NodeKind::Text(t) if t == "  "));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_stylesheet("<xsl:stylesheet>"),
            Err(XsltError::Xml(_))
        ));
    }
}
