//! Attribute binding.
//!
//! Each instruction kind declares an [`AttributeSpec`] per attribute it
//! understands. Binding turns the raw attribute strings of one element into
//! [`BoundAttributes`], recording problems instead of stopping at them:
//! unknown attributes are reported and skipped, missing required attributes
//! are reported and replaced by recovery text, and values that fail to parse
//! are replaced by an error placeholder that raises the original error if it
//! is ever evaluated.

use crate::error::{ErrorKind, ErrorSink};
use crate::tree::{ExpandedName, NodeRef, RawAttribute, XSL_NS};
use log::trace;
use scrivener_xpath::{
    Avt, AvtPart, Expression, SequenceType, XPathError, parse_avt, parse_expression,
    parse_sequence_type,
};

/// Turns attribute text into expressions and templates.
pub trait ExpressionParser {
    fn make_expression(&self, text: &str) -> Result<Expression, XPathError>;
    fn make_attribute_value_template(&self, text: &str) -> Result<Avt, XPathError>;
}

/// The built-in expression language.
#[derive(Debug, Default, Clone, Copy)]
pub struct XPathParser;

impl ExpressionParser for XPathParser {
    fn make_expression(&self, text: &str) -> Result<Expression, XPathError> {
        parse_expression(text)
    }

    fn make_attribute_value_template(&self, text: &str) -> Result<Avt, XPathError> {
        parse_avt(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Expression,
    Template,
    Name,
    YesNo,
    SequenceType,
    Text,
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: AttributeKind,
    pub required_type: SequenceType,
    /// Parsed in place of a missing required attribute.
    pub recovery: Option<&'static str>,
    /// Parsed when an optional attribute is absent.
    pub default: Option<&'static str>,
}

impl AttributeSpec {
    const fn of(name: &'static str, kind: AttributeKind, required_type: SequenceType) -> Self {
        Self {
            name,
            required: false,
            kind,
            required_type,
            recovery: None,
            default: None,
        }
    }

    pub const fn expression(name: &'static str, required_type: SequenceType) -> Self {
        Self::of(name, AttributeKind::Expression, required_type)
    }

    pub const fn template(name: &'static str) -> Self {
        Self::of(name, AttributeKind::Template, SequenceType::ATOMIC_SEQUENCE)
    }

    pub const fn name(name: &'static str) -> Self {
        Self::of(name, AttributeKind::Name, SequenceType::ITEM_SEQUENCE)
    }

    pub const fn yes_no(name: &'static str) -> Self {
        Self::of(name, AttributeKind::YesNo, SequenceType::ITEM_SEQUENCE)
    }

    pub const fn sequence_type(name: &'static str) -> Self {
        Self::of(name, AttributeKind::SequenceType, SequenceType::ITEM_SEQUENCE)
    }

    pub const fn text(name: &'static str) -> Self {
        Self::of(name, AttributeKind::Text, SequenceType::ITEM_SEQUENCE)
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn recovery(mut self, text: &'static str) -> Self {
        self.recovery = Some(text);
        self
    }

    pub const fn default_value(mut self, text: &'static str) -> Self {
        self.default = Some(text);
        self
    }
}

/// Attributes every XSLT element may carry; accepted and not interpreted.
const STANDARD_ATTRIBUTES: &[&str] = &[
    "default-collation",
    "exclude-result-prefixes",
    "expand-text",
    "extension-element-prefixes",
    "use-when",
    "version",
    "xpath-default-namespace",
];

#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Expression(Expression),
    Template(Avt),
    Name(String),
    Flag(bool),
    SequenceType(SequenceType),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundAttribute {
    pub name: &'static str,
    pub value: BoundValue,
    pub required_type: SequenceType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundAttributes {
    attributes: Vec<BoundAttribute>,
}

impl BoundAttributes {
    fn get(&self, name: &str) -> Option<&BoundValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn expression(&self, name: &str) -> Option<&Expression> {
        match self.get(name) {
            Some(BoundValue::Expression(expr)) => Some(expr),
            _ => None,
        }
    }

    pub fn expression_mut(&mut self, name: &str) -> Option<&mut Expression> {
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(BoundAttribute {
                value: BoundValue::Expression(expr),
                ..
            }) => Some(expr),
            _ => None,
        }
    }

    pub fn template(&self, name: &str) -> Option<&Avt> {
        match self.get(name) {
            Some(BoundValue::Template(avt)) => Some(avt),
            _ => None,
        }
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(BoundValue::Name(n)) => Some(n),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(BoundValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn sequence_type(&self, name: &str) -> Option<SequenceType> {
        match self.get(name) {
            Some(BoundValue::SequenceType(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BoundAttribute> {
        self.attributes.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundAttribute> {
        self.attributes.iter()
    }
}

/// Binds the raw attributes of one element against `schema`.
pub fn bind_attributes(
    element: &ExpandedName,
    raw: &[RawAttribute],
    schema: &[AttributeSpec],
    parser: &dyn ExpressionParser,
    sink: &mut ErrorSink,
    node: &NodeRef,
) -> BoundAttributes {
    for attr in raw {
        let known = match attr.name.namespace.as_deref() {
            None => {
                schema.iter().any(|spec| spec.name == attr.name.local)
                    || (element.is_xsl() && STANDARD_ATTRIBUTES.contains(&attr.name.local.as_str()))
            }
            Some(XSL_NS) => false,
            Some(_) => true,
        };
        if !known {
            sink.structural(
                "XTSE0090",
                format!("Attribute {} is not allowed on element {}", attr.name, element),
                node,
            );
        }
    }

    let mut bound = BoundAttributes::default();
    for spec in schema {
        let supplied = raw
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local == spec.name)
            .map(|a| a.value.as_str());

        let text = match (supplied, spec.required) {
            (Some(text), _) => text,
            (None, true) => {
                sink.structural(
                    "XTSE0010",
                    format!(
                        "absence of required attribute \"{}\" on element {}",
                        spec.name, element
                    ),
                    node,
                );
                match spec.recovery {
                    Some(text) => text,
                    None => continue,
                }
            }
            (None, false) => match spec.default {
                Some(text) => text,
                None => continue,
            },
        };

        trace!("Binding {}/@{} = {:?}", element, spec.name, text);
        let value = bind_value(spec, text, parser, sink, node);
        bound.attributes.push(BoundAttribute {
            name: spec.name,
            value,
            required_type: spec.required_type,
        });
    }
    bound
}

fn bind_value(
    spec: &AttributeSpec,
    text: &str,
    parser: &dyn ExpressionParser,
    sink: &mut ErrorSink,
    node: &NodeRef,
) -> BoundValue {
    match spec.kind {
        AttributeKind::Expression => match parser.make_expression(text) {
            Ok(expr) => BoundValue::Expression(expr),
            Err(err) => {
                sink.xpath(ErrorKind::Syntax, &err, node);
                BoundValue::Expression(placeholder(&err, spec.required_type))
            }
        },
        AttributeKind::Template => match parser.make_attribute_value_template(text) {
            Ok(avt) => BoundValue::Template(avt),
            Err(err) => {
                sink.xpath(ErrorKind::Syntax, &err, node);
                BoundValue::Template(Avt::Dynamic(vec![AvtPart::Dynamic(placeholder(
                    &err,
                    SequenceType::ATOMIC_SEQUENCE,
                ))]))
            }
        },
        AttributeKind::Name => {
            let name = text.trim();
            if !is_qname(name) {
                sink.structural(
                    "XTSE0020",
                    format!("Invalid name \"{}\" in attribute @{}", name, spec.name),
                    node,
                );
            }
            BoundValue::Name(name.to_string())
        }
        AttributeKind::YesNo => match text.trim() {
            "yes" | "true" | "1" => BoundValue::Flag(true),
            "no" | "false" | "0" => BoundValue::Flag(false),
            other => {
                sink.structural(
                    "XTSE0020",
                    format!("Value \"{}\" of @{} must be yes or no", other, spec.name),
                    node,
                );
                BoundValue::Flag(false)
            }
        },
        AttributeKind::SequenceType => match parse_sequence_type(text) {
            Ok(t) => BoundValue::SequenceType(t),
            Err(err) => {
                sink.xpath(ErrorKind::Syntax, &err, node);
                BoundValue::SequenceType(SequenceType::ITEM_SEQUENCE)
            }
        },
        AttributeKind::Text => BoundValue::Text(text.to_string()),
    }
}

fn placeholder(err: &XPathError, static_type: SequenceType) -> Expression {
    Expression::error(err.code(), err.to_string(), static_type)
}

fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn is_qname(s: &str) -> bool {
    match s.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
        None => is_ncname(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Location;
    use scrivener_xpath::ItemType;

    static SCHEMA: &[AttributeSpec] = &[
        AttributeSpec::expression("select", SequenceType::OPTIONAL_STRING)
            .required()
            .recovery("."),
        AttributeSpec::template("regex").required().recovery("xxx"),
        AttributeSpec::template("flags").default_value(""),
    ];

    fn node() -> NodeRef {
        NodeRef {
            name: "xsl:analyze-string".to_string(),
            location: Location::default(),
        }
    }

    fn attr(name: &str, value: &str) -> RawAttribute {
        RawAttribute {
            name: ExpandedName::local(name),
            value: value.to_string(),
        }
    }

    fn bind(raw: &[RawAttribute], sink: &mut ErrorSink) -> BoundAttributes {
        bind_attributes(
            &ExpandedName::xsl("analyze-string"),
            raw,
            SCHEMA,
            &XPathParser,
            sink,
            &node(),
        )
    }

    #[test]
    fn missing_required_attribute_uses_recovery_text() {
        let mut sink = ErrorSink::default();
        let bound = bind(&[attr("regex", "a+")], &mut sink);

        assert_eq!(sink.errors().len(), 1);
        assert_eq!(sink.errors()[0].code, "XTSE0010");
        assert!(
            sink.errors()[0]
                .message
                .contains("absence of required attribute \"select\"")
        );
        assert_eq!(bound.expression("select"), Some(&Expression::ContextItem));
        assert_eq!(bound.template("flags"), Some(&Avt::Static(String::new())));
    }

    #[test]
    fn unknown_attribute_is_reported_and_others_still_bound() {
        let mut sink = ErrorSink::default();
        let bound = bind(
            &[
                attr("select", "'baaab'"),
                attr("colour", "red"),
                attr("regex", "a+"),
                RawAttribute {
                    name: ExpandedName::new(Some("urn:other"), "note"),
                    value: "ignored".to_string(),
                },
            ],
            &mut sink,
        );

        assert_eq!(sink.errors().len(), 1);
        assert_eq!(sink.errors()[0].code, "XTSE0090");
        assert_eq!(bound.expression("select"), Some(&Expression::string("baaab")));
        assert_eq!(bound.template("regex"), Some(&Avt::Static("a+".to_string())));
    }

    #[test]
    fn syntax_error_becomes_placeholder() {
        let mut sink = ErrorSink::default();
        let bound = bind(&[attr("select", "1 +"), attr("regex", "a}")], &mut sink);

        let codes: Vec<_> = sink.errors().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["XPST0003", "XTSE0370"]);
        assert!(sink.errors().iter().all(|e| e.kind == ErrorKind::Syntax));
        match bound.expression("select") {
            Some(Expression::Error { static_type, .. }) => {
                assert_eq!(static_type.item_type, ItemType::String)
            }
            other => panic!("expected placeholder, got {:?}", other),
        }
    }

    #[test]
    fn validates_names() {
        assert!(is_qname("main"));
        assert!(is_qname("my:main-2"));
        assert!(!is_qname("2main"));
        assert!(!is_qname("a:b:c"));
    }
}
