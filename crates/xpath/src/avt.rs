//! Attribute value templates: literal text with `{expr}` holes.

use crate::ast::Expression;
use crate::engine::{DynamicContext, evaluate};
use crate::error::XPathError;
use crate::parser::parse_expression;
use crate::value::string_join;

#[derive(Debug, Clone, PartialEq)]
pub enum Avt {
    Static(String),
    Dynamic(Vec<AvtPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AvtPart {
    Static(String),
    Dynamic(Expression),
}

impl Avt {
    /// The fixed value, if the template has no expression parts.
    pub fn as_static(&self) -> Option<&str> {
        match self {
            Avt::Static(s) => Some(s),
            Avt::Dynamic(_) => None,
        }
    }

    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        let parts: &[AvtPart] = match self {
            Avt::Static(_) => Default::default(),
            Avt::Dynamic(parts) => parts.as_slice(),
        };
        parts.iter().filter_map(|part| match part {
            AvtPart::Dynamic(expr) => Some(expr),
            AvtPart::Static(_) => None,
        })
    }

    pub fn expressions_mut(&mut self) -> impl Iterator<Item = &mut Expression> {
        let parts: &mut [AvtPart] = match self {
            Avt::Static(_) => Default::default(),
            Avt::Dynamic(parts) => parts.as_mut_slice(),
        };
        parts.iter_mut().filter_map(|part| match part {
            AvtPart::Dynamic(expr) => Some(expr),
            AvtPart::Static(_) => None,
        })
    }

    pub fn evaluate(&self, cx: &DynamicContext) -> Result<String, XPathError> {
        match self {
            Avt::Static(s) => Ok(s.clone()),
            Avt::Dynamic(parts) => {
                let mut result = String::new();
                for part in parts {
                    match part {
                        AvtPart::Static(s) => result.push_str(s),
                        AvtPart::Dynamic(expr) => {
                            result.push_str(&string_join(&evaluate(expr, cx)?, " "))
                        }
                    }
                }
                Ok(result)
            }
        }
    }
}

pub fn parse_avt(s: &str) -> Result<Avt, XPathError> {
    if !s.contains(['{', '}']) {
        return Ok(Avt::Static(s.to_string()));
    }

    let mut parts = Vec::new();
    let mut current_static = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    current_static.push('{');
                    continue;
                }
                if !current_static.is_empty() {
                    parts.push(AvtPart::Static(std::mem::take(&mut current_static)));
                }

                let mut expr_str = String::new();
                let mut depth = 1;
                let mut quote: Option<char> = None;
                for ec in chars.by_ref() {
                    match (quote, ec) {
                        (Some(q), c) if c == q => quote = None,
                        (Some(_), _) => {}
                        (None, '\'' | '"') => quote = Some(ec),
                        (None, '{') => depth += 1,
                        (None, '}') => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    expr_str.push(ec);
                }

                if depth != 0 {
                    return Err(XPathError::TemplateError {
                        code: "XTSE0350",
                        template: s.to_string(),
                        message: "Expression in attribute value template is not closed by '}'"
                            .to_string(),
                    });
                }
                parts.push(AvtPart::Dynamic(parse_expression(&expr_str)?));
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    current_static.push('}');
                } else {
                    return Err(XPathError::TemplateError {
                        code: "XTSE0370",
                        template: s.to_string(),
                        message: "A closing '}' must be doubled in attribute value templates"
                            .to_string(),
                    });
                }
            }
            _ => current_static.push(c),
        }
    }

    if !current_static.is_empty() {
        parts.push(AvtPart::Static(current_static));
    }

    match parts.as_slice() {
        [] => Ok(Avt::Static(String::new())),
        [AvtPart::Static(s)] => Ok(Avt::Static(s.clone())),
        _ => Ok(Avt::Dynamic(parts)),
    }
}
