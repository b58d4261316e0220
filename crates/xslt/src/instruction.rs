//! The executable instruction tree produced by compilation.

use scrivener_xpath::{Avt, DynamicContext, Expression, SequenceType, XPathError, evaluate, string_join};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Sequence(Vec<Instruction>),
    Text(String),
    ValueOf {
        select: Expression,
        separator: Avt,
    },
    CallTemplate(CallTemplateInstruction),
    Schedule(ScheduleInstruction),
    AnalyzeString(AnalyzeStringInstruction),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallTemplateInstruction {
    pub name: String,
    pub params: Vec<WithParam>,
    /// The executor may reuse the caller's frame for this call.
    pub tail_call: bool,
}

/// Runs `call` after `wait` milliseconds, outside the current sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleInstruction {
    pub call: CallTemplateInstruction,
    pub wait: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeStringInstruction {
    pub input: Expression,
    pub regex: Avt,
    pub flags: Avt,
    pub matching: Option<Box<Instruction>>,
    pub non_matching: Option<Box<Instruction>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Select(Expression),
    Content(Box<Instruction>),
    Absent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithParam {
    pub name: String,
    pub value: ParamValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParam {
    pub name: String,
    pub required: bool,
    pub as_type: Option<SequenceType>,
    pub default: ParamValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedTemplate {
    pub name: String,
    pub params: Vec<TemplateParam>,
    pub body: Instruction,
}

/// A compiled stylesheet: named templates ready to run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Executable {
    pub templates: BTreeMap<String, Arc<NamedTemplate>>,
}

impl Executable {
    pub fn template(&self, name: &str) -> Option<&Arc<NamedTemplate>> {
        self.templates.get(name)
    }
}

/// What compiling one node yields.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledNode {
    Instruction(Instruction),
    Template(NamedTemplate),
    Param(TemplateParam),
    WithParam(WithParam),
    /// Content of an `xsl:fallback`; only used by a parent that is not recognized.
    Fallback(Instruction),
    Stylesheet(Executable),
}

impl Instruction {
    /// Flags the call-template in tail position, if any, so the executor
    /// runs it in place of the caller's frame.
    pub fn mark_tail_call(&mut self) {
        match self {
            Instruction::CallTemplate(call) => call.tail_call = true,
            Instruction::Sequence(items) => {
                if let Some(last) = items.last_mut() {
                    last.mark_tail_call();
                }
            }
            _ => {}
        }
    }

    /// Flattens nested sequences, merges adjacent text and folds
    /// `value-of` instructions whose value is fixed.
    pub fn simplify(self) -> Result<Instruction, XPathError> {
        match self {
            Instruction::Sequence(items) => {
                let mut flat: Vec<Instruction> = Vec::with_capacity(items.len());
                for item in items {
                    match item.simplify()? {
                        Instruction::Empty => {}
                        Instruction::Sequence(inner) => {
                            for i in inner {
                                push_merging_text(&mut flat, i);
                            }
                        }
                        other => push_merging_text(&mut flat, other),
                    }
                }
                Ok(match flat.len() {
                    0 => Instruction::Empty,
                    1 => flat.remove(0),
                    _ => Instruction::Sequence(flat),
                })
            }
            Instruction::ValueOf { select, separator }
                if select.is_context_free() && separator.as_static().is_some() =>
            {
                let sep = separator.as_static().unwrap_or(" ");
                let value = evaluate(&select, &DynamicContext::empty())?;
                Ok(Instruction::Text(string_join(&value, sep)))
            }
            Instruction::Text(t) if t.is_empty() => Ok(Instruction::Empty),
            other => Ok(other),
        }
    }
}

fn push_merging_text(items: &mut Vec<Instruction>, next: Instruction) {
    if let Instruction::Text(text) = &next
        && let Some(Instruction::Text(prev)) = items.last_mut()
    {
        prev.push_str(text);
        return;
    }
    items.push(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener_xpath::parse_expression;

    #[test]
    fn simplify_flattens_and_merges_text() {
        let tree = Instruction::Sequence(vec![
            Instruction::Text("a".to_string()),
            Instruction::Sequence(vec![Instruction::Text("b".to_string()), Instruction::Empty]),
            Instruction::ValueOf {
                select: parse_expression("1 + 1").unwrap(),
                separator: Avt::Static(" ".to_string()),
            },
        ]);
        assert_eq!(tree.simplify().unwrap(), Instruction::Text("ab2".to_string()));
    }

    #[test]
    fn simplify_keeps_context_dependent_value_of() {
        let tree = Instruction::ValueOf {
            select: Expression::ContextItem,
            separator: Avt::Static(" ".to_string()),
        };
        assert_eq!(tree.clone().simplify().unwrap(), tree);
    }

    #[test]
    fn simplify_reports_folding_errors() {
        let tree = Instruction::ValueOf {
            select: parse_expression("1 idiv 0").unwrap(),
            separator: Avt::Static(" ".to_string()),
        };
        assert_eq!(tree.simplify().unwrap_err().code(), "FOAR0001");
    }
}
