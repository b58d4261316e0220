//! Built-in function library.
//!
//! Each entry carries its arity range and declared return type so static
//! type inference can resolve calls without evaluating them.

use crate::engine::DynamicContext;
use crate::error::XPathError;
use crate::pattern::compile_regex;
use crate::types::{ItemType, SequenceType};
use crate::value::{AtomicValue, Sequence, effective_boolean_value, string_join};

pub type FunctionImpl = fn(&[Sequence], &DynamicContext) -> Result<Sequence, XPathError>;

/// What a function reads from the dynamic context besides its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    None,
    /// Uses the context item when called without arguments.
    ContextWhenNoArgs,
    /// Reads state such as the current regex match.
    Dynamic,
}

pub struct FunctionSignature {
    pub name: &'static str,
    pub min_arity: usize,
    pub max_arity: Option<usize>,
    pub return_type: SequenceType,
    pub dependency: Dependency,
    pub implementation: FunctionImpl,
}

impl FunctionSignature {
    pub fn accepts_arity(&self, arity: usize) -> bool {
        arity >= self.min_arity && self.max_arity.is_none_or(|max| arity <= max)
    }
}

const STRING: SequenceType = SequenceType::single(ItemType::String);
const BOOLEAN: SequenceType = SequenceType::single(ItemType::Boolean);
const INTEGER: SequenceType = SequenceType::SINGLE_INTEGER;

static FUNCTIONS: &[FunctionSignature] = &[
    FunctionSignature {
        name: "string",
        min_arity: 0,
        max_arity: Some(1),
        return_type: STRING,
        dependency: Dependency::ContextWhenNoArgs,
        implementation: fn_string,
    },
    FunctionSignature {
        name: "concat",
        min_arity: 2,
        max_arity: None,
        return_type: STRING,
        dependency: Dependency::None,
        implementation: fn_concat,
    },
    FunctionSignature {
        name: "string-length",
        min_arity: 0,
        max_arity: Some(1),
        return_type: INTEGER,
        dependency: Dependency::ContextWhenNoArgs,
        implementation: fn_string_length,
    },
    FunctionSignature {
        name: "normalize-space",
        min_arity: 0,
        max_arity: Some(1),
        return_type: STRING,
        dependency: Dependency::ContextWhenNoArgs,
        implementation: fn_normalize_space,
    },
    FunctionSignature {
        name: "upper-case",
        min_arity: 1,
        max_arity: Some(1),
        return_type: STRING,
        dependency: Dependency::None,
        implementation: fn_upper_case,
    },
    FunctionSignature {
        name: "lower-case",
        min_arity: 1,
        max_arity: Some(1),
        return_type: STRING,
        dependency: Dependency::None,
        implementation: fn_lower_case,
    },
    FunctionSignature {
        name: "substring",
        min_arity: 2,
        max_arity: Some(3),
        return_type: STRING,
        dependency: Dependency::None,
        implementation: fn_substring,
    },
    FunctionSignature {
        name: "contains",
        min_arity: 2,
        max_arity: Some(2),
        return_type: BOOLEAN,
        dependency: Dependency::None,
        implementation: fn_contains,
    },
    FunctionSignature {
        name: "matches",
        min_arity: 2,
        max_arity: Some(3),
        return_type: BOOLEAN,
        dependency: Dependency::None,
        implementation: fn_matches,
    },
    FunctionSignature {
        name: "regex-group",
        min_arity: 1,
        max_arity: Some(1),
        return_type: STRING,
        dependency: Dependency::Dynamic,
        implementation: fn_regex_group,
    },
    FunctionSignature {
        name: "string-join",
        min_arity: 1,
        max_arity: Some(2),
        return_type: STRING,
        dependency: Dependency::None,
        implementation: fn_string_join,
    },
    FunctionSignature {
        name: "count",
        min_arity: 1,
        max_arity: Some(1),
        return_type: INTEGER,
        dependency: Dependency::None,
        implementation: fn_count,
    },
    FunctionSignature {
        name: "true",
        min_arity: 0,
        max_arity: Some(0),
        return_type: BOOLEAN,
        dependency: Dependency::None,
        implementation: fn_true,
    },
    FunctionSignature {
        name: "false",
        min_arity: 0,
        max_arity: Some(0),
        return_type: BOOLEAN,
        dependency: Dependency::None,
        implementation: fn_false,
    },
    FunctionSignature {
        name: "not",
        min_arity: 1,
        max_arity: Some(1),
        return_type: BOOLEAN,
        dependency: Dependency::None,
        implementation: fn_not,
    },
    FunctionSignature {
        name: "empty",
        min_arity: 1,
        max_arity: Some(1),
        return_type: BOOLEAN,
        dependency: Dependency::None,
        implementation: fn_empty,
    },
    FunctionSignature {
        name: "exists",
        min_arity: 1,
        max_arity: Some(1),
        return_type: BOOLEAN,
        dependency: Dependency::None,
        implementation: fn_exists,
    },
    FunctionSignature {
        name: "xs:string",
        min_arity: 1,
        max_arity: Some(1),
        return_type: SequenceType::OPTIONAL_STRING,
        dependency: Dependency::None,
        implementation: cast_string,
    },
    FunctionSignature {
        name: "xs:integer",
        min_arity: 1,
        max_arity: Some(1),
        return_type: SequenceType::optional(ItemType::Integer),
        dependency: Dependency::None,
        implementation: cast_integer,
    },
    FunctionSignature {
        name: "xs:double",
        min_arity: 1,
        max_arity: Some(1),
        return_type: SequenceType::optional(ItemType::Double),
        dependency: Dependency::None,
        implementation: cast_double,
    },
];

/// Finds the function with this name that accepts `arity` arguments.
pub fn lookup(name: &str, arity: usize) -> Option<&'static FunctionSignature> {
    let local = name.strip_prefix("fn:").unwrap_or(name);
    FUNCTIONS
        .iter()
        .find(|f| f.name == local && f.accepts_arity(arity))
}

pub fn depends_on_focus(name: &str, arity: usize) -> bool {
    match lookup(name, arity) {
        Some(f) => match f.dependency {
            Dependency::None => false,
            Dependency::ContextWhenNoArgs => arity == 0,
            Dependency::Dynamic => true,
        },
        None => true,
    }
}

/// The string value of an optional single item; empty gives "".
fn string_arg(seq: &[AtomicValue], function: &str) -> Result<String, XPathError> {
    match seq {
        [] => Ok(String::new()),
        [item] => Ok(item.to_string()),
        _ => Err(XPathError::type_error(format!(
            "A sequence of more than one item is not allowed as an argument of {}()",
            function
        ))),
    }
}

fn number_arg(seq: &[AtomicValue], function: &str) -> Result<f64, XPathError> {
    match seq {
        [item] => match item.as_double() {
            Some(d) => Ok(d),
            None => item.cast_to(ItemType::Double).and_then(|v| {
                v.as_double()
                    .ok_or_else(|| XPathError::type_error(format!("Expected a number in {}()", function)))
            }),
        },
        _ => Err(XPathError::type_error(format!(
            "Expected exactly one number as an argument of {}()",
            function
        ))),
    }
}

fn context_or_arg(
    args: &[Sequence],
    cx: &DynamicContext,
    function: &str,
) -> Result<String, XPathError> {
    match args.first() {
        Some(arg) => string_arg(arg, function),
        None => cx
            .context_item
            .as_ref()
            .map(|item| item.to_string())
            .ok_or(XPathError::NoContextItem),
    }
}

fn single(value: AtomicValue) -> Result<Sequence, XPathError> {
    Ok(vec![value])
}

fn fn_string(args: &[Sequence], cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::String(context_or_arg(args, cx, "string")?))
}

fn fn_concat(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    let mut result = String::new();
    for arg in args {
        result.push_str(&string_arg(arg, "concat")?);
    }
    single(AtomicValue::String(result))
}

fn fn_string_length(args: &[Sequence], cx: &DynamicContext) -> Result<Sequence, XPathError> {
    let s = context_or_arg(args, cx, "string-length")?;
    single(AtomicValue::Integer(s.chars().count() as i64))
}

fn fn_normalize_space(args: &[Sequence], cx: &DynamicContext) -> Result<Sequence, XPathError> {
    let s = context_or_arg(args, cx, "normalize-space")?;
    single(AtomicValue::String(
        s.split_whitespace().collect::<Vec<_>>().join(" "),
    ))
}

fn fn_upper_case(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::String(
        string_arg(&args[0], "upper-case")?.to_uppercase(),
    ))
}

fn fn_lower_case(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::String(
        string_arg(&args[0], "lower-case")?.to_lowercase(),
    ))
}

fn round_half_up(d: f64) -> f64 {
    (d + 0.5).floor()
}

fn fn_substring(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    let source = string_arg(&args[0], "substring")?;
    let start = round_half_up(number_arg(&args[1], "substring")?);
    let end = match args.get(2) {
        Some(len) => start + round_half_up(number_arg(len, "substring")?),
        None => f64::INFINITY,
    };

    let result: String = source
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = (*i + 1) as f64;
            position >= start && position < end
        })
        .map(|(_, c)| c)
        .collect();
    single(AtomicValue::String(result))
}

fn fn_contains(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    let haystack = string_arg(&args[0], "contains")?;
    let needle = string_arg(&args[1], "contains")?;
    single(AtomicValue::Boolean(haystack.contains(&needle)))
}

fn fn_matches(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    let input = string_arg(&args[0], "matches")?;
    let pattern = string_arg(&args[1], "matches")?;
    let flags = match args.get(2) {
        Some(f) => string_arg(f, "matches")?,
        None => String::new(),
    };
    let regex = compile_regex(&pattern, &flags)?;
    single(AtomicValue::Boolean(regex.is_match(&input)))
}

fn fn_regex_group(args: &[Sequence], cx: &DynamicContext) -> Result<Sequence, XPathError> {
    let index = number_arg(&args[0], "regex-group")?;
    let group = if index >= 0.0 {
        cx.regex_groups
            .get(index as usize)
            .cloned()
            .unwrap_or_default()
    } else {
        String::new()
    };
    single(AtomicValue::String(group))
}

fn fn_string_join(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    let separator = match args.get(1) {
        Some(sep) => string_arg(sep, "string-join")?,
        None => String::new(),
    };
    single(AtomicValue::String(string_join(&args[0], &separator)))
}

fn fn_count(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::Integer(args[0].len() as i64))
}

fn fn_true(_args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::Boolean(true))
}

fn fn_false(_args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::Boolean(false))
}

fn fn_not(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::Boolean(!effective_boolean_value(&args[0])?))
}

fn fn_empty(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::Boolean(args[0].is_empty()))
}

fn fn_exists(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    single(AtomicValue::Boolean(!args[0].is_empty()))
}

fn cast_optional(arg: &[AtomicValue], target: ItemType) -> Result<Sequence, XPathError> {
    match arg {
        [] => Ok(Vec::new()),
        [item] => Ok(vec![item.cast_to(target)?]),
        _ => Err(XPathError::type_error(format!(
            "Cannot cast a sequence of {} items to {}",
            arg.len(),
            target
        ))),
    }
}

fn cast_string(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    cast_optional(&args[0], ItemType::String)
}

fn cast_integer(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    cast_optional(&args[0], ItemType::Integer)
}

fn cast_double(args: &[Sequence], _cx: &DynamicContext) -> Result<Sequence, XPathError> {
    cast_optional(&args[0], ItemType::Double)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_checks_arity_and_prefix() {
        assert!(lookup("concat", 1).is_none());
        assert!(lookup("concat", 5).is_some());
        assert!(lookup("fn:string-length", 0).is_some());
        assert!(lookup("no-such-function", 0).is_none());
    }

    #[test]
    fn focus_dependency() {
        assert!(depends_on_focus("string", 0));
        assert!(!depends_on_focus("string", 1));
        assert!(depends_on_focus("regex-group", 1));
        assert!(!depends_on_focus("upper-case", 1));
    }

    #[test]
    fn substring_uses_one_based_rounded_positions() {
        let cx = DynamicContext::empty();
        let args = vec![
            vec![AtomicValue::String("12345".to_string())],
            vec![AtomicValue::Double(1.5)],
            vec![AtomicValue::Double(2.6)],
        ];
        assert_eq!(
            fn_substring(&args, &cx).unwrap(),
            vec![AtomicValue::String("234".to_string())]
        );
    }
}
