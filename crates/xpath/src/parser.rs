use crate::ast::{BinaryOperator, Expression, Literal};
use crate::error::XPathError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{map, not, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};

pub fn parse_expression(input: &str) -> Result<Expression, XPathError> {
    match expr(input.trim()) {
        Ok(("", expr)) => Ok(expr),
        Ok((rem, _)) => Err(XPathError::parse(
            input,
            format!("Unparsed input remaining: '{}'", rem),
        )),
        Err(e) => Err(XPathError::parse(input, e.to_string())),
    }
}

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// A keyword that must not run on into a following name.
fn keyword<'a>(
    kw: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = NomError<&'a str>> {
    ws(terminated(tag(kw), not(satisfy(is_name_char))))
}

fn expr(input: &str) -> IResult<&str, Expression> {
    map(separated_list1(ws(char(',')), expr_single), |mut items| {
        if items.len() == 1 {
            items.remove(0)
        } else {
            Expression::Sequence(items)
        }
    })
    .parse(input)
}

fn expr_single(input: &str) -> IResult<&str, Expression> {
    alt((if_expr, or_expr)).parse(input)
}

fn if_expr(input: &str) -> IResult<&str, Expression> {
    let (input, _) = keyword("if").parse(input)?;
    let (input, condition) = delimited(ws(char('(')), expr, ws(char(')'))).parse(input)?;
    let (input, _) = keyword("then").parse(input)?;
    let (input, then_expr) = expr_single(input)?;
    let (input, _) = keyword("else").parse(input)?;
    let (input, else_expr) = expr_single(input)?;

    Ok((
        input,
        Expression::IfExpr {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        },
    ))
}

fn fold_binary(first: Expression, rest: Vec<(BinaryOperator, Expression)>) -> Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
}

fn or_expr(input: &str) -> IResult<&str, Expression> {
    let (input, first) = and_expr(input)?;
    let (input, rest) =
        many0(pair(value(BinaryOperator::Or, keyword("or")), and_expr)).parse(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn and_expr(input: &str) -> IResult<&str, Expression> {
    let (input, first) = comparison_expr(input)?;
    let (input, rest) =
        many0(pair(value(BinaryOperator::And, keyword("and")), comparison_expr)).parse(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn comparison_operator(input: &str) -> IResult<&str, BinaryOperator> {
    alt((
        value(BinaryOperator::NotEquals, ws(tag("!="))),
        value(BinaryOperator::LessThanOrEqual, ws(tag("<="))),
        value(BinaryOperator::GreaterThanOrEqual, ws(tag(">="))),
        value(BinaryOperator::Equals, ws(tag("="))),
        value(BinaryOperator::LessThan, ws(tag("<"))),
        value(BinaryOperator::GreaterThan, ws(tag(">"))),
        value(BinaryOperator::Equals, keyword("eq")),
        value(BinaryOperator::NotEquals, keyword("ne")),
        value(BinaryOperator::LessThanOrEqual, keyword("le")),
        value(BinaryOperator::GreaterThanOrEqual, keyword("ge")),
        value(BinaryOperator::LessThan, keyword("lt")),
        value(BinaryOperator::GreaterThan, keyword("gt")),
    ))
    .parse(input)
}

fn comparison_expr(input: &str) -> IResult<&str, Expression> {
    let (input, left) = concat_expr(input)?;
    let (input, tail) = opt(pair(comparison_operator, concat_expr)).parse(input)?;
    let expr = match tail {
        Some((op, right)) => Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        None => left,
    };
    Ok((input, expr))
}

fn concat_expr(input: &str) -> IResult<&str, Expression> {
    let (input, first) = additive_expr(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), additive_expr)).parse(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |left, right| Expression::StringConcat {
            left: Box::new(left),
            right: Box::new(right),
        });
    Ok((input, expr))
}

fn additive_expr(input: &str) -> IResult<&str, Expression> {
    let (input, first) = multiplicative_expr(input)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOperator::Plus, char('+')),
            value(BinaryOperator::Minus, char('-')),
        ))),
        multiplicative_expr,
    ))
    .parse(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expression> {
    let (input, first) = unary_expr(input)?;
    let (input, rest) = many0(pair(
        alt((
            value(BinaryOperator::Multiply, ws(char('*'))),
            value(BinaryOperator::IntegerDivide, keyword("idiv")),
            value(BinaryOperator::Divide, keyword("div")),
            value(BinaryOperator::Modulo, keyword("mod")),
        )),
        unary_expr,
    ))
    .parse(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn unary_expr(input: &str) -> IResult<&str, Expression> {
    alt((
        map(preceded(ws(char('-')), unary_expr), |e| {
            Expression::Negate(Box::new(e))
        }),
        preceded(ws(char('+')), unary_expr),
        primary_expr,
    ))
    .parse(input)
}

fn primary_expr(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        number_literal,
        string_literal,
        variable_reference,
        parenthesized_expr,
        function_call,
        context_item,
    )))
    .parse(input)
}

fn number_literal(input: &str) -> IResult<&str, Expression> {
    let (rest, text) = recognize(pair(
        pair(digit1, opt(pair(char('.'), digit0))),
        opt(pair(pair(one_of("eE"), opt(one_of("+-"))), digit1)),
    ))
    .parse(input)?;

    let literal = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().map(Literal::Double).ok()
    } else {
        text.parse::<i64>().map(Literal::Integer).ok()
    };

    match literal {
        Some(lit) => Ok((rest, Expression::Literal(lit))),
        None => Err(nom::Err::Failure(NomError::new(input, ErrorKind::Digit))),
    }
}

/// `'...'` or `"..."`, with the delimiter escaped by doubling it.
fn string_literal(input: &str) -> IResult<&str, Expression> {
    let quote = match input.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(nom::Err::Error(NomError::new(input, ErrorKind::Char))),
    };

    let mut value = String::new();
    let mut chars = input.char_indices().skip(1).peekable();
    while let Some((idx, c)) = chars.next() {
        if c == quote {
            if let Some(&(_, next)) = chars.peek()
                && next == quote
            {
                chars.next();
                value.push(quote);
                continue;
            }
            let rest = &input[idx + c.len_utf8()..];
            return Ok((rest, Expression::string(value)));
        }
        value.push(c);
    }

    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Char)))
}

fn ncname(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_name_start_char), take_while(is_name_char))).parse(input)
}

fn qname(input: &str) -> IResult<&str, &str> {
    recognize(pair(ncname, opt(pair(char(':'), ncname)))).parse(input)
}

fn variable_reference(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('$'), qname), |name: &str| {
        Expression::Variable(name.to_string())
    })
    .parse(input)
}

fn parenthesized_expr(input: &str) -> IResult<&str, Expression> {
    map(
        delimited(ws(char('(')), opt(expr), ws(char(')'))),
        |inner| inner.unwrap_or(Expression::Sequence(Vec::new())),
    )
    .parse(input)
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = qname(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expr_single),
        ws(char(')')),
    )
    .parse(input)?;

    Ok((
        input,
        Expression::FunctionCall {
            name: name.to_string(),
            args,
        },
    ))
}

fn context_item(input: &str) -> IResult<&str, Expression> {
    map(
        terminated(char('.'), not(satisfy(|c| c == '.' || c.is_ascii_digit()))),
        |_| Expression::ContextItem,
    )
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literals() {
        assert_eq!(parse_expression("'baaab'").unwrap(), Expression::string("baaab"));
        assert_eq!(
            parse_expression("'it''s'").unwrap(),
            Expression::string("it's")
        );
        assert_eq!(parse_expression(" 42 ").unwrap(), Expression::integer(42));
        assert_eq!(
            parse_expression("1.5").unwrap(),
            Expression::Literal(Literal::Double(1.5))
        );
    }

    #[test]
    fn parses_context_item_and_variables() {
        assert_eq!(parse_expression(".").unwrap(), Expression::ContextItem);
        assert_eq!(
            parse_expression("$delay-ms").unwrap(),
            Expression::Variable("delay-ms".to_string())
        );
    }

    #[test]
    fn respects_operator_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        match expr {
            Expression::BinaryOp { op, right, .. } => {
                assert_eq!(op, BinaryOperator::Plus);
                assert!(matches!(
                    *right,
                    Expression::BinaryOp {
                        op: BinaryOperator::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("expected binary op, got {:?}", other),
        }
    }

    #[test]
    fn parses_function_calls_and_sequences() {
        let expr = parse_expression("concat('a', string-length(.), 'b')").unwrap();
        match expr {
            Expression::FunctionCall { name, args } => {
                assert_eq!(name, "concat");
                assert_eq!(args.len(), 3);
            }
            other => panic!("expected function call, got {:?}", other),
        }
        assert_eq!(
            parse_expression("()").unwrap(),
            Expression::Sequence(vec![])
        );
        assert!(matches!(
            parse_expression("(1, 2, 3)").unwrap(),
            Expression::Sequence(items) if items.len() == 3
        ));
    }

    #[test]
    fn parses_keywords_without_swallowing_names() {
        let expr = parse_expression("if ($x = 1) then 'one' else 'other'").unwrap();
        assert!(matches!(expr, Expression::IfExpr { .. }));
        let expr = parse_expression("$order div 2").unwrap();
        assert!(matches!(
            expr,
            Expression::BinaryOp {
                op: BinaryOperator::Divide,
                ..
            }
        ));
    }

    #[test]
    fn reports_syntax_errors() {
        assert!(parse_expression("1 +").is_err());
        assert!(parse_expression("'unterminated").is_err());
        assert!(parse_expression("").is_err());
        let err = parse_expression("f(").unwrap_err();
        assert_eq!(err.code(), "XPST0003");
    }
}
