//! Infix to postfix compilation.
//!
//! A shunting-yard pass over the whitespace-stripped input. Besides ordering
//! tokens it rejects every malformed input up front, so a postfix sequence
//! returned from [`to_postfix`] always builds a well-formed tree.

use std::fmt;

use calc_core::{CompileError, Operator};

/// Postfix token. Parentheses never survive compilation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    Number(f64),
    Operator(Operator),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "{value}"),
            Token::Operator(op) => write!(f, "{op}"),
        }
    }
}

/// Renders a postfix sequence as space separated text, e.g. `2 2 +`.
pub fn format_postfix(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Previous {
    Start,
    Number,
    Operator,
    LeftParen,
    RightParen,
}

impl Previous {
    /// Positions where an operand (or a sign) is expected next.
    fn expects_operand(self) -> bool {
        matches!(self, Previous::Start | Previous::Operator | Previous::LeftParen)
    }
}

enum StackItem {
    Operator(Operator),
    LeftParen,
}

pub fn to_postfix(input: &str) -> Result<Vec<Token>, CompileError> {
    let chars: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return Err(CompileError::InvalidExpression);
    }

    let mut output = Vec::with_capacity(chars.len());
    let mut stack: Vec<StackItem> = Vec::new();
    let mut previous = Previous::Start;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if is_number_char(c) {
            if previous == Previous::RightParen {
                return Err(CompileError::MismatchedBracket);
            }
            let (value, next) = read_number(&chars, i)?;
            output.push(Token::Number(value));
            previous = Previous::Number;
            i = next;
            continue;
        }

        if c == '-' && previous.expects_operand() {
            // sign of the following literal
            match chars.get(i + 1) {
                Some(&next) if is_number_char(next) => {}
                _ => return Err(CompileError::InvalidOperatorPlacement),
            }
            let (value, next) = read_number(&chars, i + 1)?;
            output.push(Token::Number(-value));
            previous = Previous::Number;
            i = next;
            continue;
        }

        match c {
            '(' => {
                if matches!(previous, Previous::Number | Previous::RightParen) {
                    return Err(CompileError::MismatchedBracket);
                }
                stack.push(StackItem::LeftParen);
                previous = Previous::LeftParen;
            }
            ')' => {
                if previous.expects_operand() {
                    return Err(CompileError::MismatchedBracket);
                }
                loop {
                    match stack.pop() {
                        Some(StackItem::Operator(op)) => output.push(Token::Operator(op)),
                        Some(StackItem::LeftParen) => break,
                        None => return Err(CompileError::MismatchedBracket),
                    }
                }
                previous = Previous::RightParen;
            }
            _ => {
                let op = Operator::from_symbol(c).ok_or(CompileError::InvalidSymbol)?;
                if previous.expects_operand() {
                    return Err(CompileError::InvalidOperatorPlacement);
                }
                while let Some(StackItem::Operator(top)) = stack.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(Token::Operator(*top));
                    stack.pop();
                }
                stack.push(StackItem::Operator(op));
                previous = Previous::Operator;
            }
        }
        i += 1;
    }

    if previous == Previous::Operator {
        return Err(CompileError::InvalidExpression);
    }

    while let Some(item) = stack.pop() {
        match item {
            StackItem::Operator(op) => output.push(Token::Operator(op)),
            StackItem::LeftParen => return Err(CompileError::MismatchedBracket),
        }
    }

    Ok(output)
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.'
}

/// Reads a literal starting at `start`; returns its value and the index
/// just past it.
fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), CompileError> {
    let end = chars[start..]
        .iter()
        .position(|&c| !is_number_char(c))
        .map_or(chars.len(), |offset| start + offset);

    let literal: String = chars[start..end].iter().collect();
    if literal.matches('.').count() > 1 {
        return Err(CompileError::InvalidSymbol);
    }

    let value = literal
        .parse::<f64>()
        .map_err(|_| CompileError::InvalidSymbol)?;
    if !value.is_finite() {
        return Err(CompileError::InvalidSymbol);
    }

    Ok((value, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postfix(input: &str) -> String {
        format_postfix(&to_postfix(input).unwrap())
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(postfix("2+2"), "2 2 +");
        assert_eq!(postfix("2+3*4"), "2 3 4 * +");
        assert_eq!(postfix("2*3+4"), "2 3 * 4 +");
        assert_eq!(postfix("8-3-2"), "8 3 - 2 -");
        assert_eq!(postfix("8/4/2"), "8 4 / 2 /");
        assert_eq!(postfix("2*(2+2)"), "2 2 2 + *");
    }

    #[test]
    fn test_whitespace_and_decimals() {
        assert_eq!(postfix(" 2 + 6 "), "2 6 +");
        assert_eq!(postfix("2.2/1.1"), "2.2 1.1 /");
        assert_eq!(postfix(".5+5."), "0.5 5 +");
        assert_eq!(postfix("12 34"), "1234");
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(postfix("-2*(-4+2)"), "-2 -4 2 + *");
        assert_eq!(postfix("2--2"), "2 -2 -");
        assert_eq!(postfix("2*-3"), "2 -3 *");
        assert_eq!(postfix("3-1"), "3 1 -");
        assert_eq!(postfix("(1)-(-1)"), "1 -1 -");
    }

    #[test]
    fn test_empty_and_trailing_operator() {
        assert_eq!(to_postfix(""), Err(CompileError::InvalidExpression));
        assert_eq!(to_postfix("   "), Err(CompileError::InvalidExpression));
        assert_eq!(to_postfix("2+"), Err(CompileError::InvalidExpression));
        assert_eq!(to_postfix("2*3/"), Err(CompileError::InvalidExpression));
    }

    #[test]
    fn test_mismatched_brackets() {
        for input in [
            "2+2+2)",
            "2+2+2(()",
            "2+2+2(",
            "2+((2+2",
            "(2+2+2",
            ")2+2+2",
            "()",
            "(2+)3",
            "2(3)",
            "(2)3",
            "(2)(3)",
        ] {
            assert_eq!(
                to_postfix(input),
                Err(CompileError::MismatchedBracket),
                "input: {input}"
            );
        }
    }

    #[test]
    fn test_invalid_symbols() {
        for input in ["a", "2+O", "3^3", "2|2", "1.2.3", ".", "2+.", "2,5"] {
            assert_eq!(
                to_postfix(input),
                Err(CompileError::InvalidSymbol),
                "input: {input}"
            );
        }
    }

    #[test]
    fn test_invalid_operator_placement() {
        for input in ["2++", "2++2-", "2*(*2+2)", "*2", "+2", "-", "-(2)", "2*-", "2--"] {
            assert_eq!(
                to_postfix(input),
                Err(CompileError::InvalidOperatorPlacement),
                "input: {input}"
            );
        }
    }
}
