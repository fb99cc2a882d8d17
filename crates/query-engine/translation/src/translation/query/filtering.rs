//! Handle `$filter` parsing and its translation to a WHERE clause.

use crate::translation::error::Error;
use crate::translation::values::{self, Literal};
use query_engine_metadata::metadata::EntityType;
use query_engine_sql::sql;

/// Parentheses and `not` may nest this deep.
const MAX_NESTING: usize = 100;

/// The deepest expression tree accepted, counting every `and`, `or` and `not`.
const MAX_DEPTH: usize = 1000;

/// A parsed `$filter` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Compare {
        property: String,
        operator: ComparisonOperator,
        value: Literal,
    },
    Match {
        property: String,
        kind: MatchKind,
        text: String,
    },
}

impl Filter {
    /// The number of levels from the root to the deepest comparison, counted without
    /// recursing.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((filter, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            match filter {
                Filter::And(left, right) | Filter::Or(left, right) => {
                    pending.push((left, depth + 1));
                    pending.push((right, depth + 1));
                }
                Filter::Not(operand) => pending.push((operand, depth + 1)),
                Filter::Compare { .. } | Filter::Match { .. } => {}
            }
        }
        deepest
    }
}

fn nested_too_deeply() -> Error {
    Error::InvalidFilter("expression nested too deeply".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
}

impl ComparisonOperator {
    fn from_keyword(keyword: &str) -> Option<ComparisonOperator> {
        match keyword.to_ascii_lowercase().as_str() {
            "eq" => Some(ComparisonOperator::Equals),
            "ne" => Some(ComparisonOperator::NotEquals),
            "gt" => Some(ComparisonOperator::GreaterThan),
            "ge" => Some(ComparisonOperator::GreaterThanOrEqualTo),
            "lt" => Some(ComparisonOperator::LessThan),
            "le" => Some(ComparisonOperator::LessThanOrEqualTo),
            _ => None,
        }
    }

    fn to_sql(self) -> sql::ast::BinaryOperator {
        match self {
            ComparisonOperator::Equals => sql::ast::BinaryOperator::Equals,
            ComparisonOperator::NotEquals => sql::ast::BinaryOperator::NotEquals,
            ComparisonOperator::GreaterThan => sql::ast::BinaryOperator::GreaterThan,
            ComparisonOperator::GreaterThanOrEqualTo => {
                sql::ast::BinaryOperator::GreaterThanOrEqualTo
            }
            ComparisonOperator::LessThan => sql::ast::BinaryOperator::LessThan,
            ComparisonOperator::LessThanOrEqualTo => sql::ast::BinaryOperator::LessThanOrEqualTo,
        }
    }
}

/// The string functions that compile to `LIKE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// `startswith(Property, 'text')`
    StartsWith,
    /// `endswith(Property, 'text')`
    EndsWith,
    /// `substringof('text', Property)`
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    OpenParen,
    CloseParen,
    Comma,
    Word(String),
    Literal(Literal),
}

fn tokenize(input: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = vec![];
    let chars: Vec<char> = input.chars().collect();
    let mut index = 0;

    while index < chars.len() {
        let c = chars[index];
        match c {
            c if c.is_whitespace() => index += 1,
            '(' => {
                tokens.push(Token::OpenParen);
                index += 1;
            }
            ')' => {
                tokens.push(Token::CloseParen);
                index += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                index += 1;
            }
            '\'' => {
                let (text, next) = read_quoted(&chars, index)?;
                tokens.push(Token::Literal(Literal::String(text)));
                index = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = index;
                while index < chars.len()
                    && (chars[index].is_alphanumeric() || matches!(chars[index], '_' | '.' | '/'))
                {
                    index += 1;
                }
                let word: String = chars[start..index].iter().collect();
                if index < chars.len() && chars[index] == '\'' {
                    // typed literal such as datetime'2014-01-01'
                    let (text, next) = read_quoted(&chars, index)?;
                    let literal = Literal::parse(&format!("{word}'{}'", text.replace('\'', "''")))
                        .ok_or_else(|| Error::InvalidFilter(format!("unknown literal {word}")))?;
                    tokens.push(Token::Literal(literal));
                    index = next;
                } else {
                    match word.as_str() {
                        "true" => tokens.push(Token::Literal(Literal::Boolean(true))),
                        "false" => tokens.push(Token::Literal(Literal::Boolean(false))),
                        "null" => tokens.push(Token::Literal(Literal::Null)),
                        _ => tokens.push(Token::Word(word)),
                    }
                }
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = index;
                index += 1;
                while index < chars.len()
                    && (chars[index].is_ascii_alphanumeric()
                        || chars[index] == '.'
                        || (matches!(chars[index], '+' | '-')
                            && matches!(chars[index - 1], 'e' | 'E')))
                {
                    index += 1;
                }
                let text: String = chars[start..index].iter().collect();
                let literal = Literal::parse(&text)
                    .ok_or_else(|| Error::InvalidFilter(format!("invalid number {text}")))?;
                tokens.push(Token::Literal(literal));
            }
            other => {
                return Err(Error::InvalidFilter(format!(
                    "unexpected character '{other}'"
                )))
            }
        }
    }
    Ok(tokens)
}

/// Read a quoted string starting at `start`, returning its contents and the index
/// after the closing quote.
fn read_quoted(chars: &[char], start: usize) -> Result<(String, usize), Error> {
    let mut text = String::new();
    let mut index = start + 1;
    loop {
        match chars.get(index) {
            None => return Err(Error::InvalidFilter("unterminated string".to_string())),
            Some('\'') if chars.get(index + 1) == Some(&'\'') => {
                text.push('\'');
                index += 2;
            }
            Some('\'') => return Ok((text, index + 1)),
            Some(c) => {
                text.push(*c);
                index += 1;
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    nesting: usize,
}

impl Parser {
    /// Run `parse` one level of parentheses or `not` deeper.
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Parser) -> Result<Filter, Error>,
    ) -> Result<Filter, Error> {
        if self.nesting >= MAX_NESTING {
            return Err(nested_too_deeply());
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn expect(&mut self, expected: &Token) -> Result<(), Error> {
        match self.next() {
            Some(token) if token == *expected => Ok(()),
            other => Err(Error::InvalidFilter(format!(
                "expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<Filter, Error> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.position += 1;
            let right = self.parse_and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter, Error> {
        let mut left = self.parse_unary()?;
        while self.peek_keyword("and") {
            self.position += 1;
            let right = self.parse_unary()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Filter, Error> {
        if self.peek_keyword("not") {
            self.position += 1;
            let operand = self.nested(Parser::parse_unary)?;
            return Ok(Filter::Not(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Filter, Error> {
        match self.next() {
            Some(Token::OpenParen) => {
                let inner = self.nested(Parser::parse_or)?;
                self.expect(&Token::CloseParen)?;
                Ok(inner)
            }
            Some(Token::Word(word)) if self.peek() == Some(&Token::OpenParen) => {
                self.position += 1;
                let filter = self.parse_function(&word)?;
                self.parse_boolean_comparison(filter)
            }
            Some(Token::Word(property)) => {
                let operator = match self.next() {
                    Some(Token::Word(keyword)) => ComparisonOperator::from_keyword(&keyword),
                    _ => None,
                }
                .ok_or_else(|| {
                    Error::InvalidFilter(format!("expected a comparison after {property}"))
                })?;
                match self.next() {
                    Some(Token::Literal(value)) => Ok(Filter::Compare {
                        property,
                        operator,
                        value,
                    }),
                    other => Err(Error::InvalidFilter(format!(
                        "expected a literal, found {other:?}"
                    ))),
                }
            }
            other => Err(Error::InvalidFilter(format!("unexpected {other:?}"))),
        }
    }

    /// The arguments and closing parenthesis of a function call.
    fn parse_function(&mut self, name: &str) -> Result<Filter, Error> {
        let first = self.next();
        self.expect(&Token::Comma)?;
        let second = self.next();
        self.expect(&Token::CloseParen)?;

        let kind = match name.to_ascii_lowercase().as_str() {
            "startswith" => MatchKind::StartsWith,
            "endswith" => MatchKind::EndsWith,
            "substringof" => MatchKind::Contains,
            other => {
                return Err(Error::InvalidFilter(format!(
                    "unsupported function {other}"
                )))
            }
        };
        let (property, text) = match (kind, first, second) {
            (
                MatchKind::StartsWith | MatchKind::EndsWith,
                Some(Token::Word(property)),
                Some(Token::Literal(Literal::String(text))),
            )
            | (
                MatchKind::Contains,
                Some(Token::Literal(Literal::String(text))),
                Some(Token::Word(property)),
            ) => (property, text),
            _ => {
                return Err(Error::InvalidFilter(format!(
                    "invalid arguments to {name}"
                )))
            }
        };
        Ok(Filter::Match {
            property,
            kind,
            text,
        })
    }

    /// `startswith(A,'x') eq true`, `… eq false` and `… ne true`.
    fn parse_boolean_comparison(&mut self, filter: Filter) -> Result<Filter, Error> {
        let operator = match self.peek() {
            Some(Token::Word(word)) => match ComparisonOperator::from_keyword(word) {
                Some(operator @ (ComparisonOperator::Equals | ComparisonOperator::NotEquals)) => {
                    operator
                }
                _ => return Ok(filter),
            },
            _ => return Ok(filter),
        };
        self.position += 1;
        let expected = match self.next() {
            Some(Token::Literal(Literal::Boolean(b))) => b,
            other => {
                return Err(Error::InvalidFilter(format!(
                    "expected true or false, found {other:?}"
                )))
            }
        };
        let positive = expected == (operator == ComparisonOperator::Equals);
        Ok(if positive {
            filter
        } else {
            Filter::Not(Box::new(filter))
        })
    }
}

/// Parse a `$filter` value.
pub fn parse_filter(input: &str) -> Result<Filter, Error> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(Error::InvalidFilter("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        position: 0,
        nesting: 0,
    };
    let filter = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(Error::InvalidFilter(format!("unexpected {token:?}")));
    }
    if filter.depth() > MAX_DEPTH {
        return Err(nested_too_deeply());
    }
    Ok(filter)
}

/// Escape the `LIKE` wildcards of a literal with `\`.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Translate a filter to a predicate over the columns of `table`.
pub fn translate_filter(
    entity_type: &EntityType,
    table: &sql::ast::TableReference,
    filter: &Filter,
) -> Result<sql::ast::Expression, Error> {
    let column = |property: &str| {
        entity_type
            .property(property)
            .map(|property| {
                (
                    property,
                    sql::ast::Expression::ColumnReference(sql::ast::ColumnReference::TableColumn {
                        table: table.clone(),
                        name: sql::ast::ColumnName(property.column_name.clone()),
                    }),
                )
            })
            .ok_or_else(|| Error::InvalidFilterField(property.to_string()))
    };

    match filter {
        Filter::And(left, right) => Ok(sql::ast::Expression::And {
            left: Box::new(translate_filter(entity_type, table, left)?),
            right: Box::new(translate_filter(entity_type, table, right)?),
        }),
        Filter::Or(left, right) => Ok(sql::ast::Expression::Or {
            left: Box::new(translate_filter(entity_type, table, left)?),
            right: Box::new(translate_filter(entity_type, table, right)?),
        }),
        Filter::Not(inner) => Ok(sql::ast::Expression::Not(Box::new(translate_filter(
            entity_type,
            table,
            inner,
        )?))),
        Filter::Compare {
            property,
            operator,
            value: Literal::Null,
        } => {
            let (_, column) = column(property)?;
            let is_null = sql::ast::Expression::UnaryOperation {
                expression: Box::new(column),
                operator: sql::ast::UnaryOperator::IsNull,
            };
            match operator {
                ComparisonOperator::Equals => Ok(is_null),
                ComparisonOperator::NotEquals => Ok(sql::ast::Expression::Not(Box::new(is_null))),
                _ => Err(Error::InvalidFilter(format!(
                    "null can only be compared with eq or ne on {property}"
                ))),
            }
        }
        Filter::Compare {
            property,
            operator,
            value,
        } => {
            let (property, column) = column(property)?;
            let value = values::coerce(property, &value.to_json())?;
            Ok(sql::ast::Expression::BinaryOperation {
                left: Box::new(column),
                operator: operator.to_sql(),
                right: Box::new(values::to_sql_value(value)),
            })
        }
        Filter::Match {
            property,
            kind,
            text,
        } => {
            let (_, column) = column(property)?;
            let escaped = escape_like(text);
            let pattern = match kind {
                MatchKind::StartsWith => format!("{escaped}%"),
                MatchKind::EndsWith => format!("%{escaped}"),
                MatchKind::Contains => format!("%{escaped}%"),
            };
            Ok(sql::ast::Expression::Like {
                expression: Box::new(column),
                pattern: Box::new(sql::ast::Expression::Value(sql::ast::Value::String(
                    pattern,
                ))),
                escape: '\\',
            })
        }
    }
}
