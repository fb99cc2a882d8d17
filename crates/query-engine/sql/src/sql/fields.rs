//! Parse the select list of a hand-written SQL query into its top-level column
//! expressions.
//!
//! This is not a SQL parser. It tracks parentheses and quotes so that commas inside
//! function calls and string literals do not split a field, and that is all.

const AGGREGATE_FUNCTIONS: [&str; 6] = ["COUNT", "SUM", "AVG", "MIN", "MAX", "GROUP_CONCAT"];

/// A single top-level expression of a select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub expression: String,
}

/// Something odd found while splitting a select list. Parsing still produces a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The parentheses did not balance. `depth` is the nesting depth where splitting
    /// stopped: negative for a stray `)`, positive for unclosed `(`.
    UnbalancedParentheses { depth: i32 },
}

/// The result of splitting a select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList {
    pub fields: Vec<Field>,
    pub diagnostic: Option<Diagnostic>,
}

/// Tracks whether a position is inside a quoted string or identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
    Backtick,
}

impl Quote {
    fn step(self, c: char) -> Quote {
        match (self, c) {
            (Quote::None, '\'') => Quote::Single,
            (Quote::None, '"') => Quote::Double,
            (Quote::None, '`') => Quote::Backtick,
            (Quote::Single, '\'') | (Quote::Double, '"') | (Quote::Backtick, '`') => Quote::None,
            (quote, _) => quote,
        }
    }
}

/// Collapse every whitespace run into a single space and trim the ends.
pub fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a select list on the commas at parenthesis depth 0.
pub fn parse_fields(sql: &str) -> FieldList {
    let mut fields = vec![];
    let mut diagnostic = None;
    let mut depth: i32 = 0;
    let mut quote = Quote::None;
    let mut start = 0;

    for (index, c) in sql.char_indices() {
        let was_quoted = quote != Quote::None;
        quote = quote.step(c);
        if was_quoted || quote != Quote::None {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    diagnostic = Some(Diagnostic::UnbalancedParentheses { depth });
                    break;
                }
            }
            ',' if depth == 0 => {
                push_field(&mut fields, &sql[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }

    if depth > 0 {
        diagnostic = Some(Diagnostic::UnbalancedParentheses { depth });
    }
    push_field(&mut fields, &sql[start..]);

    FieldList { fields, diagnostic }
}

fn push_field(fields: &mut Vec<Field>, text: &str) {
    let expression = text.trim();
    if !expression.is_empty() {
        fields.push(Field {
            expression: expression.to_string(),
        });
    }
}

/// The text between a leading `SELECT` and the first top-level `FROM` of a query.
/// Returns `None` when the query does not start with `SELECT`.
pub fn select_list(sql: &str) -> Option<String> {
    let sql = normalize(sql);
    let head = sql.get(..6)?;
    if !head.eq_ignore_ascii_case("SELECT") {
        return None;
    }
    let rest = &sql[6..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('(') {
        return None;
    }
    let end = find_top_level_keyword(rest, "FROM").unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

/// Position of the first occurrence of `keyword` as a whole word outside any
/// parentheses or quotes.
fn find_top_level_keyword(sql: &str, keyword: &str) -> Option<usize> {
    find_top_level_keywords(sql, keyword).into_iter().next()
}

fn find_top_level_keywords(sql: &str, keyword: &str) -> Vec<usize> {
    let mut found = vec![];
    let mut depth: i32 = 0;
    let mut quote = Quote::None;
    let mut previous: Option<char> = None;

    for (index, c) in sql.char_indices() {
        let was_quoted = quote != Quote::None;
        quote = quote.step(c);
        if !was_quoted && quote == Quote::None {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if depth == 0 && !previous.is_some_and(is_identifier_char) => {
                    let candidate = sql.get(index..index + keyword.len());
                    let next = sql[index..].chars().nth(keyword.len());
                    if candidate.is_some_and(|text| text.eq_ignore_ascii_case(keyword))
                        && !next.is_some_and(is_identifier_char)
                    {
                        found.push(index);
                    }
                }
                _ => {}
            }
        }
        previous = Some(c);
    }
    found
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn unquote(identifier: &str) -> &str {
    let identifier = identifier.trim();
    let mut chars = identifier.chars();
    match (chars.next(), chars.next_back()) {
        (Some('"'), Some('"')) | (Some('`'), Some('`')) | (Some('['), Some(']'))
            if identifier.len() >= 2 =>
        {
            &identifier[1..identifier.len() - 1]
        }
        _ => identifier,
    }
}

impl Field {
    /// The column name this expression produces: the alias after a top-level `AS`,
    /// an implicit trailing alias, or the identifier after the last `.`.
    pub fn output_name(&self) -> String {
        let expression = self.expression.as_str();

        if let Some(index) = find_top_level_keywords(expression, "AS").last() {
            let alias = &expression[index + 2..];
            if !alias.trim().is_empty() {
                return unquote(alias).to_string();
            }
        }

        if let Some(alias) = implicit_alias(expression) {
            return unquote(alias).to_string();
        }

        let last_segment = expression.rsplit('.').next().unwrap_or(expression);
        unquote(last_segment).to_string()
    }

    /// The expression with any alias removed, suitable for a `GROUP BY` clause.
    pub fn expression_without_alias(&self) -> String {
        let expression = self.expression.as_str();
        if let Some(index) = find_top_level_keywords(expression, "AS").last() {
            if !expression[index + 2..].trim().is_empty() {
                return expression[..*index].trim().to_string();
            }
        }
        if let Some(alias) = implicit_alias(expression) {
            return expression[..expression.len() - alias.len()].trim().to_string();
        }
        expression.to_string()
    }

    /// Whether the expression calls an aggregate function.
    pub fn is_aggregate(&self) -> bool {
        let upper = self.expression.to_ascii_uppercase();
        AGGREGATE_FUNCTIONS.iter().any(|function| {
            upper.match_indices(function).any(|(index, _)| {
                let before = upper[..index].chars().next_back();
                let after = upper[index + function.len()..].trim_start();
                !before.is_some_and(is_identifier_char) && after.starts_with('(')
            })
        })
    }
}

/// `COUNT(*) total` or `t.name label`: a trailing bare identifier after an operand.
fn implicit_alias(expression: &str) -> Option<&str> {
    let (head, last) = expression.rsplit_once(' ')?;
    let last_is_identifier = !last.is_empty()
        && (last.chars().all(is_identifier_char)
            || (unquote(last) != last && !unquote(last).is_empty()));
    let head_ends_operand = head
        .chars()
        .next_back()
        .is_some_and(|c| is_identifier_char(c) || matches!(c, ')' | '"' | '`' | ']' | '\''));
    let last_is_keyword = ["END", "DESC", "ASC", "NULL"]
        .iter()
        .any(|keyword| last.eq_ignore_ascii_case(keyword));
    // a bare identifier after a keyword such as DISTINCT is the column, not an alias
    let head_last_word = head.rsplit(' ').next().unwrap_or(head);
    let head_is_keyword = ["DISTINCT", "ALL", "NOT", "AND", "OR", "THEN", "ELSE", "WHEN", "IS"]
        .iter()
        .any(|keyword| head_last_word.eq_ignore_ascii_case(keyword));

    if last_is_identifier
        && head_ends_operand
        && !last_is_keyword
        && !head_is_keyword
        && find_top_level_keyword(last, "AS").is_none()
        && !has_unbalanced_tail(head)
    {
        Some(last)
    } else {
        None
    }
}

fn has_unbalanced_tail(head: &str) -> bool {
    parse_fields(head).diagnostic.is_some()
}

/// Insert `_` before every internal uppercase letter: `RefName` becomes `Ref_Name`.
pub fn un_pascalize(identifier: &str) -> String {
    let mut result = String::with_capacity(identifier.len() + 4);
    let mut previous: Option<char> = None;
    for c in identifier.chars() {
        if c.is_uppercase() && previous.is_some_and(|p| p != '_') {
            result.push('_');
        }
        result.push(c);
        previous = Some(c);
    }
    result
}
