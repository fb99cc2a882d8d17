//! The SQL statements the query engine generates, as a tree.

use std::collections::BTreeMap;

/// A SELECT statement, possibly nested in a FROM
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub select_list: SelectList,
    pub from: Option<From>,
    pub where_: Where,
    pub order_by: OrderBy,
    pub limit: Limit,
}

/// An INSERT of a single row
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub schema: SchemaName,
    pub table: TableName,
    pub columns: Vec<ColumnName>,
    pub values: Vec<Expression>,
}

/// A DELETE restricted to the rows matching `where_`
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub schema: SchemaName,
    pub table: TableName,
    pub where_: Where,
}

/// An UPDATE of the rows matching `where_`
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub schema: SchemaName,
    pub table: TableName,
    pub set: BTreeMap<ColumnName, Expression>,
    pub where_: Where,
}

/// What a SELECT returns
#[derive(Debug, Clone, PartialEq)]
pub enum SelectList {
    SelectList(Vec<(ColumnAlias, Expression)>),
    SelectStar,
}

/// The source of a SELECT
#[derive(Debug, Clone, PartialEq)]
pub enum From {
    /// a table or view
    Table {
        reference: TableReference,
        alias: TableAlias,
    },
    /// a nested SELECT, used to count a limited result
    Select {
        select: Box<Select>,
        alias: TableAlias,
    },
    /// Select from a query written by hand, which is opaque to us
    RawSql { sql: String, alias: TableAlias },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Where(pub Expression);

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub elements: Vec<OrderByElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByElement {
    pub target: Expression,
    pub direction: OrderByDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByDirection {
    Asc,
    Desc,
}

/// `LIMIT -1` is written when only an offset is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// An expression in a select list, predicate or assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    And {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Or {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    /// comparison of two operands
    BinaryOperation {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    /// `LIKE pattern ESCAPE 'c'`
    Like {
        expression: Box<Expression>,
        pattern: Box<Expression>,
        escape: char,
    },
    UnaryOperation {
        expression: Box<Expression>,
        operator: UnaryOperator,
    },
    ColumnReference(ColumnReference),
    /// rendered as a bound parameter
    Value(Value),
    Count(CountType),
    /// one more than the largest value of the column, 1 in an empty table
    NextKey(ColumnReference),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaryOperator {
    IsNull,
}

/// Comparison operators of `$filter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
}

/// `COUNT(*)` or `COUNT(column)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountType {
    Star,
    Simple(ColumnReference),
}

/// A literal, bound as a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int8(i64),
    Bool(bool),
    String(String),
    Null,
    JsonValue(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaName(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(pub String);

/// How a statement names a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableReference {
    /// `"schema"."table"`
    DBTable {
        schema: SchemaName,
        table: TableName,
    },
    /// an alias given in a FROM
    AliasedTable(TableAlias),
}

/// A column as it is named in the database, not the property name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnName(pub String);

/// How an expression names a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnReference {
    /// qualified by its table
    TableColumn {
        table: TableReference,
        name: ColumnName,
    },
    /// unqualified, in INSERT, UPDATE and DELETE statements
    Column(ColumnName),
}

/// Alias of a FROM source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableAlias {
    pub name: String,
}

/// Output name of a select list entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnAlias {
    pub name: String,
}
