//! Constructors for the statement shapes the translator builds.

use super::ast::*;

// Empty clauses //

/// An empty `WHERE` clause.
pub fn empty_where() -> Expression {
    Expression::Value(Value::Bool(true))
}

/// An empty `ORDER BY` clause.
pub fn empty_order_by() -> OrderBy {
    OrderBy { elements: vec![] }
}

/// Empty `LIMIT` and `OFFSET` clauses.
pub fn empty_limit() -> Limit {
    Limit {
        limit: None,
        offset: None,
    }
}

/// A `true` expression.
pub fn true_expr() -> Expression {
    Expression::Value(Value::Bool(true))
}

/// Combine two predicates with `AND`, dropping trivially true sides.
pub fn and(left: Expression, right: Expression) -> Expression {
    if left == true_expr() {
        right
    } else if right == true_expr() {
        left
    } else {
        Expression::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

// Aliasing //

/// `alias.column AS name`
pub fn make_column(
    table: TableReference,
    name: ColumnName,
    alias: ColumnAlias,
) -> (ColumnAlias, Expression) {
    (
        alias,
        Expression::ColumnReference(ColumnReference::TableColumn { table, name }),
    )
}

/// The output name of a select list entry.
pub fn make_column_alias(name: String) -> ColumnAlias {
    ColumnAlias { name }
}

/// Create table aliases using this function so we build everything in one place.
pub fn make_table_alias(name: String) -> TableAlias {
    TableAlias { name }
}

/// The table reference `"main"."table"`.
pub fn db_table(schema: &str, table: &str) -> TableReference {
    TableReference::DBTable {
        schema: SchemaName(schema.to_string()),
        table: TableName(table.to_string()),
    }
}

// SELECTs //

/// A SELECT of `select_list` with no source, filter, order or limit yet.
pub fn simple_select(select_list: Vec<(ColumnAlias, Expression)>) -> Select {
    Select {
        select_list: SelectList::SelectList(select_list),
        from: None,
        where_: Where(empty_where()),
        order_by: empty_order_by(),
        limit: empty_limit(),
    }
}

/// `SELECT * FROM from`
pub fn star_select(from: From) -> Select {
    Select {
        select_list: SelectList::SelectStar,
        from: Some(from),
        where_: Where(empty_where()),
        order_by: empty_order_by(),
        limit: empty_limit(),
    }
}

/// `SELECT COUNT(*) AS "count" FROM (<select>) AS "counted"`, so that a row limit on the
/// inner select is honored by the count.
pub fn count_select(select: Select) -> Select {
    let mut outer = simple_select(vec![(
        make_column_alias("count".to_string()),
        Expression::Count(CountType::Star),
    )]);
    outer.from = Some(From::Select {
        select: Box::new(select),
        alias: make_table_alias("counted".to_string()),
    });
    outer
}

/// `SELECT COALESCE(MAX(column), 0) + 1 AS "next_key" FROM "schema"."table"`, the key
/// for a new row of a table whose integer key is not the row id.
pub fn next_key_select(schema: &str, table: &str, column: ColumnName) -> Select {
    let alias = make_table_alias(table.to_string());
    let mut select = simple_select(vec![(
        make_column_alias("next_key".to_string()),
        Expression::NextKey(ColumnReference::TableColumn {
            table: TableReference::AliasedTable(alias.clone()),
            name: column,
        }),
    )]);
    select.from = Some(From::Table {
        reference: db_table(schema, table),
        alias,
    });
    select
}
