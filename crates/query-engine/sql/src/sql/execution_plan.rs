//! Describe the SQL execution plan.

use super::ast;
use super::helpers;
use super::string;

/// Definition of an execution plan to be run against the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan<T> {
    /// The entity set the plan was built for. Used for logging and response shaping.
    pub entity_set: String,
    /// The query or statement.
    pub query: T,
}

/// A query plan: the rows select, an optional count select and the shape of the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select: ast::Select,
    /// A second query counting the rows matched by the filter. Present for
    /// `$inlinecount=allpages` and `/$count`.
    pub count: Option<ast::Select>,
    /// Property names to render, in order.
    pub projection: Vec<String>,
    /// Only the count is requested, the rows query is never run.
    pub count_only: bool,
}

impl Query {
    /// Extract the query component as SQL.
    pub fn query_sql(&self) -> string::SQL {
        select_to_sql(&self.select)
    }

    /// Extract the count query component as SQL, if there is one.
    pub fn count_sql(&self) -> Option<string::SQL> {
        self.count.as_ref().map(select_to_sql)
    }
}

/// A single write statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(ast::Insert),
    Update(ast::Update),
    Delete(ast::Delete),
}

impl Mutation {
    pub fn to_sql(&self) -> string::SQL {
        let mut sql = string::SQL::new();
        match self {
            Mutation::Insert(insert) => insert.to_sql(&mut sql),
            Mutation::Update(update) => update.to_sql(&mut sql),
            Mutation::Delete(delete) => delete.to_sql(&mut sql),
        }
        sql
    }
}

/// Build a plan for a query, counting as well when requested.
pub fn simple_query_execution_plan(
    entity_set: String,
    select: ast::Select,
    count: Option<ast::Select>,
    projection: Vec<String>,
) -> ExecutionPlan<Query> {
    ExecutionPlan {
        entity_set,
        query: Query {
            select,
            count,
            projection,
            count_only: false,
        },
    }
}

/// Build a plan that only counts the rows `select` returns.
pub fn count_only_execution_plan(entity_set: String, select: ast::Select) -> ExecutionPlan<Query> {
    ExecutionPlan {
        entity_set,
        query: Query {
            select: select.clone(),
            count: Some(helpers::count_select(select)),
            projection: vec![],
            count_only: true,
        },
    }
}

pub fn mutation_execution_plan(entity_set: String, mutation: Mutation) -> ExecutionPlan<Mutation> {
    ExecutionPlan {
        entity_set,
        query: mutation,
    }
}

/// Convert a select to SQL.
pub fn select_to_sql(select: &ast::Select) -> string::SQL {
    let mut sql = string::SQL::new();
    select.to_sql(&mut sql);
    sql
}
