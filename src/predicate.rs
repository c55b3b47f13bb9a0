//! Backend predicate building blocks on top of sea-query.
//!
//! Criteria compile to `SimpleExpr` fragments over the tables below. Custom
//! issue fields and comments live in side tables and are reached through
//! `IN (SELECT ...)` subqueries keyed by the owning row id.

use crate::query::Direction;
use crate::token::Operator;
use sea_query::{
    Alias, Asterisk, Expr, Func, Iden, LikeExpr, Order, Query as SqlQuery, SelectStatement,
    SimpleExpr,
};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Issues,
    IssueFields,
    IssueComments,
    PullRequests,
    PullRequestComments,
    Projects,
    ProjectOwners,
}

impl Iden for Table {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            Table::Issues => "issues",
            Table::IssueFields => "issue_fields",
            Table::IssueComments => "issue_comments",
            Table::PullRequests => "pull_requests",
            Table::PullRequestComments => "pull_request_comments",
            Table::Projects => "projects",
            Table::ProjectOwners => "project_owners",
        };
        write!(s, "{}", name).unwrap();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Project,
    Number,
    Title,
    Description,
    State,
    Status,
    Milestone,
    Submitter,
    SubmitDate,
    UpdateDate,
    VoteCount,
    CommentCount,
    SourceBranch,
    TargetBranch,
    Name,
    Owner,
    Value,
    Ordinal,
    Content,
    // Foreign keys of the side tables
    Issue,
    PullRequest,
}

impl Iden for Column {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            Column::Id => "id",
            Column::Project => "project",
            Column::Number => "number",
            Column::Title => "title",
            Column::Description => "description",
            Column::State => "state",
            Column::Status => "status",
            Column::Milestone => "milestone",
            Column::Submitter => "submitter",
            Column::SubmitDate => "submit_date",
            Column::UpdateDate => "update_date",
            Column::VoteCount => "vote_count",
            Column::CommentCount => "comment_count",
            Column::SourceBranch => "source_branch",
            Column::TargetBranch => "target_branch",
            Column::Name => "name",
            Column::Owner => "owner",
            Column::Value => "value",
            Column::Ordinal => "ordinal",
            Column::Content => "content",
            Column::Issue => "issue",
            Column::PullRequest => "pull_request",
        };
        write!(s, "{}", name).unwrap();
    }
}

/// Comparison used by number, ordinal and date criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Less,
    Greater,
}

impl Comparison {
    pub fn of(op: Operator) -> Self {
        match op {
            Operator::IsLessThan | Operator::IsBefore => Comparison::Less,
            Operator::IsGreaterThan | Operator::IsAfter => Comparison::Greater,
            _ => Comparison::Equal,
        }
    }

    /// Operator written for a number comparison.
    pub fn number_operator(self) -> Operator {
        match self {
            Comparison::Equal => Operator::Is,
            Comparison::Less => Operator::IsLessThan,
            Comparison::Greater => Operator::IsGreaterThan,
        }
    }

    /// Operator written for a date comparison.
    pub fn date_operator(self) -> Operator {
        match self {
            Comparison::Less => Operator::IsBefore,
            _ => Operator::IsAfter,
        }
    }

    /// In-memory counterpart of [`compare`].
    pub fn holds<T: PartialOrd>(self, actual: T, expected: T) -> bool {
        match self {
            Comparison::Equal => actual == expected,
            Comparison::Less => actual < expected,
            Comparison::Greater => actual > expected,
        }
    }
}

pub fn col(table: Table, column: Column) -> Expr {
    Expr::col((table, column))
}

pub fn always(value: bool) -> SimpleExpr {
    Expr::val(value).into()
}

/// Conjunction; `TRUE` when empty.
pub fn all(exprs: impl IntoIterator<Item = SimpleExpr>) -> SimpleExpr {
    exprs
        .into_iter()
        .reduce(SimpleExpr::and)
        .unwrap_or_else(|| always(true))
}

/// Disjunction; `FALSE` when empty.
pub fn any(exprs: impl IntoIterator<Item = SimpleExpr>) -> SimpleExpr {
    exprs
        .into_iter()
        .reduce(SimpleExpr::or)
        .unwrap_or_else(|| always(false))
}

pub fn compare<V>(expr: Expr, comparison: Comparison, value: V) -> SimpleExpr
where
    V: Into<SimpleExpr>,
{
    match comparison {
        Comparison::Equal => expr.eq(value),
        Comparison::Less => expr.lt(value),
        Comparison::Greater => expr.gt(value),
    }
}

/// `column IN (...)`, or `FALSE` for an empty set.
pub fn in_numbers(table: Table, column: Column, numbers: &HashSet<i64>) -> SimpleExpr {
    if numbers.is_empty() {
        return always(false);
    }
    let mut numbers: Vec<i64> = numbers.iter().copied().collect();
    numbers.sort_unstable();
    col(table, column).is_in(numbers)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A text column read as a timestamp. Custom date values are stored as text in
/// any form the backend casts to `timestamptz` (`2024-06-01`, `2024-06-01 10:00`).
pub fn as_timestamp(table: Table, column: Column) -> Expr {
    Expr::expr(Func::cast_as(col(table, column), Alias::new("timestamptz")))
}

/// Case-insensitive substring match.
pub fn contains_ci(table: Table, column: Column, value: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&value.to_lowercase()));
    Expr::expr(Func::lower(col(table, column))).like(LikeExpr::new(pattern).escape('\\'))
}

/// Case-insensitive equality.
pub fn equals_ci(table: Table, column: Column, value: &str) -> SimpleExpr {
    Expr::expr(Func::lower(col(table, column))).eq(value.to_lowercase())
}

/// Rows of `owner` that have a side-table row satisfying `condition`, e.g.
/// `issues.id IN (SELECT issue FROM issue_comments WHERE ...)`.
pub fn has_related(
    owner: Table,
    side: Table,
    foreign_key: Column,
    condition: SimpleExpr,
) -> SimpleExpr {
    let subquery = SqlQuery::select()
        .column((side, foreign_key))
        .from(side)
        .and_where(condition)
        .to_owned();
    col(owner, Column::Id).in_subquery(subquery)
}

/// Issues having a value of custom field `name` that satisfies `condition`.
pub fn issue_field(name: &str, condition: SimpleExpr) -> SimpleExpr {
    has_related(
        Table::Issues,
        Table::IssueFields,
        Column::Issue,
        col(Table::IssueFields, Column::Name).eq(name).and(condition),
    )
}

/// Issues with no value at all for custom field `name`.
pub fn issue_field_empty(name: &str) -> SimpleExpr {
    let subquery = SqlQuery::select()
        .column((Table::IssueFields, Column::Issue))
        .from(Table::IssueFields)
        .and_where(col(Table::IssueFields, Column::Name).eq(name))
        .and_where(col(Table::IssueFields, Column::Value).is_not_null())
        .to_owned();
    col(Table::Issues, Column::Id).not_in_subquery(subquery)
}

/// `SELECT * FROM table WHERE predicate ORDER BY ...`.
pub fn select(table: Table, predicate: SimpleExpr, orders: &[(Column, Direction)]) -> SelectStatement {
    let mut select = SqlQuery::select();
    select.column(Asterisk).from(table).and_where(predicate);
    for (column, direction) in orders {
        let order = match direction {
            Direction::Ascending => Order::Asc,
            Direction::Descending => Order::Desc,
        };
        select.order_by((table, *column), order);
    }
    select
}
