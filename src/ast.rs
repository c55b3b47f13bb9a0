//! Parse tree produced by the parser, before any field resolution.

use crate::literal;
use crate::token::{Operator, RevisionKind, Span};

/// The root of a parsed query: optional criteria followed by order clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryTree {
    pub criteria: Option<CriteriaNode>,
    pub orders: Vec<OrderNode>,
}

/// A quoted literal as written, escapes still in place.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralNode {
    pub raw: String,
    pub span: Span,
}

impl LiteralNode {
    /// The literal with escapes removed.
    pub fn value(&self) -> String {
        literal::unescape(&self.raw)
    }
}

/// One `"field" asc|desc` entry of an `order by` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderNode {
    pub field: LiteralNode,
    /// `None` when the direction keyword was omitted
    pub ascending: Option<bool>,
}

/// An endpoint of `fixed between`, e.g. `tag "v1.0"`.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionNode {
    pub kind: RevisionKind,
    pub value: LiteralNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaNode {
    /// Two or more children joined by `or`
    Or(Vec<CriteriaNode>),
    /// Two or more children joined by `and`
    And(Vec<CriteriaNode>),
    Not(Box<CriteriaNode>),
    /// Parenthesized sub-expression
    Parens(Box<CriteriaNode>),
    /// `submitted by me`
    Operator { op: Operator, span: Span },
    /// `"Milestone" is empty`
    FieldOperator { field: LiteralNode, op: Operator },
    /// `"Title" contains "crash"`
    FieldOperatorValue {
        field: LiteralNode,
        op: Operator,
        value: LiteralNode,
    },
    /// `submitted by "robin"`
    OperatorValue { op: Operator, value: LiteralNode },
    /// `fixed between tag "v1" and branch "main"`
    FixedBetween {
        first: RevisionNode,
        second: RevisionNode,
    },
}
