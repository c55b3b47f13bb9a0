//! Entity-independent query plumbing: sorts, the criteria traits, the walk from
//! parse tree to criteria, and the `EntityQuery` container shared by the issue,
//! pull request and project queries.

use crate::ast::CriteriaNode;
use crate::context::{MatchContext, Revision};
use crate::error::QueryError;
use crate::literal::quote;
use crate::parser::parse_tree;
use crate::token::{Operator, Span};
use log::debug;
use sea_query::{Expr, SimpleExpr};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn name(self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySort {
    pub field: String,
    pub direction: Direction,
}

impl EntitySort {
    pub fn new(field: &str, direction: Direction) -> Self {
        Self {
            field: field.to_string(),
            direction,
        }
    }
}

impl fmt::Display for EntitySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", quote(&self.field), self.direction.name())
    }
}

/// A node of a typed criteria tree for one kind of entity.
pub trait Criteria: Sized + Clone + fmt::Display {
    type Entity;

    fn and_of(children: Vec<Self>) -> Self;

    fn or_of(children: Vec<Self>) -> Self;

    fn not_of(child: Self) -> Self;

    /// `and`/`or` nodes, which need parentheses when nested.
    fn is_composite(&self) -> bool;

    /// In-memory evaluation.
    fn matches(&self, entity: &Self::Entity, ctx: &MatchContext) -> bool;

    /// Whether evaluation depends on the acting user.
    fn needs_login(&self) -> bool;

    /// Backend predicate over the entity's table.
    fn to_predicate(&self, ctx: &MatchContext) -> SimpleExpr;
}

/// Turns parse tree leaves into typed criteria for one kind of entity.
///
/// Composite nodes are handled by [`build_criteria`]; builders only see leaves,
/// with literals already unescaped. Operators that make no sense for the entity
/// are rejected through the default methods.
pub trait CriteriaBuilder {
    type Criteria: Criteria;

    fn operator(&mut self, op: Operator) -> Result<Self::Criteria, QueryError> {
        Err(QueryError::unsupported(op))
    }

    fn field_operator(&mut self, field: &str, op: Operator) -> Result<Self::Criteria, QueryError> {
        let _ = field;
        Err(QueryError::unsupported(op))
    }

    fn field_operator_value(
        &mut self,
        field: &str,
        op: Operator,
        value: &str,
    ) -> Result<Self::Criteria, QueryError>;

    fn operator_value(&mut self, op: Operator, value: &str) -> Result<Self::Criteria, QueryError> {
        let _ = value;
        Err(QueryError::unsupported(op))
    }

    fn fixed_between(&mut self, first: Revision, second: Revision) -> Result<Self::Criteria, QueryError> {
        let _ = (first, second);
        Err(QueryError::unsupported(Operator::FixedBetween))
    }

    /// Checks that the query may be ordered by `field`.
    fn order_field(&mut self, field: &str) -> Result<(), QueryError>;
}

/// Attaches a location to syntax errors raised without one.
fn located(error: QueryError, at: Span) -> QueryError {
    match error {
        QueryError::Syntax { message, span: None } => QueryError::Syntax {
            message,
            span: Some(at),
        },
        other => other,
    }
}

pub fn build_criteria<B: CriteriaBuilder>(
    node: &CriteriaNode,
    builder: &mut B,
) -> Result<B::Criteria, QueryError> {
    match node {
        CriteriaNode::Or(children) => {
            let children = children
                .iter()
                .map(|child| build_criteria(child, builder))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(B::Criteria::or_of(children))
        }
        CriteriaNode::And(children) => {
            let children = children
                .iter()
                .map(|child| build_criteria(child, builder))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(B::Criteria::and_of(children))
        }
        CriteriaNode::Not(inner) => Ok(B::Criteria::not_of(build_criteria(inner, builder)?)),
        CriteriaNode::Parens(inner) => build_criteria(inner, builder),
        CriteriaNode::Operator { op, span } => builder.operator(*op).map_err(|e| located(e, *span)),
        CriteriaNode::FieldOperator { field, op } => builder
            .field_operator(&field.value(), *op)
            .map_err(|e| located(e, field.span)),
        CriteriaNode::FieldOperatorValue {
            field,
            op: Operator::IsNot,
            value,
        } => {
            let name = field.value();
            let criteria = builder
                .field_operator_value(&name, Operator::Is, &value.value())
                .map_err(|e| {
                    if e == QueryError::not_applicable(&name, Operator::Is) {
                        QueryError::not_applicable(&name, Operator::IsNot)
                    } else {
                        located(e, field.span)
                    }
                })?;
            Ok(B::Criteria::not_of(criteria))
        }
        CriteriaNode::FieldOperatorValue { field, op, value } => builder
            .field_operator_value(&field.value(), *op, &value.value())
            .map_err(|e| located(e, field.span)),
        CriteriaNode::OperatorValue { op, value } => builder
            .operator_value(*op, &value.value())
            .map_err(|e| located(e, value.span)),
        CriteriaNode::FixedBetween { first, second } => builder
            .fixed_between(
                Revision::new(first.kind, &first.value.value()),
                Revision::new(second.kind, &second.value.value()),
            )
            .map_err(|e| located(e, first.value.span)),
    }
}

/// Runs lexer, parser and `builder` over `text`. Absent text is the empty query.
pub fn build_query<B: CriteriaBuilder>(
    text: Option<&str>,
    builder: &mut B,
) -> Result<EntityQuery<B::Criteria>, QueryError> {
    let Some(text) = text else {
        return Ok(EntityQuery::default());
    };
    debug!("parsing query: {}", text);

    let tree = parse_tree(text)?;
    let criteria = tree
        .criteria
        .as_ref()
        .map(|node| build_criteria(node, builder))
        .transpose()?;

    let mut sorts = Vec::with_capacity(tree.orders.len());
    for order in &tree.orders {
        let field = order.field.value();
        builder.order_field(&field)?;
        let direction = match order.ascending {
            Some(true) => Direction::Ascending,
            _ => Direction::Descending,
        };
        sorts.push(EntitySort { field, direction });
    }

    Ok(EntityQuery { criteria, sorts })
}

/// Writes `children` joined by `separator`, parenthesizing nested composites.
pub fn fmt_joined<C: Criteria>(f: &mut fmt::Formatter<'_>, children: &[C], separator: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", separator)?;
        }
        if child.is_composite() {
            write!(f, "({})", child)?;
        } else {
            write!(f, "{}", child)?;
        }
    }
    Ok(())
}

/// Writes a `"field" op "value"` leaf.
pub fn fmt_field(f: &mut fmt::Formatter<'_>, field: &str, op: Operator, value: &str) -> fmt::Result {
    write!(f, "{} {} {}", quote(field), op, quote(value))
}

/// An optional criteria tree plus ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery<C> {
    pub(crate) criteria: Option<C>,
    pub(crate) sorts: Vec<EntitySort>,
}

impl<C> Default for EntityQuery<C> {
    fn default() -> Self {
        Self {
            criteria: None,
            sorts: Vec::new(),
        }
    }
}

impl<C: Criteria> EntityQuery<C> {
    pub fn new(criteria: Option<C>, sorts: Vec<EntitySort>) -> Self {
        Self { criteria, sorts }
    }

    pub fn criteria(&self) -> Option<&C> {
        self.criteria.as_ref()
    }

    /// Empty means the caller's default ordering.
    pub fn sorts(&self) -> &[EntitySort] {
        &self.sorts
    }

    pub fn matches(&self, entity: &C::Entity, ctx: &MatchContext) -> bool {
        self.criteria
            .as_ref()
            .map_or(true, |criteria| criteria.matches(entity, ctx))
    }

    pub fn needs_login(&self) -> bool {
        self.criteria
            .as_ref()
            .is_some_and(|criteria| criteria.needs_login())
    }

    pub fn to_predicate(&self, ctx: &MatchContext) -> SimpleExpr {
        match &self.criteria {
            Some(criteria) => criteria.to_predicate(ctx),
            None => Expr::val(true).into(),
        }
    }

    /// Criteria of both queries joined by `and`; sorts of `first` take precedence.
    pub fn merge(first: &Self, second: &Self) -> Self {
        let mut criterias: Vec<C> = first
            .criteria
            .iter()
            .chain(second.criteria.iter())
            .cloned()
            .collect();
        let criteria = match criterias.len() {
            0 => None,
            1 => criterias.pop(),
            _ => Some(C::and_of(criterias)),
        };
        let sorts = first.sorts.iter().chain(&second.sorts).cloned().collect();
        Self { criteria, sorts }
    }
}

impl<C: fmt::Display> fmt::Display for EntityQuery<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(criteria) = &self.criteria {
            write!(f, "{}", criteria)?;
        }
        if !self.sorts.is_empty() {
            if self.criteria.is_some() {
                f.write_str(" ")?;
            }
            f.write_str("order by ")?;
            for (i, sort) in self.sorts.iter().enumerate() {
                if i > 0 {
                    f.write_str(" and ")?;
                }
                write!(f, "{}", sort)?;
            }
        }
        Ok(())
    }
}
