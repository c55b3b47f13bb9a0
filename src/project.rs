//! Project queries.

use crate::context::{MatchContext, ParseContext};
use crate::error::QueryError;
use crate::literal::{contains_ignore_case, quote, DateLiteral};
use crate::model::Project;
use crate::predicate::{
    self, all, always, any, col, compare, contains_ci, equals_ci, has_related, Column, Comparison,
    Table,
};
use crate::query::{build_query, fmt_field, fmt_joined, Criteria, CriteriaBuilder, EntityQuery};
use crate::token::Operator;
use log::debug;
use sea_query::{SelectStatement, SimpleExpr};
use std::fmt;

pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const UPDATE_DATE: &str = "update date";

pub const ORDER_FIELDS: [&str; 2] = [NAME, UPDATE_DATE];

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectCriteria {
    And(Vec<ProjectCriteria>),
    Or(Vec<ProjectCriteria>),
    Not(Box<ProjectCriteria>),
    OwnedByMe,
    OwnedBy(String),
    /// Case-insensitive; `contains` selects substring matching
    Name { value: String, contains: bool },
    Description(String),
    UpdateDate { op: Comparison, value: DateLiteral },
}

fn owned_by(user: &str) -> SimpleExpr {
    has_related(
        Table::Projects,
        Table::ProjectOwners,
        Column::Project,
        col(Table::ProjectOwners, Column::Owner).eq(user),
    )
}

impl Criteria for ProjectCriteria {
    type Entity = Project;

    fn and_of(children: Vec<Self>) -> Self {
        ProjectCriteria::And(children)
    }

    fn or_of(children: Vec<Self>) -> Self {
        ProjectCriteria::Or(children)
    }

    fn not_of(child: Self) -> Self {
        ProjectCriteria::Not(Box::new(child))
    }

    fn is_composite(&self) -> bool {
        matches!(self, ProjectCriteria::And(_) | ProjectCriteria::Or(_))
    }

    fn matches(&self, project: &Project, ctx: &MatchContext) -> bool {
        match self {
            ProjectCriteria::And(children) => children.iter().all(|child| child.matches(project, ctx)),
            ProjectCriteria::Or(children) => children.iter().any(|child| child.matches(project, ctx)),
            ProjectCriteria::Not(child) => !child.matches(project, ctx),
            ProjectCriteria::OwnedByMe => ctx.user_name().is_some_and(|user| project.owners.contains(user)),
            ProjectCriteria::OwnedBy(user) => project.owners.contains(user),
            ProjectCriteria::Name { value, contains: true } => contains_ignore_case(&project.name, value),
            ProjectCriteria::Name { value, contains: false } => project.name.eq_ignore_ascii_case(value),
            ProjectCriteria::Description(value) => project
                .description
                .as_deref()
                .is_some_and(|description| contains_ignore_case(description, value)),
            ProjectCriteria::UpdateDate { op, value } => op.holds(project.update_date, value.date),
        }
    }

    fn needs_login(&self) -> bool {
        match self {
            ProjectCriteria::And(children) | ProjectCriteria::Or(children) => {
                children.iter().any(|child| child.needs_login())
            }
            ProjectCriteria::Not(child) => child.needs_login(),
            ProjectCriteria::OwnedByMe => true,
            _ => false,
        }
    }

    fn to_predicate(&self, ctx: &MatchContext) -> SimpleExpr {
        match self {
            ProjectCriteria::And(children) => all(children.iter().map(|child| child.to_predicate(ctx))),
            ProjectCriteria::Or(children) => any(children.iter().map(|child| child.to_predicate(ctx))),
            ProjectCriteria::Not(child) => child.to_predicate(ctx).not(),
            ProjectCriteria::OwnedByMe => match ctx.user_name() {
                Some(user) => owned_by(user),
                None => always(false),
            },
            ProjectCriteria::OwnedBy(user) => owned_by(user),
            ProjectCriteria::Name { value, contains: true } => contains_ci(Table::Projects, Column::Name, value),
            ProjectCriteria::Name { value, contains: false } => equals_ci(Table::Projects, Column::Name, value),
            ProjectCriteria::Description(value) => contains_ci(Table::Projects, Column::Description, value),
            ProjectCriteria::UpdateDate { op, value } => {
                compare(col(Table::Projects, Column::UpdateDate), *op, value.date)
            }
        }
    }
}

impl fmt::Display for ProjectCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectCriteria::And(children) => fmt_joined(f, children, "and"),
            ProjectCriteria::Or(children) => fmt_joined(f, children, "or"),
            ProjectCriteria::Not(child) => write!(f, "not({})", child),
            ProjectCriteria::OwnedByMe => write!(f, "{}", Operator::OwnedByMe),
            ProjectCriteria::OwnedBy(user) => write!(f, "{} {}", Operator::OwnedBy, quote(user)),
            ProjectCriteria::Name { value, contains } => {
                let op = if *contains { Operator::Contains } else { Operator::Is };
                fmt_field(f, NAME, op, value)
            }
            ProjectCriteria::Description(value) => fmt_field(f, DESCRIPTION, Operator::Contains, value),
            ProjectCriteria::UpdateDate { op, value } => {
                fmt_field(f, UPDATE_DATE, op.date_operator(), &value.text)
            }
        }
    }
}

pub struct ProjectQueryBuilder {
    validate: bool,
}

impl ProjectQueryBuilder {
    pub fn new(validate: bool) -> Self {
        Self { validate }
    }
}

impl CriteriaBuilder for ProjectQueryBuilder {
    type Criteria = ProjectCriteria;

    fn operator(&mut self, op: Operator) -> Result<ProjectCriteria, QueryError> {
        match op {
            Operator::OwnedByMe => Ok(ProjectCriteria::OwnedByMe),
            other => Err(QueryError::unsupported(other)),
        }
    }

    fn field_operator_value(&mut self, field: &str, op: Operator, value: &str) -> Result<ProjectCriteria, QueryError> {
        match (op, field) {
            (Operator::Is | Operator::Contains, NAME) => Ok(ProjectCriteria::Name {
                value: value.to_string(),
                contains: op == Operator::Contains,
            }),
            (Operator::Contains, DESCRIPTION) => Ok(ProjectCriteria::Description(value.to_string())),
            (Operator::IsBefore | Operator::IsAfter, UPDATE_DATE) => Ok(ProjectCriteria::UpdateDate {
                op: Comparison::of(op),
                value: DateLiteral::parse(value)?,
            }),
            (_, NAME | DESCRIPTION | UPDATE_DATE) => Err(QueryError::not_applicable(field, op)),
            _ => Err(QueryError::field_not_found(field)),
        }
    }

    fn operator_value(&mut self, op: Operator, value: &str) -> Result<ProjectCriteria, QueryError> {
        match op {
            Operator::OwnedBy => Ok(ProjectCriteria::OwnedBy(value.to_string())),
            other => Err(QueryError::unsupported(other)),
        }
    }

    fn order_field(&mut self, field: &str) -> Result<(), QueryError> {
        if self.validate && !ORDER_FIELDS.contains(&field) {
            return Err(QueryError::validation(format!("Can not order by field: {}", field)));
        }
        Ok(())
    }
}

pub type ProjectQuery = EntityQuery<ProjectCriteria>;

impl EntityQuery<ProjectCriteria> {
    /// Project queries reference no configurable fields, so `ctx` only scopes
    /// the call.
    pub fn parse(ctx: &ParseContext, text: Option<&str>, validate: bool) -> Result<Self, QueryError> {
        let mut builder = ProjectQueryBuilder::new(validate);
        let query = build_query(text, &mut builder)?;
        debug!("parsed project query: {} (scope {:?})", query, ctx.project);
        Ok(query)
    }

    pub fn to_select(&self, ctx: &MatchContext) -> SelectStatement {
        let orders: Vec<_> = self
            .sorts
            .iter()
            .filter_map(|sort| {
                let column = match sort.field.as_str() {
                    NAME => Column::Name,
                    UPDATE_DATE => Column::UpdateDate,
                    _ => return None,
                };
                Some((column, sort.direction))
            })
            .collect();
        predicate::select(Table::Projects, self.to_predicate(ctx), &orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssueSetting;
    use crate::context::MemoryRepository;
    use crate::model::User;
    use chrono::{TimeZone, Utc};
    use sea_query::PostgresQueryBuilder;
    use std::collections::HashSet;

    fn parse(text: &str) -> Result<ProjectQuery, QueryError> {
        let setting = IssueSetting::default();
        let repo = MemoryRepository::new();
        ProjectQuery::parse(&ParseContext::new(&setting, &repo), Some(text), true)
    }

    fn project(name: &str, owners: &[&str]) -> Project {
        Project {
            id: 1,
            name: name.to_string(),
            description: Some("Query engine".to_string()),
            owners: owners.iter().map(|owner| owner.to_string()).collect::<HashSet<_>>(),
            update_date: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_owned_by_me() {
        let setting = IssueSetting::default();
        let repo = MemoryRepository::new();
        let robin = User::new("robin");
        let ctx = MatchContext::new(&setting, &repo).with_user(&robin);
        let query = parse("owned by me").unwrap();
        assert!(query.needs_login());
        assert!(query.matches(&project("onedev", &["robin"]), &ctx));
        assert!(!query.matches(&project("onedev", &["alex"]), &ctx));
        assert!(!query.matches(&project("onedev", &["robin"]), &MatchContext::new(&setting, &repo)));
    }

    #[test]
    fn test_name_and_date() {
        let setting = IssueSetting::default();
        let repo = MemoryRepository::new();
        let ctx = MatchContext::new(&setting, &repo);
        let query = parse(r#""name" contains "DEV" and "update date" is after "2024-05-01""#).unwrap();
        assert!(query.matches(&project("onedev", &[]), &ctx));
        assert!(!query.matches(&project("tracker", &[]), &ctx));
        assert!(parse(r#""name" is "OneDev""#).unwrap().matches(&project("onedev", &[]), &ctx));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse(r#""owner" is "robin""#).unwrap_err(),
            QueryError::field_not_found("owner")
        );
        assert_eq!(
            parse(r#""description" is "x""#).unwrap_err(),
            QueryError::not_applicable("description", Operator::Is)
        );
        assert!(matches!(parse("submitted by me").unwrap_err(), QueryError::Syntax { .. }));
    }

    #[test]
    fn test_select() {
        let setting = IssueSetting::default();
        let repo = MemoryRepository::new();
        let ctx = MatchContext::new(&setting, &repo);
        let query = parse(r#"owned by "robin" order by "name" asc"#).unwrap();
        assert_eq!(query.to_string(), r#"owned by "robin" order by "name" asc"#);
        let sql = query.to_select(&ctx).to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#""projects"."id" IN (SELECT "project_owners"."project" FROM "project_owners""#), "{}", sql);
        assert!(sql.ends_with(r#"ORDER BY "projects"."name" ASC"#), "{}", sql);
    }
}
