//! Pull request queries.
//!
//! Pull requests have no configurable fields, so every field name must be one
//! of the builtins below whether or not validation is requested.

use crate::context::{MatchContext, ParseContext, Revision};
use crate::error::QueryError;
use crate::literal::{contains_ignore_case, parse_int, quote, DateLiteral};
use crate::model::{CommitId, PullRequest, PullRequestStatus};
use crate::predicate::{
    self, all, always, any, col, compare, contains_ci, has_related, in_numbers, Column, Comparison,
    Table,
};
use crate::query::{build_query, fmt_field, fmt_joined, Criteria, CriteriaBuilder, EntityQuery};
use crate::token::{Operator, RevisionKind};
use log::{debug, warn};
use sea_query::{SelectStatement, SimpleExpr};
use std::fmt;

pub const NUMBER: &str = "number";
pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const COMMENT: &str = "comment";
pub const SOURCE_BRANCH: &str = "source branch";
pub const TARGET_BRANCH: &str = "target branch";
pub const SUBMIT_DATE: &str = "submit date";
pub const UPDATE_DATE: &str = "update date";
pub const COMMENT_COUNT: &str = "comment count";

pub const ORDER_FIELDS: [&str; 4] = [NUMBER, SUBMIT_DATE, UPDATE_DATE, COMMENT_COUNT];

#[derive(Debug, Clone, PartialEq)]
pub enum PullRequestCriteria {
    And(Vec<PullRequestCriteria>),
    Or(Vec<PullRequestCriteria>),
    Not(Box<PullRequestCriteria>),
    Open,
    Merged,
    Discarded,
    SubmittedByMe,
    SubmittedBy(String),
    /// `commit` is `None` when the revision could not be resolved. `project`
    /// is the target project it was resolved in, `None` for any project
    IncludesCommit {
        value: String,
        project: Option<String>,
        commit: Option<CommitId>,
    },
    Title(String),
    Description(String),
    Comment(String),
    SourceBranch(String),
    TargetBranch(String),
    Number { op: Comparison, value: i64 },
    CommentCount { op: Comparison, value: i64 },
    SubmitDate { op: Comparison, value: DateLiteral },
    UpdateDate { op: Comparison, value: DateLiteral },
}

impl PullRequestCriteria {
    fn status(&self) -> Option<PullRequestStatus> {
        match self {
            PullRequestCriteria::Open => Some(PullRequestStatus::Open),
            PullRequestCriteria::Merged => Some(PullRequestStatus::Merged),
            PullRequestCriteria::Discarded => Some(PullRequestStatus::Discarded),
            _ => None,
        }
    }
}

fn status_name(status: PullRequestStatus) -> &'static str {
    match status {
        PullRequestStatus::Open => "open",
        PullRequestStatus::Merged => "merged",
        PullRequestStatus::Discarded => "discarded",
    }
}

impl Criteria for PullRequestCriteria {
    type Entity = PullRequest;

    fn and_of(children: Vec<Self>) -> Self {
        PullRequestCriteria::And(children)
    }

    fn or_of(children: Vec<Self>) -> Self {
        PullRequestCriteria::Or(children)
    }

    fn not_of(child: Self) -> Self {
        PullRequestCriteria::Not(Box::new(child))
    }

    fn is_composite(&self) -> bool {
        matches!(self, PullRequestCriteria::And(_) | PullRequestCriteria::Or(_))
    }

    fn matches(&self, request: &PullRequest, ctx: &MatchContext) -> bool {
        match self {
            PullRequestCriteria::And(children) => children.iter().all(|child| child.matches(request, ctx)),
            PullRequestCriteria::Or(children) => children.iter().any(|child| child.matches(request, ctx)),
            PullRequestCriteria::Not(child) => !child.matches(request, ctx),
            PullRequestCriteria::Open | PullRequestCriteria::Merged | PullRequestCriteria::Discarded => {
                self.status() == Some(request.status)
            }
            PullRequestCriteria::SubmittedByMe => ctx
                .user_name()
                .is_some_and(|user| request.submitter.as_deref() == Some(user)),
            PullRequestCriteria::SubmittedBy(user) => request.submitter.as_deref() == Some(user.as_str()),
            PullRequestCriteria::IncludesCommit { project, commit, .. } => commit.as_ref().is_some_and(|commit| {
                project.as_ref().map_or(true, |project| request.project == *project)
                    && ctx
                        .index
                        .pull_requests_including(project.as_deref(), commit)
                        .contains(&request.id)
            }),
            PullRequestCriteria::Title(value) => contains_ignore_case(&request.title, value),
            PullRequestCriteria::Description(value) => request
                .description
                .as_deref()
                .is_some_and(|description| contains_ignore_case(description, value)),
            PullRequestCriteria::Comment(value) => request
                .comments
                .iter()
                .any(|comment| contains_ignore_case(comment, value)),
            PullRequestCriteria::SourceBranch(value) => request.source_branch == *value,
            PullRequestCriteria::TargetBranch(value) => request.target_branch == *value,
            PullRequestCriteria::Number { op, value } => op.holds(request.number, *value),
            PullRequestCriteria::CommentCount { op, value } => op.holds(request.comment_count(), *value),
            PullRequestCriteria::SubmitDate { op, value } => op.holds(request.submit_date, value.date),
            PullRequestCriteria::UpdateDate { op, value } => op.holds(request.update_date, value.date),
        }
    }

    fn needs_login(&self) -> bool {
        match self {
            PullRequestCriteria::And(children) | PullRequestCriteria::Or(children) => {
                children.iter().any(|child| child.needs_login())
            }
            PullRequestCriteria::Not(child) => child.needs_login(),
            PullRequestCriteria::SubmittedByMe => true,
            _ => false,
        }
    }

    fn to_predicate(&self, ctx: &MatchContext) -> SimpleExpr {
        match self {
            PullRequestCriteria::And(children) => all(children.iter().map(|child| child.to_predicate(ctx))),
            PullRequestCriteria::Or(children) => any(children.iter().map(|child| child.to_predicate(ctx))),
            PullRequestCriteria::Not(child) => child.to_predicate(ctx).not(),
            PullRequestCriteria::Open | PullRequestCriteria::Merged | PullRequestCriteria::Discarded => {
                match self.status() {
                    Some(status) => col(Table::PullRequests, Column::Status).eq(status_name(status)),
                    None => always(false),
                }
            }
            PullRequestCriteria::SubmittedByMe => match ctx.user_name() {
                Some(user) => col(Table::PullRequests, Column::Submitter).eq(user),
                None => always(false),
            },
            PullRequestCriteria::SubmittedBy(user) => {
                col(Table::PullRequests, Column::Submitter).eq(user.as_str())
            }
            PullRequestCriteria::IncludesCommit { project, commit, .. } => match commit {
                Some(commit) => {
                    let ids = in_numbers(
                        Table::PullRequests,
                        Column::Id,
                        &ctx.index.pull_requests_including(project.as_deref(), commit),
                    );
                    match project {
                        Some(project) => col(Table::PullRequests, Column::Project).eq(project.as_str()).and(ids),
                        None => ids,
                    }
                }
                None => always(false),
            },
            PullRequestCriteria::Title(value) => contains_ci(Table::PullRequests, Column::Title, value),
            PullRequestCriteria::Description(value) => {
                contains_ci(Table::PullRequests, Column::Description, value)
            }
            PullRequestCriteria::Comment(value) => has_related(
                Table::PullRequests,
                Table::PullRequestComments,
                Column::PullRequest,
                contains_ci(Table::PullRequestComments, Column::Content, value),
            ),
            PullRequestCriteria::SourceBranch(value) => {
                col(Table::PullRequests, Column::SourceBranch).eq(value.as_str())
            }
            PullRequestCriteria::TargetBranch(value) => {
                col(Table::PullRequests, Column::TargetBranch).eq(value.as_str())
            }
            PullRequestCriteria::Number { op, value } => {
                compare(col(Table::PullRequests, Column::Number), *op, *value)
            }
            PullRequestCriteria::CommentCount { op, value } => {
                compare(col(Table::PullRequests, Column::CommentCount), *op, *value)
            }
            PullRequestCriteria::SubmitDate { op, value } => {
                compare(col(Table::PullRequests, Column::SubmitDate), *op, value.date)
            }
            PullRequestCriteria::UpdateDate { op, value } => {
                compare(col(Table::PullRequests, Column::UpdateDate), *op, value.date)
            }
        }
    }
}

impl fmt::Display for PullRequestCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullRequestCriteria::And(children) => fmt_joined(f, children, "and"),
            PullRequestCriteria::Or(children) => fmt_joined(f, children, "or"),
            PullRequestCriteria::Not(child) => write!(f, "not({})", child),
            PullRequestCriteria::Open => write!(f, "{}", Operator::Open),
            PullRequestCriteria::Merged => write!(f, "{}", Operator::Merged),
            PullRequestCriteria::Discarded => write!(f, "{}", Operator::Discarded),
            PullRequestCriteria::SubmittedByMe => write!(f, "{}", Operator::SubmittedByMe),
            PullRequestCriteria::SubmittedBy(user) => write!(f, "{} {}", Operator::SubmittedBy, quote(user)),
            PullRequestCriteria::IncludesCommit { value, .. } => {
                write!(f, "{} {}", Operator::IncludesCommit, quote(value))
            }
            PullRequestCriteria::Title(value) => fmt_field(f, TITLE, Operator::Contains, value),
            PullRequestCriteria::Description(value) => fmt_field(f, DESCRIPTION, Operator::Contains, value),
            PullRequestCriteria::Comment(value) => fmt_field(f, COMMENT, Operator::Contains, value),
            PullRequestCriteria::SourceBranch(value) => fmt_field(f, SOURCE_BRANCH, Operator::Is, value),
            PullRequestCriteria::TargetBranch(value) => fmt_field(f, TARGET_BRANCH, Operator::Is, value),
            PullRequestCriteria::Number { op, value } => {
                fmt_field(f, NUMBER, op.number_operator(), &value.to_string())
            }
            PullRequestCriteria::CommentCount { op, value } => {
                fmt_field(f, COMMENT_COUNT, op.number_operator(), &value.to_string())
            }
            PullRequestCriteria::SubmitDate { op, value } => {
                fmt_field(f, SUBMIT_DATE, op.date_operator(), &value.text)
            }
            PullRequestCriteria::UpdateDate { op, value } => {
                fmt_field(f, UPDATE_DATE, op.date_operator(), &value.text)
            }
        }
    }
}

pub struct PullRequestQueryBuilder<'a> {
    ctx: ParseContext<'a>,
    validate: bool,
}

impl<'a> PullRequestQueryBuilder<'a> {
    pub fn new(ctx: ParseContext<'a>, validate: bool) -> Self {
        Self { ctx, validate }
    }
}

impl CriteriaBuilder for PullRequestQueryBuilder<'_> {
    type Criteria = PullRequestCriteria;

    fn operator(&mut self, op: Operator) -> Result<PullRequestCriteria, QueryError> {
        match op {
            Operator::Open => Ok(PullRequestCriteria::Open),
            Operator::Merged => Ok(PullRequestCriteria::Merged),
            Operator::Discarded => Ok(PullRequestCriteria::Discarded),
            Operator::SubmittedByMe => Ok(PullRequestCriteria::SubmittedByMe),
            other => Err(QueryError::unsupported(other)),
        }
    }

    fn field_operator_value(&mut self, field: &str, op: Operator, value: &str) -> Result<PullRequestCriteria, QueryError> {
        let number = |value: &str| parse_int(value.trim().trim_start_matches('#'));
        let criteria = match (op, field) {
            (Operator::Contains, TITLE) => PullRequestCriteria::Title(value.to_string()),
            (Operator::Contains, DESCRIPTION) => PullRequestCriteria::Description(value.to_string()),
            (Operator::Contains, COMMENT) => PullRequestCriteria::Comment(value.to_string()),
            (Operator::Is, SOURCE_BRANCH) => PullRequestCriteria::SourceBranch(value.to_string()),
            (Operator::Is, TARGET_BRANCH) => PullRequestCriteria::TargetBranch(value.to_string()),
            (Operator::Is | Operator::IsLessThan | Operator::IsGreaterThan, NUMBER) => {
                PullRequestCriteria::Number {
                    op: Comparison::of(op),
                    value: number(value)?,
                }
            }
            (Operator::Is | Operator::IsLessThan | Operator::IsGreaterThan, COMMENT_COUNT) => {
                PullRequestCriteria::CommentCount {
                    op: Comparison::of(op),
                    value: parse_int(value)?,
                }
            }
            (Operator::IsBefore | Operator::IsAfter, SUBMIT_DATE) => PullRequestCriteria::SubmitDate {
                op: Comparison::of(op),
                value: DateLiteral::parse(value)?,
            },
            (Operator::IsBefore | Operator::IsAfter, UPDATE_DATE) => PullRequestCriteria::UpdateDate {
                op: Comparison::of(op),
                value: DateLiteral::parse(value)?,
            },
            (
                _,
                TITLE | DESCRIPTION | COMMENT | SOURCE_BRANCH | TARGET_BRANCH | NUMBER | COMMENT_COUNT
                | SUBMIT_DATE | UPDATE_DATE,
            ) => return Err(QueryError::not_applicable(field, op)),
            _ => return Err(QueryError::field_not_found(field)),
        };
        Ok(criteria)
    }

    fn operator_value(&mut self, op: Operator, value: &str) -> Result<PullRequestCriteria, QueryError> {
        match op {
            Operator::SubmittedBy => Ok(PullRequestCriteria::SubmittedBy(value.to_string())),
            Operator::IncludesCommit => {
                let revision = Revision::new(RevisionKind::Commit, value);
                let commit = match self.ctx.resolver.resolve_commit(self.ctx.project, &revision) {
                    Some(commit) => Some(commit),
                    None if self.validate => {
                        return Err(QueryError::validation(format!("Unable to find commit: {}", value)))
                    }
                    None => {
                        warn!("Unable to find commit: {}", value);
                        None
                    }
                };
                Ok(PullRequestCriteria::IncludesCommit {
                    value: value.to_string(),
                    project: self.ctx.project.map(str::to_string),
                    commit,
                })
            }
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

pub type PullRequestQuery = EntityQuery<PullRequestCriteria>;

fn sort_column(field: &str) -> Option<Column> {
    match field {
        NUMBER => Some(Column::Number),
        SUBMIT_DATE => Some(Column::SubmitDate),
        UPDATE_DATE => Some(Column::UpdateDate),
        COMMENT_COUNT => Some(Column::CommentCount),
        _ => None,
    }
}

impl EntityQuery<PullRequestCriteria> {
    pub fn parse(ctx: &ParseContext, text: Option<&str>, validate: bool) -> Result<Self, QueryError> {
        let mut builder = PullRequestQueryBuilder::new(*ctx, validate);
        let query = build_query(text, &mut builder)?;
        debug!("parsed pull request query: {}", query);
        Ok(query)
    }

    pub fn to_select(&self, ctx: &MatchContext) -> SelectStatement {
        let orders: Vec<_> = self
            .sorts
            .iter()
            .filter_map(|sort| sort_column(&sort.field).map(|column| (column, sort.direction)))
            .collect();
        predicate::select(Table::PullRequests, self.to_predicate(ctx), &orders)
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

    fn repository() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.add_commit("0a1b2c", &[])
            .add_commit("3d4e5f", &[])
            .add_pull_request_commit(1, "0a1b2c")
            .add_pull_request_commit(2, "3d4e5f");
        repo
    }

    fn parse_with(text: &str, validate: bool) -> Result<PullRequestQuery, QueryError> {
        let setting = IssueSetting::default();
        let repo = repository();
        PullRequestQuery::parse(&ParseContext::new(&setting, &repo), Some(text), validate)
    }

    fn request(id: i64, title: &str, status: PullRequestStatus) -> PullRequest {
        PullRequest {
            id,
            project: "demo".to_string(),
            number: id,
            title: title.to_string(),
            description: None,
            comments: vec!["looks good".to_string()],
            status,
            submitter: Some("robin".to_string()),
            source_branch: format!("feature-{}", id),
            target_branch: "main".to_string(),
            submit_date: Utc.with_ymd_and_hms(2024, 4, id as u32, 0, 0, 0).unwrap(),
            update_date: Utc.with_ymd_and_hms(2024, 4, id as u32, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_status_operators() {
        let setting = IssueSetting::default();
        let repo = repository();
        let ctx = MatchContext::new(&setting, &repo);
        let requests = [
            request(1, "Add parser", PullRequestStatus::Open),
            request(2, "Fix lexer", PullRequestStatus::Merged),
            request(3, "Drop REPL", PullRequestStatus::Discarded),
        ];
        let query = parse_with("open or discarded", true).unwrap();
        let matched: Vec<i64> = requests
            .iter()
            .filter(|request| query.matches(request, &ctx))
            .map(|request| request.id)
            .collect();
        assert_eq!(matched, vec![1, 3]);
    }

    #[test]
    fn test_includes_commit() {
        let setting = IssueSetting::default();
        let repo = repository();
        let ctx = MatchContext::new(&setting, &repo);
        let query = parse_with(r#"includes commit "3d4e""#, true).unwrap();
        assert!(query.matches(&request(2, "x", PullRequestStatus::Open), &ctx));
        assert!(!query.matches(&request(1, "x", PullRequestStatus::Open), &ctx));

        let sql = query.to_select(&ctx).to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#""pull_requests"."id" IN (2)"#), "{}", sql);

        let err = parse_with(r#"includes commit "ffff""#, true).unwrap_err();
        assert_eq!(err, QueryError::validation("Unable to find commit: ffff"));
        let lenient = parse_with(r#"includes commit "ffff""#, false).unwrap();
        assert!(!lenient.matches(&request(2, "x", PullRequestStatus::Open), &ctx));
    }

    #[test]
    fn test_includes_commit_is_scoped_to_project() {
        let setting = IssueSetting::default();
        let repo = repository();
        let parse_ctx = ParseContext::new(&setting, &repo).with_project("demo");
        let query = PullRequestQuery::parse(&parse_ctx, Some(r#"includes commit "3d4e""#), true).unwrap();

        let ctx = MatchContext::new(&setting, &repo);
        let mut elsewhere = request(2, "x", PullRequestStatus::Open);
        elsewhere.project = "other".to_string();
        assert!(query.matches(&request(2, "x", PullRequestStatus::Open), &ctx));
        assert!(!query.matches(&elsewhere, &ctx));

        let sql = query.to_select(&ctx).to_string(PostgresQueryBuilder);
        assert!(sql.contains(r#""pull_requests"."project" = 'demo'"#), "{}", sql);
        assert!(sql.contains(r#""pull_requests"."id" IN (2)"#), "{}", sql);
    }

    #[test]
    fn test_field_criteria() {
        let setting = IssueSetting::default();
        let repo = repository();
        let robin = User::new("robin");
        let ctx = MatchContext::new(&setting, &repo).with_user(&robin);
        let query = parse_with(
            r#""target branch" is "main" and "title" contains "PARSER" and "submit date" is before "2024-04-02" and submitted by me"#,
            true,
        )
        .unwrap();
        assert!(query.needs_login());
        assert!(query.matches(&request(1, "Add parser", PullRequestStatus::Open), &ctx));
        assert!(!query.matches(&request(2, "Add parser", PullRequestStatus::Open), &ctx));
    }

    #[test]
    fn test_unknown_and_inapplicable_fields() {
        assert_eq!(
            parse_with(r#""Priority" is "High""#, false).unwrap_err(),
            QueryError::field_not_found("Priority")
        );
        assert_eq!(
            parse_with(r#""title" is "x""#, false).unwrap_err(),
            QueryError::not_applicable("title", Operator::Is)
        );
        assert_eq!(
            parse_with(r#""title" is not "x""#, false).unwrap_err(),
            QueryError::not_applicable("title", Operator::IsNot)
        );
        assert!(matches!(
            parse_with("fixed in current build", true).unwrap_err(),
            QueryError::Syntax { .. }
        ));
    }

    #[test]
    fn test_render_round_trip() {
        let text = r#"(open or merged) and not("source branch" is "feature-1") and "comment count" is greater than "2" order by "update date" asc"#;
        let query = parse_with(text, true).unwrap();
        assert_eq!(query.to_string(), text);
        assert_eq!(parse_with(&query.to_string(), true).unwrap(), query);
    }

    #[test]
    fn test_order_fields() {
        assert!(parse_with(r#"order by "number""#, true).is_ok());
        assert_eq!(
            parse_with(r#"order by "title""#, true).unwrap_err().to_string(),
            "Can not order by field: title"
        );
    }
}
