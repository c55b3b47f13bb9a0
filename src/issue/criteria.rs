//! Typed issue criteria: evaluation, predicate compilation and rendering.

use crate::context::{MatchContext, Revision};
use crate::literal::{contains_ignore_case, parse_bool, parse_date, quote, DateLiteral, EntityReference};
use crate::model::{Build, CommitId, FieldValue, Issue};
use crate::predicate::{
    all, always, any, as_timestamp, col, compare, contains_ci, equals_ci, has_related, in_numbers,
    issue_field, issue_field_empty, Column, Comparison, Table,
};
use crate::query::{fmt_field, fmt_joined, Criteria};
use crate::token::Operator;
use chrono::Utc;
use sea_query::SimpleExpr;
use std::fmt;

pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const COMMENT: &str = "comment";
pub const STATE: &str = "state";
pub const STATUS: &str = "status";
pub const VOTE_COUNT: &str = "vote count";
pub const COMMENT_COUNT: &str = "comment count";
pub const NUMBER: &str = "number";
pub const MILESTONE: &str = "milestone";
pub const SUBMIT_DATE: &str = "submit date";
pub const UPDATE_DATE: &str = "update date";

/// Canonical name of a builtin issue field, accepting the `status` alias.
pub fn builtin_field(name: &str) -> Option<&'static str> {
    const ALL: [&str; 10] = [
        TITLE,
        DESCRIPTION,
        COMMENT,
        STATE,
        VOTE_COUNT,
        COMMENT_COUNT,
        NUMBER,
        MILESTONE,
        SUBMIT_DATE,
        UPDATE_DATE,
    ];
    if name == STATUS {
        return Some(STATE);
    }
    ALL.iter().copied().find(|builtin| *builtin == name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssueCriteria {
    And(Vec<IssueCriteria>),
    Or(Vec<IssueCriteria>),
    Not(Box<IssueCriteria>),

    SubmittedByMe,
    FixedInCurrentBuild,
    SubmittedBy(String),
    /// `build` is `None` when the reference could not be resolved
    FixedInBuild {
        value: String,
        build: Option<Build>,
    },
    /// Commits after `first` up to `second`, when both resolved. `project` is
    /// the project the revisions were resolved in, `None` for any project
    FixedBetween {
        first: Revision,
        second: Revision,
        project: Option<String>,
        commits: Option<(CommitId, CommitId)>,
    },

    Title(String),
    Description(String),
    Comment(String),
    /// `field` keeps the spelling used in the query, `state` or `status`
    State {
        field: String,
        value: String,
    },
    /// `None` for `"milestone" is empty`
    Milestone(Option<String>),
    VoteCount {
        op: Comparison,
        value: i64,
    },
    CommentCount {
        op: Comparison,
        value: i64,
    },
    Number {
        op: Comparison,
        value: i64,
    },
    SubmitDate {
        op: Comparison,
        value: DateLiteral,
    },
    UpdateDate {
        op: Comparison,
        value: DateLiteral,
    },

    DateField {
        field: String,
        op: Comparison,
        value: DateLiteral,
    },
    StringField {
        field: String,
        value: String,
        contains: bool,
    },
    /// `ordinal` is -1 until resolved against the field's choices
    ChoiceField {
        field: String,
        value: String,
        ordinal: i64,
        op: Operator,
    },
    NumericField {
        field: String,
        op: Comparison,
        value: i64,
    },
    BooleanField {
        field: String,
        value: bool,
    },
    /// Issue, build or pull request reference; `number` is `None` when unresolved
    ReferenceField {
        field: String,
        value: String,
        number: Option<i64>,
    },
    /// `is empty`, `is me`, `is current` or `is previous` on a custom field
    FieldOperator {
        field: String,
        op: Operator,
    },
}

fn reference_number(value: &FieldValue) -> Option<i64> {
    value
        .value
        .as_deref()
        .and_then(EntityReference::parse)
        .map(|reference| reference.number)
}

impl IssueCriteria {
    /// Custom field referenced by this leaf.
    pub fn custom_field(&self) -> Option<&str> {
        match self {
            IssueCriteria::DateField { field, .. }
            | IssueCriteria::StringField { field, .. }
            | IssueCriteria::ChoiceField { field, .. }
            | IssueCriteria::NumericField { field, .. }
            | IssueCriteria::BooleanField { field, .. }
            | IssueCriteria::ReferenceField { field, .. }
            | IssueCriteria::FieldOperator { field, .. } => Some(field),
            _ => None,
        }
    }

    pub(crate) fn custom_field_mut(&mut self) -> Option<&mut String> {
        match self {
            IssueCriteria::DateField { field, .. }
            | IssueCriteria::StringField { field, .. }
            | IssueCriteria::ChoiceField { field, .. }
            | IssueCriteria::NumericField { field, .. }
            | IssueCriteria::BooleanField { field, .. }
            | IssueCriteria::ReferenceField { field, .. }
            | IssueCriteria::FieldOperator { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Calls `f` on every leaf.
    pub fn visit<'s, F: FnMut(&'s IssueCriteria)>(&'s self, f: &mut F) {
        match self {
            IssueCriteria::And(children) | IssueCriteria::Or(children) => {
                for child in children {
                    child.visit(f);
                }
            }
            IssueCriteria::Not(child) => child.visit(f),
            leaf => f(leaf),
        }
    }

    pub fn visit_mut<F: FnMut(&mut IssueCriteria)>(&mut self, f: &mut F) {
        match self {
            IssueCriteria::And(children) | IssueCriteria::Or(children) => {
                for child in children {
                    child.visit_mut(f);
                }
            }
            IssueCriteria::Not(child) => child.visit_mut(f),
            leaf => f(leaf),
        }
    }

    /// Removes leaves for which `doomed` holds. `and` drops such children and
    /// collapses to its only survivor; `or` and `not` are lost with any doomed
    /// child. Returns true when this node as a whole has to go.
    pub fn prune<F: Fn(&IssueCriteria) -> bool>(&mut self, doomed: &F) -> bool {
        let survivor = match self {
            IssueCriteria::And(children) => {
                children.retain_mut(|child| !child.prune(doomed));
                match children.len() {
                    0 => return true,
                    1 => children.pop(),
                    _ => None,
                }
            }
            IssueCriteria::Or(children) => return children.iter_mut().any(|child| child.prune(doomed)),
            IssueCriteria::Not(child) => return child.prune(doomed),
            leaf => return doomed(&*leaf),
        };
        if let Some(survivor) = survivor {
            *self = survivor;
        }
        false
    }

    /// Ordinal of the criteria value, resolved against the current setting
    /// when it was not resolved at parse time.
    fn choice_ordinal(field: &str, value: &str, ordinal: i64, ctx: &MatchContext) -> i64 {
        if ordinal >= 0 {
            return ordinal;
        }
        ctx.setting
            .field_spec(field)
            .map_or(-1, |spec| spec.ordinal_of(value))
    }

    fn value_ordinal(field: &str, value: &FieldValue, ctx: &MatchContext) -> i64 {
        let resolved = match (ctx.setting.field_spec(field), value.value.as_deref()) {
            (Some(spec), Some(text)) => spec.ordinal_of(text),
            _ => -1,
        };
        if resolved >= 0 {
            resolved
        } else {
            value.ordinal
        }
    }
}

impl Criteria for IssueCriteria {
    type Entity = Issue;

    fn and_of(children: Vec<Self>) -> Self {
        IssueCriteria::And(children)
    }

    fn or_of(children: Vec<Self>) -> Self {
        IssueCriteria::Or(children)
    }

    fn not_of(child: Self) -> Self {
        IssueCriteria::Not(Box::new(child))
    }

    fn is_composite(&self) -> bool {
        matches!(self, IssueCriteria::And(_) | IssueCriteria::Or(_))
    }

    fn matches(&self, issue: &Issue, ctx: &MatchContext) -> bool {
        match self {
            IssueCriteria::And(children) => children.iter().all(|child| child.matches(issue, ctx)),
            IssueCriteria::Or(children) => children.iter().any(|child| child.matches(issue, ctx)),
            IssueCriteria::Not(child) => !child.matches(issue, ctx),

            IssueCriteria::SubmittedByMe => ctx
                .user_name()
                .is_some_and(|user| issue.submitter.as_deref() == Some(user)),
            IssueCriteria::FixedInCurrentBuild => ctx.build.is_some_and(|build| {
                build.project == issue.project
                    && ctx.index.fixed_issues_in_build(build).contains(&issue.number)
            }),
            IssueCriteria::SubmittedBy(user) => issue.submitter.as_deref() == Some(user.as_str()),
            IssueCriteria::FixedInBuild { build, .. } => build.as_ref().is_some_and(|build| {
                build.project == issue.project
                    && ctx.index.fixed_issues_in_build(build).contains(&issue.number)
            }),
            IssueCriteria::FixedBetween { project, commits, .. } => commits.as_ref().is_some_and(|(from, to)| {
                project.as_ref().map_or(true, |project| issue.project == *project)
                    && ctx
                        .index
                        .fixed_issues_between(project.as_deref(), from, to)
                        .contains(&issue.number)
            }),

            IssueCriteria::Title(value) => contains_ignore_case(&issue.title, value),
            IssueCriteria::Description(value) => issue
                .description
                .as_deref()
                .is_some_and(|description| contains_ignore_case(description, value)),
            IssueCriteria::Comment(value) => issue
                .comments
                .iter()
                .any(|comment| contains_ignore_case(comment, value)),
            IssueCriteria::State { value, .. } => issue.state == *value,
            IssueCriteria::Milestone(value) => issue.milestone == *value,
            IssueCriteria::VoteCount { op, value } => op.holds(issue.vote_count, *value),
            IssueCriteria::CommentCount { op, value } => op.holds(issue.comment_count(), *value),
            IssueCriteria::Number { op, value } => op.holds(issue.number, *value),
            IssueCriteria::SubmitDate { op, value } => op.holds(issue.submit_date, value.date),
            IssueCriteria::UpdateDate { op, value } => op.holds(issue.update_date, value.date),

            IssueCriteria::DateField { field, op, value } => {
                let now = Utc::now();
                issue.field_values(field).any(|field_value| {
                    field_value
                        .value
                        .as_deref()
                        .and_then(|text| parse_date(text, now))
                        .is_some_and(|date| op.holds(date, value.date))
                })
            }
            IssueCriteria::StringField {
                field,
                value,
                contains,
            } => issue.field_values(field).any(|field_value| {
                let text = field_value.value.as_deref().unwrap_or_default();
                if *contains {
                    contains_ignore_case(text, value)
                } else {
                    text.eq_ignore_ascii_case(value)
                }
            }),
            IssueCriteria::ChoiceField {
                field,
                value,
                ordinal,
                op,
            } => match op {
                Operator::IsLessThan | Operator::IsGreaterThan => {
                    let ordinal = Self::choice_ordinal(field, value, *ordinal, ctx);
                    if ordinal < 0 {
                        return false;
                    }
                    let op = if *op == Operator::IsLessThan {
                        Comparison::Less
                    } else {
                        Comparison::Greater
                    };
                    issue.field_values(field).any(|field_value| {
                        let actual = Self::value_ordinal(field, field_value, ctx);
                        actual >= 0 && op.holds(actual, ordinal)
                    })
                }
                _ => issue
                    .field_values(field)
                    .any(|field_value| field_value.value.as_deref() == Some(value.as_str())),
            },
            IssueCriteria::NumericField { field, op, value } => {
                issue.field_values(field).any(|field_value| {
                    let actual = field_value
                        .value
                        .as_deref()
                        .and_then(|text| text.trim().parse::<i64>().ok())
                        .unwrap_or(field_value.ordinal);
                    op.holds(actual, *value)
                })
            }
            IssueCriteria::BooleanField { field, value } => {
                let actual = issue
                    .field_values(field)
                    .any(|field_value| field_value.value.as_deref().is_some_and(parse_bool));
                actual == *value
            }
            IssueCriteria::ReferenceField { field, number, .. } => number.is_some_and(|number| {
                issue
                    .field_values(field)
                    .any(|field_value| reference_number(field_value) == Some(number))
            }),
            IssueCriteria::FieldOperator { field, op } => match op {
                Operator::IsEmpty => issue.field_values(field).next().is_none(),
                Operator::IsMe => ctx.user_name().is_some_and(|user| {
                    issue
                        .field_values(field)
                        .any(|field_value| field_value.value.as_deref() == Some(user))
                }),
                Operator::IsCurrent | Operator::IsPrevious => {
                    let target = ctx.build.and_then(|build| {
                        if *op == Operator::IsCurrent {
                            Some(build.number)
                        } else {
                            build.previous
                        }
                    });
                    target.is_some_and(|number| {
                        issue
                            .field_values(field)
                            .any(|field_value| reference_number(field_value) == Some(number))
                    })
                }
                _ => false,
            },
        }
    }

    fn needs_login(&self) -> bool {
        match self {
            IssueCriteria::And(children) | IssueCriteria::Or(children) => {
                children.iter().any(|child| child.needs_login())
            }
            IssueCriteria::Not(child) => child.needs_login(),
            IssueCriteria::SubmittedByMe => true,
            IssueCriteria::FieldOperator { op, .. } => *op == Operator::IsMe,
            _ => false,
        }
    }

    fn to_predicate(&self, ctx: &MatchContext) -> SimpleExpr {
        match self {
            IssueCriteria::And(children) => all(children.iter().map(|child| child.to_predicate(ctx))),
            IssueCriteria::Or(children) => any(children.iter().map(|child| child.to_predicate(ctx))),
            IssueCriteria::Not(child) => child.to_predicate(ctx).not(),

            IssueCriteria::SubmittedByMe => match ctx.user_name() {
                Some(user) => col(Table::Issues, Column::Submitter).eq(user),
                None => always(false),
            },
            IssueCriteria::FixedInCurrentBuild => match ctx.build {
                Some(build) => fixed_in(build, ctx),
                None => always(false),
            },
            IssueCriteria::SubmittedBy(user) => col(Table::Issues, Column::Submitter).eq(user.as_str()),
            IssueCriteria::FixedInBuild { build, .. } => match build {
                Some(build) => fixed_in(build, ctx),
                None => always(false),
            },
            IssueCriteria::FixedBetween { project, commits, .. } => match commits {
                Some((from, to)) => {
                    let numbers = in_numbers(
                        Table::Issues,
                        Column::Number,
                        &ctx.index.fixed_issues_between(project.as_deref(), from, to),
                    );
                    match project {
                        Some(project) => col(Table::Issues, Column::Project).eq(project.as_str()).and(numbers),
                        None => numbers,
                    }
                }
                None => always(false),
            },

            IssueCriteria::Title(value) => contains_ci(Table::Issues, Column::Title, value),
            IssueCriteria::Description(value) => contains_ci(Table::Issues, Column::Description, value),
            IssueCriteria::Comment(value) => has_related(
                Table::Issues,
                Table::IssueComments,
                Column::Issue,
                contains_ci(Table::IssueComments, Column::Content, value),
            ),
            IssueCriteria::State { value, .. } => col(Table::Issues, Column::State).eq(value.as_str()),
            IssueCriteria::Milestone(None) => col(Table::Issues, Column::Milestone).is_null(),
            IssueCriteria::Milestone(Some(value)) => {
                col(Table::Issues, Column::Milestone).eq(value.as_str())
            }
            IssueCriteria::VoteCount { op, value } => {
                compare(col(Table::Issues, Column::VoteCount), *op, *value)
            }
            IssueCriteria::CommentCount { op, value } => {
                compare(col(Table::Issues, Column::CommentCount), *op, *value)
            }
            IssueCriteria::Number { op, value } => compare(col(Table::Issues, Column::Number), *op, *value),
            IssueCriteria::SubmitDate { op, value } => {
                compare(col(Table::Issues, Column::SubmitDate), *op, value.date)
            }
            IssueCriteria::UpdateDate { op, value } => {
                compare(col(Table::Issues, Column::UpdateDate), *op, value.date)
            }

            IssueCriteria::DateField { field, op, value } => issue_field(
                field,
                compare(as_timestamp(Table::IssueFields, Column::Value), *op, value.date),
            ),
            IssueCriteria::StringField {
                field,
                value,
                contains,
            } => {
                let condition = if *contains {
                    contains_ci(Table::IssueFields, Column::Value, value)
                } else {
                    equals_ci(Table::IssueFields, Column::Value, value)
                };
                issue_field(field, condition)
            }
            IssueCriteria::ChoiceField {
                field,
                value,
                ordinal,
                op,
            } => match op {
                Operator::IsLessThan | Operator::IsGreaterThan => {
                    let ordinal = Self::choice_ordinal(field, value, *ordinal, ctx);
                    if ordinal < 0 {
                        return always(false);
                    }
                    let op = if *op == Operator::IsLessThan {
                        Comparison::Less
                    } else {
                        Comparison::Greater
                    };
                    issue_field(field, compare(col(Table::IssueFields, Column::Ordinal), op, ordinal))
                }
                _ => issue_field(field, col(Table::IssueFields, Column::Value).eq(value.as_str())),
            },
            IssueCriteria::NumericField { field, op, value } => {
                issue_field(field, compare(col(Table::IssueFields, Column::Ordinal), *op, *value))
            }
            IssueCriteria::BooleanField { field, value } => {
                let set = issue_field(field, equals_ci(Table::IssueFields, Column::Value, "true"));
                if *value {
                    set
                } else {
                    set.not()
                }
            }
            IssueCriteria::ReferenceField { field, number, .. } => match number {
                Some(number) => {
                    issue_field(field, col(Table::IssueFields, Column::Ordinal).eq(*number))
                }
                None => always(false),
            },
            IssueCriteria::FieldOperator { field, op } => match op {
                Operator::IsEmpty => issue_field_empty(field),
                Operator::IsMe => match ctx.user_name() {
                    Some(user) => issue_field(field, col(Table::IssueFields, Column::Value).eq(user)),
                    None => always(false),
                },
                Operator::IsCurrent | Operator::IsPrevious => {
                    let target = ctx.build.and_then(|build| {
                        if *op == Operator::IsCurrent {
                            Some(build.number)
                        } else {
                            build.previous
                        }
                    });
                    match target {
                        Some(number) => {
                            issue_field(field, col(Table::IssueFields, Column::Ordinal).eq(number))
                        }
                        None => always(false),
                    }
                }
                _ => always(false),
            },
        }
    }
}

fn fixed_in(build: &Build, ctx: &MatchContext) -> SimpleExpr {
    col(Table::Issues, Column::Project)
        .eq(build.project.as_str())
        .and(in_numbers(
            Table::Issues,
            Column::Number,
            &ctx.index.fixed_issues_in_build(build),
        ))
}

impl fmt::Display for IssueCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueCriteria::And(children) => fmt_joined(f, children, "and"),
            IssueCriteria::Or(children) => fmt_joined(f, children, "or"),
            IssueCriteria::Not(child) => write!(f, "not({})", child),

            IssueCriteria::SubmittedByMe => write!(f, "{}", Operator::SubmittedByMe),
            IssueCriteria::FixedInCurrentBuild => write!(f, "{}", Operator::FixedInCurrentBuild),
            IssueCriteria::SubmittedBy(user) => write!(f, "{} {}", Operator::SubmittedBy, quote(user)),
            IssueCriteria::FixedInBuild { value, .. } => {
                write!(f, "{} {}", Operator::FixedInBuild, quote(value))
            }
            IssueCriteria::FixedBetween { first, second, .. } => write!(
                f,
                "{} {} {} and {} {}",
                Operator::FixedBetween,
                first.kind,
                quote(&first.value),
                second.kind,
                quote(&second.value)
            ),

            IssueCriteria::Title(value) => fmt_field(f, TITLE, Operator::Contains, value),
            IssueCriteria::Description(value) => fmt_field(f, DESCRIPTION, Operator::Contains, value),
            IssueCriteria::Comment(value) => fmt_field(f, COMMENT, Operator::Contains, value),
            IssueCriteria::State { field, value } => fmt_field(f, field, Operator::Is, value),
            IssueCriteria::Milestone(None) => write!(f, "{} {}", quote(MILESTONE), Operator::IsEmpty),
            IssueCriteria::Milestone(Some(value)) => fmt_field(f, MILESTONE, Operator::Is, value),
            IssueCriteria::VoteCount { op, value } => {
                fmt_field(f, VOTE_COUNT, op.number_operator(), &value.to_string())
            }
            IssueCriteria::CommentCount { op, value } => {
                fmt_field(f, COMMENT_COUNT, op.number_operator(), &value.to_string())
            }
            IssueCriteria::Number { op, value } => {
                fmt_field(f, NUMBER, op.number_operator(), &value.to_string())
            }
            IssueCriteria::SubmitDate { op, value } => {
                fmt_field(f, SUBMIT_DATE, op.date_operator(), &value.text)
            }
            IssueCriteria::UpdateDate { op, value } => {
                fmt_field(f, UPDATE_DATE, op.date_operator(), &value.text)
            }

            IssueCriteria::DateField { field, op, value } => {
                fmt_field(f, field, op.date_operator(), &value.text)
            }
            IssueCriteria::StringField {
                field,
                value,
                contains,
            } => {
                let op = if *contains { Operator::Contains } else { Operator::Is };
                fmt_field(f, field, op, value)
            }
            IssueCriteria::ChoiceField { field, value, op, .. } => fmt_field(f, field, *op, value),
            IssueCriteria::NumericField { field, op, value } => {
                fmt_field(f, field, op.number_operator(), &value.to_string())
            }
            IssueCriteria::BooleanField { field, value } => {
                fmt_field(f, field, Operator::Is, &value.to_string())
            }
            IssueCriteria::ReferenceField { field, value, .. } => fmt_field(f, field, Operator::Is, value),
            IssueCriteria::FieldOperator { field, op } => write!(f, "{} {}", quote(field), op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssueSetting;
    use crate::context::MemoryRepository;
    use crate::model::User;
    use chrono::TimeZone;

    fn issue() -> Issue {
        Issue {
            id: 1,
            project: "demo".to_string(),
            number: 7,
            title: "Crash on startup".to_string(),
            description: Some("Happens after upgrade".to_string()),
            comments: vec!["Cannot reproduce".to_string()],
            state: "Open".to_string(),
            milestone: None,
            submitter: Some("robin".to_string()),
            submit_date: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            update_date: Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap(),
            vote_count: 3,
            fields: vec![
                FieldValue {
                    name: "Priority".to_string(),
                    value: Some("High".to_string()),
                    ordinal: 2,
                },
                FieldValue {
                    name: "Labels".to_string(),
                    value: Some("ui".to_string()),
                    ordinal: 0,
                },
                FieldValue {
                    name: "Labels".to_string(),
                    value: Some("docs".to_string()),
                    ordinal: 2,
                },
                FieldValue {
                    name: "Assignee".to_string(),
                    value: Some("robin".to_string()),
                    ordinal: -1,
                },
            ],
        }
    }

    fn title(value: &str) -> IssueCriteria {
        IssueCriteria::Title(value.to_string())
    }

    #[test]
    fn test_boolean_identity() {
        let setting = IssueSetting::demo();
        let repo = MemoryRepository::new();
        let ctx = MatchContext::new(&setting, &repo);
        let issue = issue();

        assert!(IssueCriteria::And(vec![]).matches(&issue, &ctx));
        assert!(!IssueCriteria::Or(vec![]).matches(&issue, &ctx));
        for criteria in [title("crash"), title("nothing")] {
            let double = IssueCriteria::not_of(IssueCriteria::not_of(criteria.clone()));
            assert_eq!(double.matches(&issue, &ctx), criteria.matches(&issue, &ctx));
        }
    }

    #[test]
    fn test_submitted_by_me_needs_user() {
        let setting = IssueSetting::demo();
        let repo = MemoryRepository::new();
        let robin = User::new("robin");
        let anonymous = MatchContext::new(&setting, &repo);
        let logged_in = anonymous.with_user(&robin);

        assert!(!IssueCriteria::SubmittedByMe.matches(&issue(), &anonymous));
        assert!(IssueCriteria::SubmittedByMe.matches(&issue(), &logged_in));
        assert!(IssueCriteria::SubmittedByMe.needs_login());
        assert!(IssueCriteria::Not(Box::new(IssueCriteria::SubmittedByMe)).needs_login());
    }

    #[test]
    fn test_choice_comparison_uses_ordinals() {
        let setting = IssueSetting::demo();
        let repo = MemoryRepository::new();
        let ctx = MatchContext::new(&setting, &repo);
        let greater = |value: &str, ordinal: i64| IssueCriteria::ChoiceField {
            field: "Priority".to_string(),
            value: value.to_string(),
            ordinal,
            op: Operator::IsGreaterThan,
        };

        assert!(greater("Normal", 1).matches(&issue(), &ctx));
        assert!(!greater("Critical", 3).matches(&issue(), &ctx));
        // unresolved ordinal is looked up at evaluation time
        assert!(greater("Low", -1).matches(&issue(), &ctx));
        assert!(!greater("Removed", -1).matches(&issue(), &ctx));
    }

    #[test]
    fn test_multi_value_choice_contains() {
        let setting = IssueSetting::demo();
        let repo = MemoryRepository::new();
        let ctx = MatchContext::new(&setting, &repo);
        let contains = |value: &str| IssueCriteria::ChoiceField {
            field: "Labels".to_string(),
            value: value.to_string(),
            ordinal: -1,
            op: Operator::Contains,
        };
        assert!(contains("docs").matches(&issue(), &ctx));
        assert!(!contains("backend").matches(&issue(), &ctx));
    }

    #[test]
    fn test_prune_collapses_and() {
        let mut criteria = IssueCriteria::And(vec![
            title("a"),
            IssueCriteria::State {
                field: STATE.to_string(),
                value: "Open".to_string(),
            },
        ]);
        let removed = criteria.prune(&|leaf| matches!(leaf, IssueCriteria::State { .. }));
        assert!(!removed);
        assert_eq!(criteria, title("a"));

        let mut criteria = IssueCriteria::Or(vec![title("a"), title("b")]);
        assert!(criteria.prune(&|leaf| *leaf == title("b")));
    }

    #[test]
    fn test_render() {
        let criteria = IssueCriteria::And(vec![
            IssueCriteria::Or(vec![title("x"), IssueCriteria::Milestone(None)]),
            IssueCriteria::not_of(IssueCriteria::SubmittedBy("ro\"bin".to_string())),
            IssueCriteria::VoteCount {
                op: Comparison::Greater,
                value: 2,
            },
        ]);
        assert_eq!(
            criteria.to_string(),
            r#"("title" contains "x" or "milestone" is empty) and not(submitted by "ro\"bin") and "vote count" is greater than "2""#
        );
    }
}
