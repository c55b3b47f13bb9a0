//! Turns parse tree leaves into issue criteria, validating each field and
//! operator combination against the issue setting.

use super::criteria::{
    builtin_field, IssueCriteria, COMMENT, COMMENT_COUNT, DESCRIPTION, MILESTONE, NUMBER, STATE,
    SUBMIT_DATE, TITLE, UPDATE_DATE, VOTE_COUNT,
};
use crate::config::{FieldSpec, FieldType};
use crate::context::{ParseContext, Revision};
use crate::error::QueryError;
use crate::literal::{parse_bool, parse_int, DateLiteral, EntityReference};
use crate::predicate::Comparison;
use crate::query::CriteriaBuilder;
use crate::token::Operator;
use log::warn;

/// Builtin fields an issue query may be ordered by.
pub const ORDER_FIELDS: [&str; 5] = [NUMBER, SUBMIT_DATE, UPDATE_DATE, VOTE_COUNT, COMMENT_COUNT];

/// What a field name in a query refers to.
#[derive(Debug, Clone, Copy)]
enum Target<'s> {
    Builtin(&'static str),
    Custom(&'s FieldSpec),
}

fn is_choice_like(field_type: FieldType) -> bool {
    matches!(
        field_type,
        FieldType::Choice | FieldType::UserChoice | FieldType::GroupChoice
    )
}

/// Whether `op` may be applied to `target`.
fn applicable(target: Target, op: Operator) -> bool {
    match (op, target) {
        (Operator::IsEmpty, Target::Builtin(field)) => field == MILESTONE,
        (Operator::IsEmpty, Target::Custom(_)) => true,
        (Operator::IsMe, Target::Custom(spec)) => spec.field_type == FieldType::UserChoice,
        (Operator::IsCurrent | Operator::IsPrevious, Target::Custom(spec)) => {
            spec.field_type == FieldType::BuildChoice
        }
        (Operator::IsBefore | Operator::IsAfter, Target::Builtin(field)) => {
            field == SUBMIT_DATE || field == UPDATE_DATE
        }
        (Operator::IsBefore | Operator::IsAfter, Target::Custom(spec)) => {
            spec.field_type == FieldType::Date
        }
        (Operator::Contains, Target::Builtin(field)) => matches!(field, TITLE | DESCRIPTION | COMMENT),
        (Operator::Contains, Target::Custom(spec)) => {
            spec.field_type == FieldType::Text || (spec.allow_multiple && is_choice_like(spec.field_type))
        }
        (Operator::Is | Operator::IsNot, Target::Builtin(field)) => {
            matches!(field, STATE | MILESTONE | VOTE_COUNT | COMMENT_COUNT | NUMBER)
        }
        (Operator::Is | Operator::IsNot, Target::Custom(spec)) => spec.field_type != FieldType::Date,
        (Operator::IsLessThan | Operator::IsGreaterThan, Target::Builtin(field)) => {
            matches!(field, VOTE_COUNT | COMMENT_COUNT | NUMBER)
        }
        (Operator::IsLessThan | Operator::IsGreaterThan, Target::Custom(spec)) => {
            matches!(spec.field_type, FieldType::Number | FieldType::Choice)
        }
        _ => false,
    }
}

pub struct IssueQueryBuilder<'a> {
    ctx: ParseContext<'a>,
    validate: bool,
}

impl<'a> IssueQueryBuilder<'a> {
    pub fn new(ctx: ParseContext<'a>, validate: bool) -> Self {
        Self { ctx, validate }
    }

    fn target(&self, field: &str) -> Option<Target<'a>> {
        match builtin_field(field) {
            Some(builtin) => Some(Target::Builtin(builtin)),
            None => self.ctx.setting.field_spec(field).map(Target::Custom),
        }
    }

    /// Fails unless `field` exists and supports `op`.
    pub fn check_field(&self, field: &str, op: Operator) -> Result<(), QueryError> {
        let target = self
            .target(field)
            .ok_or_else(|| QueryError::field_not_found(field))?;
        if applicable(target, op) {
            Ok(())
        } else {
            Err(QueryError::not_applicable(field, op))
        }
    }

    /// Resolves against the field's choices only when validating; stale values
    /// are rejected then and left at -1 otherwise.
    fn choice_ordinal(&self, field: &str, spec: Option<&FieldSpec>, value: &str) -> Result<i64, QueryError> {
        let Some(spec) = spec.filter(|spec| spec.field_type == FieldType::Choice) else {
            return Ok(-1);
        };
        if !self.validate {
            return Ok(-1);
        }
        match spec.ordinal_of(value) {
            -1 => Err(QueryError::undefined_value(field, value)),
            ordinal => Ok(ordinal),
        }
    }

    fn choice(&self, field: &str, spec: Option<&FieldSpec>, op: Operator, value: &str) -> Result<IssueCriteria, QueryError> {
        Ok(IssueCriteria::ChoiceField {
            field: field.to_string(),
            value: value.to_string(),
            ordinal: self.choice_ordinal(field, spec, value)?,
            op,
        })
    }

    /// Unresolved references fail when validating and match nothing otherwise.
    fn unresolved<T>(&self, message: String) -> Result<Option<T>, QueryError> {
        if self.validate {
            Err(QueryError::validation(message))
        } else {
            warn!("{}", message);
            Ok(None)
        }
    }

    fn reference(&self, spec: &FieldSpec, value: &str) -> Result<IssueCriteria, QueryError> {
        let number = match EntityReference::parse(value) {
            Some(reference) if spec.field_type == FieldType::BuildChoice => {
                match self.ctx.resolver.find_build(self.ctx.project, &reference) {
                    Some(build) => Some(build.number),
                    None => self.unresolved(format!("Unable to find build: {}", value))?,
                }
            }
            Some(reference) => Some(reference.number),
            None => self.unresolved(format!("Invalid reference: {}", value))?,
        };
        Ok(IssueCriteria::ReferenceField {
            field: spec.name.clone(),
            value: value.to_string(),
            number,
        })
    }

    fn number(value: &str) -> Result<i64, QueryError> {
        parse_int(value.trim().trim_start_matches('#'))
    }
}

impl CriteriaBuilder for IssueQueryBuilder<'_> {
    type Criteria = IssueCriteria;

    fn operator(&mut self, op: Operator) -> Result<IssueCriteria, QueryError> {
        match op {
            Operator::SubmittedByMe => Ok(IssueCriteria::SubmittedByMe),
            Operator::FixedInCurrentBuild => Ok(IssueCriteria::FixedInCurrentBuild),
            other => Err(QueryError::unsupported(other)),
        }
    }

    fn field_operator(&mut self, field: &str, op: Operator) -> Result<IssueCriteria, QueryError> {
        if self.validate {
            self.check_field(field, op)?;
        }
        match op {
            Operator::IsEmpty if builtin_field(field) == Some(MILESTONE) => Ok(IssueCriteria::Milestone(None)),
            Operator::IsEmpty | Operator::IsMe | Operator::IsCurrent | Operator::IsPrevious => {
                Ok(IssueCriteria::FieldOperator {
                    field: field.to_string(),
                    op,
                })
            }
            other => Err(QueryError::unsupported(other)),
        }
    }

    fn field_operator_value(&mut self, field: &str, op: Operator, value: &str) -> Result<IssueCriteria, QueryError> {
        if self.validate {
            self.check_field(field, op)?;
        }
        let target = self.target(field);
        let spec = match target {
            Some(Target::Custom(spec)) => Some(spec),
            _ => None,
        };
        let owned = || (field.to_string(), value.to_string());

        let criteria = match op {
            Operator::IsBefore | Operator::IsAfter => {
                let op = Comparison::of(op);
                let value = DateLiteral::parse(value)?;
                match target {
                    Some(Target::Builtin(SUBMIT_DATE)) => IssueCriteria::SubmitDate { op, value },
                    Some(Target::Builtin(UPDATE_DATE)) => IssueCriteria::UpdateDate { op, value },
                    _ => IssueCriteria::DateField {
                        field: field.to_string(),
                        op,
                        value,
                    },
                }
            }
            Operator::Contains => match target {
                Some(Target::Builtin(TITLE)) => IssueCriteria::Title(value.to_string()),
                Some(Target::Builtin(DESCRIPTION)) => IssueCriteria::Description(value.to_string()),
                Some(Target::Builtin(COMMENT)) => IssueCriteria::Comment(value.to_string()),
                Some(Target::Custom(spec)) if spec.field_type == FieldType::Text => {
                    let (field, value) = owned();
                    IssueCriteria::StringField {
                        field,
                        value,
                        contains: true,
                    }
                }
                _ => self.choice(field, spec, op, value)?,
            },
            Operator::Is => match target {
                Some(Target::Builtin(STATE)) => {
                    if self.validate && !self.ctx.setting.has_state(value) {
                        return Err(QueryError::undefined_value(field, value));
                    }
                    let (field, value) = owned();
                    IssueCriteria::State { field, value }
                }
                Some(Target::Builtin(MILESTONE)) => IssueCriteria::Milestone(Some(value.to_string())),
                Some(Target::Builtin(VOTE_COUNT)) => IssueCriteria::VoteCount {
                    op: Comparison::Equal,
                    value: parse_int(value)?,
                },
                Some(Target::Builtin(COMMENT_COUNT)) => IssueCriteria::CommentCount {
                    op: Comparison::Equal,
                    value: parse_int(value)?,
                },
                Some(Target::Builtin(NUMBER)) => IssueCriteria::Number {
                    op: Comparison::Equal,
                    value: Self::number(value)?,
                },
                Some(Target::Custom(spec)) => match spec.field_type {
                    FieldType::IssueChoice | FieldType::BuildChoice | FieldType::PullRequestChoice => {
                        self.reference(spec, value)?
                    }
                    FieldType::Boolean => IssueCriteria::BooleanField {
                        field: field.to_string(),
                        value: parse_bool(value),
                    },
                    FieldType::Number => IssueCriteria::NumericField {
                        field: field.to_string(),
                        op: Comparison::Equal,
                        value: parse_int(value)?,
                    },
                    FieldType::Choice | FieldType::UserChoice | FieldType::GroupChoice => {
                        self.choice(field, Some(spec), op, value)?
                    }
                    FieldType::Text | FieldType::Date => {
                        let (field, value) = owned();
                        IssueCriteria::StringField {
                            field,
                            value,
                            contains: false,
                        }
                    }
                },
                _ => {
                    let (field, value) = owned();
                    IssueCriteria::StringField {
                        field,
                        value,
                        contains: false,
                    }
                }
            },
            Operator::IsLessThan | Operator::IsGreaterThan => {
                let comparison = Comparison::of(op);
                match target {
                    Some(Target::Builtin(VOTE_COUNT)) => IssueCriteria::VoteCount {
                        op: comparison,
                        value: parse_int(value)?,
                    },
                    Some(Target::Builtin(COMMENT_COUNT)) => IssueCriteria::CommentCount {
                        op: comparison,
                        value: parse_int(value)?,
                    },
                    Some(Target::Builtin(NUMBER)) => IssueCriteria::Number {
                        op: comparison,
                        value: Self::number(value)?,
                    },
                    Some(Target::Custom(spec)) if spec.field_type == FieldType::Number => {
                        IssueCriteria::NumericField {
                            field: field.to_string(),
                            op: comparison,
                            value: parse_int(value)?,
                        }
                    }
                    _ => self.choice(field, spec, op, value)?,
                }
            }
            other => return Err(QueryError::unsupported(other)),
        };
        Ok(criteria)
    }

    fn operator_value(&mut self, op: Operator, value: &str) -> Result<IssueCriteria, QueryError> {
        match op {
            Operator::SubmittedBy => Ok(IssueCriteria::SubmittedBy(value.to_string())),
            Operator::FixedInBuild => {
                let build = match EntityReference::parse(value) {
                    Some(reference) => match self.ctx.resolver.find_build(self.ctx.project, &reference) {
                        Some(build) => Some(build),
                        None => self.unresolved(format!("Unable to find build: {}", value))?,
                    },
                    None => self.unresolved(format!("Invalid build: {}", value))?,
                };
                Ok(IssueCriteria::FixedInBuild {
                    value: value.to_string(),
                    build,
                })
            }
            other => Err(QueryError::unsupported(other)),
        }
    }

    fn fixed_between(&mut self, first: Revision, second: Revision) -> Result<IssueCriteria, QueryError> {
        let resolve = |revision: &Revision| self.ctx.resolver.resolve_commit(self.ctx.project, revision);
        let commits = match (resolve(&first), resolve(&second)) {
            (Some(from), Some(to)) => Some((from, to)),
            (None, _) => self.unresolved(format!("Unable to find {} {}", first.kind, first.value))?,
            (_, None) => self.unresolved(format!("Unable to find {} {}", second.kind, second.value))?,
        };
        Ok(IssueCriteria::FixedBetween {
            first,
            second,
            project: self.ctx.project.map(str::to_string),
            commits,
        })
    }

    fn order_field(&mut self, field: &str) -> Result<(), QueryError> {
        if !self.validate || ORDER_FIELDS.contains(&field) {
            return Ok(());
        }
        match self.ctx.setting.field_spec(field) {
            Some(spec)
                if matches!(
                    spec.field_type,
                    FieldType::Choice | FieldType::Date | FieldType::Number
                ) =>
            {
                Ok(())
            }
            _ => Err(QueryError::validation(format!("Can not order by field: {}", field))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IssueSetting;
    use crate::context::MemoryRepository;

    fn check(setting: &IssueSetting, field: &str, op: Operator) -> Result<(), QueryError> {
        let repo = MemoryRepository::new();
        let builder = IssueQueryBuilder::new(ParseContext::new(setting, &repo), true);
        builder.check_field(field, op)
    }

    #[test]
    fn test_validation_matrix() {
        let setting = IssueSetting::demo();
        let allowed = [
            ("Due Date", Operator::IsBefore),
            ("submit date", Operator::IsAfter),
            ("title", Operator::Contains),
            ("Environment", Operator::Contains),
            ("Labels", Operator::Contains),
            ("status", Operator::Is),
            ("milestone", Operator::IsEmpty),
            ("Priority", Operator::IsGreaterThan),
            ("Estimate", Operator::IsLessThan),
            ("vote count", Operator::IsLessThan),
            ("Assignee", Operator::IsMe),
            ("Found In", Operator::IsPrevious),
            ("Duplicate Of", Operator::Is),
            ("Regression", Operator::Is),
            ("Regression", Operator::IsEmpty),
            ("Due Date", Operator::IsEmpty),
        ];
        for (field, op) in allowed {
            assert!(check(&setting, field, op).is_ok(), "{} {}", field, op);
        }

        let rejected = [
            ("Priority", Operator::IsBefore),
            ("title", Operator::Is),
            ("Priority", Operator::Contains),
            ("Due Date", Operator::Is),
            ("Environment", Operator::IsGreaterThan),
            ("Assignee", Operator::IsGreaterThan),
            ("state", Operator::IsEmpty),
            ("Team", Operator::IsMe),
            ("Assignee", Operator::IsCurrent),
            ("number", Operator::Contains),
        ];
        for (field, op) in rejected {
            let err = check(&setting, field, op).unwrap_err();
            assert_eq!(err, QueryError::not_applicable(field, op));
            assert!(err.to_string().contains(field));
            assert!(err.to_string().contains(op.name()));
        }
    }

    #[test]
    fn test_unknown_field_always_fails() {
        let setting = IssueSetting::demo();
        assert_eq!(
            check(&setting, "Severity", Operator::Is).unwrap_err(),
            QueryError::field_not_found("Severity")
        );
    }

    #[test]
    fn test_order_fields() {
        let setting = IssueSetting::demo();
        let repo = MemoryRepository::new();
        let mut builder = IssueQueryBuilder::new(ParseContext::new(&setting, &repo), true);
        assert!(builder.order_field("vote count").is_ok());
        assert!(builder.order_field("Due Date").is_ok());
        assert_eq!(
            builder.order_field("title").unwrap_err().to_string(),
            "Can not order by field: title"
        );

        let mut lenient = IssueQueryBuilder::new(ParseContext::new(&setting, &repo), false);
        assert!(lenient.order_field("title").is_ok());
    }
}
