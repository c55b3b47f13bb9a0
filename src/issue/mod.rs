//! Issue queries, plus the hooks that keep saved queries in step with changes
//! to the issue setting.

mod builder;
mod criteria;

pub use builder::{IssueQueryBuilder, ORDER_FIELDS};
pub use criteria::{builtin_field, IssueCriteria};

use crate::config::{FieldType, IssueSetting};
use crate::context::{MatchContext, ParseContext};
use crate::error::QueryError;
use crate::predicate::{self, Column, Table};
use crate::query::{build_query, EntityQuery};
use log::debug;
use sea_query::SelectStatement;
use std::collections::{BTreeSet, HashMap, HashSet};

pub type IssueQuery = EntityQuery<IssueCriteria>;

/// A choice value referenced by a query but missing from the field's choices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UndefinedFieldValue {
    pub field_name: String,
    pub value: String,
}

impl UndefinedFieldValue {
    pub fn new(field_name: &str, value: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Changes made to the choices of one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSetEdit {
    /// Old value to new value
    pub renames: HashMap<String, String>,
    pub deletions: HashSet<String>,
}

fn sort_column(field: &str) -> Option<Column> {
    match field {
        criteria::NUMBER => Some(Column::Number),
        criteria::SUBMIT_DATE => Some(Column::SubmitDate),
        criteria::UPDATE_DATE => Some(Column::UpdateDate),
        criteria::VOTE_COUNT => Some(Column::VoteCount),
        criteria::COMMENT_COUNT => Some(Column::CommentCount),
        _ => None,
    }
}

fn is_builtin_sort(field: &str) -> bool {
    ORDER_FIELDS.contains(&field)
}

impl EntityQuery<IssueCriteria> {
    /// Parses `text` into an issue query. Absent text yields the empty query.
    ///
    /// With `validate` off, unknown fields, stale choice values and references
    /// that cannot be resolved are tolerated; malformed numbers and dates are
    /// still rejected.
    pub fn parse(ctx: &ParseContext, text: Option<&str>, validate: bool) -> Result<Self, QueryError> {
        let mut builder = IssueQueryBuilder::new(*ctx, validate);
        let query = build_query(text, &mut builder)?;
        debug!("parsed issue query: {}", query);
        Ok(query)
    }

    /// Complete `SELECT` over `issues`. Only builtin sort fields become
    /// `ORDER BY` columns.
    pub fn to_select(&self, ctx: &MatchContext) -> SelectStatement {
        let orders: Vec<_> = self
            .sorts
            .iter()
            .filter_map(|sort| sort_column(&sort.field).map(|column| (column, sort.direction)))
            .collect();
        predicate::select(Table::Issues, self.to_predicate(ctx), &orders)
    }

    fn leaves(&self) -> Vec<&IssueCriteria> {
        let mut leaves = Vec::new();
        if let Some(criteria) = &self.criteria {
            criteria.visit(&mut |leaf| leaves.push(leaf));
        }
        leaves
    }

    pub fn undefined_fields(&self, setting: &IssueSetting) -> Vec<String> {
        let undefined = |field: &str| builtin_field(field).is_none() && setting.field_spec(field).is_none();
        let mut fields = BTreeSet::new();
        for leaf in self.leaves() {
            if let Some(field) = leaf.custom_field().filter(|field| undefined(*field)) {
                fields.insert(field.to_string());
            }
        }
        for sort in &self.sorts {
            if !is_builtin_sort(&sort.field) && undefined(&sort.field) {
                fields.insert(sort.field.clone());
            }
        }
        fields.into_iter().collect()
    }

    pub fn undefined_states(&self, setting: &IssueSetting) -> Vec<String> {
        let mut states = BTreeSet::new();
        for leaf in self.leaves() {
            if let IssueCriteria::State { value, .. } = leaf {
                if !setting.has_state(value) {
                    states.insert(value.clone());
                }
            }
        }
        states.into_iter().collect()
    }

    pub fn undefined_field_values(&self, setting: &IssueSetting) -> Vec<UndefinedFieldValue> {
        let mut values = BTreeSet::new();
        for leaf in self.leaves() {
            if let IssueCriteria::ChoiceField { field, value, .. } = leaf {
                let defined = match setting.field_spec(field) {
                    Some(spec) if spec.field_type == FieldType::Choice => spec.choices.contains(value),
                    _ => true,
                };
                if !defined {
                    values.insert(UndefinedFieldValue::new(field, value));
                }
            }
        }
        values.into_iter().collect()
    }

    pub fn on_rename_field(&mut self, old_name: &str, new_name: &str) {
        if let Some(criteria) = &mut self.criteria {
            criteria.visit_mut(&mut |leaf| {
                if let Some(field) = leaf.custom_field_mut().filter(|field| field.as_str() == old_name) {
                    *field = new_name.to_string();
                }
            });
        }
        for sort in &mut self.sorts {
            if sort.field == old_name {
                sort.field = new_name.to_string();
            }
        }
    }

    /// Drops everything referring to `field_name`. Returns true when the
    /// criteria can not survive without it and the query should be discarded.
    pub fn on_delete_field(&mut self, field_name: &str) -> bool {
        self.sorts.retain(|sort| sort.field != field_name);
        self.criteria
            .as_mut()
            .is_some_and(|criteria| criteria.prune(&|leaf| leaf.custom_field() == Some(field_name)))
    }

    pub fn on_rename_state(&mut self, old_name: &str, new_name: &str) {
        if let Some(criteria) = &mut self.criteria {
            criteria.visit_mut(&mut |leaf| {
                if let IssueCriteria::State { value, .. } = leaf {
                    if value == old_name {
                        *value = new_name.to_string();
                    }
                }
            });
        }
    }

    /// Returns true when the query should be discarded.
    pub fn on_delete_state(&mut self, state_name: &str) -> bool {
        self.criteria.as_mut().is_some_and(|criteria| {
            criteria.prune(&|leaf| matches!(leaf, IssueCriteria::State { value, .. } if value == state_name))
        })
    }

    /// Applies renamed and deleted choices of `field_name`. Returns true when
    /// the query should be discarded.
    pub fn on_edit_field_values(&mut self, field_name: &str, edit: &ValueSetEdit) -> bool {
        let Some(criteria) = &mut self.criteria else {
            return false;
        };
        let deleted = criteria.prune(&|leaf| {
            matches!(leaf, IssueCriteria::ChoiceField { field, value, .. }
                if field == field_name && edit.deletions.contains(value))
        });
        if deleted {
            return true;
        }
        criteria.visit_mut(&mut |leaf| {
            if let IssueCriteria::ChoiceField { field, value, .. } = leaf {
                if field == field_name {
                    if let Some(renamed) = edit.renames.get(value.as_str()) {
                        *value = renamed.clone();
                    }
                }
            }
        });
        false
    }

    /// Applies value edits for several fields, keyed by field name.
    pub fn fix_undefined_field_values(&mut self, edits: &HashMap<String, ValueSetEdit>) -> bool {
        edits
            .iter()
            .any(|(field_name, edit)| self.on_edit_field_values(field_name, edit))
    }
}
