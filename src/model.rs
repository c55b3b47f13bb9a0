//! Entities that queries are evaluated against in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Login name
    pub name: String,
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub project: String,
    pub number: i64,
    pub commit: CommitId,
    /// Number of the preceding build of the same job, if any
    #[serde(default)]
    pub previous: Option<i64>,
}

/// One value of a custom field. Multi-valued fields have one entry per value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Option<String>,
    /// Choice position, or the number itself for number fields
    #[serde(default)]
    pub ordinal: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    pub project: String,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    pub state: String,
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub submitter: Option<String>,
    pub submit_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
}

impl Issue {
    pub fn comment_count(&self) -> i64 {
        self.comments.len() as i64
    }

    /// Non-empty values recorded for the named field.
    pub fn field_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |field| field.name == name && field.value.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestStatus {
    Open,
    Merged,
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: i64,
    pub project: String,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    pub status: PullRequestStatus,
    #[serde(default)]
    pub submitter: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    pub submit_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl PullRequest {
    pub fn comment_count(&self) -> i64 {
        self.comments.len() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owners: HashSet<String>,
    pub update_date: DateTime<Utc>,
}
