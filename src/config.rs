//! Issue setting: the custom field schema and workflow states, loaded from JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Setting file does not exist: {0}")]
    Missing(String),
    #[error("Unable to read setting file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse setting file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Value type of a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    Date,
    Choice,
    UserChoice,
    GroupChoice,
    IssueChoice,
    BuildChoice,
    PullRequestChoice,
}

/// A user-defined issue field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub allow_multiple: bool,
    /// Ordered choices, only meaningful for `choice` fields
    #[serde(default)]
    pub choices: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            allow_multiple: false,
            choices: Vec::new(),
        }
    }

    pub fn choice(name: &str, choices: &[&str]) -> Self {
        Self {
            choices: choices.iter().map(|c| c.to_string()).collect(),
            ..Self::new(name, FieldType::Choice)
        }
    }

    pub fn multiple(mut self) -> Self {
        self.allow_multiple = true;
        self
    }

    /// Position of `value` in the choice list, or -1 when the field has no
    /// enumerable choices or the value is not among them.
    pub fn ordinal_of(&self, value: &str) -> i64 {
        if self.field_type != FieldType::Choice {
            return -1;
        }
        self.choices
            .iter()
            .position(|choice| choice == value)
            .map_or(-1, |index| index as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IssueSetting {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Workflow states, in display order
    #[serde(default)]
    pub states: Vec<String>,
}

impl IssueSetting {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        if !path_ref.exists() {
            return Err(ConfigError::Missing(display));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|state| state == name)
    }

    /// Demo schema used when no setting file is available.
    pub fn demo() -> Self {
        Self {
            fields: vec![
                FieldSpec::choice("Priority", &["Low", "Normal", "High", "Critical"]),
                FieldSpec::choice("Type", &["Bug", "Feature", "Task"]),
                FieldSpec::choice("Labels", &["ui", "backend", "docs"]).multiple(),
                FieldSpec::new("Assignee", FieldType::UserChoice),
                FieldSpec::new("Team", FieldType::GroupChoice),
                FieldSpec::new("Estimate", FieldType::Number),
                FieldSpec::new("Due Date", FieldType::Date),
                FieldSpec::new("Regression", FieldType::Boolean),
                FieldSpec::new("Environment", FieldType::Text),
                FieldSpec::new("Duplicate Of", FieldType::IssueChoice),
                FieldSpec::new("Found In", FieldType::BuildChoice),
                FieldSpec::new("Fixed By", FieldType::PullRequestChoice),
            ],
            states: vec!["Open".to_string(), "In Progress".to_string(), "Closed".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_json_setting() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "fields": [
                    {{"name": "Priority", "type": "choice", "choices": ["Low", "High"]}},
                    {{"name": "Assignee", "type": "user-choice", "allow_multiple": true}}
                ],
                "states": ["Open", "Closed"]
            }}"#
        )
        .unwrap();

        let setting = IssueSetting::from_json_file(file.path()).unwrap();
        let priority = setting.field_spec("Priority").unwrap();
        assert_eq!(priority.field_type, FieldType::Choice);
        assert_eq!(priority.ordinal_of("High"), 1);
        assert!(setting.field_spec("Assignee").unwrap().allow_multiple);
        assert!(setting.has_state("Closed"));
        assert!(setting.field_spec("Unknown").is_none());
    }

    #[test]
    fn test_invalid_json_setting() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "invalid json").unwrap();

        let result = IssueSetting::from_json_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = IssueSetting::from_json_file("non_existent_setting.json");
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_ordinal_only_for_plain_choices() {
        let setting = IssueSetting::demo();
        assert_eq!(setting.field_spec("Priority").unwrap().ordinal_of("Normal"), 1);
        assert_eq!(setting.field_spec("Priority").unwrap().ordinal_of("Urgent"), -1);
        assert_eq!(setting.field_spec("Assignee").unwrap().ordinal_of("robin"), -1);
    }
}
