use anyhow::Result;
use chrono::{Duration, Utc};
use entity_query::config::IssueSetting;
use entity_query::context::{MatchContext, MemoryRepository, ParseContext};
use entity_query::model::{Build, CommitId, FieldValue, Issue, User};
use entity_query::token::RevisionKind;
use entity_query::IssueQuery;
use log::{info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sea_query::PostgresQueryBuilder;

const PROJECT: &str = "demo";

/// Loads the issue setting from `issue_setting.json`, falling back to the demo schema.
fn load_setting() -> IssueSetting {
    match IssueSetting::from_json_file("issue_setting.json") {
        Ok(setting) => {
            info!(
                "loaded issue setting: {} fields, {} states",
                setting.fields.len(),
                setting.states.len()
            );
            setting
        }
        Err(e) => {
            warn!("unable to load issue setting ({}), using demo schema", e);
            IssueSetting::demo()
        }
    }
}

fn demo_repository() -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    repo.add_commit("a1b2c3", &[])
        .add_commit("d4e5f6", &[1])
        .add_commit("0718aa", &[2, 3])
        .add_ref(RevisionKind::Tag, "v1.0", "a1b2c3")
        .add_ref(RevisionKind::Branch, "main", "0718aa")
        .add_build(Build {
            project: PROJECT.to_string(),
            number: 1,
            commit: CommitId("a1b2c3".to_string()),
            previous: None,
        })
        .add_build(Build {
            project: PROJECT.to_string(),
            number: 2,
            commit: CommitId("0718aa".to_string()),
            previous: Some(1),
        });
    repo
}

fn demo_issue(number: i64, title: &str, state: &str, submitter: &str, fields: &[(&str, &str, i64)]) -> Issue {
    let now = Utc::now();
    Issue {
        id: number,
        project: PROJECT.to_string(),
        number,
        title: title.to_string(),
        description: None,
        comments: Vec::new(),
        state: state.to_string(),
        milestone: None,
        submitter: Some(submitter.to_string()),
        submit_date: now - Duration::days(number * 3),
        update_date: now - Duration::days(number),
        vote_count: number % 3,
        fields: fields
            .iter()
            .map(|(name, value, ordinal)| FieldValue {
                name: name.to_string(),
                value: Some(value.to_string()),
                ordinal: *ordinal,
            })
            .collect(),
    }
}

fn demo_issues() -> Vec<Issue> {
    vec![
        demo_issue(1, "Crash on startup", "Closed", "robin", &[("Priority", "Critical", 3), ("Type", "Bug", 0)]),
        demo_issue(2, "Dark mode", "Open", "alex", &[("Priority", "Normal", 1), ("Type", "Feature", 1)]),
        demo_issue(3, "Slow search", "In Progress", "robin", &[("Priority", "High", 2), ("Assignee", "alex", -1)]),
        demo_issue(4, "Update docs", "Open", "sam", &[("Labels", "docs", 2), ("Estimate", "3", 3)]),
    ]
}

fn run_query(line: &str, setting: &IssueSetting, repo: &MemoryRepository, issues: &[Issue], user: &User) {
    let parse_ctx = ParseContext::new(setting, repo).with_project(PROJECT);
    let query = match IssueQuery::parse(&parse_ctx, Some(line), true) {
        Ok(query) => query,
        Err(e) => {
            println!("error: {}", e);
            if let Some(span) = e.span() {
                println!("  at {}-{}", span.start, span.end);
            }
            return;
        }
    };

    let match_ctx = MatchContext::new(setting, repo).with_user(user);
    println!("query: {}", query);
    println!("sql:   {}", query.to_select(&match_ctx).to_string(PostgresQueryBuilder));
    let numbers: Vec<String> = issues
        .iter()
        .filter(|issue| query.matches(issue, &match_ctx))
        .map(|issue| format!("#{}", issue.number))
        .collect();
    println!("matches: [{}]", numbers.join(", "));
}

fn main() -> Result<()> {
    env_logger::init();
    println!("--- Entity Query: issue query console ---");

    let setting = load_setting();
    let repo = demo_repository();
    let issues = demo_issues();
    let user = User::new("robin");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("query> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                run_query(line, &setting, &repo, &issues, &user);
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
