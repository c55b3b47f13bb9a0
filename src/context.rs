//! Collaborators a query needs while parsing and evaluating.
//!
//! Nothing here is global: the project, field schema, acting user and current
//! build are passed in explicitly for every call.

use crate::config::IssueSetting;
use crate::literal::EntityReference;
use crate::model::{Build, CommitId, User};
use crate::token::RevisionKind;
use std::collections::{HashMap, HashSet};

/// A textual revision, e.g. `tag "v1.0"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    pub kind: RevisionKind,
    pub value: String,
}

impl Revision {
    pub fn new(kind: RevisionKind, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Resolves textual references against a project's repository.
pub trait ProjectResolver {
    fn resolve_commit(&self, project: Option<&str>, revision: &Revision) -> Option<CommitId>;

    fn find_build(&self, project: Option<&str>, reference: &EntityReference) -> Option<Build>;
}

/// Relations between commits, builds, issues and pull requests.
pub trait RelationIndex {
    /// Numbers of issues fixed by commits after `from` up to and including `to`.
    fn fixed_issues_between(&self, project: Option<&str>, from: &CommitId, to: &CommitId) -> HashSet<i64>;

    /// Numbers of issues fixed since the previous build of the same job.
    fn fixed_issues_in_build(&self, build: &Build) -> HashSet<i64>;

    /// Ids of pull requests whose commits include `commit`.
    fn pull_requests_including(&self, project: Option<&str>, commit: &CommitId) -> HashSet<i64>;
}

/// Everything a parse call may consult.
#[derive(Clone, Copy)]
pub struct ParseContext<'a> {
    /// Project the query is scoped to, `None` for cross-project queries
    pub project: Option<&'a str>,
    pub setting: &'a IssueSetting,
    pub resolver: &'a dyn ProjectResolver,
}

impl<'a> ParseContext<'a> {
    pub fn new(setting: &'a IssueSetting, resolver: &'a dyn ProjectResolver) -> Self {
        Self {
            project: None,
            setting,
            resolver,
        }
    }

    pub fn with_project(mut self, project: &'a str) -> Self {
        self.project = Some(project);
        self
    }
}

/// Everything an evaluation or predicate compilation may consult.
#[derive(Clone, Copy)]
pub struct MatchContext<'a> {
    /// The acting user, `None` when anonymous
    pub user: Option<&'a User>,
    pub build: Option<&'a Build>,
    pub setting: &'a IssueSetting,
    pub index: &'a dyn RelationIndex,
}

impl<'a> MatchContext<'a> {
    pub fn new(setting: &'a IssueSetting, index: &'a dyn RelationIndex) -> Self {
        Self {
            user: None,
            build: None,
            setting,
            index,
        }
    }

    pub fn with_user(mut self, user: &'a User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_build(mut self, build: &'a Build) -> Self {
        self.build = Some(build);
        self
    }

    pub fn user_name(&self) -> Option<&'a str> {
        self.user.map(|user| user.name.as_str())
    }
}

/// A single-project repository kept in memory, with a linear commit history.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    /// Oldest first
    history: Vec<CommitId>,
    refs: HashMap<(RevisionKind, String), CommitId>,
    fixes: HashMap<CommitId, HashSet<i64>>,
    builds: Vec<Build>,
    pull_request_commits: HashMap<i64, HashSet<CommitId>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a commit to the history, recording the issues it fixes.
    pub fn add_commit(&mut self, commit: &str, fixed_issues: &[i64]) -> &mut Self {
        let id = CommitId(commit.to_string());
        self.fixes
            .insert(id.clone(), fixed_issues.iter().copied().collect());
        self.history.push(id);
        self
    }

    pub fn add_ref(&mut self, kind: RevisionKind, name: &str, commit: &str) -> &mut Self {
        self.refs
            .insert((kind, name.to_string()), CommitId(commit.to_string()));
        self
    }

    pub fn add_build(&mut self, build: Build) -> &mut Self {
        self.builds.push(build);
        self
    }

    pub fn add_pull_request_commit(&mut self, pull_request_id: i64, commit: &str) -> &mut Self {
        self.pull_request_commits
            .entry(pull_request_id)
            .or_default()
            .insert(CommitId(commit.to_string()));
        self
    }

    fn position(&self, commit: &CommitId) -> Option<usize> {
        self.history.iter().position(|id| id == commit)
    }

    fn build(&self, number: i64) -> Option<&Build> {
        self.builds.iter().find(|build| build.number == number)
    }

    fn fixed_in_range(&self, after: Option<usize>, upto: usize) -> HashSet<i64> {
        let start = after.map_or(0, |position| position + 1);
        if start > upto {
            return HashSet::new();
        }
        self.history[start..=upto]
            .iter()
            .filter_map(|commit| self.fixes.get(commit))
            .flatten()
            .copied()
            .collect()
    }
}

impl ProjectResolver for MemoryRepository {
    fn resolve_commit(&self, _project: Option<&str>, revision: &Revision) -> Option<CommitId> {
        match revision.kind {
            RevisionKind::Commit => self
                .history
                .iter()
                .find(|id| !revision.value.is_empty() && id.0.starts_with(&revision.value))
                .cloned(),
            RevisionKind::Build => {
                let reference = EntityReference::parse(&revision.value)?;
                self.build(reference.number).map(|build| build.commit.clone())
            }
            RevisionKind::Branch | RevisionKind::Tag => self
                .refs
                .get(&(revision.kind, revision.value.clone()))
                .cloned(),
        }
    }

    fn find_build(&self, project: Option<&str>, reference: &EntityReference) -> Option<Build> {
        let project = reference.project.as_deref().or(project);
        self.builds
            .iter()
            .find(|build| {
                build.number == reference.number
                    && project.map_or(true, |project| build.project == project)
            })
            .cloned()
    }
}

impl RelationIndex for MemoryRepository {
    fn fixed_issues_between(&self, _project: Option<&str>, from: &CommitId, to: &CommitId) -> HashSet<i64> {
        match (self.position(from), self.position(to)) {
            (Some(from), Some(to)) => self.fixed_in_range(Some(from), to),
            _ => HashSet::new(),
        }
    }

    fn fixed_issues_in_build(&self, build: &Build) -> HashSet<i64> {
        let Some(upto) = self.position(&build.commit) else {
            return HashSet::new();
        };
        let after = build
            .previous
            .and_then(|number| self.build(number))
            .and_then(|previous| self.position(&previous.commit));
        self.fixed_in_range(after, upto)
    }

    fn pull_requests_including(&self, _project: Option<&str>, commit: &CommitId) -> HashSet<i64> {
        self.pull_request_commits
            .iter()
            .filter(|(_, commits)| commits.contains(commit))
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        repo.add_commit("a1", &[])
            .add_commit("b2", &[1, 2])
            .add_commit("c3", &[3])
            .add_commit("d4", &[4])
            .add_ref(RevisionKind::Tag, "v1", "b2")
            .add_ref(RevisionKind::Branch, "main", "d4")
            .add_build(Build {
                project: "demo".to_string(),
                number: 1,
                commit: CommitId("b2".to_string()),
                previous: None,
            })
            .add_build(Build {
                project: "demo".to_string(),
                number: 2,
                commit: CommitId("d4".to_string()),
                previous: Some(1),
            })
            .add_pull_request_commit(10, "c3");
        repo
    }

    #[test]
    fn test_resolve_revisions() {
        let repo = repository();
        let resolve = |kind, value| repo.resolve_commit(None, &Revision::new(kind, value));
        assert_eq!(resolve(RevisionKind::Tag, "v1"), Some(CommitId("b2".to_string())));
        assert_eq!(resolve(RevisionKind::Commit, "c"), Some(CommitId("c3".to_string())));
        assert_eq!(resolve(RevisionKind::Build, "#2"), Some(CommitId("d4".to_string())));
        assert_eq!(resolve(RevisionKind::Branch, "dev"), None);
    }

    #[test]
    fn test_fixed_issues_between() {
        let repo = repository();
        let fixed = repo.fixed_issues_between(
            None,
            &CommitId("b2".to_string()),
            &CommitId("d4".to_string()),
        );
        assert_eq!(fixed, HashSet::from([3, 4]));
    }

    #[test]
    fn test_fixed_issues_in_build() {
        let repo = repository();
        let second = repo.find_build(Some("demo"), &EntityReference::parse("#2").unwrap()).unwrap();
        assert_eq!(repo.fixed_issues_in_build(&second), HashSet::from([3, 4]));
        let first = repo.find_build(None, &EntityReference::parse("1").unwrap()).unwrap();
        assert_eq!(repo.fixed_issues_in_build(&first), HashSet::from([1, 2]));
        assert!(repo.find_build(Some("other"), &EntityReference::parse("#1").unwrap()).is_none());
    }

    #[test]
    fn test_pull_requests_including() {
        let repo = repository();
        assert_eq!(
            repo.pull_requests_including(None, &CommitId("c3".to_string())),
            HashSet::from([10])
        );
        assert!(repo
            .pull_requests_including(None, &CommitId("a1".to_string()))
            .is_empty());
    }
}
