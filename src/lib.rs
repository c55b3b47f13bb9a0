//! Textual query language for issues, pull requests and projects.
//!
//! A query string is tokenized, parsed into a [`ast::QueryTree`] and then
//! built into a typed criteria tree by an entity specific builder. The result
//! can be matched against in-memory entities or compiled to a sea-query
//! `SELECT`.

pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod issue;
pub mod lexer;
pub mod literal;
pub mod model;
pub mod parser;
pub mod predicate;
pub mod project;
pub mod pull_request;
pub mod query;
pub mod token;

pub use error::QueryError;
pub use issue::IssueQuery;
pub use project::ProjectQuery;
pub use pull_request::PullRequestQuery;
pub use query::{Direction, EntityQuery, EntitySort};
