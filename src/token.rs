//! The token definition for the query language.

use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Connectives
    And, // "and"
    Or,  // "or"
    Not, // "not"

    // Ordering
    OrderBy, // "order by"
    Asc,     // "asc"
    Desc,    // "desc"

    /// Any operator phrase, e.g. `is`, `is before`, `submitted by me`
    Operator(Operator),
    /// Revision type keyword used by `fixed between`
    Revision(RevisionKind),

    /// The raw content between the quotes, escapes still in place
    Quoted(&'a str),

    // Punctuation
    LParen, // (
    RParen, // )
}

/// Every operator phrase recognized by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Is,
    IsNot,
    IsBefore,
    IsAfter,
    IsLessThan,
    IsGreaterThan,
    Contains,
    IsEmpty,
    IsMe,
    IsCurrent,
    IsPrevious,
    SubmittedByMe,
    FixedInCurrentBuild,
    Open,
    Merged,
    Discarded,
    OwnedByMe,
    SubmittedBy,
    FixedInBuild,
    IncludesCommit,
    OwnedBy,
    FixedBetween,
}

/// Grammar position an operator may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCategory {
    /// `"field" op "value"`
    FieldValue,
    /// `"field" op`
    Field,
    /// `op`
    ZeroOperand,
    /// `op "value"`
    Value,
    /// `fixed between <revision> and <revision>`
    Range,
}

impl Operator {
    /// The textual form, exactly as written in a query.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::IsBefore => "is before",
            Operator::IsAfter => "is after",
            Operator::IsLessThan => "is less than",
            Operator::IsGreaterThan => "is greater than",
            Operator::Contains => "contains",
            Operator::IsEmpty => "is empty",
            Operator::IsMe => "is me",
            Operator::IsCurrent => "is current",
            Operator::IsPrevious => "is previous",
            Operator::SubmittedByMe => "submitted by me",
            Operator::FixedInCurrentBuild => "fixed in current build",
            Operator::Open => "open",
            Operator::Merged => "merged",
            Operator::Discarded => "discarded",
            Operator::OwnedByMe => "owned by me",
            Operator::SubmittedBy => "submitted by",
            Operator::FixedInBuild => "fixed in build",
            Operator::IncludesCommit => "includes commit",
            Operator::OwnedBy => "owned by",
            Operator::FixedBetween => "fixed between",
        }
    }

    pub fn category(self) -> OperatorCategory {
        match self {
            Operator::Is
            | Operator::IsNot
            | Operator::IsBefore
            | Operator::IsAfter
            | Operator::IsLessThan
            | Operator::IsGreaterThan
            | Operator::Contains => OperatorCategory::FieldValue,
            Operator::IsEmpty | Operator::IsMe | Operator::IsCurrent | Operator::IsPrevious => {
                OperatorCategory::Field
            }
            Operator::SubmittedByMe
            | Operator::FixedInCurrentBuild
            | Operator::Open
            | Operator::Merged
            | Operator::Discarded
            | Operator::OwnedByMe => OperatorCategory::ZeroOperand,
            Operator::SubmittedBy
            | Operator::FixedInBuild
            | Operator::IncludesCommit
            | Operator::OwnedBy => OperatorCategory::Value,
            Operator::FixedBetween => OperatorCategory::Range,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a `fixed between` endpoint names its revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevisionKind {
    Branch,
    Tag,
    Commit,
    Build,
}

impl RevisionKind {
    pub fn name(self) -> &'static str {
        match self {
            RevisionKind::Branch => "branch",
            RevisionKind::Tag => "tag",
            RevisionKind::Commit => "commit",
            RevisionKind::Build => "build",
        }
    }
}

impl fmt::Display for RevisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
