//! Errors raised while turning query text into criteria.

use crate::token::{Operator, Span};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The text does not follow the grammar. Reported on the first failure.
    #[error("Malformed query syntax: {message}")]
    Syntax { message: String, span: Option<Span> },

    /// Well-formed text that does not fit the field schema or project.
    #[error("{0}")]
    Validation(String),
}

impl QueryError {
    pub fn syntax(message: impl Into<String>, span: Option<Span>) -> Self {
        QueryError::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        QueryError::Validation(message.into())
    }

    pub fn not_applicable(field: &str, op: Operator) -> Self {
        QueryError::Validation(format!(
            "Field '{}' is not applicable for operator '{}'",
            field, op
        ))
    }

    pub fn field_not_found(field: &str) -> Self {
        QueryError::Validation(format!("Field not found: {}", field))
    }

    pub fn undefined_value(field: &str, value: &str) -> Self {
        QueryError::Validation(format!(
            "Value '{}' is not defined for field '{}'",
            value, field
        ))
    }

    /// An operator the grammar accepts but this kind of query has no meaning for.
    pub fn unsupported(op: Operator) -> Self {
        QueryError::syntax(format!("Unexpected operator: {}", op), None)
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            QueryError::Syntax { span, .. } => *span,
            QueryError::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_field_and_operator() {
        let err = QueryError::not_applicable("Priority", Operator::IsBefore);
        assert_eq!(
            err.to_string(),
            "Field 'Priority' is not applicable for operator 'is before'"
        );
    }

    #[test]
    fn test_syntax_error_prefix() {
        let err = QueryError::syntax("Unexpected end of input", Some(Span::new(3, 3)));
        assert_eq!(err.to_string(), "Malformed query syntax: Unexpected end of input");
        assert_eq!(err.span(), Some(Span::new(3, 3)));
    }
}
