//! The query parser
//!
//! ## Grammar (precedence from low to high)
//!
//! ```text
//! query     := criteria? order*
//! criteria  := and ("or" and)*
//! and       := not ("and" not)*
//! not       := "not" not | primary
//! primary   := "(" criteria ")"
//!            | Quoted fieldValueOp Quoted        "Title" contains "crash"
//!            | Quoted fieldOp                    "Milestone" is empty
//!            | zeroOperandOp                     submitted by me
//!            | valueOp Quoted                    submitted by "robin"
//!            | "fixed between" revision "and" revision
//! revision  := ("branch" | "tag" | "commit" | "build") Quoted
//! order     := "order by" Quoted ("asc" | "desc")? ("and" Quoted ("asc" | "desc")?)*
//! ```
//!
//! `and`/`or` chains are flattened into a single n-ary node. Parentheses are kept
//! as `Parens` nodes so that later stages can tell `a and (b and c)` from
//! `a and b and c`.
//!
//! The parser stops at the first error; there is no recovery.

use crate::ast::{CriteriaNode, LiteralNode, OrderNode, QueryTree, RevisionNode};
use crate::error::QueryError;
use crate::token::{OperatorCategory, Token, TokenKind};

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
}

fn describe(kind: &TokenKind<'_>) -> String {
    match kind {
        TokenKind::And => "'and'".to_string(),
        TokenKind::Or => "'or'".to_string(),
        TokenKind::Not => "'not'".to_string(),
        TokenKind::OrderBy => "'order by'".to_string(),
        TokenKind::Asc => "'asc'".to_string(),
        TokenKind::Desc => "'desc'".to_string(),
        TokenKind::Operator(op) => format!("operator '{}'", op),
        TokenKind::Revision(kind) => format!("'{}'", kind),
        TokenKind::Quoted(raw) => format!("\"{}\"", raw),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
    }
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn match_token(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|token| &token.kind == kind)
    }

    fn unexpected(token: &Token<'_>, expected: &str) -> QueryError {
        QueryError::syntax(
            format!("Expected {}, found {}", expected, describe(&token.kind)),
            Some(token.span),
        )
    }

    fn end_of_input(expected: &str) -> QueryError {
        QueryError::syntax(format!("Expected {}, but reached end of input", expected), None)
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<&'a Token<'a>, QueryError> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(Self::unexpected(token, expected)),
            None => Err(Self::end_of_input(expected)),
        }
    }

    fn expect_quoted(&mut self, expected: &str) -> Result<LiteralNode, QueryError> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Quoted(raw),
                span,
            }) => Ok(LiteralNode {
                raw: raw.to_string(),
                span: *span,
            }),
            Some(token) => Err(Self::unexpected(token, expected)),
            None => Err(Self::end_of_input(expected)),
        }
    }

    pub fn parse(&mut self) -> Result<QueryTree, QueryError> {
        let criteria = match self.peek() {
            None => None,
            Some(token) if token.kind == TokenKind::OrderBy => None,
            Some(_) => Some(self.parse_or_criteria()?),
        };

        let mut orders = Vec::new();
        while self.match_token(&TokenKind::OrderBy) {
            self.advance();
            loop {
                orders.push(self.parse_order()?);
                if self.match_token(&TokenKind::And) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if let Some(token) = self.peek() {
            return Err(Self::unexpected(token, "'and', 'or' or 'order by'"));
        }

        Ok(QueryTree { criteria, orders })
    }

    fn parse_order(&mut self) -> Result<OrderNode, QueryError> {
        let field = self.expect_quoted("quoted field name")?;
        let ascending = match self.peek().map(|token| &token.kind) {
            Some(TokenKind::Asc) => {
                self.advance();
                Some(true)
            }
            Some(TokenKind::Desc) => {
                self.advance();
                Some(false)
            }
            _ => None,
        };
        Ok(OrderNode { field, ascending })
    }

    /// `and (or and)*`, the lowest precedence level.
    fn parse_or_criteria(&mut self) -> Result<CriteriaNode, QueryError> {
        let mut children = vec![self.parse_and_criteria()?];
        while self.match_token(&TokenKind::Or) {
            self.advance();
            children.push(self.parse_and_criteria()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            CriteriaNode::Or(children)
        })
    }

    fn parse_and_criteria(&mut self) -> Result<CriteriaNode, QueryError> {
        let mut children = vec![self.parse_not_criteria()?];
        while self.match_token(&TokenKind::And) {
            self.advance();
            children.push(self.parse_not_criteria()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            CriteriaNode::And(children)
        })
    }

    fn parse_not_criteria(&mut self) -> Result<CriteriaNode, QueryError> {
        if self.match_token(&TokenKind::Not) {
            self.advance();
            let inner = self.parse_not_criteria()?;
            Ok(CriteriaNode::Not(Box::new(inner)))
        } else {
            self.parse_primary_criteria()
        }
    }

    fn parse_primary_criteria(&mut self) -> Result<CriteriaNode, QueryError> {
        let Some(token) = self.advance() else {
            return Err(Self::end_of_input("criteria"));
        };
        match &token.kind {
            TokenKind::LParen => {
                let inner = self.parse_or_criteria()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(CriteriaNode::Parens(Box::new(inner)))
            }
            TokenKind::Operator(op) => match op.category() {
                OperatorCategory::ZeroOperand => Ok(CriteriaNode::Operator {
                    op: *op,
                    span: token.span,
                }),
                OperatorCategory::Value => {
                    let value = self.expect_quoted("quoted value")?;
                    Ok(CriteriaNode::OperatorValue { op: *op, value })
                }
                OperatorCategory::Range => {
                    let first = self.parse_revision()?;
                    self.expect(TokenKind::And, "'and'")?;
                    let second = self.parse_revision()?;
                    Ok(CriteriaNode::FixedBetween { first, second })
                }
                OperatorCategory::FieldValue | OperatorCategory::Field => {
                    Err(Self::unexpected(token, "criteria"))
                }
            },
            TokenKind::Quoted(raw) => {
                let field = LiteralNode {
                    raw: raw.to_string(),
                    span: token.span,
                };
                self.parse_field_criteria(field)
            }
            _ => Err(Self::unexpected(token, "criteria")),
        }
    }

    fn parse_field_criteria(&mut self, field: LiteralNode) -> Result<CriteriaNode, QueryError> {
        let expected = "field operator";
        let Some(token) = self.advance() else {
            return Err(Self::end_of_input(expected));
        };
        match &token.kind {
            TokenKind::Operator(op) => match op.category() {
                OperatorCategory::FieldValue => {
                    let value = self.expect_quoted("quoted value")?;
                    Ok(CriteriaNode::FieldOperatorValue {
                        field,
                        op: *op,
                        value,
                    })
                }
                OperatorCategory::Field => Ok(CriteriaNode::FieldOperator { field, op: *op }),
                _ => Err(Self::unexpected(token, expected)),
            },
            _ => Err(Self::unexpected(token, expected)),
        }
    }

    fn parse_revision(&mut self) -> Result<RevisionNode, QueryError> {
        let expected = "'branch', 'tag', 'commit' or 'build'";
        match self.advance() {
            Some(Token {
                kind: TokenKind::Revision(kind),
                ..
            }) => {
                let value = self.expect_quoted("quoted revision")?;
                Ok(RevisionNode { kind: *kind, value })
            }
            Some(token) => Err(Self::unexpected(token, expected)),
            None => Err(Self::end_of_input(expected)),
        }
    }
}

/// Lexes and parses `input` in one go.
pub fn parse_tree(input: &str) -> Result<QueryTree, QueryError> {
    let tokens = crate::lexer::Lexer::tokenize(input)?;
    Parser::new(&tokens).parse()
}
