// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lexer and parser for the elementwise expression language.
//!
//! # Grammar
//! ```text
//! expr := '@' INDEX
//!       | ('add' | 'mul') '(' expr ',' expr ')'
//! ```
//! Whitespace is ignored. The parsed tree is stored in an arena of
//! [`ExprNode`]s whose children are referenced by [`ExprId`].

use std::fmt;

use crate::ExpressionError;

/// Lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Add,
    Mul,
    /// `@N`, carrying `N`.
    Input(usize),
    Comma,
    LeftBracket,
    RightBracket,
}

/// One token and its span in the whitespace-stripped statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Splits `statement` into tokens.
///
/// # Errors
/// - [`ExpressionError::Empty`] for a blank statement.
/// - [`ExpressionError::UnexpectedChar`] for anything outside the alphabet.
/// - [`ExpressionError::MissingIndex`] / [`ExpressionError::IndexOverflow`]
///   for a malformed `@N`.
pub fn tokenize(statement: &str) -> Result<Vec<Token>, ExpressionError> {
    let stripped: Vec<char> = statement.chars().filter(|c| !c.is_whitespace()).collect();
    if stripped.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < stripped.len() {
        let ch = stripped[pos];
        let (kind, len) = match ch {
            'a' | 'm' => {
                let (word, kind) = if ch == 'a' {
                    ("add", TokenKind::Add)
                } else {
                    ("mul", TokenKind::Mul)
                };
                for (offset, expected) in word.chars().enumerate() {
                    match stripped.get(pos + offset) {
                        Some(&c) if c == expected => {}
                        Some(&c) => {
                            return Err(ExpressionError::UnexpectedChar {
                                pos: pos + offset,
                                ch: c,
                            })
                        }
                        None => {
                            return Err(ExpressionError::Syntax {
                                index: tokens.len(),
                                expected: word,
                            })
                        }
                    }
                }
                (kind, word.len())
            }
            '@' => {
                let digits = stripped[pos + 1..]
                    .iter()
                    .take_while(|c| c.is_ascii_digit())
                    .count();
                if digits == 0 {
                    return Err(ExpressionError::MissingIndex { pos });
                }
                let number: String = stripped[pos + 1..pos + 1 + digits].iter().collect();
                let index = number
                    .parse::<usize>()
                    .map_err(|_| ExpressionError::IndexOverflow { pos })?;
                (TokenKind::Input(index), digits + 1)
            }
            ',' => (TokenKind::Comma, 1),
            '(' => (TokenKind::LeftBracket, 1),
            ')' => (TokenKind::RightBracket, 1),
            other => return Err(ExpressionError::UnexpectedChar { pos, ch: other }),
        };
        tokens.push(Token {
            kind,
            text: stripped[pos..pos + len].iter().collect(),
            start: pos,
            end: pos + len,
        });
        pos += len;
    }
    Ok(tokens)
}

// ── Syntax tree ────────────────────────────────────────────────────

/// Index of a node inside an [`ExprTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprNode {
    /// Operand `@N`.
    Input(usize),
    Add { lhs: ExprId, rhs: ExprId },
    Mul { lhs: ExprId, rhs: ExprId },
}

/// A parsed expression.
#[derive(Debug, Clone)]
pub struct ExprTree {
    tokens: Vec<Token>,
    nodes: Vec<ExprNode>,
    root: ExprId,
}

impl ExprTree {
    /// Tokenizes and parses `statement`; the whole token stream must be consumed.
    pub fn parse(statement: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(statement)?;
        let mut parser = Parser {
            tokens: &tokens,
            index: 0,
            nodes: Vec::new(),
        };
        let root = parser.expr()?;
        if parser.index != tokens.len() {
            return Err(ExpressionError::Trailing {
                index: parser.index,
            });
        }
        let nodes = parser.nodes;
        Ok(Self {
            tokens,
            nodes,
            root,
        })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Token texts in source order.
    pub fn token_strs(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    pub fn nodes(&self) -> &[ExprNode] {
        &self.nodes
    }

    pub fn node(&self, id: ExprId) -> ExprNode {
        self.nodes[id.0]
    }

    pub fn root(&self) -> ExprId {
        self.root
    }

    /// Nodes in post-order (children before their operator).
    pub fn reverse_polish(&self) -> Vec<ExprNode> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((id, expanded)) = stack.pop() {
            let node = self.nodes[id.0];
            match node {
                ExprNode::Input(_) => order.push(node),
                ExprNode::Add { lhs, rhs } | ExprNode::Mul { lhs, rhs } => {
                    if expanded {
                        order.push(node);
                    } else {
                        stack.push((id, true));
                        stack.push((rhs, false));
                        stack.push((lhs, false));
                    }
                }
            }
        }
        order
    }

    /// Largest operand index referenced, if any.
    pub fn max_input(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                ExprNode::Input(i) => Some(*i),
                _ => None,
            })
            .max()
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    index: usize,
    nodes: Vec<ExprNode>,
}

impl Parser<'_> {
    fn push(&mut self, node: ExprNode) -> ExprId {
        self.nodes.push(node);
        ExprId(self.nodes.len() - 1)
    }

    fn next_kind(&mut self, expected: &'static str) -> Result<TokenKind, ExpressionError> {
        let token = self.tokens.get(self.index).ok_or(ExpressionError::Syntax {
            index: self.index,
            expected,
        })?;
        self.index += 1;
        Ok(token.kind)
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<(), ExpressionError> {
        let at = self.index;
        if self.next_kind(expected)? == kind {
            Ok(())
        } else {
            Err(ExpressionError::Syntax {
                index: at,
                expected,
            })
        }
    }

    fn expr(&mut self) -> Result<ExprId, ExpressionError> {
        let at = self.index;
        match self.next_kind("an operand or operator")? {
            TokenKind::Input(n) => Ok(self.push(ExprNode::Input(n))),
            op @ (TokenKind::Add | TokenKind::Mul) => {
                self.expect(TokenKind::LeftBracket, "'('")?;
                let lhs = self.expr()?;
                self.expect(TokenKind::Comma, "','")?;
                let rhs = self.expr()?;
                self.expect(TokenKind::RightBracket, "')'")?;
                let node = if op == TokenKind::Add {
                    ExprNode::Add { lhs, rhs }
                } else {
                    ExprNode::Mul { lhs, rhs }
                };
                Ok(self.push(node))
            }
            _ => Err(ExpressionError::Syntax {
                index: at,
                expected: "an operand or operator",
            }),
        }
    }
}
