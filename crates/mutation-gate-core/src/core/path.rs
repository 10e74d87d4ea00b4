// crates/mutation-gate-core/src/core/path.rs
// ============================================================================
// Module: Path Expressions
// Description: Addressing language for locations inside nested documents.
// Purpose: Parse, validate, and render mutator locations.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Path`] is a sequence of object steps (named map fields) and list steps
//! (elements of a keyed list). Paths are immutable values: equality is
//! structural and clones are independent deep copies.
//!
//! ### Grammar (informal)
//! - `spec.replicas` addresses a map field.
//! - `spec.containers[name: nginx].image` matches the element whose `name` is `nginx`.
//! - `spec.containers[name: *].image` matches every element.
//! - `spec.containers[name]` (final step only) upserts an element keyed by `name`.
//! - Any name may be double-quoted: `metadata.labels."app.kubernetes.io/name"`.
//!
//! A list step must be followed by an object step or end the path; a glob may
//! not be the final step since every write needs a concrete target.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted path expression size in bytes.
const MAX_PATH_INPUT_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Path parse and validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// Input was empty or whitespace only.
    #[error("path is empty")]
    Empty,
    /// Input exceeded the size limit.
    #[error("path exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length.
        actual_bytes: usize,
    },
    /// Unexpected token.
    #[error("unexpected token `{found}` at {position}, expected {expected}")]
    UnexpectedToken {
        /// Expectation summary.
        expected: &'static str,
        /// Token actually seen.
        found: String,
        /// Byte offset in the input.
        position: usize,
    },
    /// Quoted string was not terminated.
    #[error("unterminated quoted string starting at {position}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },
    /// A list step directly followed another list step.
    #[error("list step at {position} directly follows a list step; nested lists are unsupported")]
    NestedList {
        /// Byte offset of the second list step.
        position: usize,
    },
    /// A list step appeared where an object step was required.
    #[error("path must begin with an object step")]
    LeadingList,
    /// The final node is a glob.
    #[error("glob cannot be the final step of a path")]
    GlobTerminal,
    /// An append marker appeared before the final node.
    #[error("append step `[{key_field}]` is only valid as the final step")]
    AppendNotTerminal {
        /// Key field of the misplaced append step.
        key_field: String,
    },
}

// ============================================================================
// SECTION: Path Model
// ============================================================================

/// Selector used by a list step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListSelector {
    /// Element whose key field equals the value.
    Key(String),
    /// Every element.
    Glob,
    /// Terminal insert position keyed by the written value.
    Append,
}

/// Step addressing a named field of a map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectStep {
    /// Field name.
    pub reference: String,
}

/// Step addressing elements of a keyed list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListStep {
    /// Field used as the element key.
    pub key_field: String,
    /// Element selector.
    pub selector: ListSelector,
}

impl ListStep {
    /// Returns true when this step matches every element.
    #[must_use]
    pub const fn is_glob(&self) -> bool {
        matches!(self.selector, ListSelector::Glob)
    }

    /// Returns the exact key value, if any.
    #[must_use]
    pub fn key_value(&self) -> Option<&str> {
        match &self.selector {
            ListSelector::Key(value) => Some(value),
            _ => None,
        }
    }
}

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathNode {
    /// Map field step.
    Object(ObjectStep),
    /// Keyed list step.
    List(ListStep),
}

impl PathNode {
    /// Builds an object step.
    #[must_use]
    pub fn object(reference: impl Into<String>) -> Self {
        Self::Object(ObjectStep {
            reference: reference.into(),
        })
    }

    /// Builds a list step.
    #[must_use]
    pub fn list(key_field: impl Into<String>, selector: ListSelector) -> Self {
        Self::List(ListStep {
            key_field: key_field.into(),
            selector,
        })
    }

    /// Returns the object step when this node is one.
    #[must_use]
    pub const fn as_object(&self) -> Option<&ObjectStep> {
        match self {
            Self::Object(step) => Some(step),
            Self::List(_) => None,
        }
    }

    /// Returns the list step when this node is one.
    #[must_use]
    pub const fn as_list(&self) -> Option<&ListStep> {
        match self {
            Self::List(step) => Some(step),
            Self::Object(_) => None,
        }
    }
}

/// Parsed location inside a document.
///
/// # Invariants
/// - Non-empty and begins with an object step.
/// - No two list steps are adjacent.
/// - The final node is not a glob; append steps only appear last.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    /// Validated path nodes.
    nodes: Vec<PathNode>,
}

impl Path {
    /// Builds a path from nodes, enforcing the path invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] when the node sequence is malformed.
    pub fn from_nodes(nodes: Vec<PathNode>) -> Result<Self, PathError> {
        validate_nodes(&nodes, false)?;
        Ok(Self {
            nodes,
        })
    }

    /// Builds a prefix path used by path tests, where a trailing glob is allowed.
    pub(crate) fn from_prefix_nodes(nodes: Vec<PathNode>) -> Result<Self, PathError> {
        validate_nodes(&nodes, true)?;
        Ok(Self {
            nodes,
        })
    }

    /// Returns the path nodes.
    #[must_use]
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a validated path; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the final node.
    #[must_use]
    pub fn last(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    /// Returns true when the first step references `field`.
    #[must_use]
    pub fn starts_with_field(&self, field: &str) -> bool {
        self.nodes
            .first()
            .and_then(PathNode::as_object)
            .is_some_and(|step| step.reference == field)
    }

    /// Returns true when every node of `self` equals the leading nodes of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.nodes.len() <= other.nodes.len()
            && self.nodes.iter().zip(other.nodes.iter()).all(|(a, b)| a == b)
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_path(input)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                PathNode::Object(step) => {
                    if index > 0 {
                        f.write_str(".")?;
                    }
                    write_name(f, &step.reference)?;
                }
                PathNode::List(step) => {
                    f.write_str("[")?;
                    write_name(f, &step.key_field)?;
                    match &step.selector {
                        ListSelector::Key(value) => {
                            f.write_str(": ")?;
                            write_name(f, value)?;
                        }
                        ListSelector::Glob => f.write_str(": *")?,
                        ListSelector::Append => {}
                    }
                    f.write_str("]")?;
                }
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_path(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Parses a path expression.
///
/// # Errors
///
/// Returns [`PathError`] for syntax errors and disallowed path shapes.
pub fn parse_path(input: &str) -> Result<Path, PathError> {
    let nodes = parse_nodes(input)?;
    Path::from_nodes(nodes)
}

/// Parses a path-test sub-path, which may end in a glob step.
pub(crate) fn parse_prefix_path(input: &str) -> Result<Path, PathError> {
    let nodes = parse_nodes(input)?;
    Path::from_prefix_nodes(nodes)
}

/// Renders a node slice in canonical form for diagnostics.
pub(crate) fn render_nodes(nodes: &[PathNode]) -> String {
    Path {
        nodes: nodes.to_vec(),
    }
    .to_string()
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates structural invariants of a node sequence.
fn validate_nodes(nodes: &[PathNode], allow_trailing_glob: bool) -> Result<(), PathError> {
    let Some(first) = nodes.first() else {
        return Err(PathError::Empty);
    };
    if first.as_list().is_some() {
        return Err(PathError::LeadingList);
    }
    for (index, pair) in nodes.windows(2).enumerate() {
        if pair[0].as_list().is_some() && pair[1].as_list().is_some() {
            return Err(PathError::NestedList {
                position: index + 1,
            });
        }
    }
    let last_index = nodes.len() - 1;
    for (index, node) in nodes.iter().enumerate() {
        let PathNode::List(step) = node else {
            continue;
        };
        match step.selector {
            ListSelector::Glob if index == last_index && !allow_trailing_glob => {
                return Err(PathError::GlobTerminal);
            }
            ListSelector::Append if index != last_index => {
                return Err(PathError::AppendNotTerminal {
                    key_field: step.key_field.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare identifier.
    Ident(String),
    /// Quoted string (unescaped contents).
    Quoted(String),
    /// `.` separator.
    Dot,
    /// `[` opening a list step.
    LBracket,
    /// `]` closing a list step.
    RBracket,
    /// `:` between key field and key value.
    Colon,
    /// `*` glob.
    Star,
    /// End of input.
    Eof,
}

impl Token {
    /// Renders the token for diagnostics.
    fn describe(&self) -> String {
        match self {
            Self::Ident(text) => text.clone(),
            Self::Quoted(text) => format!("\"{text}\""),
            Self::Dot => ".".to_string(),
            Self::LBracket => "[".to_string(),
            Self::RBracket => "]".to_string(),
            Self::Colon => ":".to_string(),
            Self::Star => "*".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

/// Token paired with its byte offset.
#[derive(Debug, Clone)]
struct SpannedToken {
    /// Token value.
    token: Token,
    /// Byte offset into the input.
    position: usize,
}

/// Returns true for characters that end a bare identifier.
const fn is_delimiter(ch: char) -> bool {
    matches!(ch, '.' | '[' | ']' | ':' | '"' | '*') || ch.is_whitespace()
}

/// Splits the input into tokens.
fn lex(input: &str) -> Result<Vec<SpannedToken>, PathError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(position, ch)) = chars.peek() {
        let simple = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '.' => Some(Token::Dot),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ':' => Some(Token::Colon),
            '*' => Some(Token::Star),
            _ => None,
        };
        if let Some(token) = simple {
            chars.next();
            tokens.push(SpannedToken {
                token,
                position,
            });
            continue;
        }
        if ch == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some((_, next)) = chars.next() {
                match next {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((_, escaped)) => text.push(escaped),
                        None => break,
                    },
                    other => text.push(other),
                }
            }
            if !closed {
                return Err(PathError::UnterminatedString {
                    position,
                });
            }
            tokens.push(SpannedToken {
                token: Token::Quoted(text),
                position,
            });
            continue;
        }
        let mut text = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if is_delimiter(next) {
                break;
            }
            text.push(next);
            chars.next();
        }
        tokens.push(SpannedToken {
            token: Token::Ident(text),
            position,
        });
    }
    tokens.push(SpannedToken {
        token: Token::Eof,
        position: input.len(),
    });
    Ok(tokens)
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Parses the input into an unvalidated node list.
fn parse_nodes(input: &str) -> Result<Vec<PathNode>, PathError> {
    if input.len() > MAX_PATH_INPUT_BYTES {
        return Err(PathError::InputTooLarge {
            max_bytes: MAX_PATH_INPUT_BYTES,
            actual_bytes: input.len(),
        });
    }
    if input.trim().is_empty() {
        return Err(PathError::Empty);
    }
    let mut parser = Parser {
        tokens: lex(input)?,
        index: 0,
    };
    parser.parse()
}

/// Recursive-descent parser over the token stream.
struct Parser {
    /// Token stream.
    tokens: Vec<SpannedToken>,
    /// Current token index.
    index: usize,
}

impl Parser {
    /// Parses `segment ('.' segment)*`.
    fn parse(&mut self) -> Result<Vec<PathNode>, PathError> {
        let mut nodes = Vec::new();
        loop {
            let reference = self.expect_name("field name")?;
            nodes.push(PathNode::object(reference));
            if self.peek().token == Token::LBracket {
                nodes.push(self.parse_list_step()?);
                let next = self.peek();
                if next.token == Token::LBracket {
                    return Err(PathError::NestedList {
                        position: next.position,
                    });
                }
            }
            let next = self.advance();
            match next.token {
                Token::Dot => {}
                Token::Eof => break,
                other => {
                    return Err(PathError::UnexpectedToken {
                        expected: "`.` or end of input",
                        found: other.describe(),
                        position: next.position,
                    });
                }
            }
        }
        Ok(nodes)
    }

    /// Parses `'[' key (':' (value | '*'))? ']'`.
    fn parse_list_step(&mut self) -> Result<PathNode, PathError> {
        self.advance();
        let key_field = self.expect_name("list key field")?;
        let selector = if self.peek().token == Token::Colon {
            self.advance();
            if self.peek().token == Token::Star {
                self.advance();
                ListSelector::Glob
            } else {
                ListSelector::Key(self.expect_name("list key value or `*`")?)
            }
        } else {
            ListSelector::Append
        };
        let close = self.advance();
        if close.token != Token::RBracket {
            return Err(PathError::UnexpectedToken {
                expected: "`]`",
                found: close.token.describe(),
                position: close.position,
            });
        }
        Ok(PathNode::list(key_field, selector))
    }

    /// Consumes an identifier or quoted string.
    fn expect_name(&mut self, expected: &'static str) -> Result<String, PathError> {
        let next = self.advance();
        match next.token {
            Token::Ident(text) | Token::Quoted(text) => Ok(text),
            other => Err(PathError::UnexpectedToken {
                expected,
                found: other.describe(),
                position: next.position,
            }),
        }
    }

    /// Returns the current token without consuming it.
    fn peek(&self) -> &SpannedToken {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)]
    }

    /// Consumes the current token; the end-of-input token repeats forever.
    fn advance(&mut self) -> SpannedToken {
        let token = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Writes a name, quoting it when it would not lex as a bare identifier.
fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let needs_quotes = name.is_empty() || name.chars().any(|ch| is_delimiter(ch) || ch == '\\');
    if !needs_quotes {
        return f.write_str(name);
    }
    f.write_str("\"")?;
    for ch in name.chars() {
        if ch == '"' || ch == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{ch}")?;
    }
    f.write_str("\"")
}

// ============================================================================
// SECTION: Tests
// ============================================================================
