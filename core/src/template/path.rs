// cartograph/src/template/path.rs

//! A small JSONPath subset used for output paths and template references.
//!
//! Accepted forms, optionally prefixed by `$` and/or wrapped in `{}`:
//! `.status.image`, `status.image`, `.data['some.key']`, `.items[0]` and
//! `.status.conditions[?(@.type=="Ready")].status`.

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
  #[error("invalid path '{path}': {message}")]
  Parse { path: String, message: String },

  #[error("no value at '{at}' while evaluating '{path}'")]
  Missing { path: String, at: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
  Field(String),
  Index(usize),
  /// `[?(@.a.b == literal)]`: first array element whose field path equals the literal.
  Filter { fields: Vec<String>, equals: Value },
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Segment::Field(name) => write!(f, ".{}", name),
      Segment::Index(idx) => write!(f, "[{}]", idx),
      Segment::Filter { fields, equals } => write!(f, "[?(@.{}=={})]", fields.join("."), equals),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
  raw: String,
  segments: Vec<Segment>,
}

impl JsonPath {
  pub fn parse(path: &str) -> Result<Self, PathError> {
    Parser::new(path).parse()
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  /// Resolves the path against `root`. A `null` leaf counts as missing: a
  /// field that exists but was never populated is not an output yet.
  pub fn evaluate<'v>(&self, root: &'v Value) -> Result<&'v Value, PathError> {
    let mut current = root;
    let mut walked = String::new();
    for segment in &self.segments {
      walked.push_str(&segment.to_string());
      let next = match segment {
        Segment::Field(name) => current.get(name.as_str()),
        Segment::Index(idx) => current.as_array().and_then(|items| items.get(*idx)),
        Segment::Filter { fields, equals } => current.as_array().and_then(|items| {
          items.iter().find(|item| {
            fields
              .iter()
              .try_fold(*item, |v, field| v.get(field.as_str()))
              .map_or(false, |found| found == equals)
          })
        }),
      };
      current = match next {
        Some(value) if !value.is_null() => value,
        _ => {
          return Err(PathError::Missing {
            path: self.raw.clone(),
            at: walked,
          })
        }
      };
    }
    Ok(current)
  }
}

impl FromStr for JsonPath {
  type Err = PathError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    JsonPath::parse(s)
  }
}

impl fmt::Display for JsonPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

struct Parser<'a> {
  raw: &'a str,
  chars: Vec<char>,
  pos: usize,
}

impl<'a> Parser<'a> {
  fn new(raw: &'a str) -> Self {
    let mut body = raw.trim();
    if let Some(inner) = body.strip_prefix('{').and_then(|b| b.strip_suffix('}')) {
      body = inner.trim();
    }
    let body = body.strip_prefix('$').unwrap_or(body);
    Self {
      raw,
      chars: body.chars().collect(),
      pos: 0,
    }
  }

  fn error(&self, message: impl Into<String>) -> PathError {
    PathError::Parse {
      path: self.raw.to_string(),
      message: message.into(),
    }
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn parse(mut self) -> Result<JsonPath, PathError> {
    let mut segments = Vec::new();
    // A bare leading identifier is allowed: `status.image`.
    if matches!(self.peek(), Some(c) if c != '.' && c != '[') {
      segments.push(Segment::Field(self.identifier()?));
    }
    while let Some(c) = self.peek() {
      match c {
        '.' => {
          self.pos += 1;
          segments.push(Segment::Field(self.identifier()?));
        }
        '[' => {
          self.pos += 1;
          segments.push(self.bracket()?);
        }
        other => return Err(self.error(format!("unexpected character '{}' at {}", other, self.pos))),
      }
    }
    if segments.is_empty() {
      return Err(self.error("path is empty"));
    }
    Ok(JsonPath {
      raw: self.raw.trim().to_string(),
      segments,
    })
  }

  fn identifier(&mut self) -> Result<String, PathError> {
    let start = self.pos;
    while matches!(self.peek(), Some(c) if !matches!(c, '.' | '[' | ']' | '(' | ')' | '$') && !c.is_whitespace()) {
      self.pos += 1;
    }
    if start == self.pos {
      return Err(self.error(format!("empty field name at {}", start)));
    }
    Ok(self.chars[start..self.pos].iter().collect())
  }

  fn bracket(&mut self) -> Result<Segment, PathError> {
    let segment = match self.peek() {
      Some(quote @ ('\'' | '"')) => {
        self.pos += 1;
        Segment::Field(self.quoted(quote)?)
      }
      Some('?') => self.filter()?,
      Some(c) if c.is_ascii_digit() => {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
          self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        let idx = digits.parse().map_err(|_| self.error(format!("invalid index '{}'", digits)))?;
        Segment::Index(idx)
      }
      _ => return Err(self.error(format!("unsupported bracket expression at {}", self.pos))),
    };
    self.expect(']')?;
    Ok(segment)
  }

  fn quoted(&mut self, quote: char) -> Result<String, PathError> {
    let start = self.pos;
    while matches!(self.peek(), Some(c) if c != quote) {
      self.pos += 1;
    }
    if self.peek().is_none() {
      return Err(self.error("unterminated quoted name"));
    }
    let name: String = self.chars[start..self.pos].iter().collect();
    self.pos += 1;
    Ok(name)
  }

  fn filter(&mut self) -> Result<Segment, PathError> {
    self.expect('?')?;
    self.expect('(')?;
    self.expect('@')?;
    let mut fields: Vec<String> = Vec::new();
    while self.peek() == Some('.') {
      self.pos += 1;
      let start = self.pos;
      while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-') {
        self.pos += 1;
      }
      if start == self.pos {
        return Err(self.error("empty field name in filter"));
      }
      fields.push(self.chars[start..self.pos].iter().collect());
    }
    self.skip_spaces();
    self.expect('=')?;
    self.expect('=')?;
    self.skip_spaces();
    let start = self.pos;
    while matches!(self.peek(), Some(c) if c != ')') {
      self.pos += 1;
    }
    let literal: String = self.chars[start..self.pos].iter().collect();
    self.expect(')')?;
    Ok(Segment::Filter {
      fields,
      equals: parse_literal(literal.trim()),
    })
  }

  fn skip_spaces(&mut self) {
    while self.peek() == Some(' ') {
      self.pos += 1;
    }
  }

  fn expect(&mut self, expected: char) -> Result<(), PathError> {
    match self.peek() {
      Some(c) if c == expected => {
        self.pos += 1;
        Ok(())
      }
      Some(c) => Err(self.error(format!("expected '{}' but found '{}' at {}", expected, c, self.pos))),
      None => Err(self.error(format!("expected '{}' but reached the end", expected))),
    }
  }
}

fn parse_literal(literal: &str) -> Value {
  for quote in ['\'', '"'] {
    if let Some(inner) = literal.strip_prefix(quote).and_then(|l| l.strip_suffix(quote)) {
      return Value::String(inner.to_string());
    }
  }
  serde_json::from_str(literal).unwrap_or_else(|_| Value::String(literal.to_string()))
}
