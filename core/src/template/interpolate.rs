// cartograph/src/template/interpolate.rs

//! Substitution of `$(reference)$` tags in template bodies.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::template::path::{JsonPath, PathError};

const TAG_OPEN: &str = "$(";
const TAG_CLOSE: &str = ")$";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpolationError {
  #[error("unresolved reference '{reference}': {source}")]
  Unresolved {
    reference: String,
    #[source]
    source: PathError,
  },
}

/// Renders a partially abstract body against a context. The stamper treats
/// implementations as a black box.
pub trait Evaluator: Send + Sync {
  fn evaluate(&self, body: &Value, context: &Value) -> Result<Value, InterpolationError>;
}

/// Default evaluator.
///
/// A string that is exactly one tag is replaced by the referenced value with
/// its type preserved (`"$(params.replicas)$"` can become `3`). Tags embedded
/// in longer strings are substituted by the value's text form. Only
/// `$(<path>)$` with a parseable path is a tag; any other `$(` is copied
/// through, so shell text such as `echo $(date)` survives rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagInterpolator;

impl Evaluator for TagInterpolator {
  fn evaluate(&self, body: &Value, context: &Value) -> Result<Value, InterpolationError> {
    match body {
      Value::Object(map) => {
        let mut rendered = Map::with_capacity(map.len());
        for (key, value) in map {
          rendered.insert(key.clone(), self.evaluate(value, context)?);
        }
        Ok(Value::Object(rendered))
      }
      Value::Array(items) => items
        .iter()
        .map(|item| self.evaluate(item, context))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array),
      Value::String(text) => interpolate_str(text, context),
      other => Ok(other.clone()),
    }
  }
}

fn interpolate_str(text: &str, context: &Value) -> Result<Value, InterpolationError> {
  if !text.contains(TAG_OPEN) {
    return Ok(Value::String(text.to_string()));
  }

  if let Some(path) = sole_tag(text) {
    return lookup(&path, context).cloned();
  }

  let mut rendered = String::with_capacity(text.len());
  let mut rest = text;
  while let Some(start) = rest.find(TAG_OPEN) {
    rendered.push_str(&rest[..start]);
    let after_open = &rest[start + TAG_OPEN.len()..];
    match tag_at(after_open) {
      Some((path, consumed)) => {
        match lookup(&path, context)? {
          Value::String(s) => rendered.push_str(s),
          other => rendered.push_str(&other.to_string()),
        }
        rest = &after_open[consumed..];
      }
      None => {
        rendered.push_str(TAG_OPEN);
        rest = after_open;
      }
    }
  }
  rendered.push_str(rest);
  Ok(Value::String(rendered))
}

/// Parses the tag whose opener was just consumed. Returns the reference and
/// the byte length through the closing `)$`, or `None` when the text after
/// the opener is not a well-formed tag.
fn tag_at(after_open: &str) -> Option<(JsonPath, usize)> {
  let end = after_open.find(TAG_CLOSE)?;
  let inner = &after_open[..end];
  if inner.contains(TAG_OPEN) {
    return None;
  }
  let path = JsonPath::parse(inner).ok()?;
  Some((path, end + TAG_CLOSE.len()))
}

/// Returns the reference when `text` consists of a single tag and nothing else.
fn sole_tag(text: &str) -> Option<JsonPath> {
  let after_open = text.strip_prefix(TAG_OPEN)?;
  let (path, consumed) = tag_at(after_open)?;
  (consumed == after_open.len()).then_some(path)
}

fn lookup<'c>(path: &JsonPath, context: &'c Value) -> Result<&'c Value, InterpolationError> {
  path.evaluate(context).map_err(|source| InterpolationError::Unresolved {
    reference: path.as_str().to_string(),
    source,
  })
}
