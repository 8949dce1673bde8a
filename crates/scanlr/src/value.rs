//! Dynamic semantic values
//!
//! [`Value`] is the result type of the in-line action mode and of the
//! built-in actions. It borrows matched text from the input where possible
//! and owns everything assembled during reductions. Production metadata and
//! the per-parse `extra` scratchpad use the same representation.

use hashbrown::HashMap;
use std::borrow::Cow;

/// A semantic value produced by parse actions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value<'i> {
    /// Absence of a value (suppressed match, missing optional).
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Matched or computed text. Borrows from the input when it comes
    /// straight from a token.
    Str(Cow<'i, str>),
    List(Vec<Value<'i>>),
    /// A record built from named matches (see the `obj` built-in action).
    Object(HashMap<String, Value<'i>>),
}

impl<'i> Value<'i> {
    /// Borrow input text as a value.
    #[must_use]
    pub const fn borrowed(s: &'i str) -> Self {
        Self::Str(Cow::Borrowed(s))
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The string content, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_list(&self) -> Option<&Vec<Value<'i>>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_object(&self) -> Option<&HashMap<String, Value<'i>>> {
        match self {
            Self::Object(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => {
                // Metadata and action results stay well below the 2^53
                // precision edge.
                #[allow(clippy::cast_precision_loss)]
                Some(*i as f64)
            }
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Deep-copy into a value that no longer borrows the input.
    #[must_use]
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Self::None => Value::None,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::Int(i),
            Self::Float(f) => Value::Float(f),
            Self::Str(s) => Value::Str(Cow::Owned(s.into_owned())),
            Self::List(items) => Value::List(items.into_iter().map(Value::into_owned).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_owned()))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value<'_> {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value<'_> {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Self::Str(Cow::Owned(s))
    }
}

impl<'i> From<&'i str> for Value<'i> {
    fn from(s: &'i str) -> Self {
        Self::Str(Cow::Borrowed(s))
    }
}

impl<'i> From<Vec<Value<'i>>> for Value<'i> {
    fn from(items: Vec<Value<'i>>) -> Self {
        Self::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_owned_detaches_from_input() {
        let input = String::from("abc");
        let v = Value::List(vec![Value::borrowed(&input), Value::Int(1)]);
        let owned: Value<'static> = v.into_owned();
        drop(input);
        assert_eq!(owned.as_list().unwrap()[0].as_str(), Some("abc"));
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Bool(true).as_f64(), None);
    }
}
