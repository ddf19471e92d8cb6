//! Scenario variables and `${name}` placeholders

use std::borrow::Cow;
use std::collections::HashMap;

pub const VARIABLE_PREFIX: &str = "${";
pub const VARIABLE_SUFFIX: &str = "}";

/// Placeholder text for a deferred variable reference.
#[must_use]
pub fn placeholder(name: &str) -> String {
    format!("{VARIABLE_PREFIX}{name}{VARIABLE_SUFFIX}")
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown variable: {0}")]
pub struct UnknownVariable(pub String);

/// Name → value mapping owned by one scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableContext {
    values: HashMap<String, String>,
}

impl VariableContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every `${name}` in `text` with its value.
    ///
    /// An unterminated `${` is kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVariable`] for the first placeholder with no value.
    pub fn resolve(&self, text: &str) -> Result<String, UnknownVariable> {
        self.resolve_with(text, Cow::Borrowed)
    }

    /// Like [`resolve`](Self::resolve), passing each value through `encode`
    /// before it is inserted. Text outside placeholders is left as is.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownVariable`] for the first placeholder with no value.
    pub fn resolve_with<'v>(
        &'v self,
        text: &str,
        encode: impl Fn(&'v str) -> Cow<'v, str>,
    ) -> Result<String, UnknownVariable> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(VARIABLE_PREFIX) {
            let after = &rest[start + VARIABLE_PREFIX.len()..];
            let Some(end) = after.find(VARIABLE_SUFFIX) else {
                break;
            };
            let name = &after[..end];
            let value = self
                .get(name)
                .ok_or_else(|| UnknownVariable(name.to_string()))?;
            out.push_str(&rest[..start]);
            out.push_str(&encode(value));
            rest = &after[end + VARIABLE_SUFFIX.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for VariableContext {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = Self::new();
        ctx.extend(iter);
        ctx
    }
}
