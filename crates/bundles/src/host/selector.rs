//! Compound selectors for locating host structure
//!
//! Only compound selectors are supported: a tag, an id, any number of
//! classes and attribute tests, all applying to the same element
//! (`tr.zA`, `#loading`, `div.ar.as`, `[data-bundle="Work"]`).
//! Descendant matching is done by the caller via `Document::query_all`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors from parsing a selector string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Unexpected character '{found}' at offset {offset} in selector '{selector}'")]
    Unexpected {
        selector: String,
        offset: usize,
        found: char,
    },
    #[error("Unterminated attribute test in selector '{0}'")]
    Unterminated(String),
}

/// Attribute test inside a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeTest {
    Present(String),
    Equals(String, String),
}

impl AttributeTest {
    fn name(&self) -> &str {
        match self {
            AttributeTest::Present(n) | AttributeTest::Equals(n, _) => n,
        }
    }
}

/// A compound selector
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeTest>,
}

impl Selector {
    /// Selector matching elements with the given tag
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Selector matching the element with the given id
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Builder method to require an additional class
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Selector matching elements that carry the given class
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            classes: vec![class.into()],
            ..Self::default()
        }
    }

    /// Selector matching elements that carry the attribute at all
    pub fn attribute_present(name: impl Into<String>) -> Self {
        Self {
            attributes: vec![AttributeTest::Present(name.into())],
            ..Self::default()
        }
    }

    /// Selector matching an exact attribute value; no quoting concerns
    pub fn attribute_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attributes: vec![AttributeTest::Equals(name.into(), value.into())],
            ..Self::default()
        }
    }

    /// Test an element given its tag and an attribute lookup
    pub fn matches_with<F>(&self, tag: &str, attribute: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(expected) = &self.tag
            && !expected.eq_ignore_ascii_case(tag)
        {
            return false;
        }
        if let Some(id) = &self.id
            && attribute("id").as_deref() != Some(id.as_str())
        {
            return false;
        }
        if !self.classes.is_empty() {
            let class_attr = attribute("class").unwrap_or_default();
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|test| match test {
            AttributeTest::Present(name) => attribute(name).is_some(),
            AttributeTest::Equals(name, value) => attribute(name).as_deref() == Some(value),
        })
    }

    /// Test an owned markup element
    pub fn matches_element(&self, element: &super::VElement) -> bool {
        self.matches_with(&element.tag, |name| element.attribute(name).map(str::to_string))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let source = s.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }

        let chars: Vec<char> = source.chars().collect();
        let unexpected = |offset: usize| SelectorError::Unexpected {
            selector: source.to_string(),
            offset,
            found: chars[offset],
        };
        let ident = |start: usize| -> (String, usize) {
            let mut end = start;
            while end < chars.len() && is_ident_char(chars[end]) {
                end += 1;
            }
            (chars[start..end].iter().collect(), end)
        };

        let mut selector = Selector::default();
        let mut pos = 0;
        while pos < chars.len() {
            match chars[pos] {
                '.' | '#' => {
                    let (name, end) = ident(pos + 1);
                    if name.is_empty() {
                        return Err(unexpected(pos));
                    }
                    if chars[pos] == '.' {
                        selector.classes.push(name);
                    } else {
                        selector.id = Some(name);
                    }
                    pos = end;
                }
                '[' => {
                    let close = chars[pos..]
                        .iter()
                        .position(|&c| c == ']')
                        .map(|i| pos + i)
                        .ok_or_else(|| SelectorError::Unterminated(source.to_string()))?;
                    let body: String = chars[pos + 1..close].iter().collect();
                    let test = match body.split_once('=') {
                        Some((name, value)) => {
                            let value = value.trim();
                            let value = value
                                .strip_prefix('"')
                                .and_then(|v| v.strip_suffix('"'))
                                .unwrap_or(value);
                            AttributeTest::Equals(name.trim().to_string(), value.to_string())
                        }
                        None => AttributeTest::Present(body.trim().to_string()),
                    };
                    if test.name().is_empty() || !test.name().chars().all(is_ident_char) {
                        return Err(unexpected(pos));
                    }
                    selector.attributes.push(test);
                    pos = close + 1;
                }
                c if is_ident_char(c) && pos == 0 => {
                    let (name, end) = ident(pos);
                    selector.tag = Some(name);
                    pos = end;
                }
                _ => return Err(unexpected(pos)),
            }
        }
        Ok(selector)
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tag) = &self.tag {
            write!(f, "{}", tag)?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{}", id)?;
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        for test in &self.attributes {
            match test {
                AttributeTest::Present(name) => write!(f, "[{}]", name)?,
                AttributeTest::Equals(name, value) => write!(f, "[{}=\"{}\"]", name, value)?,
            }
        }
        Ok(())
    }
}
