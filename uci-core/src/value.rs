use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// The value of a single UCI option.
///
/// UCI stores either a plain `option` (one string) or a `list` (ordered
/// strings). Readers mostly do not care which one they got, so both forms can
/// be normalized with [`OptionValue::as_list`] and [`OptionValue::as_scalar`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// `option key 'value'`
    Scalar(String),
    /// `list key 'a'` / `list key 'b'`
    List(Vec<String>),
}

impl OptionValue {
    /// Build a list value from any iterator of strings.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Return the value as a list; a scalar becomes a one-element list.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::Scalar(value) => vec![value.clone()],
            Self::List(values) => values.clone(),
        }
    }

    /// Return the value as a single string; a list yields its first element.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value.as_str()),
            Self::List(values) => values.first().map(String::as_str),
        }
    }

    /// True if `needle` is the scalar value or one of the list entries.
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Self::Scalar(value) => value == needle,
            Self::List(values) => values.iter().any(|v| v == needle),
        }
    }

    /// `values` written the way `self` is: a scalar stays a scalar while there
    /// is exactly one value.
    pub fn with_values(&self, values: &[String]) -> Self {
        match (self, values) {
            (Self::Scalar(_), [only]) => Self::Scalar(only.clone()),
            _ => Self::List(values.to_vec()),
        }
    }

    /// True for an empty list. Scalars are never empty, even `''`.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::List(values) if values.is_empty())
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<&[&str]> for OptionValue {
    fn from(values: &[&str]) -> Self {
        Self::list(values.iter().copied())
    }
}

impl Display for OptionValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => write!(f, "'{value}'"),
            Self::List(values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
                write!(f, "{}", quoted.join(" "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OptionValue;

    #[test]
    fn scalar_and_list_normalize_to_each_other() {
        let scalar = OptionValue::from("eth0");
        let list = OptionValue::list(["eth0", "eth1"]);

        assert_eq!(scalar.as_list(), vec!["eth0"]);
        assert_eq!(list.as_scalar(), Some("eth0"));
        assert!(list.contains("eth1"));
        assert!(!scalar.contains("eth1"));
    }

    #[test]
    fn empty_list_has_no_scalar() {
        let empty = OptionValue::List(Vec::new());
        assert!(empty.is_empty());
        assert_eq!(empty.as_scalar(), None);
        assert!(!OptionValue::from("").is_empty());
    }
}
