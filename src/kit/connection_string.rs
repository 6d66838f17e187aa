use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::DbToolsError;

static PAIR_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r#"\s*([^=;]+?)\s*=\s*("(?:[^"]|"")*"|'(?:[^']|'')*'|[^;]*?)\s*(?:;|$)"#)
});

/// Ordered `key=value;` connection string.
///
/// Keys are compared case-insensitively and keep the casing of their first
/// insertion. Values containing `;`, `=` or quotes are quoted on output.
///
/// ```rust
/// use db_tools::prelude::*;
///
/// let mut b = ConnectionStringBuilder::parse("Data Source=srv;Initial Catalog=Sales").unwrap();
/// b.set("Application Name", "backup job");
/// assert_eq!(b.initial_catalog(), Some("Sales"));
/// assert_eq!(b.to_string(), "Data Source=srv;Initial Catalog=Sales;Application Name=backup job");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStringBuilder {
    pairs: Vec<(String, String)>,
}

impl ConnectionStringBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a connection string.
    ///
    /// # Errors
    /// Returns [`DbToolsError::ConfigError`] if a segment is not a
    /// `key=value` pair.
    pub fn parse(connection_string: &str) -> Result<Self, DbToolsError> {
        let pattern = PAIR_PATTERN
            .as_ref()
            .map_err(|e| DbToolsError::ConfigError(format!("connection string pattern: {e}")))?;
        let mut builder = Self::new();
        let mut consumed = 0;
        for caps in pattern.captures_iter(connection_string) {
            let (Some(whole), Some(key), Some(value)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if whole.start() != consumed {
                break;
            }
            consumed = whole.end();
            builder.set(key.as_str(), unquote(value.as_str()));
        }
        if !connection_string[consumed..].trim().trim_matches(';').is_empty() {
            return Err(DbToolsError::ConfigError(format!(
                "malformed connection string near '{}'",
                &connection_string[consumed..]
            )));
        }
        Ok(builder)
    }

    /// Set `key`, replacing an existing value in place.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.position(key) {
            Some(i) => self.pairs[i].1 = value,
            None => self.pairs.push((key.trim().to_string(), value)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.pairs[i].1.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.position(key).map(|i| self.pairs.remove(i).1)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// First non-blank value among `keys`.
    #[must_use]
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.trim().is_empty())
    }

    #[must_use]
    pub fn data_source(&self) -> Option<&str> {
        self.get_any(&["Data Source", "Server", "Address"])
    }

    #[must_use]
    pub fn initial_catalog(&self) -> Option<&str> {
        self.get_any(&["Initial Catalog", "Database"])
    }

    fn position(&self, key: &str) -> Option<usize> {
        let key = key.trim();
        self.pairs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for ConnectionStringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{key}={}", quote(value))?;
        }
        Ok(())
    }
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            let doubled: String = [q, q].iter().collect();
            return value[1..value.len() - 1].replace(&doubled, &q.to_string());
        }
    }
    value.to_string()
}

fn quote(value: &str) -> String {
    let needs_quotes = value.contains([';', '=', '"', '\''])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if !needs_quotes {
        return value.to_string();
    }
    if value.contains('"') {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        format!("\"{value}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive_and_ordered() {
        let mut b = ConnectionStringBuilder::parse("server=a; DATABASE = Sales ;").unwrap();
        assert_eq!(b.data_source(), Some("a"));
        assert_eq!(b.initial_catalog(), Some("Sales"));
        b.set("Database", "Other");
        assert_eq!(b.to_string(), "server=a;DATABASE=Other");
    }

    #[test]
    fn quoted_values_round_trip() {
        let b = ConnectionStringBuilder::parse(r#"Password="a;b""c";User ID=sa"#).unwrap();
        assert_eq!(b.get("password"), Some(r#"a;b"c"#));
        let again = ConnectionStringBuilder::parse(&b.to_string()).unwrap();
        assert_eq!(again, b);
    }

    #[test]
    fn segment_without_equals_is_rejected() {
        assert!(ConnectionStringBuilder::parse("Data Source=x;garbage").is_err());
    }
}
