//! エントリ検索クエリ
//!
//! Drive の `q` パラメータ形式への変換と、インメモリ照合の両方を提供する。

use crate::types::RemoteEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryQuery {
    /// `name = "<name>"`
    NameEquals(String),
    /// `"<id>" in parents`
    InParent(String),
}

impl EntryQuery {
    pub fn name(name: impl Into<String>) -> Self {
        Self::NameEquals(name.into())
    }

    pub fn parent(id: impl Into<String>) -> Self {
        Self::InParent(id.into())
    }

    /// Drive API の `q` 文字列
    pub fn to_drive_query(&self) -> String {
        match self {
            Self::NameEquals(name) => format!("name = \"{}\"", escape_query_value(name)),
            Self::InParent(id) => format!("\"{}\" in parents", escape_query_value(id)),
        }
    }

    pub fn matches(&self, entry: &RemoteEntry) -> bool {
        match self {
            Self::NameEquals(name) => entry.name == *name,
            Self::InParent(id) => entry.is_child_of(id),
        }
    }
}

impl std::fmt::Display for EntryQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_drive_query())
    }
}

fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_query_name() {
        assert_eq!(EntryQuery::name("Datasets").to_drive_query(), r#"name = "Datasets""#);
    }

    #[test]
    fn test_drive_query_parent() {
        assert_eq!(EntryQuery::parent("abc123").to_drive_query(), r#""abc123" in parents"#);
    }

    #[test]
    fn test_drive_query_escapes_quotes() {
        let query = EntryQuery::name(r#"my "best" \ set"#);
        assert_eq!(query.to_drive_query(), r#"name = "my \"best\" \\ set""#);
    }

    #[test]
    fn test_matches() {
        let entry = RemoteEntry::folder("c1", "label1", &["d1".to_string()]);
        assert!(EntryQuery::name("label1").matches(&entry));
        assert!(!EntryQuery::name("label2").matches(&entry));
        assert!(EntryQuery::parent("d1").matches(&entry));
        assert!(!EntryQuery::parent("c1").matches(&entry));
    }
}
