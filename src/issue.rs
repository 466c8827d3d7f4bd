use serde::Deserialize;
use smol_str::SmolStr;
use std::fmt;

/// Tracked work item as presented in pick lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Issue {
    /// Team-prefixed short code, e.g. `ENG-123`
    pub identifier: SmolStr,
    pub title: String,
    /// Branch slug suggested by the tracker
    #[serde(default, rename = "branchName")]
    pub branch_name: Option<String>,
    /// Cycle/sprint label, only used for display
    #[serde(skip)]
    pub group_label: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Issue {
    #[cfg(test)]
    pub fn new(identifier: &str, title: &str) -> Self {
        Self {
            identifier: SmolStr::from(identifier),
            title: title.to_owned(),
            ..Self::default()
        }
    }

    /// Cheap local filter: every whitespace separated term must occur in identifier or title.
    pub fn matches(&self, query: &str) -> bool {
        let id = self.identifier.to_lowercase();
        let title = self.title.to_lowercase();
        query
            .split_whitespace()
            .map(str::to_lowercase)
            .all(|term| id.contains(&term) || title.contains(&term))
    }
}

impl fmt::Display for Issue {
    /// Alternate display appends the group label
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identifier, self.title)?;
        match &self.group_label {
            Some(label) if f.alternate() => write!(f, " ({})", label),
            _ => Ok(()),
        }
    }
}
