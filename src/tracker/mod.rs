pub mod linear;

use crate::issue::Issue;

use async_trait::async_trait;
pub use linear::Linear;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Linear(#[from] linear::Error),
}

/// Fields for a new issue
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Draft {
    pub title: String,
    pub description: Option<String>,
    /// Team key like `ENG`. Falls back to the first team visible to the viewer.
    pub team: Option<String>,
    pub assign_to_me: bool,
}

/// Single field modification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Title(String),
    Description(String),
    /// 0 (none) to 4 (low)
    Priority(u8),
    /// Workflow state name as shown in the tracker, e.g. "In Progress"
    State(String),
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Title(t) => write!(f, "title = {:?}", t),
            Change::Description(_) => write!(f, "description"),
            Change::Priority(p) => write!(f, "priority = {}", p),
            Change::State(s) => write!(f, "state = {:?}", s),
        }
    }
}

#[async_trait]
pub trait Tracker: Send + Sync {
    /// Open issues assigned to the current user. This is the picker's default list.
    async fn assigned(&self) -> Result<Vec<Issue>, Error>;

    /// Full-text search over all issues
    async fn search(&self, query: &str) -> Result<Vec<Issue>, Error>;

    async fn create_issue(&self, draft: &Draft) -> Result<Issue, Error>;

    /// Looks up a single issue by identifier
    async fn issue(&self, identifier: &str) -> Result<Issue, Error>;

    async fn update_issue(&self, identifier: &str, change: &Change) -> Result<Issue, Error>;

    fn name(&self) -> String;
}
