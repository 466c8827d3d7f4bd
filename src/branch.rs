//! Branch naming: slugs derived from issues and issue identifiers found in branch names.

use crate::issue::Issue;

use anyhow::{Context, Result};
use git2::Repository;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9\s]").unwrap();
    static ref IDENTIFIER: Regex = Regex::new(r"(?i)(?:^|[^a-z0-9])([a-z][a-z0-9]*-\d+)").unwrap();
}

/// How issue titles are turned into branch name fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugStyle {
    /// Lowercase, drop everything except `[a-z0-9]`, whitespace runs become `-`
    Strict,
    /// Lowercase, trim, whitespace runs become `-`
    Loose,
}

#[derive(Debug, Error)]
#[error("Unknown slug style '{0}' (expected 'strict' or 'loose')")]
pub struct SlugStyleErr(String);

impl FromStr for SlugStyle {
    type Err = SlugStyleErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(SlugStyle::Strict),
            "loose" => Ok(SlugStyle::Loose),
            _ => Err(SlugStyleErr(s.to_owned())),
        }
    }
}

pub fn slugify(text: &str, style: SlugStyle) -> String {
    let lower = text.to_lowercase();
    let kept = match style {
        SlugStyle::Strict => NON_SLUG.replace_all(&lower, ""),
        SlugStyle::Loose => lower.as_str().into(),
    };
    WHITESPACE.replace_all(kept.trim(), "-").into_owned()
}

/// Cleans up a branch name typed by the user
pub fn normalize(input: &str) -> String {
    WHITESPACE
        .replace_all(input.trim(), "-")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchPolicy {
    pub style: SlugStyle,
    /// Append a title fragment after the identifier
    pub include_title: bool,
    /// Use the tracker's suggested branch name if there is one
    pub prefer_tracker: bool,
    pub max_len: usize,
}

impl Default for BranchPolicy {
    fn default() -> Self {
        Self {
            style: SlugStyle::Strict,
            include_title: true,
            prefer_tracker: true,
            max_len: 60,
        }
    }
}

impl BranchPolicy {
    /// Proposed branch name for `issue`. The user gets to edit it before anything is created.
    pub fn propose(&self, issue: &Issue) -> String {
        if self.prefer_tracker {
            if let Some(b) = issue.branch_name.as_deref().filter(|b| !b.is_empty()) {
                return b.to_owned();
            }
        }
        let mut name = issue.identifier.to_lowercase();
        if self.include_title {
            let title = slugify(&issue.title, self.style);
            if !title.is_empty() {
                name.push('-');
                name.push_str(&title);
            }
        }
        truncate(name, self.max_len)
    }
}

/// Cuts at `max` chars without leaving a trailing hyphen
fn truncate(mut name: String, max: usize) -> String {
    if let Some((idx, _)) = name.char_indices().nth(max) {
        name.truncate(idx);
    }
    while name.ends_with('-') {
        name.pop();
    }
    name
}

/// Issue identifiers contained in a branch name, uppercased, in order of preference.
///
/// Identifiers of `team` come first, otherwise the order within the name is kept.
/// Examples: "eng-42-fix-login" => ["ENG-42"], "release-2024-eng-42" with team "ENG" =>
/// ["ENG-42", "RELEASE-2024"]
pub fn identifiers_in(branch: &str, team: Option<&str>) -> Vec<String> {
    let mut ids: Vec<String> = IDENTIFIER
        .captures_iter(branch)
        .map(|cap| cap[1].to_uppercase())
        .collect();
    if let Some(team) = team {
        let prefix = format!("{}-", team.to_uppercase());
        // stable sort keeps the original order within both groups
        ids.sort_by_key(|id| !id.starts_with(&prefix));
    }
    ids
}

/// Name of the branch checked out in the repository containing `workdir`
pub fn current(workdir: &Path) -> Result<String> {
    let repo = Repository::discover(workdir)
        .with_context(|| format!("No git repository found at {}", workdir.display()))?;
    let head = repo.head().context("Cannot resolve HEAD")?;
    anyhow::ensure!(head.is_branch(), "HEAD is detached");
    head.shorthand()
        .map(String::from)
        .context("Branch name is not valid UTF-8")
}
